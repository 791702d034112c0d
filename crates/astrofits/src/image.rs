//! Image pixel buffers and their big-endian codec.
//!
//! An [`Image`] is a closed sum over the pixel types BITPIX can name. Each
//! variant wraps an [`ImageBuffer`] whose pixels are stored row-major with
//! `x` varying fastest, as in the FITS data array. Axes beyond the second
//! are folded into `height`.

use alloc::format;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;

use crate::bitpix::Bitpix;
use crate::card::Card;
use crate::endian::{decode_slice, encode_slice, BigEndian};
use crate::error::{Error, Result};
use crate::header::Header;

/// A numeric type that can be stored as image pixels.
pub trait Pixel: BigEndian + PartialOrd + Default + fmt::Debug {
    const BITPIX: Bitpix;

    fn to_f64(self) -> f64;

    fn into_image(buffer: ImageBuffer<Self>) -> Image;

    fn buffer(image: &Image) -> Option<&ImageBuffer<Self>>;

    fn buffer_mut(image: &mut Image) -> Option<&mut ImageBuffer<Self>>;
}

macro_rules! pixel {
    ($($t:ty => $variant:ident),*) => {$(
        impl Pixel for $t {
            const BITPIX: Bitpix = Bitpix::$variant;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            fn into_image(buffer: ImageBuffer<Self>) -> Image {
                Image::$variant(buffer)
            }

            fn buffer(image: &Image) -> Option<&ImageBuffer<Self>> {
                match image {
                    Image::$variant(b) => Some(b),
                    _ => None,
                }
            }

            fn buffer_mut(image: &mut Image) -> Option<&mut ImageBuffer<Self>> {
                match image {
                    Image::$variant(b) => Some(b),
                    _ => None,
                }
            }
        }
    )*};
}

pixel!(u8 => U8, i16 => I16, i32 => I32, i64 => I64, f32 => F32, f64 => F64);

/// Pixels of one type with their 2-D shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Pixel> ImageBuffer<T> {
    /// Wrap `data`; its length must be `width × height`.
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| Error::format("image size overflows usize"))?;
        if data.len() != expected {
            return Err(Error::FitsFormat(format!(
                "{} pixels do not fill a {}x{} image",
                data.len(),
                width,
                height
            )));
        }
        Ok(ImageBuffer {
            data,
            width,
            height,
        })
    }

    /// A `width × height` image of zeros.
    pub fn zeros(width: usize, height: usize) -> Self {
        ImageBuffer {
            data: alloc::vec![T::default(); width * height],
            width,
            height,
        }
    }

    pub fn empty() -> Self {
        ImageBuffer {
            data: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    /// Decode `width × height` big-endian pixels from the front of `bytes`.
    pub fn from_be_bytes(width: usize, height: usize, bytes: &[u8]) -> Result<Self> {
        let count = width
            .checked_mul(height)
            .ok_or_else(|| Error::format("image size overflows usize"))?;
        let needed = count * T::SIZE;
        if bytes.len() < needed {
            return Err(Error::UnexpectedEof {
                offset: 0,
                needed,
                available: bytes.len(),
            });
        }
        Self::new(width, height, decode_slice(&bytes[..needed]))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Pixel at column `x`, row `y`.
    pub fn pixel(&self, x: usize, y: usize) -> Option<T> {
        self.index(x, y).map(|i| self.data[i])
    }

    pub fn pixel_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        self.index(x, y).map(move |i| &mut self.data[i])
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Append the big-endian pixel bytes to `out`.
    pub fn write_be(&self, out: &mut Vec<u8>) {
        encode_slice(&self.data, out);
    }

    // ── Statistics ──
    //
    // NaN pixels (blank float pixels) are left out of every statistic.

    fn values(&self) -> impl Iterator<Item = T> + '_ {
        self.data.iter().copied().filter(|v| !v.to_f64().is_nan())
    }

    pub fn min(&self) -> Option<T> {
        self.values()
            .reduce(|a, b| if b.partial_cmp(&a) == Some(Ordering::Less) { b } else { a })
    }

    pub fn max(&self) -> Option<T> {
        self.values()
            .reduce(|a, b| if b.partial_cmp(&a) == Some(Ordering::Greater) { b } else { a })
    }

    /// Arithmetic mean, 0 for an empty image.
    pub fn mean(&self) -> f64 {
        let (sum, n) = self
            .values()
            .fold((0.0, 0usize), |(sum, n), v| (sum + v.to_f64(), n + 1));
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    }

    /// The element at index `n / 2` of the sorted pixels; for an even count
    /// this is the upper of the two middle values.
    pub fn median(&self) -> Option<T> {
        let mut values: Vec<T> = self.values().collect();
        if values.is_empty() {
            return None;
        }
        let mid = values.len() / 2;
        let (_, median, _) = values
            .select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        Some(*median)
    }

    /// Sample standard deviation (`n - 1` denominator), 0 for fewer than two
    /// pixels.
    pub fn std_dev(&self) -> f64 {
        let mean = self.mean();
        let (sq, n) = self.values().fold((0.0, 0usize), |(sq, n), v| {
            let d = v.to_f64() - mean;
            (sq + d * d, n + 1)
        });
        if n < 2 {
            0.0
        } else {
            libm::sqrt(sq / (n - 1) as f64)
        }
    }
}

impl<T: Pixel> From<ImageBuffer<T>> for Image {
    fn from(buffer: ImageBuffer<T>) -> Self {
        T::into_image(buffer)
    }
}

/// Summary statistics of an image, as `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

/// Pixel data of an image HDU, typed by BITPIX.
#[derive(Debug, Clone, PartialEq)]
pub enum Image {
    U8(ImageBuffer<u8>),
    I16(ImageBuffer<i16>),
    I32(ImageBuffer<i32>),
    I64(ImageBuffer<i64>),
    F32(ImageBuffer<f32>),
    F64(ImageBuffer<f64>),
}

macro_rules! each_buffer {
    ($image:expr, $b:ident => $body:expr) => {
        match $image {
            Image::U8($b) => $body,
            Image::I16($b) => $body,
            Image::I32($b) => $body,
            Image::I64($b) => $body,
            Image::F32($b) => $body,
            Image::F64($b) => $body,
        }
    };
}

impl Image {
    /// Decode an image data array. `dims` are `NAXIS1..NAXISn`; an empty
    /// buffer gives an empty image whatever the dimensions.
    pub fn read_image(bitpix: Bitpix, dims: &[usize], bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || dims.is_empty() {
            return Ok(Self::empty(bitpix));
        }
        let width = dims[0];
        let height = dims[1..].iter().product::<usize>();
        Ok(match bitpix {
            Bitpix::U8 => Image::U8(ImageBuffer::from_be_bytes(width, height, bytes)?),
            Bitpix::I16 => Image::I16(ImageBuffer::from_be_bytes(width, height, bytes)?),
            Bitpix::I32 => Image::I32(ImageBuffer::from_be_bytes(width, height, bytes)?),
            Bitpix::I64 => Image::I64(ImageBuffer::from_be_bytes(width, height, bytes)?),
            Bitpix::F32 => Image::F32(ImageBuffer::from_be_bytes(width, height, bytes)?),
            Bitpix::F64 => Image::F64(ImageBuffer::from_be_bytes(width, height, bytes)?),
        })
    }

    /// A zero-pixel image of the given type.
    pub fn empty(bitpix: Bitpix) -> Self {
        match bitpix {
            Bitpix::U8 => Image::U8(ImageBuffer::empty()),
            Bitpix::I16 => Image::I16(ImageBuffer::empty()),
            Bitpix::I32 => Image::I32(ImageBuffer::empty()),
            Bitpix::I64 => Image::I64(ImageBuffer::empty()),
            Bitpix::F32 => Image::F32(ImageBuffer::empty()),
            Bitpix::F64 => Image::F64(ImageBuffer::empty()),
        }
    }

    pub fn bitpix(&self) -> Bitpix {
        match self {
            Image::U8(_) => Bitpix::U8,
            Image::I16(_) => Bitpix::I16,
            Image::I32(_) => Bitpix::I32,
            Image::I64(_) => Bitpix::I64,
            Image::F32(_) => Bitpix::F32,
            Image::F64(_) => Bitpix::F64,
        }
    }

    pub fn width(&self) -> usize {
        each_buffer!(self, b => b.width())
    }

    pub fn height(&self) -> usize {
        each_buffer!(self, b => b.height())
    }

    pub fn len(&self) -> usize {
        each_buffer!(self, b => b.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The buffer, if its pixel type is `T`.
    pub fn as_buffer<T: Pixel>(&self) -> Option<&ImageBuffer<T>> {
        T::buffer(self)
    }

    pub fn as_buffer_mut<T: Pixel>(&mut self) -> Option<&mut ImageBuffer<T>> {
        T::buffer_mut(self)
    }

    /// Append the big-endian pixel bytes to `out`; nothing for an empty
    /// image.
    pub fn write_image(&self, out: &mut Vec<u8>) {
        each_buffer!(self, b => b.write_be(out))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() * self.bitpix().element_size());
        self.write_image(&mut out);
        out
    }

    pub fn mean(&self) -> f64 {
        each_buffer!(self, b => b.mean())
    }

    pub fn std_dev(&self) -> f64 {
        each_buffer!(self, b => b.std_dev())
    }

    pub fn min(&self) -> Option<f64> {
        each_buffer!(self, b => b.min().map(Pixel::to_f64))
    }

    pub fn max(&self) -> Option<f64> {
        each_buffer!(self, b => b.max().map(Pixel::to_f64))
    }

    pub fn median(&self) -> Option<f64> {
        each_buffer!(self, b => b.median().map(Pixel::to_f64))
    }

    /// All statistics at once; `None` when no pixel has a value.
    pub fn stats(&self) -> Option<ImageStats> {
        Some(ImageStats {
            min: self.min()?,
            max: self.max()?,
            mean: self.mean(),
            median: self.median()?,
            std_dev: self.std_dev(),
        })
    }
}

// ── Header glue shared by image HDUs ──

/// `BITPIX`, `NAXIS` and `NAXISn` cards describing `image`.
pub(crate) fn image_cards(image: &Image) -> Result<Vec<Card>> {
    let mut cards = alloc::vec![Card::new(
        "BITPIX",
        image.bitpix().value(),
        "array data type"
    )?];
    if image.is_empty() {
        cards.push(Card::new("NAXIS", 0, "number of array dimensions")?);
    } else {
        cards.push(Card::new("NAXIS", 2, "number of array dimensions")?);
        cards.push(Card::new("NAXIS1", image.width(), "")?);
        cards.push(Card::new("NAXIS2", image.height(), "")?);
    }
    Ok(cards)
}

/// Decode the data array described by `header`.
pub(crate) fn decode_image(header: &Header, data: &[u8]) -> Result<Image> {
    let image = Image::read_image(header.bitpix(), header.all_naxis(), data)?;
    let used = image.len() * header.bitpix().element_size();
    if data.len() > used {
        log::warn!(
            "ignoring {} bytes after the image array",
            data.len() - used
        );
    }
    Ok(image)
}

/// `image` must have the header's pixel type and pixel count.
pub(crate) fn check_image(header: &Header, image: &Image) -> Result<()> {
    if image.bitpix() != header.bitpix() {
        return Err(Error::FitsFormat(format!(
            "image has BITPIX {} but the header declares {}",
            image.bitpix(),
            header.bitpix()
        )));
    }
    if image.len() != header.data_size() {
        return Err(Error::FitsFormat(format!(
            "image has {} pixels but the header declares {}",
            image.len(),
            header.data_size()
        )));
    }
    Ok(())
}
