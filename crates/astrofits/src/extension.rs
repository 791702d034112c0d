//! Image extensions and the carrier for extensions this crate does not decode.

use alloc::string::String;
use alloc::vec::Vec;

use crate::block::{pad_to_block, ZERO_FILL};
#[cfg(feature = "image-extension")]
use crate::card::Card;
#[cfg(feature = "image-extension")]
use crate::error::Error;
use crate::error::Result;
use crate::header::Header;
#[cfg(feature = "image-extension")]
use crate::image::{check_image, decode_image, image_cards, Image, Pixel};

/// The `XTENSION` value of a header.
pub(crate) fn xtension(header: &Header) -> Result<String> {
    header.value_of::<String>("XTENSION")
}

// ── Image extension ──

/// `XTENSION = 'IMAGE'`: an image array after the primary HDU.
#[cfg(feature = "image-extension")]
#[derive(Debug, Clone, PartialEq)]
pub struct ImageExtension {
    header: Header,
    image: Image,
    fill: u8,
}

#[cfg(feature = "image-extension")]
impl ImageExtension {
    /// An image extension holding `image`, optionally named by `EXTNAME`.
    pub fn new(image: Image, extname: Option<&str>) -> Result<Self> {
        let mut cards = alloc::vec![Card::new("XTENSION", "IMAGE", "image extension")?];
        cards.extend(image_cards(&image)?);
        cards.push(Card::new("PCOUNT", 0, "")?);
        cards.push(Card::new("GCOUNT", 1, "")?);
        if let Some(name) = extname {
            cards.push(Card::new("EXTNAME", name, "")?);
        }
        Ok(ImageExtension {
            header: Header::from_cards(cards)?,
            image,
            fill: ZERO_FILL,
        })
    }

    pub fn read(header: Header, data: &[u8]) -> Result<Self> {
        Self::with_fill(header, data, ZERO_FILL)
    }

    pub(crate) fn with_fill(header: Header, data: &[u8], fill: u8) -> Result<Self> {
        let kind = xtension(&header)?;
        if kind != "IMAGE" {
            return Err(Error::FitsFormat(alloc::format!(
                "expected an IMAGE extension, found `{}`",
                kind
            )));
        }
        let image = decode_image(&header, data)?;
        Ok(ImageExtension {
            header,
            image,
            fill,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub(crate) fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn get_data(&self) -> &Image {
        &self.image
    }

    pub fn pixels_mut<T: Pixel>(&mut self) -> Option<&mut [T]> {
        self.image.as_buffer_mut::<T>().map(|b| b.data_mut())
    }

    /// Replace the image with one of the same type and pixel count.
    pub fn set_data(&mut self, image: Image) -> Result<()> {
        check_image(&self.header, &image)?;
        self.image = image;
        Ok(())
    }

    pub fn fill(&self) -> u8 {
        self.fill
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.header.write(out);
        if self.image.is_empty() {
            return;
        }
        self.image.write_image(out);
        pad_to_block(out, self.fill);
        log::debug!(
            "wrote image extension: {}x{} BITPIX {}",
            self.image.width(),
            self.image.height(),
            self.image.bitpix()
        );
    }
}

// ── Unknown extensions ──

/// An extension whose `XTENSION` is not decoded. Header and data bytes are
/// kept as read so they are written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownHdu {
    header: Header,
    data: Vec<u8>,
    fill: u8,
}

impl UnknownHdu {
    pub fn new(header: Header, data: &[u8]) -> Self {
        Self::with_fill(header, data, ZERO_FILL)
    }

    pub(crate) fn with_fill(header: Header, data: &[u8], fill: u8) -> Self {
        UnknownHdu {
            header,
            data: data.to_vec(),
            fill,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub(crate) fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// The unpadded data array.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn fill(&self) -> u8 {
        self.fill
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.header.write(out);
        if self.data.is_empty() {
            return;
        }
        out.extend_from_slice(&self.data);
        pad_to_block(out, self.fill);
    }
}
