//! The primary HDU: `SIMPLE = T` header and an optional image array.
//!
//! Random-groups primaries are not decoded; their data is carried as raw
//! bytes and written back unchanged.

use alloc::vec::Vec;

use crate::block::{pad_to_block, ZERO_FILL};
use crate::card::Card;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::image::{check_image, decode_image, image_cards, Image, Pixel};

#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryHdu {
    header: Header,
    image: Image,
    groups: Vec<u8>,
    fill: u8,
}

impl PrimaryHdu {
    /// A primary HDU holding `image`, with `SIMPLE`, `BITPIX`, `NAXIS*` and
    /// `EXTEND` cards.
    pub fn new(image: Image) -> Result<Self> {
        let mut cards = alloc::vec![Card::new("SIMPLE", true, "conforms to FITS standard")?];
        cards.extend(image_cards(&image)?);
        cards.push(Card::new("EXTEND", true, "extensions may be present")?);
        Ok(PrimaryHdu {
            header: Header::from_cards(cards)?,
            image,
            groups: Vec::new(),
            fill: ZERO_FILL,
        })
    }

    /// Build from a parsed header and its unpadded data array.
    pub fn read(header: Header, data: &[u8]) -> Result<Self> {
        Self::with_fill(header, data, ZERO_FILL)
    }

    pub(crate) fn with_fill(header: Header, data: &[u8], fill: u8) -> Result<Self> {
        if !header.is_primary() {
            return Err(Error::format("primary header has no SIMPLE card"));
        }
        if header.is_random_groups() {
            log::debug!("random-groups primary: keeping {} bytes undecoded", data.len());
            return Ok(PrimaryHdu {
                image: Image::empty(header.bitpix()),
                header,
                groups: data.to_vec(),
                fill,
            });
        }
        let image = decode_image(&header, data)?;
        Ok(PrimaryHdu {
            header,
            image,
            groups: Vec::new(),
            fill,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub(crate) fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// `SIMPLE = T`.
    pub fn is_simple(&self) -> bool {
        self.header.optional::<bool>("SIMPLE").ok().flatten() == Some(true)
    }

    /// `EXTEND = T`.
    pub fn is_extended(&self) -> bool {
        self.header.optional::<bool>("EXTEND").ok().flatten() == Some(true)
    }

    pub fn get_data(&self) -> &Image {
        &self.image
    }

    /// The undecoded data of a random-groups primary.
    pub fn group_data(&self) -> Option<&[u8]> {
        self.header.is_random_groups().then_some(self.groups.as_slice())
    }

    /// Pixels as `T`, if that is the image's type.
    pub fn pixels_mut<T: Pixel>(&mut self) -> Option<&mut [T]> {
        self.image.as_buffer_mut::<T>().map(|b| b.data_mut())
    }

    /// Replace the image with one of the same type and pixel count.
    pub fn set_data(&mut self, image: Image) -> Result<()> {
        if self.header.is_random_groups() {
            return Err(Error::format("random-groups data cannot be replaced by an image"));
        }
        check_image(&self.header, &image)?;
        self.image = image;
        Ok(())
    }

    pub fn fill(&self) -> u8 {
        self.fill
    }

    /// Header and data array, padded to the record boundary.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.header.write(out);
        if !self.groups.is_empty() {
            out.extend_from_slice(&self.groups);
            let padding = pad_to_block(out, self.fill);
            log::debug!(
                "wrote random-groups primary: {} bytes, {} padding",
                self.groups.len(),
                padding
            );
            return;
        }
        if self.image.is_empty() {
            return;
        }
        self.image.write_image(out);
        let padding = pad_to_block(out, self.fill);
        log::debug!(
            "wrote primary image: {}x{} BITPIX {}, {} padding",
            self.image.width(),
            self.image.height(),
            self.image.bitpix(),
            padding
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitpix::Bitpix;
    use crate::block::BLOCK_SIZE;
    use crate::header::tests::header_bytes;
    use crate::image::ImageBuffer;
    use alloc::vec;

    fn small_image() -> Image {
        ImageBuffer::new(3, 2, vec![1i16, 2, 3, 4, 5, 6]).unwrap().into()
    }

    #[test]
    fn new_writes_structural_cards() {
        let hdu = PrimaryHdu::new(small_image()).unwrap();
        let h = hdu.header();
        assert!(hdu.is_simple());
        assert!(hdu.is_extended());
        assert_eq!(h.bitpix(), Bitpix::I16);
        assert_eq!(h.all_naxis(), &[3, 2]);
        let keywords: Vec<&str> = h.cards().iter().map(|c| c.keyword()).collect();
        assert_eq!(
            keywords,
            ["SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "EXTEND", "END"]
        );
    }

    #[test]
    fn header_only_primary() {
        let header = Header::from_bytes(&header_bytes(&[
            "SIMPLE  =                    T",
            "BITPIX  =                    8",
            "NAXIS   =                    0",
        ]))
        .unwrap();
        let hdu = PrimaryHdu::read(header, &[]).unwrap();
        assert!(hdu.get_data().is_empty());
        assert!(!hdu.is_extended());

        let mut out = Vec::new();
        hdu.write_to(&mut out);
        assert_eq!(out.len(), BLOCK_SIZE);
    }

    #[test]
    fn write_and_read_back() {
        let hdu = PrimaryHdu::new(small_image()).unwrap();
        let mut out = Vec::new();
        hdu.write_to(&mut out);
        assert_eq!(out.len(), 2 * BLOCK_SIZE);
        assert_eq!(&out[BLOCK_SIZE..BLOCK_SIZE + 4], &[0, 1, 0, 2]);

        let header = Header::from_bytes(&out).unwrap();
        let back = PrimaryHdu::read(header, &out[BLOCK_SIZE..BLOCK_SIZE + 12]).unwrap();
        assert_eq!(back, hdu);
    }

    #[test]
    fn set_data_checks_type_and_size() {
        let mut hdu = PrimaryHdu::new(small_image()).unwrap();
        let wrong_type: Image = ImageBuffer::new(3, 2, vec![0f32; 6]).unwrap().into();
        assert!(matches!(hdu.set_data(wrong_type), Err(Error::FitsFormat(_))));
        let wrong_size: Image = ImageBuffer::new(2, 2, vec![0i16; 4]).unwrap().into();
        assert!(matches!(hdu.set_data(wrong_size), Err(Error::FitsFormat(_))));

        let replacement: Image = ImageBuffer::new(3, 2, vec![9i16; 6]).unwrap().into();
        hdu.set_data(replacement.clone()).unwrap();
        assert_eq!(hdu.get_data(), &replacement);
    }

    #[test]
    fn pixels_mut_by_type() {
        let mut hdu = PrimaryHdu::new(small_image()).unwrap();
        assert!(hdu.pixels_mut::<f64>().is_none());
        hdu.pixels_mut::<i16>().unwrap()[0] = -7;
        assert_eq!(hdu.get_data().as_buffer::<i16>().unwrap().pixel(0, 0), Some(-7));
    }

    #[test]
    fn random_groups_are_kept_verbatim() {
        let header = Header::from_bytes(&header_bytes(&[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    2",
            "NAXIS1  =                    0",
            "NAXIS2  =                    2",
            "GROUPS  =                    T",
            "PCOUNT  =                    1",
            "GCOUNT  =                    2",
        ]))
        .unwrap();
        let data: Vec<u8> = (1..=12).collect();
        assert_eq!(header.data_byte_len().unwrap(), data.len());

        let hdu = PrimaryHdu::read(header, &data).unwrap();
        assert!(hdu.get_data().is_empty());
        assert_eq!(hdu.group_data(), Some(data.as_slice()));

        let mut out = Vec::new();
        hdu.write_to(&mut out);
        assert_eq!(out.len(), 2 * BLOCK_SIZE);
        assert_eq!(&out[BLOCK_SIZE..BLOCK_SIZE + 12], data.as_slice());

        let mut hdu = hdu;
        let empty = Image::empty(Bitpix::I16);
        assert!(matches!(hdu.set_data(empty), Err(Error::FitsFormat(_))));
    }

    #[test]
    fn extension_header_is_rejected() {
        let header = Header::from_bytes(&header_bytes(&[
            "XTENSION= 'IMAGE   '",
            "BITPIX  =                    8",
            "NAXIS   =                    0",
        ]))
        .unwrap();
        assert!(PrimaryHdu::read(header, &[]).is_err());
    }
}
