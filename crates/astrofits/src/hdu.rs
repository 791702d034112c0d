//! The closed set of HDU kinds and the factory that builds one from a header
//! and its data bytes.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::bintable::BinaryTable;
use crate::block::{SPACE_FILL, ZERO_FILL};
use crate::error::{Error, Result};
use crate::extension::{xtension, UnknownHdu};
#[cfg(feature = "image-extension")]
use crate::extension::ImageExtension;
use crate::header::Header;
use crate::primary::PrimaryHdu;
use crate::table::AsciiTable;
use crate::value::Value;

/// Discriminant of [`Hdu`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HduKind {
    Primary,
    BinaryTable,
    AsciiTable,
    #[cfg(feature = "image-extension")]
    Image,
    Blank,
}

impl HduKind {
    pub fn name(self) -> &'static str {
        match self {
            HduKind::Primary => "primary",
            HduKind::BinaryTable => "binary table",
            HduKind::AsciiTable => "ASCII table",
            #[cfg(feature = "image-extension")]
            HduKind::Image => "image extension",
            HduKind::Blank => "unsupported",
        }
    }
}

impl fmt::Display for HduKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One header-data unit of a FITS document.
#[derive(Debug, Clone, PartialEq)]
pub enum Hdu {
    Primary(PrimaryHdu),
    BinaryTable(BinaryTable),
    AsciiTable(AsciiTable),
    #[cfg(feature = "image-extension")]
    Image(ImageExtension),
    /// An extension kept as raw bytes.
    Blank(UnknownHdu),
}

macro_rules! each_hdu {
    ($hdu:expr, $h:ident => $body:expr) => {
        match $hdu {
            Hdu::Primary($h) => $body,
            Hdu::BinaryTable($h) => $body,
            Hdu::AsciiTable($h) => $body,
            #[cfg(feature = "image-extension")]
            Hdu::Image($h) => $body,
            Hdu::Blank($h) => $body,
        }
    };
}

/// A concrete HDU type that [`Hdu`] can hold.
pub trait HduVariant: Sized {
    const KIND: HduKind;

    fn from_hdu(hdu: &Hdu) -> Option<&Self>;

    fn from_hdu_mut(hdu: &mut Hdu) -> Option<&mut Self>;
}

macro_rules! hdu_variant {
    ($variant:ident, $t:ty) => {
        impl HduVariant for $t {
            const KIND: HduKind = HduKind::$variant;

            fn from_hdu(hdu: &Hdu) -> Option<&Self> {
                match hdu {
                    Hdu::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_hdu_mut(hdu: &mut Hdu) -> Option<&mut Self> {
                match hdu {
                    Hdu::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$t> for Hdu {
            fn from(inner: $t) -> Self {
                Hdu::$variant(inner)
            }
        }
    };
}

hdu_variant!(Primary, PrimaryHdu);
hdu_variant!(BinaryTable, BinaryTable);
hdu_variant!(AsciiTable, AsciiTable);
#[cfg(feature = "image-extension")]
hdu_variant!(Image, ImageExtension);
hdu_variant!(Blank, UnknownHdu);

/// Keywords that describe the data layout. Editing them through
/// [`Hdu::set_keyword`] would desynchronize header and payload.
fn is_structural(keyword: &str) -> bool {
    const FIXED: [&str; 7] = [
        "SIMPLE", "XTENSION", "BITPIX", "PCOUNT", "GCOUNT", "TFIELDS", "END",
    ];
    FIXED.contains(&keyword)
        || ["NAXIS", "TFORM", "TBCOL"].iter().any(|prefix| {
            keyword
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.bytes().all(|b| b.is_ascii_digit()))
        })
}

impl Hdu {
    pub fn kind(&self) -> HduKind {
        match self {
            Hdu::Primary(_) => HduKind::Primary,
            Hdu::BinaryTable(_) => HduKind::BinaryTable,
            Hdu::AsciiTable(_) => HduKind::AsciiTable,
            #[cfg(feature = "image-extension")]
            Hdu::Image(_) => HduKind::Image,
            Hdu::Blank(_) => HduKind::Blank,
        }
    }

    pub fn header(&self) -> &Header {
        each_hdu!(self, h => h.header())
    }

    fn header_mut(&mut self) -> &mut Header {
        each_hdu!(self, h => h.header_mut())
    }

    /// `"primary_hdu"` or the `XTENSION` value.
    pub fn name(&self) -> Result<String> {
        self.header().hdu_name()
    }

    pub fn extname(&self) -> Option<String> {
        self.header().extname()
    }

    /// The concrete HDU, or `WrongHduType` when this HDU is another kind.
    pub fn as_kind<T: HduVariant>(&self) -> Result<&T> {
        T::from_hdu(self).ok_or(Error::WrongHduType {
            expected: T::KIND.name(),
            found: self.kind().name(),
        })
    }

    pub fn as_kind_mut<T: HduVariant>(&mut self) -> Result<&mut T> {
        let found = self.kind().name();
        T::from_hdu_mut(self).ok_or(Error::WrongHduType {
            expected: T::KIND.name(),
            found,
        })
    }

    /// Set a descriptive keyword such as `EXTNAME`, `OBJECT` or `DATE-OBS`.
    /// Keywords that describe the data layout are rejected. Table columns
    /// pick up `TTYPEn`, `TUNITn`, `TSCALn` and the other column keywords;
    /// an edit they cannot take is undone.
    pub fn set_keyword(&mut self, keyword: &str, value: impl Into<Value>) -> Result<()> {
        if is_structural(keyword) {
            return Err(Error::InvalidCard(format!(
                "`{}` is managed by the HDU payload",
                keyword
            )));
        }
        let previous = self.header().clone();
        self.header_mut().set_value(keyword, value)?;
        let reloaded = match self {
            Hdu::BinaryTable(t) => t.reload_columns(),
            Hdu::AsciiTable(t) => t.reload_columns(),
            _ => Ok(()),
        };
        if let Err(e) = reloaded {
            *self.header_mut() = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Append a COMMENT or HISTORY line.
    pub fn add_commentary(&mut self, keyword: &str, text: &str) -> Result<()> {
        self.header_mut().add_commentary(keyword, text)
    }

    /// Header, data and record padding.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        each_hdu!(self, h => h.write_to(out))
    }
}

/// Build the HDU that `header` describes from its unpadded data bytes.
///
/// `fill` is the padding byte observed after the data, if any; fresh data
/// is padded with spaces for ASCII tables and zeros otherwise.
pub fn construct_hdu(header: Header, data: &[u8], fill: Option<u8>) -> Result<Hdu> {
    if header.is_primary() {
        let fill = fill.unwrap_or(ZERO_FILL);
        return Ok(Hdu::Primary(PrimaryHdu::with_fill(header, data, fill)?));
    }
    let kind = xtension(&header)?;
    match kind.as_str() {
        "TABLE" => {
            let fill = fill.unwrap_or(SPACE_FILL);
            Ok(Hdu::AsciiTable(AsciiTable::with_fill(header, data, fill)?))
        }
        "BINTABLE" => {
            let fill = fill.unwrap_or(ZERO_FILL);
            Ok(Hdu::BinaryTable(BinaryTable::with_fill(header, data, fill)?))
        }
        #[cfg(feature = "image-extension")]
        "IMAGE" => {
            let fill = fill.unwrap_or(ZERO_FILL);
            Ok(Hdu::Image(ImageExtension::with_fill(header, data, fill)?))
        }
        other => {
            log::warn!("keeping unsupported extension `{}` as raw bytes", other);
            let fill = fill.unwrap_or(ZERO_FILL);
            Ok(Hdu::Blank(UnknownHdu::with_fill(header, data, fill)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BLOCK_SIZE;
    use crate::header::tests::header_bytes;
    use crate::image::{Image, ImageBuffer};
    use alloc::vec;

    fn header(lines: &[&str]) -> Header {
        Header::from_bytes(&header_bytes(lines)).unwrap()
    }

    fn empty_primary() -> Header {
        header(&[
            "SIMPLE  =                    T",
            "BITPIX  =                    8",
            "NAXIS   =                    0",
        ])
    }

    // ---- dispatch ----

    #[test]
    fn simple_header_builds_primary() {
        let hdu = construct_hdu(empty_primary(), &[], None).unwrap();
        assert_eq!(hdu.kind(), HduKind::Primary);
        assert_eq!(hdu.name().unwrap(), "primary_hdu");
    }

    #[test]
    fn ascii_table_defaults_to_space_fill() {
        let h = header(&[
            "XTENSION= 'TABLE   '",
            "BITPIX  =                    8",
            "NAXIS   =                    2",
            "NAXIS1  =                    4",
            "NAXIS2  =                    1",
            "PCOUNT  =                    0",
            "GCOUNT  =                    1",
            "TFIELDS =                    1",
            "TTYPE1  = 'N       '",
            "TFORM1  = 'I4      '",
            "TBCOL1  =                    1",
        ]);
        let hdu = construct_hdu(h, b"  42", None).unwrap();
        let table = hdu.as_kind::<AsciiTable>().unwrap();
        assert_eq!(table.fill(), b' ');
        assert_eq!(table.get_column::<i32>("N").unwrap().get(0).unwrap(), 42);
    }

    #[test]
    fn binary_table_keeps_observed_fill() {
        let h = header(&[
            "XTENSION= 'BINTABLE'",
            "BITPIX  =                    8",
            "NAXIS   =                    2",
            "NAXIS1  =                    2",
            "NAXIS2  =                    1",
            "PCOUNT  =                    0",
            "GCOUNT  =                    1",
            "TFIELDS =                    1",
            "TFORM1  = 'I       '",
        ]);
        let hdu = construct_hdu(h, &[0, 7], Some(b' ')).unwrap();
        assert_eq!(hdu.as_kind::<BinaryTable>().unwrap().fill(), b' ');

        let mut out = Vec::new();
        hdu.write_to(&mut out);
        assert_eq!(out.len(), 2 * BLOCK_SIZE);
        assert_eq!(out[BLOCK_SIZE + 2], b' ');
    }

    #[test]
    fn unknown_xtension_is_blank() {
        let h = header(&[
            "XTENSION= 'A3DTABLE'",
            "BITPIX  =                    8",
            "NAXIS   =                    1",
            "NAXIS1  =                    3",
        ]);
        let hdu = construct_hdu(h, b"xyz", None).unwrap();
        assert_eq!(hdu.kind(), HduKind::Blank);
        assert_eq!(hdu.as_kind::<UnknownHdu>().unwrap().data(), b"xyz");
        assert_eq!(hdu.name().unwrap(), "A3DTABLE");
    }

    #[cfg(feature = "image-extension")]
    #[test]
    fn image_xtension_builds_image() {
        let h = header(&[
            "XTENSION= 'IMAGE   '",
            "BITPIX  =                   16",
            "NAXIS   =                    1",
            "NAXIS1  =                    2",
            "PCOUNT  =                    0",
            "GCOUNT  =                    1",
        ]);
        let hdu = construct_hdu(h, &[0, 1, 0xff, 0xff], None).unwrap();
        let image = hdu.as_kind::<ImageExtension>().unwrap().get_data();
        assert_eq!(image.as_buffer::<i16>().unwrap().data(), &[1, -1]);
    }

    #[test]
    fn extension_without_xtension_fails() {
        let h = header(&["BITPIX  =                    8", "NAXIS   =                    0"]);
        assert!(matches!(
            construct_hdu(h, &[], None),
            Err(Error::KeyNotFound(_))
        ));
    }

    // ---- typed access ----

    #[test]
    fn as_kind_reports_both_kinds() {
        let hdu = construct_hdu(empty_primary(), &[], None).unwrap();
        match hdu.as_kind::<BinaryTable>() {
            Err(Error::WrongHduType { expected, found }) => {
                assert_eq!(expected, "binary table");
                assert_eq!(found, "primary");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn as_kind_mut_edits_in_place() {
        let image: Image = ImageBuffer::new(1, 1, vec![3u8]).unwrap().into();
        let mut hdu: Hdu = PrimaryHdu::new(image).unwrap().into();
        hdu.as_kind_mut::<PrimaryHdu>().unwrap().pixels_mut::<u8>().unwrap()[0] = 9;
        assert_eq!(
            hdu.as_kind::<PrimaryHdu>().unwrap().get_data().as_buffer::<u8>().unwrap().data(),
            &[9]
        );
    }

    // ---- keywords ----

    #[test]
    fn set_keyword_rejects_layout_keywords() {
        let mut hdu = construct_hdu(empty_primary(), &[], None).unwrap();
        for kw in ["BITPIX", "NAXIS", "NAXIS2", "TFORM3", "TBCOL1", "XTENSION"] {
            assert!(matches!(
                hdu.set_keyword(kw, 1),
                Err(Error::InvalidCard(_))
            ));
        }
        hdu.set_keyword("NAXISLEN", 1).unwrap();
        hdu.set_keyword("EXTNAME", "SCI").unwrap();
        hdu.add_commentary("HISTORY", "renamed").unwrap();
        assert_eq!(hdu.extname().as_deref(), Some("SCI"));
        assert_eq!(hdu.header().commentary("HISTORY").next(), Some("renamed"));
    }

    #[test]
    fn column_keywords_reach_the_table() {
        let table = crate::bintable::BinaryTable::with_columns(
            &[crate::column::ColumnDef::new("RA", "D")],
            1,
        )
        .unwrap();
        let mut hdu: Hdu = table.into();
        hdu.set_keyword("TTYPE1", "DEC").unwrap();
        hdu.set_keyword("TUNIT1", "deg").unwrap();
        let table = hdu.as_kind::<crate::bintable::BinaryTable>().unwrap();
        assert_eq!(table.column("DEC").unwrap().unit(), Some("deg"));
        assert!(table.get_column::<f64>("DEC").is_ok());
        assert!(matches!(table.column("RA"), Err(Error::ColumnNotFound(_))));

        let before = hdu.header().clone();
        assert!(hdu.set_keyword("TSCAL1", "wide").is_err());
        assert_eq!(hdu.header(), &before);
        let table = hdu.as_kind::<crate::bintable::BinaryTable>().unwrap();
        assert_eq!(table.column("DEC").unwrap().scale(), 1.0);
    }
}
