//! The FITS document: an ordered list of HDUs plus the control block that
//! locates each one in its source.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::path::{Path, PathBuf};

use crate::block::{padded_byte_len, BLOCK_SIZE, CARD_SIZE};
use crate::error::{Error, Result};
use crate::hdu::{construct_hdu, Hdu, HduKind};
use crate::header::Header;
use crate::primary::PrimaryHdu;
use crate::stream::RecordReader;
use crate::value::Value;

/// How much of each HDU [`Fits::from_bytes`] and [`Fits::open`] decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Parse headers and record where each data array lives. Data is
    /// decoded later with [`Fits::read_hdu_data`] or [`Fits::load_hdu_data`].
    HeadersOnly,
    #[default]
    Full,
}

/// Where one HDU sits in the byte stream it was read from (or will be
/// written to, for HDUs added with [`Fits::push`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HduEntry {
    /// `"primary_hdu"` or the `XTENSION` value.
    pub name: String,
    pub extname: Option<String>,
    pub header_offset: usize,
    pub data_offset: usize,
    /// Unpadded data length.
    pub data_len: usize,
    pub hdu_index: usize,
    /// Whether the data array has been decoded.
    pub read_status: bool,
}

/// Index of the HDUs of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlBlock {
    #[cfg(feature = "std")]
    path: Option<PathBuf>,
    entries: Vec<HduEntry>,
}

impl ControlBlock {
    pub fn entries(&self) -> &[HduEntry] {
        &self.entries
    }

    /// File the document was opened from.
    #[cfg(feature = "std")]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// First HDU whose `EXTNAME` is `name`, otherwise the first whose HDU
    /// name is `name`. Names are recorded when an HDU is read or pushed and
    /// refreshed by [`Fits::set_keyword`].
    pub fn find(&self, name: &str) -> Option<&HduEntry> {
        self.entries
            .iter()
            .find(|e| e.extname.as_deref() == Some(name))
            .or_else(|| self.entries.iter().find(|e| e.name == name))
    }

    /// Offset just past the last HDU, padding included.
    fn end_offset(&self) -> usize {
        self.entries
            .last()
            .map_or(0, |e| e.data_offset + padded_byte_len(e.data_len))
    }
}

/// Selects an HDU of a [`Fits`] document, by position or by name.
pub trait HduKey {
    fn resolve(&self, fits: &Fits) -> Result<usize>;
}

impl HduKey for usize {
    fn resolve(&self, fits: &Fits) -> Result<usize> {
        if *self < fits.len() {
            Ok(*self)
        } else {
            Err(Error::HduNotFound(self.to_string()))
        }
    }
}

/// Names are matched against the current headers, so an `EXTNAME` edited
/// through [`Fits::hdu_mut`] is found under its new value.
impl HduKey for &str {
    fn resolve(&self, fits: &Fits) -> Result<usize> {
        let headers = || fits.units.iter().map(Unit::header);
        headers()
            .position(|h| h.extname().as_deref() == Some(*self))
            .or_else(|| headers().position(|h| h.hdu_name().is_ok_and(|n| n == *self)))
            .ok_or_else(|| Error::HduNotFound(self.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Unit {
    Header(Header),
    Loaded(Hdu),
}

impl Unit {
    fn header(&self) -> &Header {
        match self {
            Unit::Header(h) => h,
            Unit::Loaded(hdu) => hdu.header(),
        }
    }
}

/// A FITS document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fits {
    units: Vec<Unit>,
    control: ControlBlock,
}

impl Fits {
    /// An empty document. The first HDU pushed must be primary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a complete FITS byte stream.
    pub fn from_bytes(bytes: &[u8], mode: ReadMode) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::format("empty input"));
        }
        let mut fits = Fits::new();
        let mut reader = RecordReader::new(bytes);
        while !reader.at_end() {
            let rest = reader.rest();
            if !fits.is_empty() && (rest.len() < BLOCK_SIZE || rest.iter().all(|&b| b == 0)) {
                log::warn!(
                    "ignoring {} trailing bytes at offset {}",
                    rest.len(),
                    reader.position()
                );
                break;
            }
            fits.read_unit(&mut reader, mode)?;
        }
        Ok(fits)
    }

    fn read_unit(&mut self, reader: &mut RecordReader<'_>, mode: ReadMode) -> Result<()> {
        let header_offset = reader.position();
        let header = Header::read(reader)?;
        reader.align_to_record();
        if self.is_empty() && !header.is_primary() {
            return Err(Error::format("first HDU has no SIMPLE card"));
        }

        let data_offset = reader.position();
        let data = reader.read(header.data_byte_len()?)?;
        let padding = reader.align_to_record();

        let mut entry = self.entry_for(&header, header_offset, data_offset)?;
        log::debug!(
            "HDU {} `{}`: header at {}, {} data bytes at {}",
            entry.hdu_index,
            entry.name,
            header_offset,
            entry.data_len,
            data_offset
        );
        let unit = match mode {
            ReadMode::HeadersOnly => Unit::Header(header),
            ReadMode::Full => {
                entry.read_status = true;
                Unit::Loaded(construct_hdu(header, data, padding.first().copied())?)
            }
        };
        self.units.push(unit);
        self.control.entries.push(entry);
        Ok(())
    }

    /// Control-block entry for `header`, appended after the current HDUs.
    fn entry_for(
        &self,
        header: &Header,
        header_offset: usize,
        data_offset: usize,
    ) -> Result<HduEntry> {
        Ok(HduEntry {
            name: header.hdu_name()?,
            extname: header.extname(),
            header_offset,
            data_offset,
            data_len: header.data_byte_len()?,
            hdu_index: self.units.len(),
            read_status: false,
        })
    }

    /// Read a FITS file. In [`ReadMode::HeadersOnly`] only the header
    /// records are read; data arrays are seeked over.
    #[cfg(feature = "std")]
    pub fn open(path: impl AsRef<Path>, mode: ReadMode) -> Result<Self> {
        let path = path.as_ref();
        let mut fits = match mode {
            ReadMode::HeadersOnly => Self::scan_headers(path)?,
            ReadMode::Full => {
                let bytes = std::fs::read(path).map_err(|source| Error::FileReading {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_bytes(&bytes, mode)?
            }
        };
        fits.control.path = Some(path.to_path_buf());
        Ok(fits)
    }

    #[cfg(feature = "std")]
    fn scan_headers(path: &Path) -> Result<Self> {
        use std::io::{Read, Seek, SeekFrom};

        let reading = |source| Error::FileReading {
            path: path.display().to_string(),
            source,
        };
        let mut file = std::fs::File::open(path).map_err(reading)?;
        let file_len = file.metadata().map_err(reading)?.len() as usize;
        if file_len == 0 {
            return Err(Error::format("empty input"));
        }

        let mut fits = Fits::new();
        let mut offset = 0;
        while offset < file_len {
            file.seek(SeekFrom::Start(offset as u64)).map_err(reading)?;
            let mut bytes = Vec::new();
            (&mut file)
                .take(BLOCK_SIZE as u64)
                .read_to_end(&mut bytes)
                .map_err(reading)?;
            if !fits.is_empty() && (bytes.len() < BLOCK_SIZE || bytes.iter().all(|&b| b == 0)) {
                log::warn!(
                    "ignoring {} trailing bytes at offset {}",
                    file_len - offset,
                    offset
                );
                break;
            }
            while !bytes.is_empty()
                && bytes.len() % BLOCK_SIZE == 0
                && !has_end_card(&bytes[bytes.len() - BLOCK_SIZE..])
            {
                let before = bytes.len();
                (&mut file)
                    .take(BLOCK_SIZE as u64)
                    .read_to_end(&mut bytes)
                    .map_err(reading)?;
                if bytes.len() == before {
                    break;
                }
            }

            let header: Header = Header::from_bytes(&bytes)?;
            if fits.is_empty() && !header.is_primary() {
                return Err(Error::format("first HDU has no SIMPLE card"));
            }
            let data_offset = offset + padded_byte_len(header.cards().len() * CARD_SIZE);
            let entry = fits.entry_for(&header, offset, data_offset)?;
            let data_end = data_offset
                .checked_add(entry.data_len)
                .filter(|&end| end <= file_len)
                .ok_or(Error::UnexpectedEof {
                    offset: data_offset,
                    needed: entry.data_len,
                    available: file_len.saturating_sub(data_offset),
                })?;
            log::debug!(
                "HDU {} `{}`: header at {}, {} data bytes at {} (not read)",
                entry.hdu_index,
                entry.name,
                offset,
                entry.data_len,
                data_offset
            );
            fits.units.push(Unit::Header(header));
            fits.control.entries.push(entry);
            offset = padded_byte_len(data_end);
        }
        Ok(fits)
    }

    // ── Access ──

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn control_block(&self) -> &ControlBlock {
        &self.control
    }

    /// Headers of every HDU, loaded or not.
    pub fn headers(&self) -> impl Iterator<Item = &Header> + '_ {
        self.units.iter().map(Unit::header)
    }

    pub fn header<K: HduKey>(&self, key: K) -> Result<&Header> {
        let index = key.resolve(self)?;
        Ok(self.units[index].header())
    }

    /// The decoded HDU. Fails with `DataNotLoaded` for an HDU of a
    /// headers-only document whose data has not been read yet.
    pub fn hdu<K: HduKey>(&self, key: K) -> Result<&Hdu> {
        let index = key.resolve(self)?;
        match &self.units[index] {
            Unit::Loaded(hdu) => Ok(hdu),
            Unit::Header(_) => Err(self.not_loaded(index)),
        }
    }

    pub fn hdu_mut<K: HduKey>(&mut self, key: K) -> Result<&mut Hdu> {
        let index = key.resolve(self)?;
        let err = self.not_loaded(index);
        match &mut self.units[index] {
            Unit::Loaded(hdu) => Ok(hdu),
            Unit::Header(_) => Err(err),
        }
    }

    pub fn primary(&self) -> Result<&PrimaryHdu> {
        self.hdu(0)?.as_kind()
    }

    fn not_loaded(&self, index: usize) -> Error {
        Error::DataNotLoaded(self.control.entries[index].name.clone())
    }

    // ── Editing ──

    /// Append an HDU. The first HDU must be primary and no later one may be.
    pub fn push(&mut self, hdu: impl Into<Hdu>) -> Result<()> {
        let hdu = hdu.into();
        let is_primary = hdu.kind() == HduKind::Primary;
        if self.is_empty() != is_primary {
            return Err(Error::format(if is_primary {
                "a document has only one primary HDU"
            } else {
                "the first HDU must be primary"
            }));
        }
        let header = hdu.header();
        let header_offset = self.control.end_offset();
        let data_offset = header_offset + padded_byte_len(header.cards().len() * CARD_SIZE);
        let mut entry = self.entry_for(header, header_offset, data_offset)?;
        entry.read_status = true;
        self.control.entries.push(entry);
        self.units.push(Unit::Loaded(hdu));
        Ok(())
    }

    /// [`Hdu::set_keyword`] on a loaded HDU, keeping the control block's
    /// `EXTNAME` current.
    pub fn set_keyword<K: HduKey>(
        &mut self,
        key: K,
        keyword: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let index = key.resolve(self)?;
        let hdu = self.hdu_mut(index)?;
        hdu.set_keyword(keyword, value)?;
        let extname = hdu.extname();
        self.control.entries[index].extname = extname;
        Ok(())
    }

    // ── Deferred data loading ──

    /// Decode the data of one HDU from `source`, the byte stream the
    /// document was read from. An HDU that was already loaded is rebuilt
    /// from `source`, discarding edits.
    pub fn read_hdu_data<K: HduKey>(&mut self, key: K, source: &[u8]) -> Result<&Hdu> {
        let index = key.resolve(self)?;
        let entry = &self.control.entries[index];
        let mut reader = RecordReader::new(source);
        reader.seek(entry.data_offset)?;
        let data = reader.read(entry.data_len)?;
        let fill = reader.align_to_record().first().copied();
        self.install(index, data, fill)?;
        self.hdu(index)
    }

    /// Decode the data of one HDU from the file the document was opened from.
    #[cfg(feature = "std")]
    pub fn load_hdu_data<K: HduKey>(&mut self, key: K) -> Result<&Hdu> {
        use std::io::{Read, Seek, SeekFrom};

        let index = key.resolve(self)?;
        let path = self
            .control
            .path
            .clone()
            .ok_or_else(|| Error::format("document was not opened from a file"))?;
        let entry = &self.control.entries[index];
        let (offset, len) = (entry.data_offset, entry.data_len);

        let reading = |source| Error::FileReading {
            path: path.display().to_string(),
            source,
        };
        let mut file = std::fs::File::open(&path).map_err(reading)?;
        file.seek(SeekFrom::Start(offset as u64)).map_err(reading)?;
        let mut data = alloc::vec![0u8; len];
        file.read_exact(&mut data).map_err(reading)?;
        let mut padding = Vec::new();
        file.take((padded_byte_len(len) - len) as u64)
            .read_to_end(&mut padding)
            .map_err(reading)?;

        self.install(index, &data, padding.first().copied())?;
        self.hdu(index)
    }

    fn install(&mut self, index: usize, data: &[u8], fill: Option<u8>) -> Result<()> {
        let header = self.units[index].header().clone();
        let hdu = construct_hdu(header, data, fill)?;
        log::debug!(
            "loaded {} data bytes of HDU {} ({})",
            data.len(),
            index,
            hdu.kind()
        );
        self.units[index] = Unit::Loaded(hdu);
        self.control.entries[index].read_status = true;
        Ok(())
    }

    // ── Writing ──

    /// Append every HDU to `out`. Fails if any HDU's data was never loaded.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        for (index, unit) in self.units.iter().enumerate() {
            match unit {
                Unit::Loaded(hdu) => {
                    let start = out.len();
                    hdu.write_to(out);
                    log::debug!(
                        "wrote HDU {} ({}): {} bytes",
                        index,
                        hdu.kind(),
                        out.len() - start
                    );
                }
                Unit::Header(_) => return Err(self.not_loaded(index)),
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }

    /// Create or truncate `path` and write the document to it.
    #[cfg(feature = "std")]
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|source| Error::FileWriting {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Whether a header record holds the END card.
#[cfg(feature = "std")]
fn has_end_card(record: &[u8]) -> bool {
    record
        .chunks(CARD_SIZE)
        .any(|card| card.starts_with(b"END") && card[3..].iter().all(|&b| b == b' '))
}

impl core::ops::Index<usize> for Fits {
    type Output = Header;

    fn index(&self, index: usize) -> &Header {
        self.units[index].header()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bintable::BinaryTable;
    use crate::column::ColumnDef;
    use crate::header::tests::header_bytes;
    use crate::image::{Image, ImageBuffer};
    use alloc::vec;

    fn sample() -> Vec<u8> {
        let image: Image = ImageBuffer::new(2, 2, vec![1i32, 2, 3, 4]).unwrap().into();
        let mut fits = Fits::new();
        fits.push(PrimaryHdu::new(image).unwrap()).unwrap();

        let table = BinaryTable::with_columns(
            &[ColumnDef::new("ID", "J"), ColumnDef::new("RATE", "D")],
            3,
        )
        .unwrap();
        let mut hdu = Hdu::from(table);
        hdu.set_keyword("EXTNAME", "EVENTS").unwrap();
        fits.push(hdu).unwrap();
        fits.to_bytes().unwrap()
    }

    // ---- reading ----

    #[test]
    fn full_read_builds_every_hdu() {
        let fits = Fits::from_bytes(&sample(), ReadMode::Full).unwrap();
        assert_eq!(fits.len(), 2);
        assert_eq!(fits.hdu(0).unwrap().kind(), HduKind::Primary);
        assert_eq!(fits.hdu("EVENTS").unwrap().kind(), HduKind::BinaryTable);
        assert_eq!(fits.hdu("BINTABLE").unwrap().kind(), HduKind::BinaryTable);
        assert_eq!(fits[1].value_of::<usize>("NAXIS2").unwrap(), 3);

        let entries = fits.control_block().entries();
        assert_eq!(entries[0].header_offset, 0);
        assert_eq!(entries[0].data_offset, BLOCK_SIZE);
        assert_eq!(entries[0].data_len, 16);
        assert_eq!(entries[1].header_offset, 2 * BLOCK_SIZE);
        assert_eq!(entries[1].data_len, 36);
        assert!(entries.iter().all(|e| e.read_status));
    }

    #[test]
    fn write_reproduces_input() {
        let bytes = sample();
        let fits = Fits::from_bytes(&bytes, ReadMode::Full).unwrap();
        assert_eq!(fits.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            Fits::from_bytes(&[], ReadMode::Full),
            Err(Error::FitsFormat(_))
        ));
    }

    #[test]
    fn first_hdu_must_be_primary() {
        let bytes = header_bytes(&[
            "XTENSION= 'IMAGE   '",
            "BITPIX  =                    8",
            "NAXIS   =                    0",
        ]);
        assert!(matches!(
            Fits::from_bytes(&bytes, ReadMode::Full),
            Err(Error::FitsFormat(_))
        ));
    }

    #[test]
    fn truncated_data_fails() {
        let bytes = sample();
        let cut = &bytes[..BLOCK_SIZE + 8];
        assert!(matches!(
            Fits::from_bytes(cut, ReadMode::Full),
            Err(Error::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn trailing_zero_records_are_ignored() {
        let mut bytes = sample();
        let expected = bytes.clone();
        bytes.extend(vec![0u8; BLOCK_SIZE]);
        let fits = Fits::from_bytes(&bytes, ReadMode::Full).unwrap();
        assert_eq!(fits.len(), 2);
        assert_eq!(fits.to_bytes().unwrap(), expected);
    }

    #[test]
    fn short_trailing_garbage_is_ignored() {
        let mut bytes = sample();
        bytes.extend_from_slice(b"garbage");
        assert_eq!(Fits::from_bytes(&bytes, ReadMode::Full).unwrap().len(), 2);
    }

    #[test]
    fn missing_key_reports_hdu_not_found() {
        let fits = Fits::from_bytes(&sample(), ReadMode::Full).unwrap();
        assert!(matches!(fits.hdu(5), Err(Error::HduNotFound(_))));
        assert!(matches!(fits.hdu("NOPE"), Err(Error::HduNotFound(_))));
    }

    // ---- headers only ----

    #[test]
    fn headers_only_defers_data() {
        let bytes = sample();
        let mut fits = Fits::from_bytes(&bytes, ReadMode::HeadersOnly).unwrap();
        assert_eq!(fits.len(), 2);
        assert_eq!(fits.header("EVENTS").unwrap().value_of::<usize>("TFIELDS").unwrap(), 2);
        assert!(matches!(fits.hdu(1), Err(Error::DataNotLoaded(_))));
        assert!(matches!(fits.to_bytes(), Err(Error::DataNotLoaded(_))));
        assert!(!fits.control_block().entries()[1].read_status);

        let hdu = fits.read_hdu_data("EVENTS", &bytes).unwrap();
        let table = hdu.as_kind::<BinaryTable>().unwrap();
        assert_eq!(table.row_count(), 3);
        assert!(fits.control_block().entries()[1].read_status);

        fits.read_hdu_data(0, &bytes).unwrap();
        assert_eq!(fits.to_bytes().unwrap(), bytes);
    }

    // ---- building ----

    #[test]
    fn push_enforces_primary_first() {
        let mut fits = Fits::new();
        let table = BinaryTable::with_columns(&[ColumnDef::new("X", "E")], 1).unwrap();
        assert!(fits.push(table).is_err());

        fits.push(PrimaryHdu::new(Image::empty(crate::bitpix::Bitpix::U8)).unwrap())
            .unwrap();
        let again = PrimaryHdu::new(Image::empty(crate::bitpix::Bitpix::U8)).unwrap();
        assert!(fits.push(again).is_err());
        assert_eq!(fits.control_block().entries()[0].data_len, 0);
    }

    #[test]
    fn edits_survive_a_write() {
        let mut fits = Fits::from_bytes(&sample(), ReadMode::Full).unwrap();
        {
            let table = fits.hdu("EVENTS").unwrap().as_kind::<BinaryTable>().unwrap();
            let ids = table.get_column::<i32>("ID").unwrap();
            ids.set(2, 77).unwrap();
        }
        fits.hdu_mut(0).unwrap().set_keyword("OBJECT", "M31").unwrap();

        let bytes = fits.to_bytes().unwrap();
        let back = Fits::from_bytes(&bytes, ReadMode::Full).unwrap();
        assert_eq!(back[0].value_of::<String>("OBJECT").unwrap(), "M31");
        let table = back.hdu(1).unwrap().as_kind::<BinaryTable>().unwrap();
        assert_eq!(table.get_column::<i32>("ID").unwrap().get(2).unwrap(), 77);
    }
}
