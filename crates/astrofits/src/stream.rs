//! Sequential cursor over an in-memory FITS byte stream.

use crate::block::{padded_byte_len, CARD_SIZE};
use crate::error::{Error, Result};

/// Reads cards and data blocks from a byte buffer, tracking the position
/// relative to the start of the file so that logical-record alignment can be
/// restored after every header and data section.
#[derive(Debug, Clone)]
pub struct RecordReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        RecordReader { bytes, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Bytes from the current position to the end of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    /// Move to an absolute offset.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.bytes.len() {
            return Err(Error::UnexpectedEof {
                offset: pos,
                needed: 0,
                available: 0,
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Take the next `len` bytes.
    pub fn read(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(Error::UnexpectedEof {
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            })?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Take the next 80-byte card image.
    pub fn read_card(&mut self) -> Result<&'a [u8; CARD_SIZE]> {
        let raw = self.read(CARD_SIZE)?;
        raw.try_into().map_err(|_| Error::format("short card record"))
    }

    /// Skip to the next logical-record boundary and return the skipped
    /// padding. A stream that ends before the boundary is accepted and the
    /// cursor stops at the end.
    pub fn align_to_record(&mut self) -> &'a [u8] {
        let target = padded_byte_len(self.pos).min(self.bytes.len());
        let padding = &self.bytes[self.pos..target];
        self.pos = target;
        padding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BLOCK_SIZE;
    use alloc::vec;

    #[test]
    fn read_advances_position() {
        let data = vec![7u8; 200];
        let mut r = RecordReader::new(&data);
        assert_eq!(r.read(80).unwrap().len(), 80);
        assert_eq!(r.position(), 80);
        assert_eq!(r.remaining(), 120);
        assert!(!r.at_end());
    }

    #[test]
    fn read_past_end_fails() {
        let data = vec![0u8; 100];
        let mut r = RecordReader::new(&data);
        r.read(80).unwrap();
        let err = r.read(80).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedEof {
                offset: 80,
                needed: 80,
                available: 20
            }
        ));
        assert_eq!(r.position(), 80);
    }

    #[test]
    fn read_card_is_fixed_width() {
        let data = vec![b'X'; CARD_SIZE * 2];
        let mut r = RecordReader::new(&data);
        let card = r.read_card().unwrap();
        assert_eq!(card.len(), CARD_SIZE);
    }

    #[test]
    fn align_skips_to_boundary() {
        let mut data = vec![0u8; 2 * BLOCK_SIZE];
        data[100] = b' ';
        let mut r = RecordReader::new(&data);
        r.read(100).unwrap();
        let pad = r.align_to_record();
        assert_eq!(pad.len(), BLOCK_SIZE - 100);
        assert_eq!(pad[0], b' ');
        assert_eq!(r.position(), BLOCK_SIZE);
    }

    #[test]
    fn align_on_boundary_is_noop() {
        let data = vec![0u8; 2 * BLOCK_SIZE];
        let mut r = RecordReader::new(&data);
        r.read(BLOCK_SIZE).unwrap();
        assert!(r.align_to_record().is_empty());
        assert_eq!(r.position(), BLOCK_SIZE);
    }

    #[test]
    fn align_tolerates_missing_tail_padding() {
        let data = vec![0u8; 300];
        let mut r = RecordReader::new(&data);
        r.read(200).unwrap();
        assert_eq!(r.align_to_record().len(), 100);
        assert!(r.at_end());
    }

    #[test]
    fn seek_within_bounds() {
        let data = vec![0u8; 10];
        let mut r = RecordReader::new(&data);
        r.seek(4).unwrap();
        assert_eq!(r.rest().len(), 6);
        assert!(r.seek(11).is_err());
    }
}
