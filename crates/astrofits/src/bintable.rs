//! FITS binary table extension (`XTENSION = 'BINTABLE'`).

use alloc::format;
use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;

use crate::block::{pad_to_block, ZERO_FILL};
use crate::card::Card;
use crate::column::{
    find_column, read_tforms, table_shape, BinaryFormat, BinaryType, Column, ColumnDef,
    ColumnFormat,
};
use crate::column_view::{ColumnView, RowBuffer};
use crate::convert::{BinaryConverter, Converter};
use crate::error::{Error, Result};
use crate::header::Header;

/// Bytes a field with this TFORM occupies in a row:
/// `element_count × type_size`, packed to whole bytes for `X`.
pub fn column_size(tform: &str) -> Result<usize> {
    Ok(BinaryFormat::parse(tform)?.width())
}

/// The repeat count of a TFORM, 1 when omitted.
pub fn element_count(tform: &str) -> Result<usize> {
    Ok(BinaryFormat::parse(tform)?.repeat)
}

/// Bytes per element of a TFORM type code.
pub fn type_size(code: char) -> Result<usize> {
    BinaryType::from_code(code)
        .map(BinaryType::size)
        .ok_or_else(|| Error::InvalidColumnFormat(code.to_string()))
}

/// The type code of a TFORM.
pub fn get_type(tform: &str) -> Result<char> {
    Ok(BinaryFormat::parse(tform)?.kind.code())
}

/// A binary table: fixed-width rows followed by an opaque heap.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryTable {
    header: Header,
    columns: Vec<Column>,
    rows: RowBuffer,
    heap: Vec<u8>,
    fill: u8,
}

impl BinaryTable {
    /// Build from a parsed header and the HDU data (rows then heap,
    /// without record padding).
    pub fn new(header: Header, data: &[u8]) -> Result<Self> {
        Self::with_fill(header, data, ZERO_FILL)
    }

    pub(crate) fn with_fill(header: Header, data: &[u8], fill: u8) -> Result<Self> {
        let columns = read_columns(&header)?;
        let (row_width, row_count) = table_shape(&header)?;
        let mut table = BinaryTable {
            header,
            columns,
            rows: RowBuffer::new(Vec::new(), 0, 0),
            heap: Vec::new(),
            fill,
        };
        table.load(data, row_width, row_count)?;
        Ok(table)
    }

    /// An empty table of `rows` zero-filled rows with the given columns.
    pub fn with_columns(defs: &[ColumnDef], rows: usize) -> Result<Self> {
        let formats = defs
            .iter()
            .map(|d| BinaryFormat::parse(&d.format))
            .collect::<Result<Vec<_>>>()?;
        let row_width = formats
            .iter()
            .try_fold(0usize, |sum, f| sum.checked_add(f.width()))
            .ok_or_else(|| Error::format("binary table row width overflows usize"))?;

        let mut cards = vec![
            Card::new("XTENSION", "BINTABLE", "binary table extension")?,
            Card::new("BITPIX", 8, "8-bit bytes")?,
            Card::new("NAXIS", 2, "2-dimensional binary table")?,
            Card::new("NAXIS1", row_width, "width of table in bytes")?,
            Card::new("NAXIS2", rows, "number of rows in table")?,
            Card::new("PCOUNT", 0, "size of special data area")?,
            Card::new("GCOUNT", 1, "one data group")?,
            Card::new("TFIELDS", defs.len(), "number of fields in each row")?,
        ];
        for (i, def) in defs.iter().enumerate() {
            let n = i + 1;
            cards.push(Card::new(&format!("TTYPE{}", n), def.name.as_str(), "")?);
            cards.push(Card::new(&format!("TFORM{}", n), def.format.as_str(), "")?);
            if let Some(unit) = &def.unit {
                cards.push(Card::new(&format!("TUNIT{}", n), unit.as_str(), "")?);
            }
        }
        let rows_len = row_width
            .checked_mul(rows)
            .ok_or_else(|| Error::format("binary table size overflows usize"))?;
        let header = Header::from_cards(cards)?;
        Self::with_fill(header, &vec![0u8; rows_len], ZERO_FILL)
    }

    /// Replace the rows and heap with `data`; `PCOUNT` follows the new heap
    /// size. Column views borrowed from the previous data cannot outlive
    /// this call.
    pub fn set_data(&mut self, data: &[u8]) -> Result<()> {
        self.load(data, self.rows.row_width(), self.rows.row_count())
    }

    fn load(&mut self, data: &[u8], row_width: usize, row_count: usize) -> Result<()> {
        let rows_len = row_width
            .checked_mul(row_count)
            .ok_or_else(|| Error::format("binary table size overflows usize"))?;
        if data.len() < rows_len {
            return Err(Error::FitsFormat(format!(
                "binary table needs {} bytes of rows, data has {}",
                rows_len,
                data.len()
            )));
        }
        let heap_len = data.len() - rows_len;
        if self.header.optional::<usize>("PCOUNT")?.unwrap_or(0) != heap_len {
            log::debug!("binary table heap is now {} bytes", heap_len);
            self.header.set_value("PCOUNT", heap_len)?;
        }
        self.rows = RowBuffer::new(data[..rows_len].to_vec(), row_width, row_count);
        self.heap = data[rows_len..].to_vec();
        Ok(())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub(crate) fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Rebuild the column list after a `T*n` keyword edit.
    pub(crate) fn reload_columns(&mut self) -> Result<()> {
        self.columns = read_columns(&self.header)?;
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column metadata by `TTYPE`.
    pub fn column(&self, name: &str) -> Result<&Column> {
        find_column(&self.columns, name)
    }

    pub fn tfields(&self) -> usize {
        self.columns.len()
    }

    /// `NAXIS2`.
    pub fn row_count(&self) -> usize {
        self.rows.row_count()
    }

    /// `NAXIS1`.
    pub fn row_width(&self) -> usize {
        self.rows.row_width()
    }

    pub fn rows(&self) -> &RowBuffer {
        &self.rows
    }

    /// The bytes following the rows (`PCOUNT`), kept verbatim.
    pub fn heap(&self) -> &[u8] {
        &self.heap
    }

    /// Byte used to pad the data to a record boundary.
    pub fn fill(&self) -> u8 {
        self.fill
    }

    /// A typed view over the column named `name`.
    pub fn get_column<T>(&self, name: &str) -> Result<ColumnView<'_, T, BinaryConverter>>
    where
        T: Clone,
        BinaryConverter: Converter<T>,
    {
        let column = self.column(name)?;
        Ok(ColumnView::new(&self.rows, column))
    }

    /// Rows then heap, unpadded.
    pub fn data_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.rows.byte_len() + self.heap.len());
        self.rows.write_to(&mut out);
        out.extend_from_slice(&self.heap);
        out
    }

    /// Header, rows and heap, padded to the record boundary.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.header.write(out);
        self.rows.write_to(out);
        out.extend_from_slice(&self.heap);
        let padding = pad_to_block(out, self.fill);
        log::debug!(
            "wrote binary table: {} rows x {} bytes, {} heap bytes, {} padding",
            self.row_count(),
            self.row_width(),
            self.heap.len(),
            padding
        );
    }
}

/// Columns with cumulative offsets; their widths must add up to `NAXIS1`.
fn read_columns(header: &Header) -> Result<Vec<Column>> {
    let (row_width, _) = table_shape(header)?;
    let mut columns = Vec::new();
    let mut offset = 0;
    for (i, tform) in read_tforms(header)?.into_iter().enumerate() {
        let format = BinaryFormat::parse(&tform)?;
        let width = format.width();
        columns.push(Column::from_header(
            header,
            i + 1,
            offset,
            tform,
            ColumnFormat::Binary(format),
        )?);
        offset = offset
            .checked_add(width)
            .ok_or_else(|| Error::format("binary table row width overflows usize"))?;
    }
    if offset != row_width {
        return Err(Error::FitsFormat(format!(
            "binary table fields span {} bytes but NAXIS1 = {}",
            offset, row_width
        )));
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BLOCK_SIZE;
    use crate::header::tests::header_bytes;
    use alloc::string::String;

    /// Two rows of `ID:J`, `FLUX:2E`, `NAME:8A`, `FLAG:L`.
    fn sample() -> (Header, Vec<u8>) {
        let header = Header::from_bytes(&header_bytes(&[
            "XTENSION= 'BINTABLE'",
            "BITPIX  =                    8",
            "NAXIS   =                    2",
            "NAXIS1  =                   21",
            "NAXIS2  =                    2",
            "PCOUNT  =                    0",
            "GCOUNT  =                    1",
            "TFIELDS =                    4",
            "TTYPE1  = 'ID      '           / source identifier",
            "TFORM1  = 'J       '",
            "TTYPE2  = 'FLUX    '",
            "TFORM2  = '2E      '",
            "TUNIT2  = 'Jy      '",
            "TTYPE3  = 'NAME    '",
            "TFORM3  = '8A      '",
            "TTYPE4  = 'FLAG    '",
            "TFORM4  = 'L       '",
        ]))
        .unwrap();

        let mut data = Vec::new();
        for (id, flux, name, flag) in [
            (7i32, [1.5f32, 2.5], "M31", b'T'),
            (-3, [0.25, -8.0], "NGC 1300", b'F'),
        ] {
            data.extend_from_slice(&id.to_be_bytes());
            for f in flux {
                data.extend_from_slice(&f.to_be_bytes());
            }
            let mut text = name.as_bytes().to_vec();
            text.resize(8, b' ');
            data.extend_from_slice(&text);
            data.push(flag);
        }
        (header, data)
    }

    // ---- tform helpers ----

    #[test]
    fn column_size_of_repeated_shorts() {
        assert_eq!(column_size("144000I").unwrap(), 288000);
        assert_eq!(element_count("I").unwrap(), 1);
        assert_eq!(element_count("144000I").unwrap(), 144000);
        assert_eq!(get_type("144000I").unwrap(), 'I');
    }

    #[test]
    fn type_sizes() {
        for (code, size) in [
            ('L', 1),
            ('X', 1),
            ('B', 1),
            ('I', 2),
            ('J', 4),
            ('A', 1),
            ('E', 4),
            ('D', 8),
            ('C', 8),
            ('M', 16),
            ('P', 8),
        ] {
            assert_eq!(type_size(code).unwrap(), size, "{}", code);
        }
        assert!(matches!(type_size('Z'), Err(Error::InvalidColumnFormat(_))));
    }

    // ---- layout ----

    #[test]
    fn offsets_are_cumulative() {
        let (header, data) = sample();
        let table = BinaryTable::new(header, &data).unwrap();
        let starts: Vec<usize> = table.columns().iter().map(Column::start).collect();
        assert_eq!(starts, [0, 4, 12, 20]);
        let total: usize = table.columns().iter().map(Column::width).sum();
        assert_eq!(total, table.row_width());
        assert_eq!(table.tfields(), 4);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn optional_metadata() {
        let (header, data) = sample();
        let table = BinaryTable::new(header, &data).unwrap();
        let id = table.column("ID").unwrap();
        assert_eq!(id.comment(), Some("source identifier"));
        assert_eq!(id.unit(), None);
        assert_eq!(id.scale(), 1.0);
        assert_eq!(table.column("FLUX").unwrap().unit(), Some("Jy"));
        assert_eq!(table.column("FLUX").unwrap().total_elements(), 2);
    }

    #[test]
    fn width_mismatch_is_format_error() {
        let header = Header::from_bytes(&header_bytes(&[
            "XTENSION= 'BINTABLE'",
            "BITPIX  =                    8",
            "NAXIS   =                    2",
            "NAXIS1  =                    6",
            "NAXIS2  =                    0",
            "TFIELDS =                    1",
            "TFORM1  = 'J       '",
        ]))
        .unwrap();
        assert!(matches!(
            BinaryTable::new(header, &[]),
            Err(Error::FitsFormat(_))
        ));
    }

    #[test]
    fn overflowing_row_width_is_an_error() {
        let header = Header::from_bytes(&header_bytes(&[
            "XTENSION= 'BINTABLE'",
            "BITPIX  =                    8",
            "NAXIS   =                    2",
            "NAXIS1  =                    8",
            "NAXIS2  =                    0",
            "TFIELDS =                    1",
            "TFORM1  = '2305843009213693952D'",
        ]))
        .unwrap();
        assert!(matches!(
            BinaryTable::new(header, &[]),
            Err(Error::InvalidColumnFormat(_))
        ));

        let header = Header::from_bytes(&header_bytes(&[
            "XTENSION= 'BINTABLE'",
            "BITPIX  =                    8",
            "NAXIS   =                    2",
            "NAXIS1  =                    8",
            "NAXIS2  =                    0",
            "TFIELDS =                    2",
            "TFORM1  = '2305843009213693951D'",
            "TFORM2  = '2305843009213693951D'",
        ]))
        .unwrap();
        assert!(matches!(
            BinaryTable::new(header, &[]),
            Err(Error::FitsFormat(_))
        ));
    }

    #[test]
    fn short_data_is_format_error() {
        let (header, data) = sample();
        assert!(matches!(
            BinaryTable::new(header, &data[..30]),
            Err(Error::FitsFormat(_))
        ));
    }

    // ---- column views ----

    #[test]
    fn typed_columns() {
        let (header, data) = sample();
        let table = BinaryTable::new(header, &data).unwrap();

        let ids = table.get_column::<i32>("ID").unwrap();
        assert_eq!(ids.to_vec().unwrap(), [7, -3]);

        let flux = table.get_column::<Vec<f32>>("FLUX").unwrap();
        assert_eq!(flux.get(1).unwrap(), [0.25, -8.0]);

        let names = table.get_column::<String>("NAME").unwrap();
        assert_eq!(names.get(1).unwrap(), "NGC 1300");

        let flags = table.get_column::<bool>("FLAG").unwrap();
        assert_eq!(flags.to_vec().unwrap(), [true, false]);
    }

    #[test]
    fn missing_column() {
        let (header, data) = sample();
        let table = BinaryTable::new(header, &data).unwrap();
        assert!(matches!(
            table.get_column::<i32>("RA"),
            Err(Error::ColumnNotFound(name)) if name == "RA"
        ));
    }

    #[test]
    fn wrong_element_type() {
        let (header, data) = sample();
        let table = BinaryTable::new(header, &data).unwrap();
        let ids = table.get_column::<f64>("ID").unwrap();
        assert!(matches!(ids.get(0), Err(Error::InvalidColumnFormat(_))));
    }

    #[test]
    fn repeated_reads_hit_the_cache() {
        let (header, data) = sample();
        let table = BinaryTable::new(header, &data).unwrap();
        let ids = table.get_column::<i32>("ID").unwrap();
        assert_eq!(ids.get(0).unwrap(), ids.get(0).unwrap());
        assert_eq!(ids.cached_rows(), 1);
    }

    #[test]
    fn row_out_of_range() {
        let (header, data) = sample();
        let table = BinaryTable::new(header, &data).unwrap();
        let ids = table.get_column::<i32>("ID").unwrap();
        assert!(matches!(
            ids.get(2),
            Err(Error::RowOutOfRange { row: 2, rows: 2 })
        ));
        assert!(ids.at(5).is_err());
    }

    #[test]
    fn write_through_reaches_new_views_and_bytes() {
        let (header, data) = sample();
        let table = BinaryTable::new(header, &data).unwrap();
        {
            let ids = table.get_column::<i32>("ID").unwrap();
            ids.at(1).unwrap().set(1234).unwrap();
            assert_eq!(ids.get(1).unwrap(), 1234);
        }
        let fresh = table.get_column::<i32>("ID").unwrap();
        assert_eq!(fresh.get(1).unwrap(), 1234);
        assert_eq!(&table.data_bytes()[21..25], &1234i32.to_be_bytes());
    }

    #[test]
    fn stale_cache_in_second_view() {
        let (header, data) = sample();
        let table = BinaryTable::new(header, &data).unwrap();
        let a = table.get_column::<i32>("ID").unwrap();
        let b = table.get_column::<i32>("ID").unwrap();
        assert_eq!(b.get(0).unwrap(), 7);
        a.set(0, 99).unwrap();
        // `b` decoded row 0 before the write.
        assert_eq!(b.get(0).unwrap(), 7);
        assert_eq!(table.get_column::<i32>("ID").unwrap().get(0).unwrap(), 99);
    }

    // ---- heap and serialization ----

    #[test]
    fn heap_round_trips() {
        let header = Header::from_bytes(&header_bytes(&[
            "XTENSION= 'BINTABLE'",
            "BITPIX  =                    8",
            "NAXIS   =                    2",
            "NAXIS1  =                    8",
            "NAXIS2  =                    1",
            "PCOUNT  =                    8",
            "GCOUNT  =                    1",
            "TFIELDS =                    1",
            "TTYPE1  = 'SPECTRUM'",
            "TFORM1  = '1PI(4)  '",
        ]))
        .unwrap();
        let mut data = vec![0, 0, 0, 4, 0, 0, 0, 0];
        data.extend_from_slice(&[0, 1, 0, 2, 0, 3, 0, 4]);
        let table = BinaryTable::new(header, &data).unwrap();
        assert_eq!(table.heap(), &data[8..]);

        let spectrum = table.get_column::<crate::convert::ArrayDescriptor>("SPECTRUM").unwrap();
        assert_eq!(spectrum.get(0).unwrap().length, 4);

        let mut out = Vec::new();
        table.write_to(&mut out);
        assert_eq!(out.len(), 2 * BLOCK_SIZE);
        assert_eq!(&out[BLOCK_SIZE..BLOCK_SIZE + 16], data.as_slice());
        assert!(out[BLOCK_SIZE + 16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn set_data_replaces_rows() {
        let (header, data) = sample();
        let mut table = BinaryTable::new(header, &data).unwrap();
        let mut swapped = data[21..].to_vec();
        swapped.extend_from_slice(&data[..21]);
        table.set_data(&swapped).unwrap();
        let ids = table.get_column::<i32>("ID").unwrap();
        assert_eq!(ids.to_vec().unwrap(), [-3, 7]);
    }

    #[test]
    fn set_data_resizes_pcount() {
        let (header, data) = sample();
        let mut table = BinaryTable::new(header, &data).unwrap();
        let mut grown = data.clone();
        grown.extend_from_slice(&[0xAB; 3000]);
        table.set_data(&grown).unwrap();
        assert_eq!(table.heap().len(), 3000);
        assert_eq!(table.header().value_of::<usize>("PCOUNT").unwrap(), 3000);
        assert_eq!(
            table.header().data_byte_len().unwrap(),
            table.data_bytes().len()
        );

        table.set_data(&data).unwrap();
        assert!(table.heap().is_empty());
        assert_eq!(table.header().value_of::<usize>("PCOUNT").unwrap(), 0);
    }

    #[test]
    fn with_columns_builds_header() {
        let defs = [
            ColumnDef::new("TIME", "D").with_unit("s"),
            ColumnDef::new("RATE", "3E"),
            ColumnDef::new("MASK", "12X"),
        ];
        let table = BinaryTable::with_columns(&defs, 4).unwrap();
        assert_eq!(table.row_width(), 8 + 12 + 2);
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.header().value_of::<usize>("TFIELDS").unwrap(), 3);
        assert_eq!(table.header().hdu_name().unwrap(), "BINTABLE");
        assert_eq!(table.column("TIME").unwrap().unit(), Some("s"));

        let time = table.get_column::<f64>("TIME").unwrap();
        for row in 0..4 {
            time.set(row, row as f64 * 0.5).unwrap();
        }
        let reread =
            BinaryTable::new(table.header().clone(), &table.data_bytes()).unwrap();
        let time = reread.get_column::<f64>("TIME").unwrap();
        assert_eq!(time.to_vec().unwrap(), [0.0, 0.5, 1.0, 1.5]);
    }
}
