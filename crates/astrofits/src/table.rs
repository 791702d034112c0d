//! FITS ASCII table extension (`XTENSION = 'TABLE'`).

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use crate::block::{pad_to_block, SPACE_FILL};
use crate::card::Card;
use crate::column::{
    find_column, read_tforms, table_shape, AsciiFormat, Column, ColumnDef, ColumnFormat,
};
use crate::column_view::{ColumnView, RowBuffer};
use crate::convert::{AsciiConverter, Converter};
use crate::error::{Error, Result};
use crate::header::Header;

/// Characters a field with this TFORM occupies, e.g. 25 for `D25.17`.
pub fn column_size(tform: &str) -> Result<usize> {
    Ok(AsciiFormat::parse(tform)?.width)
}

/// The type code of a TFORM, e.g. `'D'` for `D25.17`.
pub fn get_type(tform: &str) -> Result<char> {
    Ok(AsciiFormat::parse(tform)?.kind.code())
}

/// An ASCII table: rows of `NAXIS1` characters, fields placed by `TBCOLn`.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiTable {
    header: Header,
    columns: Vec<Column>,
    rows: RowBuffer,
    fill: u8,
}

impl AsciiTable {
    /// Build from a parsed header and the unpadded table data.
    pub fn new(header: Header, data: &[u8]) -> Result<Self> {
        Self::with_fill(header, data, SPACE_FILL)
    }

    pub(crate) fn with_fill(header: Header, data: &[u8], fill: u8) -> Result<Self> {
        let columns = read_columns(&header)?;
        let (row_width, row_count) = table_shape(&header)?;
        let mut table = AsciiTable {
            header,
            columns,
            rows: RowBuffer::new(Vec::new(), 0, 0),
            fill,
        };
        table.load(data, row_width, row_count)?;
        Ok(table)
    }

    /// An empty table of `rows` blank rows. Fields are laid out back to
    /// back in definition order.
    pub fn with_columns(defs: &[ColumnDef], rows: usize) -> Result<Self> {
        let formats = defs
            .iter()
            .map(|d| AsciiFormat::parse(&d.format))
            .collect::<Result<Vec<_>>>()?;
        let row_width = formats
            .iter()
            .try_fold(0usize, |sum, f| sum.checked_add(f.width))
            .ok_or_else(|| Error::format("ASCII table row width overflows usize"))?;

        let mut cards = vec![
            Card::new("XTENSION", "TABLE", "ASCII table extension")?,
            Card::new("BITPIX", 8, "8-bit ASCII characters")?,
            Card::new("NAXIS", 2, "2-dimensional ASCII table")?,
            Card::new("NAXIS1", row_width, "width of table in characters")?,
            Card::new("NAXIS2", rows, "number of rows in table")?,
            Card::new("PCOUNT", 0, "no group parameters")?,
            Card::new("GCOUNT", 1, "one data group")?,
            Card::new("TFIELDS", defs.len(), "number of fields in each row")?,
        ];
        let mut tbcol = 1;
        for (i, (def, format)) in defs.iter().zip(&formats).enumerate() {
            let n = i + 1;
            cards.push(Card::new(&format!("TTYPE{}", n), def.name.as_str(), "")?);
            cards.push(Card::new(&format!("TBCOL{}", n), tbcol, "")?);
            cards.push(Card::new(&format!("TFORM{}", n), def.format.as_str(), "")?);
            if let Some(unit) = &def.unit {
                cards.push(Card::new(&format!("TUNIT{}", n), unit.as_str(), "")?);
            }
            tbcol += format.width;
        }
        let rows_len = row_width
            .checked_mul(rows)
            .ok_or_else(|| Error::format("ASCII table size overflows usize"))?;
        let header = Header::from_cards(cards)?;
        Self::with_fill(header, &vec![b' '; rows_len], SPACE_FILL)
    }

    /// Replace the row characters. Column views borrowed from the previous
    /// data cannot outlive this call.
    pub fn set_data(&mut self, data: &[u8]) -> Result<()> {
        self.load(data, self.rows.row_width(), self.rows.row_count())
    }

    fn load(&mut self, data: &[u8], row_width: usize, row_count: usize) -> Result<()> {
        let rows_len = row_width
            .checked_mul(row_count)
            .ok_or_else(|| Error::format("ASCII table size overflows usize"))?;
        if data.len() < rows_len {
            return Err(Error::FitsFormat(format!(
                "ASCII table needs {} characters, data has {}",
                rows_len,
                data.len()
            )));
        }
        if data.len() > rows_len {
            log::warn!(
                "ignoring {} bytes after the rows of an ASCII table",
                data.len() - rows_len
            );
        }
        self.rows = RowBuffer::new(data[..rows_len].to_vec(), row_width, row_count);
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

    pub fn fill(&self) -> u8 {
        self.fill
    }

    /// The text of one cell with surrounding blanks removed.
    pub fn cell_text(&self, row: usize, name: &str) -> Result<String> {
        let column = self.column(name)?;
        let cell = self.rows.cell(row, column)?;
        Ok(String::from_utf8_lossy(&cell).trim().to_string())
    }

    /// A typed view over the column named `name`.
    pub fn get_column<T>(&self, name: &str) -> Result<ColumnView<'_, T, AsciiConverter>>
    where
        T: Clone,
        AsciiConverter: Converter<T>,
    {
        let column = self.column(name)?;
        Ok(ColumnView::new(&self.rows, column))
    }

    pub fn data_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.rows.byte_len());
        self.rows.write_to(&mut out);
        out
    }

    /// Header and rows, padded to the record boundary.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.header.write(out);
        self.rows.write_to(out);
        let padding = pad_to_block(out, self.fill);
        log::debug!(
            "wrote ASCII table: {} rows x {} characters, {} padding",
            self.row_count(),
            self.row_width(),
            padding
        );
    }
}

/// Columns placed by `TBCOLn`; every field must end within `NAXIS1`.
fn read_columns(header: &Header) -> Result<Vec<Column>> {
    let (row_width, _) = table_shape(header)?;
    let mut columns = Vec::new();
    for (i, tform) in read_tforms(header)?.into_iter().enumerate() {
        let n = i + 1;
        let format = AsciiFormat::parse(&tform)?;
        let tbcol = header.value_of::<usize>(&format!("TBCOL{}", n))?;
        let in_row = tbcol
            .checked_sub(1)
            .and_then(|start| start.checked_add(format.width))
            .is_some_and(|end| end <= row_width);
        if !in_row {
            return Err(Error::FitsFormat(format!(
                "field {} ({} at TBCOL {}) does not fit in NAXIS1 = {}",
                n, tform, tbcol, row_width
            )));
        }
        columns.push(Column::from_header(
            header,
            n,
            tbcol - 1,
            tform,
            ColumnFormat::Ascii(format),
        )?);
    }
    Ok(columns)
}
