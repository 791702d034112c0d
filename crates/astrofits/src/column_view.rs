//! Typed, write-through views over one table column.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell};
use core::fmt;
use core::marker::PhantomData;

use crate::column::Column;
use crate::convert::Converter;
use crate::error::{Error, Result};

/// The fixed-width rows of a table, `NAXIS1 × NAXIS2` bytes.
///
/// Column views share the buffer through a `RefCell`, so an edit made
/// through one view is visible to every later decode and to serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBuffer {
    bytes: RefCell<Vec<u8>>,
    row_width: usize,
    row_count: usize,
}

impl RowBuffer {
    pub(crate) fn new(bytes: Vec<u8>, row_width: usize, row_count: usize) -> Self {
        debug_assert_eq!(bytes.len(), row_width * row_count);
        RowBuffer {
            bytes: RefCell::new(bytes),
            row_width,
            row_count,
        }
    }

    pub fn row_width(&self) -> usize {
        self.row_width
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn byte_len(&self) -> usize {
        self.row_width * self.row_count
    }

    fn cell_range(&self, row: usize, column: &Column) -> Result<core::ops::Range<usize>> {
        if row >= self.row_count {
            return Err(Error::RowOutOfRange {
                row,
                rows: self.row_count,
            });
        }
        let start = row * self.row_width + column.start();
        Ok(start..start + column.width())
    }

    /// Raw bytes of one cell.
    pub fn cell(&self, row: usize, column: &Column) -> Result<Ref<'_, [u8]>> {
        let range = self.cell_range(row, column)?;
        Ok(Ref::map(self.bytes.borrow(), |b| &b[range]))
    }

    /// Raw bytes of one row.
    pub fn row(&self, row: usize) -> Result<Ref<'_, [u8]>> {
        if row >= self.row_count {
            return Err(Error::RowOutOfRange {
                row,
                rows: self.row_count,
            });
        }
        let start = row * self.row_width;
        Ok(Ref::map(self.bytes.borrow(), |b| {
            &b[start..start + self.row_width]
        }))
    }

    pub(crate) fn write_cell(
        &self,
        row: usize,
        column: &Column,
        f: impl FnOnce(&mut [u8]) -> Result<()>,
    ) -> Result<()> {
        let range = self.cell_range(row, column)?;
        let mut bytes = self.bytes.borrow_mut();
        f(&mut bytes[range])
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.bytes.borrow());
    }
}

/// A typed accessor over one column of a table.
///
/// Each row is decoded at most once and cached inside the view. Writes go
/// straight into the table's row buffer and refresh the cache, so the next
/// serialization of the table reflects them. Views do not share caches: a
/// second view over the same column keeps its own decoded rows, and a value
/// written through one view is not seen by rows the other has already
/// cached.
pub struct ColumnView<'t, T, C> {
    rows: &'t RowBuffer,
    column: &'t Column,
    cache: RefCell<BTreeMap<usize, T>>,
    _converter: PhantomData<C>,
}

impl<'t, T, C> ColumnView<'t, T, C>
where
    T: Clone,
    C: Converter<T>,
{
    pub(crate) fn new(rows: &'t RowBuffer, column: &'t Column) -> Self {
        ColumnView {
            rows,
            column,
            cache: RefCell::new(BTreeMap::new()),
            _converter: PhantomData,
        }
    }

    pub fn column(&self) -> &'t Column {
        self.column
    }

    /// Number of rows (`NAXIS2`).
    pub fn len(&self) -> usize {
        self.rows.row_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row`, decoded on first access.
    pub fn get(&self, row: usize) -> Result<T> {
        if let Some(v) = self.cache.borrow().get(&row) {
            return Ok(v.clone());
        }
        let value = {
            let cell = self.rows.cell(row, self.column)?;
            C::decode(&cell, self.column)?
        };
        log::trace!("decoded row {} of column {}", row, self.column.index());
        self.cache.borrow_mut().insert(row, value.clone());
        Ok(value)
    }

    /// Encode `value` into the row buffer and the cache.
    pub fn set(&self, row: usize, value: T) -> Result<()> {
        self.rows
            .write_cell(row, self.column, |cell| C::encode(&value, self.column, cell))?;
        self.cache.borrow_mut().insert(row, value);
        Ok(())
    }

    /// A handle on one cell that reads and writes through this view.
    pub fn at(&self, row: usize) -> Result<CellRef<'_, 't, T, C>> {
        if row >= self.len() {
            return Err(Error::RowOutOfRange {
                row,
                rows: self.len(),
            });
        }
        Ok(CellRef { view: self, row })
    }

    /// Every row in order.
    pub fn iter(&self) -> ColumnIter<'_, 't, T, C> {
        ColumnIter {
            view: self,
            next: 0,
        }
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.iter().collect()
    }

    /// Number of rows currently decoded.
    pub fn cached_rows(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl<T, C> fmt::Debug for ColumnView<'_, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnView")
            .field("column", &self.column.index())
            .field("name", &self.column.name())
            .field("rows", &self.rows.row_count())
            .finish()
    }
}

/// One cell of a [`ColumnView`].
pub struct CellRef<'v, 't, T, C> {
    view: &'v ColumnView<'t, T, C>,
    row: usize,
}

impl<T: Clone, C: Converter<T>> CellRef<'_, '_, T, C> {
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn get(&self) -> Result<T> {
        self.view.get(self.row)
    }

    pub fn set(&self, value: T) -> Result<()> {
        self.view.set(self.row, value)
    }
}

/// Iterator over the rows of a [`ColumnView`].
pub struct ColumnIter<'v, 't, T, C> {
    view: &'v ColumnView<'t, T, C>,
    next: usize,
}

impl<T: Clone, C: Converter<T>> Iterator for ColumnIter<'_, '_, T, C> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.view.len() {
            return None;
        }
        let row = self.next;
        self.next += 1;
        Some(self.view.get(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.view.len().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl<'v, 't, T: Clone, C: Converter<T>> IntoIterator for &'v ColumnView<'t, T, C> {
    type Item = Result<T>;
    type IntoIter = ColumnIter<'v, 't, T, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
