//! Table column metadata and TFORM parsing.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::error::{Error, Result};
use crate::header::Header;

// ── Binary TFORM ──

/// Element type of a binary-table field, named by its TFORM code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryType {
    /// `L`
    Logical,
    /// `X`
    Bit,
    /// `B`
    Byte,
    /// `I`
    Short,
    /// `J`
    Int,
    /// `K`
    Long,
    /// `A`
    Char,
    /// `E`
    Float,
    /// `D`
    Double,
    /// `C`
    ComplexFloat,
    /// `M`
    ComplexDouble,
    /// `P`: 32-bit array descriptor.
    Descriptor,
    /// `Q`: 64-bit array descriptor.
    LongDescriptor,
}

impl BinaryType {
    pub fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'L' => BinaryType::Logical,
            'X' => BinaryType::Bit,
            'B' => BinaryType::Byte,
            'I' => BinaryType::Short,
            'J' => BinaryType::Int,
            'K' => BinaryType::Long,
            'A' => BinaryType::Char,
            'E' => BinaryType::Float,
            'D' => BinaryType::Double,
            'C' => BinaryType::ComplexFloat,
            'M' => BinaryType::ComplexDouble,
            'P' => BinaryType::Descriptor,
            'Q' => BinaryType::LongDescriptor,
            _ => return None,
        })
    }

    pub fn code(self) -> char {
        match self {
            BinaryType::Logical => 'L',
            BinaryType::Bit => 'X',
            BinaryType::Byte => 'B',
            BinaryType::Short => 'I',
            BinaryType::Int => 'J',
            BinaryType::Long => 'K',
            BinaryType::Char => 'A',
            BinaryType::Float => 'E',
            BinaryType::Double => 'D',
            BinaryType::ComplexFloat => 'C',
            BinaryType::ComplexDouble => 'M',
            BinaryType::Descriptor => 'P',
            BinaryType::LongDescriptor => 'Q',
        }
    }

    /// Bytes per element. `X` counts one byte per element here; the packed
    /// width is computed by [`BinaryFormat::width`].
    pub fn size(self) -> usize {
        match self {
            BinaryType::Logical | BinaryType::Bit | BinaryType::Byte | BinaryType::Char => 1,
            BinaryType::Short => 2,
            BinaryType::Int | BinaryType::Float => 4,
            BinaryType::Long
            | BinaryType::Double
            | BinaryType::ComplexFloat
            | BinaryType::Descriptor => 8,
            BinaryType::ComplexDouble | BinaryType::LongDescriptor => 16,
        }
    }
}

/// A parsed binary TFORM: `rT` or, for descriptors, `rPt(max)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFormat {
    pub repeat: usize,
    pub kind: BinaryType,
    /// Element code of the heap array a descriptor points at.
    pub heap_type: Option<char>,
    /// Declared maximum heap array length.
    pub max_len: Option<usize>,
}

impl BinaryFormat {
    pub fn parse(tform: &str) -> Result<Self> {
        let bad = || Error::InvalidColumnFormat(tform.to_string());
        let tform = tform.trim();
        let digits = tform.bytes().take_while(u8::is_ascii_digit).count();
        let repeat = if digits == 0 {
            1
        } else {
            tform[..digits].parse::<usize>().map_err(|_| bad())?
        };
        let mut rest = tform[digits..].chars();
        let kind = rest.next().and_then(BinaryType::from_code).ok_or_else(bad)?;
        let tail = rest.as_str();

        if kind != BinaryType::Bit {
            repeat.checked_mul(kind.size()).ok_or_else(bad)?;
        }
        let (heap_type, max_len) = match kind {
            BinaryType::Descriptor | BinaryType::LongDescriptor => parse_heap_suffix(tail),
            _ => (None, None),
        };
        Ok(BinaryFormat {
            repeat,
            kind,
            heap_type,
            max_len,
        })
    }

    /// Bytes this field occupies in a row. [`parse`](Self::parse) rejects
    /// repeat counts whose width overflows.
    pub fn width(&self) -> usize {
        match self.kind {
            BinaryType::Bit => self.repeat.div_ceil(8),
            kind => self.repeat * kind.size(),
        }
    }
}

fn parse_heap_suffix(tail: &str) -> (Option<char>, Option<usize>) {
    let mut chars = tail.chars();
    let heap_type = chars.next().filter(char::is_ascii_alphabetic);
    let max_len = chars
        .as_str()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .and_then(|s| s.trim().parse().ok());
    (heap_type, max_len)
}

// ── ASCII TFORM ──

/// Field type of an ASCII-table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsciiType {
    /// `Aw`
    Char,
    /// `Iw`
    Integer,
    /// `Fw.d`
    Fixed,
    /// `Ew.d`
    Exponential,
    /// `Dw.d`
    Double,
}

impl AsciiType {
    pub fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'A' => AsciiType::Char,
            'I' => AsciiType::Integer,
            'F' => AsciiType::Fixed,
            'E' => AsciiType::Exponential,
            'D' => AsciiType::Double,
            _ => return None,
        })
    }

    pub fn code(self) -> char {
        match self {
            AsciiType::Char => 'A',
            AsciiType::Integer => 'I',
            AsciiType::Fixed => 'F',
            AsciiType::Exponential => 'E',
            AsciiType::Double => 'D',
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            AsciiType::Fixed | AsciiType::Exponential | AsciiType::Double
        )
    }
}

/// A parsed ASCII TFORM such as `I10`, `A20` or `D25.17`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiFormat {
    pub kind: AsciiType,
    pub width: usize,
    pub decimals: Option<usize>,
}

impl AsciiFormat {
    pub fn parse(tform: &str) -> Result<Self> {
        let bad = || Error::InvalidColumnFormat(tform.to_string());
        let tform = tform.trim();
        let mut chars = tform.chars();
        let kind = chars.next().and_then(AsciiType::from_code).ok_or_else(bad)?;
        let rest = chars.as_str();
        let (width, decimals) = match rest.split_once('.') {
            Some((w, d)) => (w, Some(d.parse::<usize>().map_err(|_| bad())?)),
            None => (rest, None),
        };
        let width = width.parse::<usize>().map_err(|_| bad())?;
        if width == 0 {
            return Err(bad());
        }
        Ok(AsciiFormat {
            kind,
            width,
            decimals,
        })
    }
}

/// The TFORM of a column, parsed for the table kind that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnFormat {
    Binary(BinaryFormat),
    Ascii(AsciiFormat),
}

impl ColumnFormat {
    pub fn width(&self) -> usize {
        match self {
            ColumnFormat::Binary(f) => f.width(),
            ColumnFormat::Ascii(f) => f.width,
        }
    }
}

// ── Column ──

/// Metadata of one table field, populated from its `T*n` keywords.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    index: usize,
    start: usize,
    tform: String,
    format: ColumnFormat,
    name: Option<String>,
    unit: Option<String>,
    scale: f64,
    zero: f64,
    display: Option<String>,
    dimension: Option<String>,
    comment: Option<String>,
}

impl Column {
    /// Read column `index` (1-based) whose field starts at byte `start` of
    /// the row. Absent optional keywords leave their field unset.
    pub(crate) fn from_header(
        header: &Header,
        index: usize,
        start: usize,
        tform: String,
        format: ColumnFormat,
    ) -> Result<Self> {
        let key = |prefix: &str| format!("{}{}", prefix, index);
        let ttype = key("TTYPE");
        let column = Column {
            index,
            start,
            tform,
            format,
            name: header.optional::<String>(&ttype)?,
            unit: header.optional::<String>(&key("TUNIT"))?,
            scale: header.optional::<f64>(&key("TSCAL"))?.unwrap_or(1.0),
            zero: header.optional::<f64>(&key("TZERO"))?.unwrap_or(0.0),
            display: header.optional::<String>(&key("TDISP"))?,
            dimension: header.optional::<String>(&key("TDIM"))?,
            comment: header
                .card(&ttype)
                .and_then(|c| c.comment())
                .map(String::from),
        };
        log::trace!(
            "column {} `{}` {} at byte {}",
            index,
            column.name().unwrap_or(""),
            column.tform,
            start
        );
        Ok(column)
    }

    /// 1-based field number.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Byte offset of the field within a row (zero-based).
    pub fn start(&self) -> usize {
        self.start
    }

    /// `TTYPEn`.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The raw `TFORMn` text.
    pub fn tform(&self) -> &str {
        &self.tform
    }

    pub fn format(&self) -> &ColumnFormat {
        &self.format
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// `TSCALn`, 1 when absent.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// `TZEROn`, 0 when absent.
    pub fn zero(&self) -> f64 {
        self.zero
    }

    pub fn display(&self) -> Option<&str> {
        self.display.as_deref()
    }

    pub fn dimension(&self) -> Option<&str> {
        self.dimension.as_deref()
    }

    /// Comment of the `TTYPEn` card.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Repeat count of a binary field; 1 for ASCII fields.
    pub fn total_elements(&self) -> usize {
        match &self.format {
            ColumnFormat::Binary(f) => f.repeat,
            ColumnFormat::Ascii(_) => 1,
        }
    }

    /// Bytes the field occupies in a row.
    pub fn width(&self) -> usize {
        self.format.width()
    }

    /// Apply `TSCAL`/`TZERO` to a stored value.
    pub fn physical(&self, stored: f64) -> f64 {
        self.zero + self.scale * stored
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        self.name.as_deref().is_some_and(|n| n.trim() == name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>3} {:<16} {:<10}",
            self.index,
            self.name().unwrap_or("-"),
            self.tform
        )?;
        if let Some(unit) = self.unit() {
            write!(f, " [{}]", unit)?;
        }
        Ok(())
    }
}

/// Describes a column of a table built with `with_columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub format: String,
    pub unit: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, format: impl Into<String>) -> Self {
        ColumnDef {
            name: name.into(),
            format: format.into(),
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Look a column up by `TTYPE`.
pub(crate) fn find_column<'c>(columns: &'c [Column], name: &str) -> Result<&'c Column> {
    columns
        .iter()
        .find(|c| c.matches(name))
        .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
}

/// `TFIELDS` and every `TFORMn`, in field order.
pub(crate) fn read_tforms(header: &Header) -> Result<Vec<String>> {
    let tfields = header.value_of::<usize>("TFIELDS")?;
    (1..=tfields)
        .map(|n| header.value_of::<String>(&format!("TFORM{}", n)))
        .collect()
}

/// `(NAXIS1, NAXIS2)` of a table extension.
pub(crate) fn table_shape(header: &Header) -> Result<(usize, usize)> {
    match header.all_naxis() {
        &[width, rows] => Ok((width, rows)),
        dims => Err(Error::FitsFormat(format!(
            "table extension needs NAXIS = 2, found {}",
            dims.len()
        ))),
    }
}
