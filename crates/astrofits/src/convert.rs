//! Cell converters between table bytes and Rust values.
//!
//! A [`Converter`] is chosen per table kind: [`BinaryConverter`] for
//! `BINTABLE` cells and [`AsciiConverter`] for `TABLE` cells. The element
//! types each converter supports are listed by the [`BinaryField`] and
//! [`AsciiField`] impls.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::column::{AsciiFormat, AsciiType, BinaryFormat, BinaryType, Column, ColumnFormat};
use crate::endian::{decode_slice, BigEndian};
use crate::error::{Error, Result};
use crate::value::{format_float, parse_fits_float};

/// Decodes and encodes one table cell as `T`.
pub trait Converter<T> {
    /// Decode the bytes of one cell.
    fn decode(cell: &[u8], column: &Column) -> Result<T>;

    /// Encode `value` into the bytes of one cell. `cell` has exactly the
    /// column width.
    fn encode(value: &T, column: &Column, cell: &mut [u8]) -> Result<()>;
}

fn wrong_type(column: &Column, target: &str) -> Error {
    Error::InvalidColumnFormat(format!(
        "{} (column {}) cannot hold {}",
        column.tform(),
        column.index(),
        target
    ))
}

// ── Binary ──

/// Converter for binary-table cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryConverter;

/// A value that can live in a binary-table cell.
pub trait BinaryField: Sized {
    const NAME: &'static str;

    fn decode_binary(cell: &[u8], format: &BinaryFormat) -> Option<Self>;

    /// Returns `None` when the format cannot hold this type.
    fn encode_binary(&self, format: &BinaryFormat, cell: &mut [u8]) -> Option<Result<()>>;
}

impl<T: BinaryField> Converter<T> for BinaryConverter {
    fn decode(cell: &[u8], column: &Column) -> Result<T> {
        let ColumnFormat::Binary(format) = column.format() else {
            return Err(wrong_type(column, T::NAME));
        };
        T::decode_binary(cell, format).ok_or_else(|| wrong_type(column, T::NAME))
    }

    fn encode(value: &T, column: &Column, cell: &mut [u8]) -> Result<()> {
        let ColumnFormat::Binary(format) = column.format() else {
            return Err(wrong_type(column, T::NAME));
        };
        value
            .encode_binary(format, cell)
            .ok_or_else(|| wrong_type(column, T::NAME))?
    }
}

fn length_mismatch(expected: usize, found: usize) -> Error {
    Error::cast(
        format!("{} elements (repeat count {})", found, expected),
        "a fixed-length field",
    )
}

macro_rules! numeric_field {
    ($($t:ty => $kind:ident),*) => {$(
        impl BinaryField for $t {
            const NAME: &'static str = stringify!($t);

            fn decode_binary(cell: &[u8], format: &BinaryFormat) -> Option<Self> {
                (format.kind == BinaryType::$kind && format.repeat == 1)
                    .then(|| <$t>::read_be(cell))
            }

            fn encode_binary(&self, format: &BinaryFormat, cell: &mut [u8]) -> Option<Result<()>> {
                if format.kind != BinaryType::$kind {
                    return None;
                }
                if format.repeat != 1 {
                    return Some(Err(length_mismatch(format.repeat, 1)));
                }
                self.write_be(cell);
                Some(Ok(()))
            }
        }

        impl BinaryField for Vec<$t> {
            const NAME: &'static str = concat!("Vec<", stringify!($t), ">");

            fn decode_binary(cell: &[u8], format: &BinaryFormat) -> Option<Self> {
                (format.kind == BinaryType::$kind).then(|| decode_slice::<$t>(cell))
            }

            fn encode_binary(&self, format: &BinaryFormat, cell: &mut [u8]) -> Option<Result<()>> {
                if format.kind != BinaryType::$kind {
                    return None;
                }
                if self.len() != format.repeat {
                    return Some(Err(length_mismatch(format.repeat, self.len())));
                }
                for (v, chunk) in self.iter().zip(cell.chunks_exact_mut(<$t>::SIZE)) {
                    v.write_be(chunk);
                }
                Some(Ok(()))
            }
        }
    )*};
}

numeric_field!(u8 => Byte, i16 => Short, i32 => Int, i64 => Long, f32 => Float, f64 => Double);

macro_rules! complex_field {
    ($($t:ty => $kind:ident),*) => {$(
        impl BinaryField for ($t, $t) {
            const NAME: &'static str = concat!("(", stringify!($t), ", ", stringify!($t), ")");

            fn decode_binary(cell: &[u8], format: &BinaryFormat) -> Option<Self> {
                if format.kind != BinaryType::$kind || format.repeat != 1 {
                    return None;
                }
                let half = <$t>::SIZE;
                Some((<$t>::read_be(cell), <$t>::read_be(&cell[half..])))
            }

            fn encode_binary(&self, format: &BinaryFormat, cell: &mut [u8]) -> Option<Result<()>> {
                if format.kind != BinaryType::$kind {
                    return None;
                }
                if format.repeat != 1 {
                    return Some(Err(length_mismatch(format.repeat, 1)));
                }
                let half = <$t>::SIZE;
                self.0.write_be(cell);
                self.1.write_be(&mut cell[half..]);
                Some(Ok(()))
            }
        }

        impl BinaryField for Vec<($t, $t)> {
            const NAME: &'static str = concat!("Vec<(", stringify!($t), ", ", stringify!($t), ")>");

            fn decode_binary(cell: &[u8], format: &BinaryFormat) -> Option<Self> {
                if format.kind != BinaryType::$kind {
                    return None;
                }
                let parts = decode_slice::<$t>(cell);
                Some(parts.chunks_exact(2).map(|p| (p[0], p[1])).collect())
            }

            fn encode_binary(&self, format: &BinaryFormat, cell: &mut [u8]) -> Option<Result<()>> {
                if format.kind != BinaryType::$kind {
                    return None;
                }
                if self.len() != format.repeat {
                    return Some(Err(length_mismatch(format.repeat, self.len())));
                }
                let half = <$t>::SIZE;
                for (v, chunk) in self.iter().zip(cell.chunks_exact_mut(2 * half)) {
                    v.0.write_be(chunk);
                    v.1.write_be(&mut chunk[half..]);
                }
                Some(Ok(()))
            }
        }
    )*};
}

complex_field!(f32 => ComplexFloat, f64 => ComplexDouble);

fn bit(cell: &[u8], i: usize) -> bool {
    cell[i / 8] & (0x80 >> (i % 8)) != 0
}

impl BinaryField for bool {
    const NAME: &'static str = "bool";

    fn decode_binary(cell: &[u8], format: &BinaryFormat) -> Option<Self> {
        if format.repeat != 1 {
            return None;
        }
        match format.kind {
            BinaryType::Logical => Some(cell[0] == b'T'),
            BinaryType::Bit => Some(bit(cell, 0)),
            _ => None,
        }
    }

    fn encode_binary(&self, format: &BinaryFormat, cell: &mut [u8]) -> Option<Result<()>> {
        alloc::vec![*self].encode_binary(format, cell)
    }
}

impl BinaryField for Vec<bool> {
    const NAME: &'static str = "Vec<bool>";

    fn decode_binary(cell: &[u8], format: &BinaryFormat) -> Option<Self> {
        match format.kind {
            BinaryType::Logical => Some(cell.iter().map(|&b| b == b'T').collect()),
            BinaryType::Bit => Some((0..format.repeat).map(|i| bit(cell, i)).collect()),
            _ => None,
        }
    }

    fn encode_binary(&self, format: &BinaryFormat, cell: &mut [u8]) -> Option<Result<()>> {
        if !matches!(format.kind, BinaryType::Logical | BinaryType::Bit) {
            return None;
        }
        if self.len() != format.repeat {
            return Some(Err(length_mismatch(format.repeat, self.len())));
        }
        if format.kind == BinaryType::Logical {
            for (b, out) in self.iter().zip(cell.iter_mut()) {
                *out = if *b { b'T' } else { b'F' };
            }
        } else {
            cell.fill(0);
            for (i, _) in self.iter().enumerate().filter(|(_, b)| **b) {
                cell[i / 8] |= 0x80 >> (i % 8);
            }
        }
        Some(Ok(()))
    }
}

impl BinaryField for String {
    const NAME: &'static str = "String";

    /// Text up to the first NUL, trailing blanks removed.
    fn decode_binary(cell: &[u8], format: &BinaryFormat) -> Option<Self> {
        if format.kind != BinaryType::Char {
            return None;
        }
        let end = cell.iter().position(|&b| b == 0).unwrap_or(cell.len());
        let text = String::from_utf8_lossy(&cell[..end]);
        Some(text.trim_end().to_string())
    }

    fn encode_binary(&self, format: &BinaryFormat, cell: &mut [u8]) -> Option<Result<()>> {
        if format.kind != BinaryType::Char {
            return None;
        }
        Some(write_text(self, cell, false))
    }
}

/// Location of a variable-length array in the table heap. The heap itself is
/// carried opaquely; descriptors are never followed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrayDescriptor {
    /// Number of elements.
    pub length: u64,
    /// Byte offset from the start of the heap.
    pub offset: u64,
}

impl BinaryField for ArrayDescriptor {
    const NAME: &'static str = "ArrayDescriptor";

    fn decode_binary(cell: &[u8], format: &BinaryFormat) -> Option<Self> {
        if format.repeat != 1 {
            return None;
        }
        match format.kind {
            BinaryType::Descriptor => Some(ArrayDescriptor {
                length: u32::read_be(cell).into(),
                offset: u32::read_be(&cell[4..]).into(),
            }),
            BinaryType::LongDescriptor => Some(ArrayDescriptor {
                length: u64::read_be(cell),
                offset: u64::read_be(&cell[8..]),
            }),
            _ => None,
        }
    }

    fn encode_binary(&self, format: &BinaryFormat, cell: &mut [u8]) -> Option<Result<()>> {
        let is_descriptor = matches!(
            format.kind,
            BinaryType::Descriptor | BinaryType::LongDescriptor
        );
        if is_descriptor && format.repeat != 1 {
            return Some(Err(length_mismatch(format.repeat, 1)));
        }
        match format.kind {
            BinaryType::Descriptor => {
                let narrow = |n: u64| {
                    u32::try_from(n).map_err(|_| Error::cast(n.to_string(), "32-bit descriptor"))
                };
                let (length, offset) = match (narrow(self.length), narrow(self.offset)) {
                    (Ok(l), Ok(o)) => (l, o),
                    (Err(e), _) | (_, Err(e)) => return Some(Err(e)),
                };
                length.write_be(cell);
                offset.write_be(&mut cell[4..]);
            }
            BinaryType::LongDescriptor => {
                self.length.write_be(cell);
                self.offset.write_be(&mut cell[8..]);
            }
            _ => return None,
        }
        Some(Ok(()))
    }
}

/// Copy `text` into `cell`, padding with blanks. `right` right-justifies.
fn write_text(text: &str, cell: &mut [u8], right: bool) -> Result<()> {
    if text.len() > cell.len() {
        return Err(Error::cast(text, "a field of this width"));
    }
    cell.fill(b' ');
    let at = if right { cell.len() - text.len() } else { 0 };
    cell[at..at + text.len()].copy_from_slice(text.as_bytes());
    Ok(())
}

// ── ASCII ──

/// Converter for ASCII-table cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiConverter;

/// A value that can live in an ASCII-table cell.
pub trait AsciiField: Sized {
    const NAME: &'static str;

    fn decode_ascii(text: &str, format: &AsciiFormat) -> Result<Self>;

    /// Render for `format`. Returns `None` when the format cannot hold
    /// this type.
    fn encode_ascii(&self, format: &AsciiFormat) -> Option<String>;
}

impl<T: AsciiField> Converter<T> for AsciiConverter {
    fn decode(cell: &[u8], column: &Column) -> Result<T> {
        let ColumnFormat::Ascii(format) = column.format() else {
            return Err(wrong_type(column, T::NAME));
        };
        let text = core::str::from_utf8(cell)
            .map_err(|_| Error::cast(String::from_utf8_lossy(cell), T::NAME))?;
        T::decode_ascii(text.trim(), format)
    }

    fn encode(value: &T, column: &Column, cell: &mut [u8]) -> Result<()> {
        let ColumnFormat::Ascii(format) = column.format() else {
            return Err(wrong_type(column, T::NAME));
        };
        let text = value
            .encode_ascii(format)
            .ok_or_else(|| wrong_type(column, T::NAME))?;
        write_text(&text, cell, format.kind != AsciiType::Char)
    }
}

macro_rules! ascii_int_field {
    ($($t:ty),*) => {$(
        impl AsciiField for $t {
            const NAME: &'static str = stringify!($t);

            /// A blank field reads as zero.
            fn decode_ascii(text: &str, _format: &AsciiFormat) -> Result<Self> {
                if text.is_empty() {
                    return Ok(0);
                }
                text.parse::<$t>().map_err(|_| Error::cast(text, stringify!($t)))
            }

            fn encode_ascii(&self, format: &AsciiFormat) -> Option<String> {
                (format.kind == AsciiType::Integer).then(|| self.to_string())
            }
        }
    )*};
}

ascii_int_field!(i32, i64);

macro_rules! ascii_float_field {
    ($($t:ty),*) => {$(
        impl AsciiField for $t {
            const NAME: &'static str = stringify!($t);

            /// A blank field reads as zero.
            fn decode_ascii(text: &str, _format: &AsciiFormat) -> Result<Self> {
                if text.is_empty() {
                    return Ok(0.0);
                }
                parse_fits_float(text)
                    .map(|f| f as $t)
                    .ok_or_else(|| Error::cast(text, stringify!($t)))
            }

            fn encode_ascii(&self, format: &AsciiFormat) -> Option<String> {
                format.kind.is_float().then(|| format_ascii_float(*self as f64, format))
            }
        }
    )*};
}

ascii_float_field!(f32, f64);

impl AsciiField for String {
    const NAME: &'static str = "String";

    fn decode_ascii(text: &str, _format: &AsciiFormat) -> Result<Self> {
        Ok(text.to_string())
    }

    fn encode_ascii(&self, format: &AsciiFormat) -> Option<String> {
        (format.kind == AsciiType::Char).then(|| self.clone())
    }
}

/// Render `value` for an `F`, `E` or `D` field. Falls back to the shortest
/// round-trip text when the requested precision does not fit.
pub fn format_ascii_float(value: f64, format: &AsciiFormat) -> String {
    let text = match (format.kind, format.decimals) {
        (AsciiType::Fixed, Some(d)) => format!("{:.*}", d, value),
        (AsciiType::Exponential, Some(d)) => fits_exponent(value, d, 'E'),
        (AsciiType::Double, Some(d)) => fits_exponent(value, d, 'D'),
        _ => format_float(value, format.width),
    };
    if text.len() <= format.width {
        text
    } else {
        format_float(value, format.width)
    }
}

/// `1.50E+02` style: mantissa with `decimals` digits, signed two-digit
/// exponent.
fn fits_exponent(value: f64, decimals: usize, marker: char) -> String {
    let raw = format!("{:.*E}", decimals, value);
    let Some((mantissa, exponent)) = raw.split_once('E') else {
        return raw;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(d) => ('-', d),
        None => ('+', exponent),
    };
    format!("{}{}{}{:0>2}", mantissa, marker, sign, digits)
}
