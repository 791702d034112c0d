//! BITPIX values and the native types they map to.

use alloc::format;
use core::fmt;

use crate::error::{Error, Result};

/// Element encoding named by the BITPIX keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bitpix {
    /// `8`: unsigned bytes.
    U8,
    /// `16`: big-endian `i16`.
    I16,
    /// `32`: big-endian `i32`.
    I32,
    /// `64`: big-endian `i64`.
    I64,
    /// `-32`: IEEE 754 single precision.
    F32,
    /// `-64`: IEEE 754 double precision.
    F64,
}

impl Bitpix {
    pub fn from_value(value: i64) -> Result<Self> {
        match value {
            8 => Ok(Bitpix::U8),
            16 => Ok(Bitpix::I16),
            32 => Ok(Bitpix::I32),
            64 => Ok(Bitpix::I64),
            -32 => Ok(Bitpix::F32),
            -64 => Ok(Bitpix::F64),
            other => Err(Error::FitsFormat(format!("unsupported BITPIX {}", other))),
        }
    }

    /// The keyword value.
    pub fn value(self) -> i64 {
        match self {
            Bitpix::U8 => 8,
            Bitpix::I16 => 16,
            Bitpix::I32 => 32,
            Bitpix::I64 => 64,
            Bitpix::F32 => -32,
            Bitpix::F64 => -64,
        }
    }

    /// Bytes per element.
    pub fn element_size(self) -> usize {
        (self.value().unsigned_abs() / 8) as usize
    }

    pub fn is_float(self) -> bool {
        matches!(self, Bitpix::F32 | Bitpix::F64)
    }
}

impl fmt::Display for Bitpix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_values_round_trip() {
        for v in [8, 16, 32, 64, -32, -64] {
            assert_eq!(Bitpix::from_value(v).unwrap().value(), v);
        }
    }

    #[test]
    fn element_sizes() {
        assert_eq!(Bitpix::U8.element_size(), 1);
        assert_eq!(Bitpix::I16.element_size(), 2);
        assert_eq!(Bitpix::I32.element_size(), 4);
        assert_eq!(Bitpix::I64.element_size(), 8);
        assert_eq!(Bitpix::F32.element_size(), 4);
        assert_eq!(Bitpix::F64.element_size(), 8);
    }

    #[test]
    fn unsupported_values_fail() {
        for v in [0, 12, -8, -16, 128] {
            assert!(matches!(Bitpix::from_value(v), Err(Error::FitsFormat(_))));
        }
    }

    #[test]
    fn float_flag() {
        assert!(Bitpix::F32.is_float());
        assert!(!Bitpix::I16.is_float());
    }
}
