//! Big-endian element conversion for FITS data.
//!
//! FITS stores every binary number most-significant byte first. Floats are
//! moved through their integer bit patterns so that NaN payloads survive a
//! read/write cycle unchanged.

use alloc::vec::Vec;

use bytemuck::{pod_collect_to_vec, Pod};

/// A fixed-size numeric element with a big-endian on-disk form.
pub trait BigEndian: Pod + Copy {
    /// Bytes per element.
    const SIZE: usize;

    /// Decode from the first `SIZE` bytes of `buf`.
    fn read_be(buf: &[u8]) -> Self;

    /// Encode into the first `SIZE` bytes of `buf`.
    fn write_be(self, buf: &mut [u8]);

    /// Convert a native-order value loaded from big-endian bytes.
    fn from_be_order(self) -> Self;
}

macro_rules! int_big_endian {
    ($($t:ty),*) => {$(
        impl BigEndian for $t {
            const SIZE: usize = core::mem::size_of::<$t>();

            #[inline]
            fn read_be(buf: &[u8]) -> Self {
                let mut bytes = [0u8; core::mem::size_of::<$t>()];
                bytes.copy_from_slice(&buf[..Self::SIZE]);
                <$t>::from_be_bytes(bytes)
            }

            #[inline]
            fn write_be(self, buf: &mut [u8]) {
                buf[..Self::SIZE].copy_from_slice(&self.to_be_bytes());
            }

            #[inline]
            fn from_be_order(self) -> Self {
                <$t>::from_be(self)
            }
        }
    )*};
}

int_big_endian!(u8, i16, u16, i32, u32, i64, u64);

macro_rules! float_big_endian {
    ($($t:ty => $bits:ty),*) => {$(
        impl BigEndian for $t {
            const SIZE: usize = core::mem::size_of::<$t>();

            #[inline]
            fn read_be(buf: &[u8]) -> Self {
                <$t>::from_bits(<$bits>::read_be(buf))
            }

            #[inline]
            fn write_be(self, buf: &mut [u8]) {
                self.to_bits().write_be(buf)
            }

            #[inline]
            fn from_be_order(self) -> Self {
                <$t>::from_bits(<$bits>::from_be(self.to_bits()))
            }
        }
    )*};
}

float_big_endian!(f32 => u32, f64 => u64);

/// Decode a big-endian byte run into native elements. Trailing bytes that do
/// not fill a whole element are ignored.
pub fn decode_slice<T: BigEndian>(bytes: &[u8]) -> Vec<T> {
    let whole = bytes.len() - bytes.len() % T::SIZE;
    let mut out: Vec<T> = pod_collect_to_vec(&bytes[..whole]);
    if cfg!(target_endian = "little") {
        for v in &mut out {
            *v = v.from_be_order();
        }
    }
    out
}

/// Append the big-endian encoding of `values` to `out`.
pub fn encode_slice<T: BigEndian>(values: &[T], out: &mut Vec<u8>) {
    let start = out.len();
    out.resize(start + values.len() * T::SIZE, 0);
    for (v, chunk) in values.iter().zip(out[start..].chunks_exact_mut(T::SIZE)) {
        v.write_be(chunk);
    }
}
