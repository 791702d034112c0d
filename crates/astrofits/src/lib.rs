//! Reader and writer for FITS files: headers, ASCII and binary tables, and
//! image arrays.
//!
//! ```no_run
//! use astrofits::{BinaryTable, Fits, ReadMode};
//!
//! # fn main() -> astrofits::Result<()> {
//! let fits = Fits::open("events.fits", ReadMode::Full)?;
//! let table = fits.hdu("EVENTS")?.as_kind::<BinaryTable>()?;
//! let energy = table.get_column::<f32>("ENERGY")?;
//! energy.set(0, 1.5)?;
//! fits.write_to("events-edited.fits")?;
//! # Ok(())
//! # }
//! ```
//!
//! Without the `std` feature the crate is `no_std` and works on byte
//! buffers through [`Fits::from_bytes`] and [`Fits::to_bytes`].

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod bintable;
pub mod bitpix;
pub mod block;
pub mod card;
pub mod column;
pub mod column_view;
pub mod convert;
pub mod endian;
pub mod error;
pub mod extension;
pub mod fits;
pub mod hdu;
pub mod header;
pub mod image;
pub mod policy;
pub mod primary;
pub mod stream;
pub mod table;
pub mod value;

pub use bintable::BinaryTable;
pub use bitpix::Bitpix;
pub use block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
pub use card::Card;
pub use column::{Column, ColumnDef};
pub use column_view::{CellRef, ColumnView, RowBuffer};
pub use convert::{ArrayDescriptor, AsciiConverter, BinaryConverter, Converter};
pub use error::{Error, Result};
#[cfg(feature = "image-extension")]
pub use extension::ImageExtension;
pub use extension::UnknownHdu;
pub use fits::{ControlBlock, Fits, HduEntry, HduKey, ReadMode};
pub use hdu::{construct_hdu, Hdu, HduKind, HduVariant};
pub use header::{Header, PRIMARY_HDU_NAME};
pub use image::{Image, ImageBuffer, ImageStats, Pixel};
pub use policy::{CardPolicy, StandardCardPolicy};
pub use primary::PrimaryHdu;
pub use table::AsciiTable;
pub use value::{FromValue, Value};
