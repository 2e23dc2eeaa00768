//! The emulated address space and its byte-level codec.
//!
//! # Key Components
//!
//! - [`Encoding`] - Pointer width and byte order of the writing process
//! - [`BlockInfo`] - Header of a block: old address, size, element count, schema index
//! - [`BlockTable`] - Ordered, shared collection of blocks resolving saved addresses
//! - [`io`] - Byte-order aware scalar codec used by every read and write

pub(crate) mod block;
pub(crate) mod encoding;
pub mod io;
pub(crate) mod table;

pub use block::{BlockCode, BlockInfo, NOT_A_STRUCT};
pub use encoding::{ByteOrder, Encoding, PointerWidth};
pub use table::{BlockTable, TableConfig};
