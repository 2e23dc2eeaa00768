//! Typed facades over the emulated address space.
//!
//! Facades are value objects: an address, a shared handle to the [`crate::BlockTable`], the
//! [`crate::Encoding`] of the file and a type. Copying a facade never copies block bytes.
//!
//! # Key Components
//!
//! - [`MemoryView`] - Untyped base: scalar read/write at absolute addresses, byte copies and
//!   field-reinterpreting copies
//! - [`Pointer`] - C pointer with arithmetic, casts and dereference
//! - [`ArrayView`] / [`ArrayIter`] - Fixed-size, possibly multidimensional arrays
//! - [`StructView`] - One instance of a schema-described struct
//! - [`Value`] - Result of dereferencing, indexing and field reads
//!
//! # Identity
//!
//! All facades compare and hash by [`Location`] only. A pointer, an array iterator and a struct
//! view bound to the same address are equal, whatever their type.

mod array;
mod copy;
mod pointer;
mod structure;
mod value;
mod view;

pub use array::{ArrayIter, ArrayView};
pub use pointer::Pointer;
pub use structure::StructView;
pub use value::{Location, Scalar, Value};
pub use view::MemoryView;
