// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # cmemview
//!
//! Typed, C-style access to the memory dumped into self-describing binary save files.
//!
//! Some applications save their state by writing raw struct memory to disk, block by block,
//! together with a description of every struct type and the address each block had in the
//! writing process. Internal references are plain pointers holding those old addresses.
//! `cmemview` turns such a dump back into something navigable: blocks go into an emulated
//! address space, and typed facades (pointers, arrays, structs) read and write through it with
//! C semantics, at runtime, for any pointer width and byte order.
//!
//! ## Features
//!
//! - **Address resolution** - Any saved address resolves to its block and offset in O(log n)
//! - **C pointer semantics** - Arithmetic, multi-level indirection, null checks and casts
//! - **Runtime struct layout** - Sizes and offsets per pointer width and byte order
//! - **Cross-encoding copies** - Structs copied field by field between 32/64-bit and LE/BE files
//! - **Bounds-checked** - Every read and write stays inside the block it starts in
//!
//! ## Quick Start
//!
//! ```rust
//! use cmemview::prelude::*;
//! use std::sync::Arc;
//!
//! // Schema: struct Link { Link *next; Link *prev; int value; };
//! let registry = Arc::new(SchemaRegistry::new());
//! let link = registry.declare("Link");
//! let link_ptr = TypeChain::pointer_to(&TypeChain::structure(link));
//! registry.define(link, vec![
//!     FieldDef::new("next", link_ptr.clone()),
//!     FieldDef::new("prev", link_ptr),
//!     FieldDef::new("value", ScalarKind::Int32),
//! ])?;
//!
//! // Two nodes, the first pointing at the second
//! let factory = Factory::new(BlockTable::new(), Encoding::LE32, registry);
//! let first = factory.new_struct_block(link)?;
//! let second = factory.new_struct_block(link)?;
//! second.write("value", 42i32)?;
//! first.set("next", &Value::Pointer(second.address_of()))?;
//!
//! // Walk the list
//! let mut cursor = first.address_of();
//! let mut values = Vec::new();
//! while !cursor.is_null() {
//!     let node = cursor.dereference()?.into_struct()?;
//!     values.push(node.read::<i32>("value")?);
//!     cursor = node.pointer("next")?;
//! }
//! assert_eq!(values, vec![0, 42]);
//! # Ok::<(), cmemview::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`memory`] - [`Encoding`], blocks and the [`BlockTable`] address space, plus the byte codec
//! - [`schema`] - Type chains, the [`SchemaProvider`] interface and [`SchemaRegistry`]
//! - [`MemoryView`], [`Pointer`], [`ArrayView`], [`StructView`] - The typed facades
//! - [`Factory`] - Allocation of new typed blocks
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Thread Safety
//!
//! All types are `Send + Sync`. The block table resolves addresses without a table-wide lock
//! and every block guards its bytes with its own lock, so facades can be used from several
//! threads. Reads and writes of a single scalar are atomic with respect to each other; anything
//! larger (struct copies, bulk conversions) is not.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

mod facade;
mod factory;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use cmemview::prelude::*;
///
/// let table = BlockTable::new();
/// let block = table.allocate(NOT_A_STRUCT, 4, 1)?;
/// assert!(table.contains(block.old_address));
/// # Ok::<(), cmemview::Error>(())
/// ```
pub mod prelude;

/// The emulated address space: encodings, blocks, the block table and the byte codec.
///
/// Blocks are ingested from a file with [`BlockTable::insert`] or created with
/// [`BlockTable::allocate`]; both keep the table ordered by old address and free of overlaps.
///
/// # Examples
///
/// ```rust
/// use cmemview::memory::{BlockCode, BlockTable};
///
/// let table = BlockTable::new();
/// table.insert(BlockCode::from_str_padded("OB"), 0x7f00_1000, 3, 1, vec![0; 64])?;
///
/// let (block, offset) = table.resolve(0x7f00_1010).unwrap();
/// assert_eq!((block.schema_index, offset), (3, 0x10));
/// # Ok::<(), cmemview::Error>(())
/// ```
pub mod memory;

/// Struct schemas and runtime type descriptors.
pub mod schema;

/// `cmemview` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `cmemview` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use cmemview::{BlockTable, Encoding, Error, Pointer, SchemaRegistry};
/// use std::sync::Arc;
///
/// let null = Pointer::null(BlockTable::new(), Encoding::LE64, Arc::new(SchemaRegistry::new()));
/// match null.dereference() {
///     Err(Error::UnresolvedAddress(address)) => assert_eq!(address, 0),
///     Err(e) => panic!("unexpected error: {e}"),
///     Ok(_) => panic!("null dereferenced"),
/// }
/// ```
pub use error::Error;

pub use facade::{ArrayIter, ArrayView, Location, MemoryView, Pointer, Scalar, StructView, Value};
pub use factory::Factory;
pub use memory::{
    BlockCode, BlockInfo, BlockTable, ByteOrder, Encoding, PointerWidth, TableConfig, NOT_A_STRUCT,
};
pub use schema::{
    CStruct, FieldDef, ScalarKind, SchemaProvider, SchemaRef, SchemaRegistry, StructDef, StructId,
    TypeChain, TypeTag,
};
