//! # cmemview Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the cmemview library. Import it to get quick access to the address space, the facades
//! and the schema types.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cmemview operations
pub use crate::Error;

/// The result type used throughout cmemview
pub use crate::Result;

// ================================================================================================
// Address Space
// ================================================================================================

/// The emulated address space and its configuration
pub use crate::{BlockTable, TableConfig};

/// Block headers and identifiers
pub use crate::{BlockCode, BlockInfo, NOT_A_STRUCT};

/// Pointer width and byte order of a file
pub use crate::{ByteOrder, Encoding, PointerWidth};

// ================================================================================================
// Facades
// ================================================================================================

/// Typed views over block memory
pub use crate::{ArrayIter, ArrayView, MemoryView, Pointer, StructView};

/// Values read through facades, and facade identity
pub use crate::{Location, Scalar, Value};

/// Allocation of new typed blocks
pub use crate::Factory;

// ================================================================================================
// Schema
// ================================================================================================

/// Runtime type descriptors
pub use crate::{ScalarKind, StructId, TypeChain, TypeTag};

/// Struct layouts and their registration
pub use crate::{CStruct, FieldDef, SchemaProvider, SchemaRef, SchemaRegistry, StructDef};
