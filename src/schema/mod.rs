//! Struct schemas: names, fields and layouts of the struct types stored in a file.
//!
//! Saved files describe their own struct types. The core of this crate never parses that
//! description; it consumes it through the [`SchemaProvider`] trait, which answers size and
//! offset queries per [`Encoding`]. [`SchemaRegistry`] is the in-crate implementation, fed by
//! explicit registration: a schema loader (or generated accessor types via [`CStruct`]) declares
//! every struct once at startup.
//!
//! # Key Components
//!
//! - [`SchemaProvider`] - Size, offset and field queries keyed by [`StructId`] and [`Encoding`]
//! - [`SchemaRegistry`] - Registration-based provider with per-encoding layout memoization
//! - [`TypeChain`] / [`TypeTag`] - Runtime descriptors of emulated C types
//! - [`CStruct`] - Static registration hook for generated struct types

mod registry;
mod types;

pub use registry::{CStruct, SchemaRegistry, StructDef};
pub use types::{ScalarKind, StructId, TypeChain, TypeTag};

use std::sync::Arc;

use crate::{memory::encoding::Encoding, Error, Result};

/// A named, typed field of a struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name as stored in the schema
    pub name: String,
    /// Full type of the field
    pub ty: TypeChain,
}

impl FieldDef {
    /// Creates a new field definition.
    pub fn new(name: impl Into<String>, ty: impl Into<TypeChain>) -> Self {
        FieldDef {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Shared handle to a schema provider, as held by every facade.
pub type SchemaRef = Arc<dyn SchemaProvider>;

/// Source of struct field offsets and sizes keyed by struct identifier and [`Encoding`].
///
/// Implementations are expected to memoize per-encoding layouts: the same struct is queried over
/// and over while traversing linked data, and the facades never cache anything themselves.
pub trait SchemaProvider: Send + Sync {
    /// Looks up a struct by name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownStruct`] if no struct has that name.
    fn struct_id(&self, name: &str) -> Result<StructId>;

    /// Name of a struct.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownStruct`] for unknown ids.
    fn struct_name(&self, id: StructId) -> Result<Arc<str>>;

    /// Fields of a struct in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownStruct`] for unknown or not yet defined ids.
    fn struct_fields(&self, id: StructId) -> Result<Arc<[FieldDef]>>;

    /// Total size of a struct under `encoding`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownStruct`] for unknown ids.
    fn struct_size(&self, id: StructId, encoding: Encoding) -> Result<u64>;

    /// Byte offset of `field` inside the struct under `encoding`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownStruct`] or [`crate::Error::UnknownField`].
    fn field_offset(&self, id: StructId, field: &str, encoding: Encoding) -> Result<u64>;

    /// Type of `field`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownStruct`] or [`crate::Error::UnknownField`].
    fn field_type(&self, id: StructId, field: &str) -> Result<TypeChain> {
        let fields = self.struct_fields(id)?;
        match fields.iter().find(|f| f.name == field) {
            Some(def) => Ok(def.ty.clone()),
            None => Err(Error::UnknownField {
                structure: self.struct_name(id)?.to_string(),
                field: field.to_string(),
            }),
        }
    }
}
