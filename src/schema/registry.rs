//! Registration-based [`SchemaProvider`].
//!
//! Struct types are declared by name, receiving a [`StructId`], and defined with their fields.
//! Splitting the two steps lets self-referential and mutually-referential structs (linked lists,
//! parent pointers) name each other's ids before either is defined.
//!
//! # Layout
//!
//! Layouts are packed: fields follow each other in declaration order without implicit padding,
//! which is how self-describing save-file schemas store structs (any padding the writing
//! compiler inserted is part of the schema as explicit filler fields). Sizes and offsets are
//! computed lazily per [`Encoding`] and memoized, since pointer-valued fields change size with
//! the pointer width.
//!
//! # Example
//!
//! ```rust
//! use cmemview::{Encoding, FieldDef, ScalarKind, SchemaProvider, SchemaRegistry, StructDef, TypeChain};
//!
//! let registry = SchemaRegistry::new();
//! let link = registry.declare("Link");
//! let link_ptr = TypeChain::pointer_to(&TypeChain::structure(link));
//! registry.define(link, vec![
//!     FieldDef::new("next", link_ptr.clone()),
//!     FieldDef::new("prev", link_ptr),
//!     FieldDef::new("value", ScalarKind::Int32),
//! ])?;
//!
//! assert_eq!(registry.struct_size(link, Encoding::LE32)?, 12);
//! assert_eq!(registry.struct_size(link, Encoding::LE64)?, 20);
//! assert_eq!(registry.field_offset(link, "value", Encoding::BE64)?, 16);
//!
//! let vec3 = registry.register(
//!     StructDef::new("Vec3")
//!         .field("x", ScalarKind::Float32)
//!         .field("y", ScalarKind::Float32)
//!         .field("z", ScalarKind::Float32),
//! )?;
//! assert_eq!(registry.struct_id("Vec3")?, vec3);
//! # Ok::<(), cmemview::Error>(())
//! ```

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    facade::StructView,
    memory::encoding::Encoding,
    schema::{FieldDef, SchemaProvider, StructId, TypeChain, TypeTag},
    Error, Result,
};

/// Nesting depth at which struct-by-value recursion is reported as malformed.
const MAX_NESTING: usize = 64;

/// A struct definition ready for [`SchemaRegistry::register`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDef {
    /// Struct name
    pub name: String,
    /// Fields in declaration order
    pub fields: Vec<FieldDef>,
}

impl StructDef {
    /// Starts a definition without fields.
    pub fn new(name: impl Into<String>) -> Self {
        StructDef {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: impl Into<TypeChain>) -> Self {
        self.fields.push(FieldDef::new(name, ty));
        self
    }
}

/// Hook for generated struct accessor types.
///
/// Each generated type knows its schema name and field list and registers itself explicitly
/// through [`SchemaRegistry::register_type`], instead of the registry discovering types by
/// introspection. Its accessors then bottom out in the wrapped [`StructView`].
pub trait CStruct: Sized {
    /// Struct name in the schema.
    const NAME: &'static str;

    /// Field list of the struct. May register other types on `registry`. A self-referential
    /// struct must only [`SchemaRegistry::declare`] `Self::NAME`; registering `Self` from here
    /// never terminates.
    ///
    /// # Errors
    ///
    /// Propagates registration errors of referenced types.
    fn fields(registry: &SchemaRegistry) -> Result<Vec<FieldDef>>;

    /// Wraps a view of an instance.
    fn from_view(view: StructView) -> Self;

    /// The wrapped view.
    fn view(&self) -> &StructView;
}

#[derive(Debug)]
struct Definition {
    fields: Arc<[FieldDef]>,
    index: HashMap<String, usize>,
}

#[derive(Debug)]
struct StructEntry {
    name: Arc<str>,
    definition: OnceLock<Definition>,
}

#[derive(Debug)]
struct StructLayout {
    size: u64,
    offsets: Vec<u64>,
}

/// Registration-based schema provider with per-encoding layout memoization.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    structs: boxcar::Vec<StructEntry>,
    names: DashMap<Arc<str>, StructId>,
    layouts: DashMap<(StructId, Encoding), Arc<StructLayout>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of declared structs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.structs.count()
    }

    /// Returns `true` if nothing has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declares a struct name and returns its id. Declaring a known name returns the existing id.
    pub fn declare(&self, name: &str) -> StructId {
        match self.names.entry(Arc::from(name)) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let index = self.structs.push(StructEntry {
                    name: Arc::from(name),
                    definition: OnceLock::new(),
                });
                // Schema indices are stored as i32 in block headers
                #[allow(clippy::cast_possible_truncation)]
                let id = StructId(index as u32);
                *entry.insert(id)
            }
        }
    }

    /// Sets the fields of a declared struct.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownStruct`] for undeclared ids and [`crate::Error::Malformed`]
    /// for duplicate field names or a second definition of the same struct.
    pub fn define(&self, id: StructId, fields: Vec<FieldDef>) -> Result<()> {
        let entry = self.entry(id)?;

        let mut index = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            if index.insert(field.name.clone(), position).is_some() {
                return Err(malformed_error!(
                    "Duplicate field {}.{}",
                    entry.name,
                    field.name
                ));
            }
        }

        entry
            .definition
            .set(Definition {
                fields: fields.into(),
                index,
            })
            .map_err(|_| malformed_error!("Struct {} is already defined", entry.name))
    }

    /// Declares and defines a struct in one step.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a struct of that name is already defined.
    pub fn register(&self, def: StructDef) -> Result<StructId> {
        let id = self.declare(&def.name);
        self.define(id, def.fields)?;
        Ok(id)
    }

    /// Registers a generated struct type, once. Later calls return the same id.
    ///
    /// # Errors
    ///
    /// Propagates errors of [`CStruct::fields`] and [`SchemaRegistry::define`].
    pub fn register_type<T: CStruct>(&self) -> Result<StructId> {
        let id = self.declare(T::NAME);
        if self.entry(id)?.definition.get().is_some() {
            return Ok(id);
        }

        let fields = T::fields(self)?;
        match self.define(id, fields) {
            Ok(()) => Ok(id),
            Err(error) => {
                // Defined concurrently or by a recursive registration of the same type
                if self.entry(id)?.definition.get().is_some() {
                    Ok(id)
                } else {
                    Err(error)
                }
            }
        }
    }

    fn entry(&self, id: StructId) -> Result<&StructEntry> {
        self.structs
            .get(id.0 as usize)
            .ok_or_else(|| Error::UnknownStruct(id.to_string()))
    }

    fn definition(&self, id: StructId) -> Result<&Definition> {
        let entry = self.entry(id)?;
        entry
            .definition
            .get()
            .ok_or_else(|| Error::UnknownStruct(entry.name.to_string()))
    }

    fn layout(&self, id: StructId, encoding: Encoding, depth: usize) -> Result<Arc<StructLayout>> {
        if let Some(layout) = self.layouts.get(&(id, encoding)) {
            return Ok(layout.value().clone());
        }
        if depth > MAX_NESTING {
            return Err(malformed_error!(
                "Struct {} nests deeper than {} levels",
                self.entry(id)?.name,
                MAX_NESTING
            ));
        }

        let definition = self.definition(id)?;
        let mut offsets = Vec::with_capacity(definition.fields.len());
        let mut size = 0u64;
        for field in definition.fields.iter() {
            offsets.push(size);
            let field_size = self.size_of(&field.ty, encoding, depth + 1)?;
            size = size.checked_add(field_size).ok_or(Error::ValueOverflow {
                value: i128::from(size) + i128::from(field_size),
                width: 8,
            })?;
        }

        let layout = Arc::new(StructLayout { size, offsets });
        Ok(self
            .layouts
            .entry((id, encoding))
            .or_insert(layout)
            .value()
            .clone())
    }

    fn size_of(&self, ty: &TypeChain, encoding: Encoding, depth: usize) -> Result<u64> {
        match ty.head() {
            TypeTag::Struct(id) => Ok(self.layout(id, encoding, depth)?.size),
            TypeTag::Array(len) => {
                let element = self.size_of(&ty.tail(), encoding, depth)?;
                element.checked_mul(u64::from(len)).ok_or(Error::ValueOverflow {
                    value: i128::from(element) * i128::from(len),
                    width: 8,
                })
            }
            _ => ty.size_of(encoding, self),
        }
    }
}

impl SchemaProvider for SchemaRegistry {
    fn struct_id(&self, name: &str) -> Result<StructId> {
        self.names
            .get(name)
            .map(|entry| *entry.value())
            .ok_or_else(|| Error::UnknownStruct(name.to_string()))
    }

    fn struct_name(&self, id: StructId) -> Result<Arc<str>> {
        Ok(self.entry(id)?.name.clone())
    }

    fn struct_fields(&self, id: StructId) -> Result<Arc<[FieldDef]>> {
        Ok(self.definition(id)?.fields.clone())
    }

    fn struct_size(&self, id: StructId, encoding: Encoding) -> Result<u64> {
        Ok(self.layout(id, encoding, 0)?.size)
    }

    fn field_offset(&self, id: StructId, field: &str, encoding: Encoding) -> Result<u64> {
        let definition = self.definition(id)?;
        let Some(&position) = definition.index.get(field) else {
            return Err(Error::UnknownField {
                structure: self.entry(id)?.name.to_string(),
                field: field.to_string(),
            });
        };
        Ok(self.layout(id, encoding, 0)?.offsets[position])
    }

    fn field_type(&self, id: StructId, field: &str) -> Result<TypeChain> {
        let definition = self.definition(id)?;
        match definition.index.get(field) {
            Some(&position) => Ok(definition.fields[position].ty.clone()),
            None => Err(Error::UnknownField {
                structure: self.entry(id)?.name.to_string(),
                field: field.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarKind;

    #[test]
    fn declare_is_idempotent() {
        let registry = SchemaRegistry::new();
        let a = registry.declare("Scene");
        let b = registry.declare("Scene");
        let c = registry.declare("Object");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.len(), 2);
        assert_eq!(&*registry.struct_name(c).unwrap(), "Object");
    }

    #[test]
    fn undefined_struct_is_unknown() {
        let registry = SchemaRegistry::new();
        let id = registry.declare("Forward");

        assert!(matches!(
            registry.struct_size(id, Encoding::LE64),
            Err(Error::UnknownStruct(name)) if name == "Forward"
        ));
        assert!(matches!(
            registry.struct_size(StructId(99), Encoding::LE64),
            Err(Error::UnknownStruct(_))
        ));
        assert!(matches!(
            registry.struct_id("Missing"),
            Err(Error::UnknownStruct(_))
        ));
    }

    #[test]
    fn nested_layouts_follow_pointer_width() {
        let registry = SchemaRegistry::new();
        let list = registry
            .register(
                StructDef::new("ListBase")
                    .field("first", TypeChain::pointer_to(&TypeChain::void()))
                    .field("last", TypeChain::pointer_to(&TypeChain::void())),
            )
            .unwrap();
        let owner = registry
            .register(
                StructDef::new("Owner")
                    .field("flag", ScalarKind::Int16)
                    .field("items", list)
                    .field("totals", TypeChain::array_of(3, &ScalarKind::Float64.into())),
            )
            .unwrap();

        assert_eq!(registry.struct_size(list, Encoding::BE32).unwrap(), 8);
        assert_eq!(registry.struct_size(list, Encoding::LE64).unwrap(), 16);
        assert_eq!(registry.struct_size(owner, Encoding::LE32).unwrap(), 2 + 8 + 24);
        assert_eq!(registry.struct_size(owner, Encoding::LE64).unwrap(), 2 + 16 + 24);
        assert_eq!(registry.field_offset(owner, "totals", Encoding::LE64).unwrap(), 18);
        assert_eq!(registry.field_offset(owner, "items", Encoding::BE32).unwrap(), 2);
    }

    #[test]
    fn unknown_field() {
        let registry = SchemaRegistry::new();
        let id = registry
            .register(StructDef::new("Vec2").field("x", ScalarKind::Float32))
            .unwrap();

        assert!(matches!(
            registry.field_offset(id, "y", Encoding::LE32),
            Err(Error::UnknownField { structure, field }) if structure == "Vec2" && field == "y"
        ));
        assert!(matches!(
            registry.field_type(id, "y"),
            Err(Error::UnknownField { .. })
        ));
        assert_eq!(
            registry.field_type(id, "x").unwrap(),
            TypeChain::scalar(ScalarKind::Float32)
        );
    }

    #[test]
    fn rejects_duplicates() {
        let registry = SchemaRegistry::new();
        let dup = StructDef::new("Dup")
            .field("a", ScalarKind::Int8)
            .field("a", ScalarKind::Int8);
        assert!(matches!(registry.register(dup), Err(Error::Malformed { .. })));

        let once = StructDef::new("Once").field("a", ScalarKind::Int8);
        registry.register(once.clone()).unwrap();
        assert!(matches!(registry.register(once), Err(Error::Malformed { .. })));
    }

    #[test]
    fn recursive_by_value_is_malformed() {
        let registry = SchemaRegistry::new();
        let id = registry.declare("Ouroboros");
        registry
            .define(id, vec![FieldDef::new("inner", id)])
            .unwrap();

        assert!(matches!(
            registry.struct_size(id, Encoding::LE64),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn layouts_are_memoized_per_encoding() {
        let registry = SchemaRegistry::new();
        let id = registry
            .register(StructDef::new("P").field("p", TypeChain::pointer_to(&TypeChain::void())))
            .unwrap();

        registry.struct_size(id, Encoding::LE32).unwrap();
        registry.struct_size(id, Encoding::LE32).unwrap();
        registry.struct_size(id, Encoding::BE64).unwrap();
        assert_eq!(registry.layouts.len(), 2);
    }

    #[test]
    fn self_referential_type_declares_itself() {
        let registry = SchemaRegistry::new();
        let link = registry.register_type::<crate::test::Link>().unwrap();

        assert_eq!(registry.register_type::<crate::test::Link>().unwrap(), link);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.field_type(link, "next").unwrap(),
            TypeChain::pointer_to(&TypeChain::structure(link))
        );
    }
}
