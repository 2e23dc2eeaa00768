//! Allocation of new typed blocks.
//!
//! A [`Factory`] is bound to one open file: its block table, encoding and schema. Every method
//! allocates a zero-filled block sized for the requested type and returns a facade at its base
//! address.
//!
//! # Examples
//!
//! ```rust
//! use cmemview::{BlockTable, Encoding, Factory, ScalarKind, SchemaRegistry, StructDef, TypeChain, Value};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(SchemaRegistry::new());
//! let vec2 = registry.register(
//!     StructDef::new("Vec2")
//!         .field("x", ScalarKind::Float32)
//!         .field("y", ScalarKind::Float32),
//! )?;
//! let factory = Factory::new(BlockTable::new(), Encoding::LE64, registry);
//!
//! let points = factory.new_struct_array_block(vec2, 8)?;
//! points.get(7)?.into_struct()?.write("y", 1.0f32)?;
//!
//! let slot = factory.new_pointer_block(TypeChain::structure(vec2))?;
//! slot.assign(&Value::Pointer(points.as_pointer()))?;
//! assert!(factory.null_pointer().is_null());
//! # Ok::<(), cmemview::Error>(())
//! ```

use crate::{
    facade::{ArrayView, MemoryView, Pointer, StructView},
    memory::{BlockCode, BlockInfo, BlockTable, Encoding, NOT_A_STRUCT},
    schema::{CStruct, SchemaRef, StructId, TypeChain, TypeTag},
    Result,
};

/// Creates typed blocks in one block table.
#[derive(Clone, Debug)]
pub struct Factory {
    root: MemoryView,
    code: BlockCode,
}

impl Factory {
    /// Creates a factory allocating [`BlockCode::DATA`] blocks.
    #[must_use]
    pub fn new(table: BlockTable, encoding: Encoding, schema: SchemaRef) -> Self {
        Factory {
            root: MemoryView::new(0, table, encoding, schema),
            code: BlockCode::DATA,
        }
    }

    /// The same factory, allocating blocks tagged `code`.
    #[must_use]
    pub fn with_code(mut self, code: BlockCode) -> Self {
        self.code = code;
        self
    }

    /// The block table allocations go to.
    #[must_use]
    pub fn table(&self) -> &BlockTable {
        self.root.table()
    }

    /// Encoding of allocated blocks.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.root.encoding()
    }

    /// The canonical null pointer.
    #[must_use]
    pub fn null_pointer(&self) -> Pointer {
        Pointer::new(self.root.clone(), TypeChain::void())
    }

    fn allocate(&self, schema_index: i32, size: u64, count: u32) -> Result<BlockInfo> {
        self.root
            .table()
            .allocate_with_code(self.code, schema_index, size, count)
    }

    /// Allocates one instance of struct `id`.
    ///
    /// # Errors
    ///
    /// Returns schema errors, or [`crate::Error::AddressSpaceExhausted`].
    pub fn new_struct_block(&self, id: StructId) -> Result<StructView> {
        let size = self.root.size_of(&TypeChain::structure(id))?;
        let block = self.allocate(id.schema_index(), size, 1)?;
        Ok(StructView::new(self.root.at(block.old_address), id))
    }

    /// Allocates one instance of a generated struct type, which must be registered in the
    /// factory's schema.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownStruct`] if `T` is not registered.
    pub fn new_struct<T: CStruct>(&self) -> Result<T> {
        let id = self.root.provider().struct_id(T::NAME)?;
        self.new_struct_block(id).map(T::from_view)
    }

    /// Allocates `count` consecutive instances of struct `id`.
    ///
    /// # Errors
    ///
    /// Returns schema errors, or [`crate::Error::AddressSpaceExhausted`].
    pub fn new_struct_array_block(&self, id: StructId, count: u32) -> Result<ArrayView> {
        let ty = TypeChain::array_of(count, &TypeChain::structure(id));
        let size = self.root.size_of(&ty)?;
        let block = self.allocate(id.schema_index(), size, count)?;
        ArrayView::new(self.root.at(block.old_address), ty)
    }

    /// Allocates an array of type `ty`, which must start with an array dimension.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `ty` is not an array type, and the errors of
    /// [`Factory::new_struct_block`].
    pub fn new_array_block(&self, ty: TypeChain) -> Result<ArrayView> {
        let TypeTag::Array(len) = ty.head() else {
            return Err(malformed_error!("{} is not an array type", ty));
        };
        let schema_index = match ty.innermost() {
            TypeTag::Struct(id) if ty.tags().iter().all(|t| !matches!(t, TypeTag::Pointer)) => {
                id.schema_index()
            }
            _ => NOT_A_STRUCT,
        };

        let size = self.root.size_of(&ty)?;
        let block = self.allocate(schema_index, size, len)?;
        ArrayView::new(self.root.at(block.old_address), ty)
    }

    /// Allocates one pointer slot for a pointer to `target` and returns a pointer to that slot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AddressSpaceExhausted`].
    pub fn new_pointer_block(&self, target: TypeChain) -> Result<Pointer> {
        let block = self.allocate(NOT_A_STRUCT, self.encoding().pointer_size(), 1)?;
        Ok(Pointer::new(
            self.root.at(block.old_address),
            TypeChain::pointer_to(&target),
        ))
    }

    /// Allocates `count` pointer slots for pointers to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AddressSpaceExhausted`].
    pub fn new_pointer_array_block(&self, target: TypeChain, count: u32) -> Result<ArrayView> {
        self.new_array_block(TypeChain::array_of(count, &TypeChain::pointer_to(&target)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        facade::Value,
        schema::{ScalarKind, SchemaProvider},
        test::{sample_registry, Link},
        Error,
    };

    fn factory(encoding: Encoding) -> Factory {
        Factory::new(BlockTable::new(), encoding, Arc::new(sample_registry()))
    }

    #[test]
    fn struct_blocks_carry_schema_index() {
        let f = factory(Encoding::LE32);
        let id = f.root.provider().struct_id("Vec3").unwrap();
        let s = f.new_struct_block(id).unwrap();

        let (info, offset) = f.table().resolve(s.address()).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(info.schema_index, id.schema_index());
        assert_eq!(info.size, 12);
        assert_eq!(info.count, 1);
        assert_eq!(info.code, BlockCode::DATA);
    }

    #[test]
    fn struct_array_blocks() {
        let f = factory(Encoding::BE64).with_code(BlockCode::from_str_padded("OB"));
        let id = f.root.provider().struct_id("Vec3").unwrap();
        let array = f.new_struct_array_block(id, 4).unwrap();

        let info = f.table().resolve(array.address()).unwrap().0;
        assert_eq!((info.size, info.count), (48, 4));
        assert_eq!(f.table().find_by_code(BlockCode::from_str_padded("OB")).len(), 1);
    }

    #[test]
    fn array_blocks() {
        let f = factory(Encoding::LE64);
        let int = TypeChain::scalar(ScalarKind::Int32);
        let array = f.new_array_block(TypeChain::array_of(2, &int)).unwrap();
        assert_eq!(f.table().resolve(array.address()).unwrap().0.schema_index, NOT_A_STRUCT);

        assert!(matches!(f.new_array_block(int), Err(Error::Malformed { .. })));
    }

    #[test]
    fn pointer_blocks() {
        for encoding in Encoding::all() {
            let f = factory(encoding);
            let int = TypeChain::scalar(ScalarKind::Int32);
            let target = f.new_array_block(TypeChain::array_of(1, &int)).unwrap();
            target.set(0, &Value::Int32(11)).unwrap();

            let slot = f.new_pointer_block(int.clone()).unwrap();
            assert!(slot.dereference().unwrap().into_pointer().unwrap().is_null());
            slot.assign(&Value::Pointer(target.as_pointer())).unwrap();
            let inner = slot.dereference().unwrap().into_pointer().unwrap();
            assert_eq!(inner.dereference().unwrap(), Value::Int32(11));

            let slots = f.new_pointer_array_block(int, 3).unwrap();
            assert_eq!(slots.size(), 3 * encoding.pointer_size());
        }
    }

    #[test]
    fn generated_types() {
        let registry = Arc::new(crate::SchemaRegistry::new());
        registry.register_type::<Link>().unwrap();
        let f = Factory::new(BlockTable::new(), Encoding::LE64, registry);

        let link: Link = f.new_struct().unwrap();
        link.set_value(9).unwrap();
        assert_eq!(link.value().unwrap(), 9);
        assert!(link.next().unwrap().is_null());
    }
}
