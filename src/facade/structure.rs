use std::sync::Arc;

use crate::{
    facade::{
        pointer::check_long, view::checked_offset, ArrayView, Location, MemoryView, Pointer,
        Scalar, Value,
    },
    schema::{StructId, TypeChain},
    Error, Result,
};

/// One instance of a schema-described struct.
///
/// Field layout comes from the view's schema provider under the view's encoding; the view itself
/// caches nothing. Generated accessor types (see [`crate::CStruct`]) wrap a `StructView` and
/// bottom out in its field accessors.
///
/// # Examples
///
/// ```rust
/// use cmemview::{BlockTable, Encoding, MemoryView, ScalarKind, SchemaProvider, SchemaRegistry, StructDef, StructView, Value};
/// use std::sync::Arc;
///
/// let registry = Arc::new(SchemaRegistry::new());
/// let id = registry.register(
///     StructDef::new("Material")
///         .field("flag", ScalarKind::Int16)
///         .field("alpha", ScalarKind::Float32),
/// )?;
///
/// let table = BlockTable::new();
/// let block = table.allocate(id.schema_index(), registry.struct_size(id, Encoding::LE64)?, 1)?;
/// let material = StructView::new(MemoryView::new(block.old_address, table, Encoding::LE64, registry), id);
///
/// material.write("alpha", 0.5f32)?;
/// material.set("flag", &Value::Int16(3))?;
/// assert_eq!(material.get("alpha")?, Value::Float32(0.5));
/// assert_eq!(material.read::<i16>("flag")?, 3);
/// # Ok::<(), cmemview::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct StructView {
    view: MemoryView,
    id: StructId,
}

impl StructView {
    /// Creates a view of struct `id` at `view`'s address.
    #[must_use]
    pub fn new(view: MemoryView, id: StructId) -> Self {
        StructView { view, id }
    }

    /// Struct type of the instance.
    #[must_use]
    pub fn id(&self) -> StructId {
        self.id
    }

    /// Address of the instance.
    #[must_use]
    pub fn address(&self) -> u64 {
        self.view.address()
    }

    /// Location of the instance, used for equality and hashing.
    #[must_use]
    pub fn location(&self) -> Location {
        self.view.location()
    }

    /// The underlying view.
    #[must_use]
    pub fn view(&self) -> &MemoryView {
        &self.view
    }

    /// Struct name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStruct`] if the schema does not know the id.
    pub fn name(&self) -> Result<Arc<str>> {
        self.view.provider().struct_name(self.id)
    }

    /// Size of the struct under the view's encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStruct`] if the schema does not know the id.
    pub fn size(&self) -> Result<u64> {
        self.view.provider().struct_size(self.id, self.view.encoding())
    }

    /// Absolute address and type of `field`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStruct`] or [`Error::UnknownField`], and [`Error::OutOfBounds`]
    /// if the field would lie past the end of the address space.
    pub fn field(&self, field: &str) -> Result<(u64, TypeChain)> {
        let schema = self.view.provider();
        let offset = schema.field_offset(self.id, field, self.view.encoding())?;
        let ty = schema.field_type(self.id, field)?;
        Ok((checked_offset(self.address(), offset)?, ty))
    }

    /// Reads `field`. Scalars and pointers are detached; structs and arrays are views.
    ///
    /// # Errors
    ///
    /// Returns schema errors and the errors of [`MemoryView::load`].
    pub fn get(&self, field: &str) -> Result<Value> {
        let (address, ty) = self.field(field)?;
        self.view.load(address, &ty)
    }

    /// Writes `field`.
    ///
    /// # Errors
    ///
    /// Returns schema errors and the errors of [`MemoryView::store`].
    pub fn set(&self, field: &str, value: &Value) -> Result<()> {
        let (address, ty) = self.field(field)?;
        self.view.store(address, &ty, value)
    }

    fn scalar_field<T: Scalar>(&self, field: &str) -> Result<u64> {
        let (address, ty) = self.field(field)?;
        if ty.as_scalar() != Some(T::KIND) {
            return Err(Error::TypeMismatch {
                expected: T::KIND.to_string(),
                found: ty.to_string(),
            });
        }
        Ok(address)
    }

    /// Reads a scalar field of exactly `T`'s kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the field has another type.
    pub fn read<T: Scalar>(&self, field: &str) -> Result<T> {
        let address = self.scalar_field::<T>(field)?;
        self.view.read(address)
    }

    /// Writes a scalar field of exactly `T`'s kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the field has another type.
    pub fn write<T: Scalar>(&self, field: &str, value: T) -> Result<()> {
        let address = self.scalar_field::<T>(field)?;
        self.view.write(address, value)
    }

    /// Reads a pointer-width integer field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the field is not `long`.
    pub fn get_long(&self, field: &str) -> Result<i64> {
        let (address, ty) = self.field(field)?;
        check_long(&ty)?;
        self.view.read_long(address)
    }

    /// Writes a pointer-width integer field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the field is not `long`, and
    /// [`Error::ValueOverflow`] if the value does not fit a 32-bit encoding.
    pub fn set_long(&self, field: &str, value: i64) -> Result<()> {
        let (address, ty) = self.field(field)?;
        check_long(&ty)?;
        self.view.write_long(address, value)
    }

    /// Reads a pointer field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the field is not a pointer.
    pub fn pointer(&self, field: &str) -> Result<Pointer> {
        self.get(field)?.into_pointer()
    }

    /// View of an array field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the field is not an array.
    pub fn array(&self, field: &str) -> Result<ArrayView> {
        self.get(field)?.into_array()
    }

    /// View of an embedded struct field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the field is not a struct.
    pub fn structure(&self, field: &str) -> Result<StructView> {
        self.get(field)?.into_struct()
    }

    /// Pointer to this instance (`&s`).
    #[must_use]
    pub fn address_of(&self) -> Pointer {
        Pointer::new(self.view.clone(), TypeChain::structure(self.id))
    }
}

location_eq!(StructView => StructView, Pointer, ArrayView, crate::ArrayIter);

impl Eq for StructView {}

impl std::hash::Hash for StructView {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.location().hash(state);
    }
}
