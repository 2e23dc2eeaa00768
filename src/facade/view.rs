use std::sync::Arc;

use crate::{
    facade::{copy, ArrayView, Location, Pointer, StructView, Value},
    memory::{
        io::{read_at, read_ptr_at, read_ptr_int_at, write_at, write_ptr_at, write_ptr_int_at, ScalarIO},
        BlockTable, Encoding,
    },
    schema::{ScalarKind, SchemaProvider, SchemaRef, TypeChain, TypeTag},
    Error, Result,
};

/// Typed cursor over a [`BlockTable`]: an address plus everything needed to interpret the bytes
/// there.
///
/// This is the base every facade is built on. It carries no type of its own; reads and writes
/// take the scalar type or [`TypeChain`] explicitly, at an absolute address. Cloning a view
/// clones the handles, never the bytes.
///
/// # Examples
///
/// ```rust
/// use cmemview::{BlockTable, Encoding, MemoryView, SchemaRegistry, NOT_A_STRUCT};
/// use std::sync::Arc;
///
/// let table = BlockTable::new();
/// let block = table.allocate(NOT_A_STRUCT, 8, 1)?;
/// let view = MemoryView::new(block.old_address, table, Encoding::BE32, Arc::new(SchemaRegistry::new()));
///
/// view.write(view.address(), 0x0102_0304u32)?;
/// assert_eq!(view.read::<u8>(view.address())?, 0x01);
/// view.write_long(view.address() + 4, -1)?;
/// assert_eq!(view.read::<i32>(view.address() + 4)?, -1);
/// # Ok::<(), cmemview::Error>(())
/// ```
#[derive(Clone)]
pub struct MemoryView {
    address: u64,
    table: BlockTable,
    encoding: Encoding,
    schema: SchemaRef,
}

impl MemoryView {
    /// Creates a new view.
    ///
    /// # Arguments
    ///
    /// * `address` - Address the view is bound to; it does not need to resolve
    /// * `table` - Address space the view reads from and writes to
    /// * `encoding` - Encoding of the file the table was loaded from
    /// * `schema` - Provider of struct layouts for that file
    #[must_use]
    pub fn new(address: u64, table: BlockTable, encoding: Encoding, schema: SchemaRef) -> Self {
        MemoryView {
            address,
            table,
            encoding,
            schema,
        }
    }

    /// The same table, encoding and schema bound to another address.
    #[must_use]
    pub fn at(&self, address: u64) -> MemoryView {
        MemoryView {
            address,
            table: self.table.clone(),
            encoding: self.encoding,
            schema: self.schema.clone(),
        }
    }

    /// Address the view is bound to.
    #[must_use]
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Location of the view, which is what facade equality compares.
    #[must_use]
    pub fn location(&self) -> Location {
        Location(self.address)
    }

    /// The address space of the view.
    #[must_use]
    pub fn table(&self) -> &BlockTable {
        &self.table
    }

    /// Encoding used to interpret bytes.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Schema provider of the view.
    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Returns `true` if both views interpret bytes through the same schema provider.
    #[must_use]
    pub fn same_schema(&self, other: &MemoryView) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.schema), Arc::as_ptr(&other.schema))
    }

    pub(crate) fn provider(&self) -> &dyn SchemaProvider {
        self.schema.as_ref()
    }

    /// Size of a value of type `ty` under this view's encoding.
    ///
    /// # Errors
    ///
    /// See [`TypeChain::size_of`].
    pub fn size_of(&self, ty: &TypeChain) -> Result<u64> {
        ty.size_of(self.encoding, self.provider())
    }

    /// Reads a fixed-size scalar at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the address does not resolve or the scalar crosses the
    /// end of its block.
    pub fn read<T: ScalarIO>(&self, address: u64) -> Result<T> {
        let order = self.encoding.byte_order();
        self.table.with_bytes(address, T::size() as u64, |bytes| {
            read_at::<T>(bytes, &mut 0, order)
        })?
    }

    /// Writes a fixed-size scalar at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the address does not resolve or the scalar crosses the
    /// end of its block.
    pub fn write<T: ScalarIO>(&self, address: u64, value: T) -> Result<()> {
        let order = self.encoding.byte_order();
        self.table.with_bytes_mut(address, T::size() as u64, |bytes| {
            write_at(bytes, &mut 0, value, order)
        })?
    }

    /// Reads a pointer-width integer at `address`, sign-extended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] as [`MemoryView::read`] does.
    pub fn read_long(&self, address: u64) -> Result<i64> {
        let encoding = self.encoding;
        self.table
            .with_bytes(address, encoding.pointer_size(), |bytes| {
                read_ptr_int_at(bytes, &mut 0, encoding)
            })?
    }

    /// Writes a pointer-width integer at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueOverflow`] if the value does not fit 4 bytes on a 32-bit encoding,
    /// or [`Error::OutOfBounds`] as [`MemoryView::write`] does.
    pub fn write_long(&self, address: u64, value: i64) -> Result<()> {
        let encoding = self.encoding;
        self.table
            .with_bytes_mut(address, encoding.pointer_size(), |bytes| {
                write_ptr_int_at(bytes, &mut 0, value, encoding)
            })?
    }

    /// Reads a pointer value (an address) at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] as [`MemoryView::read`] does.
    pub fn read_address(&self, address: u64) -> Result<u64> {
        let encoding = self.encoding;
        self.table
            .with_bytes(address, encoding.pointer_size(), |bytes| {
                read_ptr_at(bytes, &mut 0, encoding)
            })?
    }

    /// Writes a pointer value (an address) at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueOverflow`] if the address needs more than 4 bytes on a 32-bit
    /// encoding, or [`Error::OutOfBounds`] as [`MemoryView::write`] does.
    pub fn write_address(&self, address: u64, value: u64) -> Result<()> {
        let encoding = self.encoding;
        self.table
            .with_bytes_mut(address, encoding.pointer_size(), |bytes| {
                write_ptr_at(bytes, &mut 0, value, encoding)
            })?
    }

    /// Reads a scalar of `kind` at `address` as a detached [`Value`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] as [`MemoryView::read`] does.
    pub fn read_scalar(&self, address: u64, kind: ScalarKind) -> Result<Value> {
        Ok(match kind {
            ScalarKind::Int8 => Value::Int8(self.read(address)?),
            ScalarKind::Int16 => Value::Int16(self.read(address)?),
            ScalarKind::Int32 => Value::Int32(self.read(address)?),
            ScalarKind::Int64 => Value::Int64(self.read(address)?),
            ScalarKind::PtrInt => Value::PtrInt(self.read_long(address)?),
            ScalarKind::Float32 => Value::Float32(self.read(address)?),
            ScalarKind::Float64 => Value::Float64(self.read(address)?),
        })
    }

    /// Writes `value` as a scalar of `kind` at `address`, converting it with [`Value::coerce`].
    ///
    /// # Errors
    ///
    /// Returns the conversion errors of [`Value::coerce`], [`Error::ValueOverflow`] for
    /// pointer-width integers that do not fit, and [`Error::OutOfBounds`].
    pub fn write_scalar(&self, address: u64, kind: ScalarKind, value: &Value) -> Result<()> {
        match value.coerce(kind)? {
            Value::Int8(v) => self.write(address, v),
            Value::Int16(v) => self.write(address, v),
            Value::Int32(v) => self.write(address, v),
            Value::Int64(v) => self.write(address, v),
            Value::PtrInt(v) => self.write_long(address, v),
            Value::Float32(v) => self.write(address, v),
            Value::Float64(v) => self.write(address, v),
            other => Err(Error::TypeMismatch {
                expected: kind.to_string(),
                found: other.type_name(),
            }),
        }
    }

    /// Reads a value of type `ty` at `address`.
    ///
    /// Scalars and pointers are read into detached values; structs and arrays become reference
    /// views bound to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnspecifiedTarget`] for `void`, [`Error::OutOfBounds`] for unreadable
    /// scalars and arrays that do not fit their block.
    pub fn load(&self, address: u64, ty: &TypeChain) -> Result<Value> {
        match ty.head() {
            TypeTag::Void => Err(Error::UnspecifiedTarget),
            TypeTag::Scalar(kind) => self.read_scalar(address, kind),
            TypeTag::Pointer => {
                let target = self.read_address(address)?;
                Ok(Value::Pointer(Pointer::new(self.at(target), ty.tail())))
            }
            TypeTag::Array(_) => Ok(Value::Array(ArrayView::new(self.at(address), ty.clone())?)),
            TypeTag::Struct(id) => Ok(Value::Struct(StructView::new(self.at(address), id))),
        }
    }

    /// Writes `value` as type `ty` at `address`.
    ///
    /// Pointers store the address they denote. Structs and arrays are copied: not at all if
    /// `value` already is the storage at `address`, byte for byte if both sides share encoding
    /// and schema, and field by field through [`MemoryView::reinterpret_copy`] otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnspecifiedTarget`] for `void`, [`Error::TypeMismatch`] if `value` has
    /// the wrong shape for `ty`, and the errors of the individual writes.
    pub fn store(&self, address: u64, ty: &TypeChain, value: &Value) -> Result<()> {
        match ty.head() {
            TypeTag::Void => Err(Error::UnspecifiedTarget),
            TypeTag::Scalar(kind) => self.write_scalar(address, kind, value),
            TypeTag::Pointer => self.write_address(address, value.as_pointer()?.address()),
            TypeTag::Struct(_) | TypeTag::Array(_) => self.store_aggregate(address, ty, value),
        }
    }

    fn store_aggregate(&self, address: u64, ty: &TypeChain, value: &Value) -> Result<()> {
        let source = match (ty.head(), value) {
            (TypeTag::Struct(_), Value::Struct(s)) => s.view(),
            (TypeTag::Array(_), Value::Array(a)) => a.view(),
            _ => {
                return Err(Error::TypeMismatch {
                    expected: ty.to_string(),
                    found: value.type_name(),
                })
            }
        };

        if source.table.same_table(&self.table) && source.address == address {
            return Ok(());
        }
        if source.encoding == self.encoding && self.same_schema(source) {
            let len = self.size_of(ty)?;
            return self.copy_bytes(address, source, len);
        }
        copy::transfer(self, address, ty, value)
    }

    /// Copies `len` bytes from `source`'s address to `dst_address`.
    ///
    /// Both ranges are bounds-checked. `source` may live in a different table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedAddress`] if either start address has no backing block and
    /// [`Error::OutOfBounds`] if either range overruns its block.
    pub fn copy_bytes(&self, dst_address: u64, source: &MemoryView, len: u64) -> Result<()> {
        if !source.table.contains(source.address) {
            return Err(Error::UnresolvedAddress(source.address));
        }
        if !self.table.contains(dst_address) {
            return Err(Error::UnresolvedAddress(dst_address));
        }

        let bytes = source.table.read(source.address, len)?;
        self.table.write(dst_address, &bytes)
    }

    /// Copies a struct or array value to `dst_address` field by field, re-encoding every scalar
    /// and pointer under this view's encoding.
    ///
    /// The destination type is the source type with struct names looked up in this view's
    /// schema. Fields are matched by name; destination fields the source lacks are left
    /// untouched. Scalars and pointers are written directly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueOverflow`] when a value does not fit the destination width,
    /// [`Error::UnknownStruct`] when the destination schema lacks a struct of the source, and
    /// the errors of the individual reads and writes. Fields already written stay written.
    pub fn reinterpret_copy(&self, dst_address: u64, source: &Value) -> Result<()> {
        let ty = copy::destination_type(self, source)?;
        copy::transfer(self, dst_address, &ty, source)
    }
}

/// `address + delta`, or [`Error::OutOfBounds`] if the sum leaves the 64-bit address range.
pub(crate) fn checked_offset(address: u64, delta: u64) -> Result<u64> {
    address
        .checked_add(delta)
        .ok_or(Error::OutOfBounds { address, len: delta })
}

impl std::fmt::Debug for MemoryView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryView")
            .field("address", &format_args!("{:#x}", self.address))
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}
