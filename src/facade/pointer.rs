//! C pointers over the emulated address space.
//!
//! A [`Pointer`] is a value: the address it denotes plus the [`TypeChain`] of its target. It
//! never changes once built; arithmetic returns new pointers, and [`Pointer::advance`] rebinds
//! a variable to one.
//!
//! # Value vs. Reference Semantics
//!
//! [`Pointer::dereference`] returns scalars and pointers as detached copies, and structs and
//! arrays as views bound to the pointer's address. Changing a dereferenced `int` changes nothing
//! in memory; changing a field of a dereferenced struct does.
//!
//! # Casts
//!
//! [`Pointer::cast`] is the one place where the type of memory is reinterpreted without any
//! check, as a C cast would. A scalar dereference through a mis-cast pointer returns whatever the
//! bytes at that address decode to. The bulk conversions (`to_*_array`) check the target kind and
//! fail with [`Error::TypeMismatch`] instead.
//!
//! # Examples
//!
//! ```rust
//! use cmemview::{BlockTable, Encoding, MemoryView, Pointer, ScalarKind, SchemaRegistry, TypeChain, NOT_A_STRUCT};
//! use std::sync::Arc;
//!
//! let table = BlockTable::new();
//! let block = table.allocate(NOT_A_STRUCT, 16, 4)?;
//! let view = MemoryView::new(block.old_address, table, Encoding::LE32, Arc::new(SchemaRegistry::new()));
//!
//! let ints = Pointer::new(view, TypeChain::scalar(ScalarKind::Int32));
//! ints.from_array(&[1i32, 2, 3, 4])?;
//!
//! let third = ints.plus(2)?;
//! assert_eq!(third.address(), ints.address() + 8);
//! assert_eq!(third.dereference()?.as_i32()?, 3);
//! assert_eq!(ints.to_int_array(4)?, vec![1, 2, 3, 4]);
//! # Ok::<(), cmemview::Error>(())
//! ```

use crate::{
    facade::{view::checked_offset, ArrayView, Location, MemoryView, Scalar, Value},
    memory::{BlockTable, Encoding},
    schema::{SchemaRef, TypeChain, TypeTag},
    Error, Result,
};

/// A typed C pointer.
#[derive(Clone, Debug)]
pub struct Pointer {
    view: MemoryView,
    target: TypeChain,
}

impl Pointer {
    /// Creates a pointer to `view`'s address with target type `target`.
    #[must_use]
    pub fn new(view: MemoryView, target: TypeChain) -> Self {
        Pointer { view, target }
    }

    /// The canonical `void*` null pointer for an encoding.
    #[must_use]
    pub fn null(table: BlockTable, encoding: Encoding, schema: SchemaRef) -> Self {
        Pointer::new(MemoryView::new(0, table, encoding, schema), TypeChain::void())
    }

    /// The address this pointer denotes.
    #[must_use]
    pub fn address(&self) -> u64 {
        self.view.address()
    }

    /// Location of the pointer, used for equality and hashing.
    #[must_use]
    pub fn location(&self) -> Location {
        self.view.location()
    }

    /// Type of the target.
    #[must_use]
    pub fn target_type(&self) -> &TypeChain {
        &self.target
    }

    /// The underlying view.
    #[must_use]
    pub fn view(&self) -> &MemoryView {
        &self.view
    }

    /// Encoding of the pointer.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.view.encoding()
    }

    /// Returns `true` if the address is zero. No resolution happens.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.address() == 0
    }

    /// Returns `true` if the pointer is non-null and its address lies inside a block.
    ///
    /// This resolves the address in the block table, which is O(log n) in the number of blocks;
    /// prefer [`Pointer::is_null`] in hot loops.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_null() && self.view.table().contains(self.address())
    }

    /// Size of the target under the pointer's encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnspecifiedTarget`] for `void*`, and schema errors for struct targets.
    pub fn target_size(&self) -> Result<u64> {
        self.view.size_of(&self.target)
    }

    /// Reads the target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedAddress`] for null and dangling pointers,
    /// [`Error::UnspecifiedTarget`] for `void*`, and [`Error::OutOfBounds`] if the target
    /// crosses the end of its block.
    pub fn dereference(&self) -> Result<Value> {
        if !self.is_valid() {
            return Err(Error::UnresolvedAddress(self.address()));
        }
        self.view.load(self.address(), &self.target)
    }

    /// Writes `value` to the address this pointer denotes.
    ///
    /// Scalars are converted with [`Value::coerce`], pointers store their address, structs and
    /// arrays are copied (see [`MemoryView::store`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedAddress`] for null and dangling pointers and the errors of
    /// [`MemoryView::store`].
    pub fn assign(&self, value: &Value) -> Result<()> {
        if !self.is_valid() {
            return Err(Error::UnresolvedAddress(self.address()));
        }
        self.view.store(self.address(), &self.target, value)
    }

    /// A new pointer `n` targets further (`n` may be negative). `self` is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnspecifiedTarget`] for `void*` and [`Error::OutOfBounds`] if the address
    /// leaves the 64-bit range.
    pub fn plus(&self, n: i64) -> Result<Pointer> {
        let address = self.offset_address(n)?;
        Ok(Pointer::new(self.view.at(address), self.target.clone()))
    }

    /// A new pointer `n` targets back. Shorthand for `plus(-n)`.
    ///
    /// # Errors
    ///
    /// See [`Pointer::plus`].
    pub fn minus(&self, n: i64) -> Result<Pointer> {
        self.plus(n.checked_neg().ok_or(Error::OutOfBounds {
            address: self.address(),
            len: 0,
        })?)
    }

    /// Moves this binding `n` targets further, like `p += n`.
    ///
    /// # Errors
    ///
    /// See [`Pointer::plus`]. On error the pointer is unchanged.
    pub fn advance(&mut self, n: i64) -> Result<()> {
        let address = self.offset_address(n)?;
        self.view = self.view.at(address);
        Ok(())
    }

    fn offset_address(&self, n: i64) -> Result<u64> {
        let size = self.target_size()?;
        let out_of_bounds = || Error::OutOfBounds {
            address: self.address(),
            len: size,
        };
        let delta = i64::try_from(size)
            .ok()
            .and_then(|size| size.checked_mul(n))
            .ok_or_else(out_of_bounds)?;
        self.address()
            .checked_add_signed(delta)
            .ok_or_else(out_of_bounds)
    }

    /// The same address with another target type.
    ///
    /// Unchecked, like a C cast: the new type is used as is on every later access.
    #[must_use]
    pub fn cast(&self, target: TypeChain) -> Pointer {
        Pointer::new(self.view.clone(), target)
    }

    /// An array view of `len` targets starting at this address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnspecifiedTarget`] for `void*` and [`Error::OutOfBounds`] if the array
    /// does not fit the block.
    pub fn to_array_view(&self, len: u32) -> Result<ArrayView> {
        ArrayView::new(self.view.clone(), TypeChain::array_of(len, &self.target))
    }

    /// Reads `len` consecutive targets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] unless all `len` targets lie inside one block, and the
    /// errors of [`Pointer::dereference`].
    pub fn to_vec(&self, len: usize) -> Result<Vec<Value>> {
        let size = self.target_size()?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let total = u64::try_from(len)
            .ok()
            .and_then(|len| size.checked_mul(len))
            .ok_or(Error::OutOfBounds {
                address: self.address(),
                len: u64::MAX,
            })?;
        self.view.table().with_bytes(self.address(), total, |_| ())?;

        let mut values = Vec::new();
        let mut address = self.address();
        for _ in 0..len {
            values.push(self.view.load(address, &self.target)?);
            address = checked_offset(address, size)?;
        }
        Ok(values)
    }

    fn check_kind<T: Scalar>(&self) -> Result<()> {
        if self.target.as_scalar() == Some(T::KIND) {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected: T::KIND.to_string(),
                found: self.target.to_string(),
            })
        }
    }

    /// Reads `len` consecutive scalars of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless the target is exactly `T`'s kind, and
    /// [`Error::OutOfBounds`] if the range leaves the block.
    pub fn to_array<T: Scalar>(&self, len: usize) -> Result<Vec<T>> {
        self.check_kind::<T>()?;
        read_run(&self.view, self.address(), len)
    }

    /// Writes `data` to consecutive targets of type `T`.
    ///
    /// # Errors
    ///
    /// See [`Pointer::to_array`].
    pub fn from_array<T: Scalar>(&self, data: &[T]) -> Result<()> {
        self.check_kind::<T>()?;
        write_run(&self.view, self.address(), data)
    }

    /// Reads `len` consecutive pointer-width integers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless the target is `long`, and
    /// [`Error::OutOfBounds`] if the range leaves the block.
    pub fn to_long_array(&self, len: usize) -> Result<Vec<i64>> {
        check_long(&self.target)?;
        read_long_run(&self.view, self.address(), len)
    }

    /// Writes `data` to consecutive pointer-width integers.
    ///
    /// # Errors
    ///
    /// See [`Pointer::to_long_array`], plus [`Error::ValueOverflow`] on 32-bit encodings.
    pub fn from_long_array(&self, data: &[i64]) -> Result<()> {
        check_long(&self.target)?;
        write_long_run(&self.view, self.address(), data)
    }

    /// `to_array::<i8>`
    ///
    /// # Errors
    ///
    /// See [`Pointer::to_array`].
    pub fn to_byte_array(&self, len: usize) -> Result<Vec<i8>> {
        self.to_array(len)
    }

    /// `to_array::<i16>`
    ///
    /// # Errors
    ///
    /// See [`Pointer::to_array`].
    pub fn to_short_array(&self, len: usize) -> Result<Vec<i16>> {
        self.to_array(len)
    }

    /// `to_array::<i32>`
    ///
    /// # Errors
    ///
    /// See [`Pointer::to_array`].
    pub fn to_int_array(&self, len: usize) -> Result<Vec<i32>> {
        self.to_array(len)
    }

    /// `to_array::<i64>`
    ///
    /// # Errors
    ///
    /// See [`Pointer::to_array`].
    pub fn to_int64_array(&self, len: usize) -> Result<Vec<i64>> {
        self.to_array(len)
    }

    /// `to_array::<f32>`
    ///
    /// # Errors
    ///
    /// See [`Pointer::to_array`].
    pub fn to_float_array(&self, len: usize) -> Result<Vec<f32>> {
        self.to_array(len)
    }

    /// `to_array::<f64>`
    ///
    /// # Errors
    ///
    /// See [`Pointer::to_array`].
    pub fn to_double_array(&self, len: usize) -> Result<Vec<f64>> {
        self.to_array(len)
    }
}

pub(crate) fn check_long(ty: &TypeChain) -> Result<()> {
    match ty.head() {
        TypeTag::Scalar(crate::ScalarKind::PtrInt) if ty.len() == 1 => Ok(()),
        _ => Err(Error::TypeMismatch {
            expected: crate::ScalarKind::PtrInt.to_string(),
            found: ty.to_string(),
        }),
    }
}

/// Reads `len` scalars starting at `address` within a single block.
pub(crate) fn read_run<T: Scalar>(view: &MemoryView, address: u64, len: usize) -> Result<Vec<T>> {
    let size = T::size();
    let total = size.checked_mul(len).ok_or(Error::OutOfBounds {
        address,
        len: u64::MAX,
    })?;
    let order = view.encoding().byte_order();
    view.table().with_bytes(address, total as u64, |bytes| {
        bytes
            .chunks_exact(size)
            .map(|chunk| crate::memory::io::read_at::<T>(chunk, &mut 0, order))
            .collect()
    })?
}

/// Writes `data` starting at `address` within a single block.
pub(crate) fn write_run<T: Scalar>(view: &MemoryView, address: u64, data: &[T]) -> Result<()> {
    let size = T::size();
    let order = view.encoding().byte_order();
    view.table()
        .with_bytes_mut(address, (size * data.len()) as u64, |bytes: &mut [u8]| -> Result<()> {
            for (chunk, value) in bytes.chunks_exact_mut(size).zip(data) {
                crate::memory::io::write_at(chunk, &mut 0, *value, order)?;
            }
            Ok(())
        })?
}

pub(crate) fn read_long_run(view: &MemoryView, address: u64, len: usize) -> Result<Vec<i64>> {
    let size = view.encoding().pointer_size();
    (0..len as u64)
        .map(|index| view.read_long(checked_offset(address, index * size)?))
        .collect()
}

pub(crate) fn write_long_run(view: &MemoryView, address: u64, data: &[i64]) -> Result<()> {
    let size = view.encoding().pointer_size();
    let total = size * data.len() as u64;
    if !data.is_empty() {
        // Fail before the first write if the run leaves the block
        view.table().with_bytes(address, total, |_| ())?;
    }
    for (index, value) in (0u64..).zip(data) {
        view.write_long(address + index * size, *value)?;
    }
    Ok(())
}

location_eq!(
    Pointer => Pointer, crate::ArrayView, crate::StructView, crate::ArrayIter
);

impl Eq for Pointer {}

impl std::hash::Hash for Pointer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.location().hash(state);
    }
}
