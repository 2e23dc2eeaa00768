//! Fixed-size, possibly multidimensional C arrays.
//!
//! An [`ArrayView`] is bound to the address of its first element and carries its full type
//! chain, leading array dimensions first (`[Array(4), Array(4), Scalar(Float32)]` for
//! `float [4][4]`). Its bounds are checked once, when the view is built: the whole array must lie
//! inside a single block.
//!
//! # Examples
//!
//! ```rust
//! use cmemview::{BlockTable, Encoding, MemoryView, ArrayView, ScalarKind, SchemaRegistry, TypeChain, Value, NOT_A_STRUCT};
//! use std::sync::Arc;
//!
//! let table = BlockTable::new();
//! let block = table.allocate(NOT_A_STRUCT, 64, 16)?;
//! let view = MemoryView::new(block.old_address, table, Encoding::BE64, Arc::new(SchemaRegistry::new()));
//!
//! let float = TypeChain::scalar(ScalarKind::Float32);
//! let matrix = ArrayView::new(view, TypeChain::array_of(4, &TypeChain::array_of(4, &float)))?;
//! assert_eq!(matrix.dimensions(), vec![4, 4]);
//!
//! let row = matrix.get(2)?.into_array()?;
//! row.set(3, &Value::Float32(1.0))?;
//! assert_eq!(row.to_float_array()?, vec![0.0, 0.0, 0.0, 1.0]);
//! # Ok::<(), cmemview::Error>(())
//! ```

use crate::{
    facade::{
        pointer::{check_long, read_long_run, read_run, write_long_run, write_run},
        Location, MemoryView, Pointer, Scalar, Value,
    },
    schema::{TypeChain, TypeTag},
    Error, Result,
};

/// A fixed-size C array.
#[derive(Clone, Debug)]
pub struct ArrayView {
    view: MemoryView,
    ty: TypeChain,
    len: u32,
    element_size: u64,
}

impl ArrayView {
    /// Creates an array view of type `ty` at `view`'s address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if `ty` does not start with an array dimension,
    /// [`Error::UnspecifiedTarget`] for arrays of `void`, and [`Error::OutOfBounds`] if the
    /// array does not fit inside the block its address resolves to.
    ///
    /// A zero-length array may sit one past the end of a block, but its address must still
    /// belong to one: an empty array at an unresolved address is [`Error::OutOfBounds`] too.
    pub fn new(view: MemoryView, ty: TypeChain) -> Result<Self> {
        let TypeTag::Array(len) = ty.head() else {
            return Err(malformed_error!("Array view of non-array type {}", ty));
        };

        let element_size = view.size_of(&ty.tail())?;
        let size = element_size
            .checked_mul(u64::from(len))
            .ok_or(Error::OutOfBounds {
                address: view.address(),
                len: u64::MAX,
            })?;
        view.table().with_bytes(view.address(), size, |_| ())?;

        Ok(ArrayView {
            view,
            ty,
            len,
            element_size,
        })
    }

    /// Address of the first element.
    #[must_use]
    pub fn address(&self) -> u64 {
        self.view.address()
    }

    /// Location of the array, used for equality and hashing.
    #[must_use]
    pub fn location(&self) -> Location {
        self.view.location()
    }

    /// The underlying view.
    #[must_use]
    pub fn view(&self) -> &MemoryView {
        &self.view
    }

    /// Full type of the array.
    #[must_use]
    pub fn type_chain(&self) -> &TypeChain {
        &self.ty
    }

    /// Type of one element of the outermost dimension.
    #[must_use]
    pub fn element_type(&self) -> TypeChain {
        self.ty.tail()
    }

    /// Size of one element of the outermost dimension in bytes.
    #[must_use]
    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    /// Length of the outermost dimension.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Returns `true` if the outermost dimension is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All dimensions, outermost first.
    #[must_use]
    pub fn dimensions(&self) -> Vec<u32> {
        self.ty.dimensions()
    }

    /// Total size of the array in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.element_size * u64::from(self.len)
    }

    fn element_address(&self, index: u32) -> Result<u64> {
        if index >= self.len {
            return Err(Error::OutOfBounds {
                address: self
                    .address()
                    .saturating_add(u64::from(index).saturating_mul(self.element_size)),
                len: self.element_size,
            });
        }
        Ok(self.address() + u64::from(index) * self.element_size)
    }

    /// Element `index` of the outermost dimension.
    ///
    /// Scalars and pointers are detached copies; structs and inner arrays are views.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `index >= len()`.
    pub fn get(&self, index: u32) -> Result<Value> {
        let address = self.element_address(index)?;
        self.view.load(address, &self.ty.tail())
    }

    /// Overwrites element `index` of the outermost dimension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `index >= len()`, and the errors of
    /// [`MemoryView::store`].
    pub fn set(&self, index: u32, value: &Value) -> Result<()> {
        let address = self.element_address(index)?;
        self.view.store(address, &self.ty.tail(), value)
    }

    /// Iterates the outermost dimension in ascending address order.
    #[must_use]
    pub fn iter(&self) -> ArrayIter {
        ArrayIter {
            array: self.clone(),
            index: 0,
        }
    }

    /// Pointer to the first element, as the array decays to in C.
    #[must_use]
    pub fn as_pointer(&self) -> Pointer {
        Pointer::new(self.view.clone(), self.ty.tail())
    }

    /// Pointer to the whole array (`&array`).
    #[must_use]
    pub fn address_of(&self) -> Pointer {
        Pointer::new(self.view.clone(), self.ty.clone())
    }

    fn scalar_len<T: Scalar>(&self) -> Result<usize> {
        let element = self.ty.tail();
        if element.as_scalar() != Some(T::KIND) {
            return Err(Error::TypeMismatch {
                expected: format!("[{}] {}", self.len, T::KIND),
                found: self.ty.to_string(),
            });
        }
        Ok(self.len as usize)
    }

    /// All elements of a one-dimensional array of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless the array is one-dimensional over `T`'s kind.
    pub fn to_array<T: Scalar>(&self) -> Result<Vec<T>> {
        let len = self.scalar_len::<T>()?;
        read_run(&self.view, self.address(), len)
    }

    /// Overwrites the leading elements of a one-dimensional array of `T` with `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] as [`ArrayView::to_array`] does, and
    /// [`Error::OutOfBounds`] if `data` is longer than the array.
    pub fn from_array<T: Scalar>(&self, data: &[T]) -> Result<()> {
        let len = self.scalar_len::<T>()?;
        if data.len() > len {
            return Err(Error::OutOfBounds {
                address: self.address(),
                len: (data.len() as u64) * self.element_size,
            });
        }
        write_run(&self.view, self.address(), data)
    }

    /// All elements of a one-dimensional array of pointer-width integers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless the array is one-dimensional over `long`.
    pub fn to_long_array(&self) -> Result<Vec<i64>> {
        check_long(&self.ty.tail())?;
        read_long_run(&self.view, self.address(), self.len as usize)
    }

    /// Overwrites the leading elements of a one-dimensional `long` array with `data`.
    ///
    /// # Errors
    ///
    /// See [`ArrayView::to_long_array`] and [`ArrayView::from_array`].
    pub fn from_long_array(&self, data: &[i64]) -> Result<()> {
        check_long(&self.ty.tail())?;
        if data.len() > self.len as usize {
            return Err(Error::OutOfBounds {
                address: self.address(),
                len: (data.len() as u64) * self.element_size,
            });
        }
        write_long_run(&self.view, self.address(), data)
    }

    /// `to_array::<i8>`
    ///
    /// # Errors
    ///
    /// See [`ArrayView::to_array`].
    pub fn to_byte_array(&self) -> Result<Vec<i8>> {
        self.to_array()
    }

    /// `to_array::<i16>`
    ///
    /// # Errors
    ///
    /// See [`ArrayView::to_array`].
    pub fn to_short_array(&self) -> Result<Vec<i16>> {
        self.to_array()
    }

    /// `to_array::<i32>`
    ///
    /// # Errors
    ///
    /// See [`ArrayView::to_array`].
    pub fn to_int_array(&self) -> Result<Vec<i32>> {
        self.to_array()
    }

    /// `to_array::<i64>`
    ///
    /// # Errors
    ///
    /// See [`ArrayView::to_array`].
    pub fn to_int64_array(&self) -> Result<Vec<i64>> {
        self.to_array()
    }

    /// `to_array::<f32>`
    ///
    /// # Errors
    ///
    /// See [`ArrayView::to_array`].
    pub fn to_float_array(&self) -> Result<Vec<f32>> {
        self.to_array()
    }

    /// `to_array::<f64>`
    ///
    /// # Errors
    ///
    /// See [`ArrayView::to_array`].
    pub fn to_double_array(&self) -> Result<Vec<f64>> {
        self.to_array()
    }
}

impl IntoIterator for &ArrayView {
    type Item = Result<Value>;
    type IntoIter = ArrayIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over the outermost dimension of an [`ArrayView`].
///
/// The iterator's position compares equal to a [`Pointer`] at the same address, so a C loop
/// like `for (p = arr; p != end; p++)` translates directly.
#[derive(Clone, Debug)]
pub struct ArrayIter {
    array: ArrayView,
    index: u32,
}

impl ArrayIter {
    /// Address of the element the next call to `next` yields; one past the end when exhausted.
    #[must_use]
    pub fn current_address(&self) -> u64 {
        self.array.address() + u64::from(self.index) * self.array.element_size
    }

    /// Location of the current position.
    #[must_use]
    pub fn location(&self) -> Location {
        Location(self.current_address())
    }
}

impl Iterator for ArrayIter {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.array.len {
            return None;
        }
        let item = self.array.get(self.index);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.array.len - self.index) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ArrayIter {}

location_eq!(
    ArrayView => ArrayView, Pointer, crate::StructView, ArrayIter;
    ArrayIter => ArrayIter, Pointer, ArrayView, crate::StructView
);

impl Eq for ArrayView {}

impl std::hash::Hash for ArrayView {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.location().hash(state);
    }
}
