//! Values produced by dereferencing and indexing.
//!
//! Scalars and pointers come back as detached copies: changing them never touches block bytes.
//! Structs and arrays come back as reference views bound to the address they were read at, so
//! mutations through them are visible to every other view of that address.

use crate::{
    facade::{ArrayView, Pointer, StructView},
    memory::io::ScalarIO,
    schema::ScalarKind,
    Error, Result,
};

/// Identity of a facade: the address it is bound to.
///
/// Every facade kind derives its equality and hash from its location, so a [`Pointer`] and an
/// array iterator positioned at the same address compare equal although their types differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location(pub u64);

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// The result of a dereference, an index operation or a field read.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `char`
    Int8(i8),
    /// `short`
    Int16(i16),
    /// `int`
    Int32(i32),
    /// `int64_t`
    Int64(i64),
    /// Pointer-width integer, sign-extended to 64 bits
    PtrInt(i64),
    /// `float`
    Float32(f32),
    /// `double`
    Float64(f64),
    /// A pointer value read from memory (detached)
    Pointer(Pointer),
    /// A struct instance (reference view)
    Struct(StructView),
    /// An array (reference view)
    Array(ArrayView),
}

impl Value {
    /// Short type name, as used in [`Error::TypeMismatch`].
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Value::Int8(_) => ScalarKind::Int8.to_string(),
            Value::Int16(_) => ScalarKind::Int16.to_string(),
            Value::Int32(_) => ScalarKind::Int32.to_string(),
            Value::Int64(_) => ScalarKind::Int64.to_string(),
            Value::PtrInt(_) => ScalarKind::PtrInt.to_string(),
            Value::Float32(_) => ScalarKind::Float32.to_string(),
            Value::Float64(_) => ScalarKind::Float64.to_string(),
            Value::Pointer(_) => "pointer".to_string(),
            Value::Struct(_) => "struct".to_string(),
            Value::Array(_) => "array".to_string(),
        }
    }

    /// Scalar kind of a scalar value.
    #[must_use]
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Value::Int8(_) => Some(ScalarKind::Int8),
            Value::Int16(_) => Some(ScalarKind::Int16),
            Value::Int32(_) => Some(ScalarKind::Int32),
            Value::Int64(_) => Some(ScalarKind::Int64),
            Value::PtrInt(_) => Some(ScalarKind::PtrInt),
            Value::Float32(_) => Some(ScalarKind::Float32),
            Value::Float64(_) => Some(ScalarKind::Float64),
            _ => None,
        }
    }

    /// Location of a facade value. Scalars have none.
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        match self {
            Value::Pointer(p) => Some(p.location()),
            Value::Struct(s) => Some(s.location()),
            Value::Array(a) => Some(a.location()),
            _ => None,
        }
    }

    fn mismatch(&self, expected: &str) -> Error {
        Error::TypeMismatch {
            expected: expected.to_string(),
            found: self.type_name(),
        }
    }

    fn integer(&self) -> Option<i64> {
        match *self {
            Value::Int8(v) => Some(i64::from(v)),
            Value::Int16(v) => Some(i64::from(v)),
            Value::Int32(v) => Some(i64::from(v)),
            Value::Int64(v) | Value::PtrInt(v) => Some(v),
            _ => None,
        }
    }

    /// Converts a scalar to `kind`.
    ///
    /// Integers convert among each other if the value fits; `float` and `double` convert among
    /// each other. Pointer-width integers are range-checked against the destination encoding
    /// only when written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueOverflow`] if an integer does not fit `kind`, and
    /// [`Error::TypeMismatch`] for conversions between integers and floats or from non-scalars.
    #[allow(clippy::cast_possible_truncation)]
    pub fn coerce(&self, kind: ScalarKind) -> Result<Value> {
        if let Some(v) = self.integer() {
            let overflow = || Error::ValueOverflow {
                value: i128::from(v),
                width: kind.size(crate::Encoding::LE64),
            };
            return match kind {
                ScalarKind::Int8 => i8::try_from(v).map(Value::Int8).map_err(|_| overflow()),
                ScalarKind::Int16 => i16::try_from(v).map(Value::Int16).map_err(|_| overflow()),
                ScalarKind::Int32 => i32::try_from(v).map(Value::Int32).map_err(|_| overflow()),
                ScalarKind::Int64 => Ok(Value::Int64(v)),
                ScalarKind::PtrInt => Ok(Value::PtrInt(v)),
                ScalarKind::Float32 | ScalarKind::Float64 => Err(self.mismatch(&kind.to_string())),
            };
        }

        match (self, kind) {
            (Value::Float32(v), ScalarKind::Float32) => Ok(Value::Float32(*v)),
            (Value::Float32(v), ScalarKind::Float64) => Ok(Value::Float64(f64::from(*v))),
            (Value::Float64(v), ScalarKind::Float32) => Ok(Value::Float32(*v as f32)),
            (Value::Float64(v), ScalarKind::Float64) => Ok(Value::Float64(*v)),
            _ => Err(self.mismatch(&kind.to_string())),
        }
    }

    /// The value as `char`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::Int8`].
    pub fn as_i8(&self) -> Result<i8> {
        i8::from_value(self)
    }

    /// The value as `short`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::Int16`].
    pub fn as_i16(&self) -> Result<i16> {
        i16::from_value(self)
    }

    /// The value as `int`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::Int32`].
    pub fn as_i32(&self) -> Result<i32> {
        i32::from_value(self)
    }

    /// The value as `int64_t`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::Int64`].
    pub fn as_i64(&self) -> Result<i64> {
        i64::from_value(self)
    }

    /// The value as pointer-width integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::PtrInt`].
    pub fn as_long(&self) -> Result<i64> {
        match self {
            Value::PtrInt(v) => Ok(*v),
            _ => Err(self.mismatch("long")),
        }
    }

    /// The value as `float`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::Float32`].
    pub fn as_f32(&self) -> Result<f32> {
        f32::from_value(self)
    }

    /// The value as `double`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::Float64`].
    pub fn as_f64(&self) -> Result<f64> {
        f64::from_value(self)
    }

    /// The value as pointer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::Pointer`].
    pub fn as_pointer(&self) -> Result<&Pointer> {
        match self {
            Value::Pointer(p) => Ok(p),
            _ => Err(self.mismatch("pointer")),
        }
    }

    /// The value as struct view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::Struct`].
    pub fn as_struct(&self) -> Result<&StructView> {
        match self {
            Value::Struct(s) => Ok(s),
            _ => Err(self.mismatch("struct")),
        }
    }

    /// The value as array view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::Array`].
    pub fn as_array(&self) -> Result<&ArrayView> {
        match self {
            Value::Array(a) => Ok(a),
            _ => Err(self.mismatch("array")),
        }
    }

    /// Consumes the value, returning the pointer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::Pointer`].
    pub fn into_pointer(self) -> Result<Pointer> {
        match self {
            Value::Pointer(p) => Ok(p),
            other => Err(other.mismatch("pointer")),
        }
    }

    /// Consumes the value, returning the struct view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::Struct`].
    pub fn into_struct(self) -> Result<StructView> {
        match self {
            Value::Struct(s) => Ok(s),
            other => Err(other.mismatch("struct")),
        }
    }

    /// Consumes the value, returning the array view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless this is [`Value::Array`].
    pub fn into_array(self) -> Result<ArrayView> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(other.mismatch("array")),
        }
    }
}

/// Rust scalar types with a fixed-width [`ScalarKind`] counterpart.
///
/// Used by the typed bulk conversions and field accessors. The pointer-width integer kind has no
/// fixed Rust type and is reached through the `*_long*` methods instead.
pub trait Scalar: ScalarIO + Into<Value> {
    /// The scalar kind a type chain must carry for this type.
    const KIND: ScalarKind;

    /// Extracts `Self` from a value of exactly this kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] for every other kind.
    fn from_value(value: &Value) -> Result<Self>;
}

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl Scalar for $ty {
                const KIND: ScalarKind = ScalarKind::$variant;

                fn from_value(value: &Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(*v),
                        other => Err(other.mismatch(&Self::KIND.to_string())),
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )+
    };
}

impl_scalar!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
);

impl From<Pointer> for Value {
    fn from(value: Pointer) -> Self {
        Value::Pointer(value)
    }
}

impl From<StructView> for Value {
    fn from(value: StructView) -> Self {
        Value::Struct(value)
    }
}

impl From<ArrayView> for Value {
    fn from(value: ArrayView) -> Self {
        Value::Array(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_accessors() {
        assert_eq!(Value::Int32(-7).as_i32().unwrap(), -7);
        assert_eq!(Value::PtrInt(9).as_long().unwrap(), 9);
        assert!(matches!(
            Value::Int32(1).as_i64(),
            Err(Error::TypeMismatch { expected, found }) if expected == "int64" && found == "int32"
        ));
        assert!(matches!(Value::Float32(1.0).as_pointer(), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn coerce_integers_checks_range() {
        assert_eq!(Value::Int64(100).coerce(ScalarKind::Int8).unwrap(), Value::Int8(100));
        assert_eq!(Value::Int8(-1).coerce(ScalarKind::PtrInt).unwrap(), Value::PtrInt(-1));
        assert!(matches!(
            Value::Int32(40_000).coerce(ScalarKind::Int16),
            Err(Error::ValueOverflow { value: 40_000, width: 2 })
        ));
    }

    #[test]
    fn coerce_floats() {
        assert_eq!(Value::Float32(0.5).coerce(ScalarKind::Float64).unwrap(), Value::Float64(0.5));
        assert_eq!(Value::Float64(2.25).coerce(ScalarKind::Float32).unwrap(), Value::Float32(2.25));
        assert!(matches!(
            Value::Float32(1.0).coerce(ScalarKind::Int32),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            Value::Int32(1).coerce(ScalarKind::Float64),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn location_display() {
        assert_eq!(Location(0x1000).to_string(), "0x1000");
        assert!(Location(1) < Location(2));
    }
}
