//! Type descriptors for emulated C types.
//!
//! The static type of a facade erases indirection levels and array dimensions, so they are
//! carried explicitly as a [`TypeChain`]: an ordered list of [`TypeTag`]s read outside-in.
//!
//! | C type          | chain                                   |
//! |-----------------|-----------------------------------------|
//! | `int`           | `[Scalar(Int32)]`                       |
//! | `int **`        | `[Pointer, Pointer, Scalar(Int32)]`     |
//! | `float [4][4]`  | `[Array(4), Array(4), Scalar(Float32)]` |
//! | `Link *`        | `[Pointer, Struct(link)]`               |
//! | `void *`        | `[Pointer, Void]`                       |
//!
//! A [`crate::Pointer`] stores the chain of its *target*, so the pointer of a field typed
//! `int **` carries `[Pointer, Scalar(Int32)]`, and dereferencing it once yields a pointer
//! carrying `[Scalar(Int32)]`.

use std::sync::Arc;

use strum::{Display, EnumIter};

use crate::{memory::encoding::Encoding, schema::SchemaProvider, Error, Result};

/// Scalar kinds the memory model can read and write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum ScalarKind {
    /// 1-byte signed integer (`char`)
    #[strum(to_string = "int8")]
    Int8,
    /// 2-byte signed integer (`short`)
    #[strum(to_string = "int16")]
    Int16,
    /// 4-byte signed integer (`int`)
    #[strum(to_string = "int32")]
    Int32,
    /// 8-byte signed integer (`int64_t`)
    #[strum(to_string = "int64")]
    Int64,
    /// Signed integer as wide as a pointer of the encoding (`long` on LP64 writers)
    #[strum(to_string = "long")]
    PtrInt,
    /// IEEE 754 single precision
    #[strum(to_string = "float")]
    Float32,
    /// IEEE 754 double precision
    #[strum(to_string = "double")]
    Float64,
}

impl ScalarKind {
    /// Size of the scalar in bytes under `encoding`.
    #[must_use]
    pub fn size(self, encoding: Encoding) -> u64 {
        match self {
            ScalarKind::Int8 => 1,
            ScalarKind::Int16 => 2,
            ScalarKind::Int32 | ScalarKind::Float32 => 4,
            ScalarKind::Int64 | ScalarKind::Float64 => 8,
            ScalarKind::PtrInt => encoding.pointer_size(),
        }
    }

    /// Returns `true` for the integer kinds.
    #[must_use]
    pub fn is_integer(self) -> bool {
        !matches!(self, ScalarKind::Float32 | ScalarKind::Float64)
    }
}

/// Index of a struct type in a [`SchemaProvider`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(pub u32);

impl StructId {
    /// The schema index stored in block headers for this struct.
    #[must_use]
    pub fn schema_index(self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }
}

impl std::fmt::Display for StructId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "struct#{}", self.0)
    }
}

/// One component of a [`TypeChain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Untyped target of a `void*`
    Void,
    /// A scalar value
    Scalar(ScalarKind),
    /// One level of indirection; the rest of the chain is the target
    Pointer,
    /// One array dimension of the given length; the rest of the chain is the element
    Array(u32),
    /// An instance of a schema-described struct
    Struct(StructId),
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeTag::Void => write!(f, "void"),
            TypeTag::Scalar(kind) => write!(f, "{kind}"),
            TypeTag::Pointer => write!(f, "*"),
            TypeTag::Array(len) => write!(f, "[{len}]"),
            TypeTag::Struct(id) => write!(f, "{id}"),
        }
    }
}

/// Ordered list of [`TypeTag`]s fully describing an emulated C type.
///
/// Chains are immutable and cheap to clone; taking the [`TypeChain::tail`] shares the
/// underlying storage.
///
/// # Invariants
///
/// A chain is never empty, ends in a `Void`, `Scalar` or `Struct` tag, and contains `Void` only
/// as its last tag.
#[derive(Clone, Debug)]
pub struct TypeChain {
    tags: Arc<[TypeTag]>,
    start: usize,
}

impl TypeChain {
    /// Creates a chain from its tags, outermost first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the chain violates the invariants above.
    pub fn new(tags: impl Into<Vec<TypeTag>>) -> Result<Self> {
        let tags: Vec<TypeTag> = tags.into();
        let Some((last, rest)) = tags.split_last() else {
            return Err(malformed_error!("Empty type chain"));
        };
        if matches!(last, TypeTag::Pointer | TypeTag::Array(_)) {
            return Err(malformed_error!("Type chain ends in {} without a target", last));
        }
        if rest.iter().any(|tag| *tag == TypeTag::Void) {
            return Err(malformed_error!("void can only terminate a type chain"));
        }

        Ok(TypeChain {
            tags: tags.into(),
            start: 0,
        })
    }

    fn from_valid(tags: Vec<TypeTag>) -> Self {
        TypeChain {
            tags: tags.into(),
            start: 0,
        }
    }

    /// `void`
    #[must_use]
    pub fn void() -> Self {
        Self::from_valid(vec![TypeTag::Void])
    }

    /// A single scalar.
    #[must_use]
    pub fn scalar(kind: ScalarKind) -> Self {
        Self::from_valid(vec![TypeTag::Scalar(kind)])
    }

    /// A single struct instance.
    #[must_use]
    pub fn structure(id: StructId) -> Self {
        Self::from_valid(vec![TypeTag::Struct(id)])
    }

    /// A pointer to `target`.
    #[must_use]
    pub fn pointer_to(target: &TypeChain) -> Self {
        let mut tags = Vec::with_capacity(target.len() + 1);
        tags.push(TypeTag::Pointer);
        tags.extend_from_slice(target.tags());
        Self::from_valid(tags)
    }

    /// An array of `len` elements of `element`.
    #[must_use]
    pub fn array_of(len: u32, element: &TypeChain) -> Self {
        let mut tags = Vec::with_capacity(element.len() + 1);
        tags.push(TypeTag::Array(len));
        tags.extend_from_slice(element.tags());
        Self::from_valid(tags)
    }

    /// The tags of this chain, outermost first.
    #[must_use]
    pub fn tags(&self) -> &[TypeTag] {
        &self.tags[self.start..]
    }

    /// The outermost tag.
    #[must_use]
    pub fn head(&self) -> TypeTag {
        self.tags[self.start]
    }

    /// The innermost tag.
    #[must_use]
    pub fn innermost(&self) -> TypeTag {
        self.tags[self.tags.len() - 1]
    }

    /// The chain without its outermost tag, i.e. the target of a pointer or the element of an
    /// array. A single-tag chain is its own tail.
    #[must_use]
    pub fn tail(&self) -> TypeChain {
        TypeChain {
            tags: self.tags.clone(),
            start: (self.start + 1).min(self.tags.len() - 1),
        }
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len() - self.start
    }

    /// Always `false`; chains are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Leading array dimensions, outermost first (`[4, 4]` for `float [4][4]`).
    #[must_use]
    pub fn dimensions(&self) -> Vec<u32> {
        self.tags()
            .iter()
            .map_while(|tag| match tag {
                TypeTag::Array(len) => Some(*len),
                _ => None,
            })
            .collect()
    }

    /// The scalar kind if this chain is exactly one scalar.
    #[must_use]
    pub fn as_scalar(&self) -> Option<ScalarKind> {
        match self.tags() {
            [TypeTag::Scalar(kind)] => Some(*kind),
            _ => None,
        }
    }

    /// Size of a value of this type under `encoding`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnspecifiedTarget`] for `void`, errors of the schema provider for
    /// struct types, and [`crate::Error::ValueOverflow`] if an array size overflows.
    pub fn size_of(&self, encoding: Encoding, schema: &dyn SchemaProvider) -> Result<u64> {
        match self.head() {
            TypeTag::Void => Err(Error::UnspecifiedTarget),
            TypeTag::Scalar(kind) => Ok(kind.size(encoding)),
            TypeTag::Pointer => Ok(encoding.pointer_size()),
            TypeTag::Array(len) => {
                let element = self.tail().size_of(encoding, schema)?;
                element
                    .checked_mul(u64::from(len))
                    .ok_or(Error::ValueOverflow {
                        value: i128::from(element) * i128::from(len),
                        width: 8,
                    })
            }
            TypeTag::Struct(id) => schema.struct_size(id, encoding),
        }
    }
}

impl PartialEq for TypeChain {
    fn eq(&self, other: &Self) -> bool {
        self.tags() == other.tags()
    }
}

impl Eq for TypeChain {}

impl std::hash::Hash for TypeChain {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.tags().hash(state);
    }
}

impl std::fmt::Display for TypeChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, tag) in self.tags().iter().enumerate() {
            if i > 0 && !matches!(tag, TypeTag::Array(_)) {
                write!(f, " ")?;
            }
            write!(f, "{tag}")?;
        }
        Ok(())
    }
}

impl From<ScalarKind> for TypeChain {
    fn from(kind: ScalarKind) -> Self {
        TypeChain::scalar(kind)
    }
}

impl From<StructId> for TypeChain {
    fn from(id: StructId) -> Self {
        TypeChain::structure(id)
    }
}
