//! Addressing conventions of the application that wrote a file.
//!
//! An [`Encoding`] pairs the pointer width of the writing process with its byte order. Both are
//! fixed per open file and parameterize every size and offset computation: the same schema
//! yields different struct sizes under different pointer widths, because pointer-valued fields
//! change size with it.

use strum::{Display, EnumIter, IntoEnumIterator};

/// Width of a pointer in the emulated address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum PointerWidth {
    /// 4-byte pointers
    #[strum(to_string = "32-bit")]
    Bits32,
    /// 8-byte pointers
    #[strum(to_string = "64-bit")]
    Bits64,
}

impl PointerWidth {
    /// Size of a pointer in bytes.
    #[must_use]
    pub fn bytes(self) -> u64 {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }
}

/// Byte order used to assemble multi-byte scalars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum ByteOrder {
    /// Least significant byte first
    #[strum(to_string = "little-endian")]
    LittleEndian,
    /// Most significant byte first
    #[strum(to_string = "big-endian")]
    BigEndian,
}

/// Immutable descriptor of the target addressing convention.
///
/// # Examples
///
/// ```rust
/// use cmemview::{ByteOrder, Encoding, PointerWidth};
///
/// let enc = Encoding::new(PointerWidth::Bits32, ByteOrder::BigEndian);
/// assert_eq!(enc, Encoding::BE32);
/// assert_eq!(enc.pointer_size(), 4);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Encoding {
    pointer_width: PointerWidth,
    byte_order: ByteOrder,
}

impl Encoding {
    /// 4-byte pointers, little-endian
    pub const LE32: Encoding = Encoding::new(PointerWidth::Bits32, ByteOrder::LittleEndian);
    /// 8-byte pointers, little-endian
    pub const LE64: Encoding = Encoding::new(PointerWidth::Bits64, ByteOrder::LittleEndian);
    /// 4-byte pointers, big-endian
    pub const BE32: Encoding = Encoding::new(PointerWidth::Bits32, ByteOrder::BigEndian);
    /// 8-byte pointers, big-endian
    pub const BE64: Encoding = Encoding::new(PointerWidth::Bits64, ByteOrder::BigEndian);

    /// Creates a new encoding.
    #[must_use]
    pub const fn new(pointer_width: PointerWidth, byte_order: ByteOrder) -> Self {
        Encoding {
            pointer_width,
            byte_order,
        }
    }

    /// The convention of the host this library runs on.
    #[must_use]
    pub fn native() -> Self {
        let pointer_width = if std::mem::size_of::<usize>() == 8 {
            PointerWidth::Bits64
        } else {
            PointerWidth::Bits32
        };
        let byte_order = if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };

        Encoding::new(pointer_width, byte_order)
    }

    /// Iterates all four supported encodings.
    pub fn all() -> impl Iterator<Item = Encoding> {
        PointerWidth::iter()
            .flat_map(|width| ByteOrder::iter().map(move |order| Encoding::new(width, order)))
    }

    /// The pointer width of this encoding.
    #[must_use]
    pub fn pointer_width(&self) -> PointerWidth {
        self.pointer_width
    }

    /// The byte order of this encoding.
    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Size of a pointer (and of the pointer-width integer kind) in bytes.
    #[must_use]
    pub fn pointer_size(&self) -> u64 {
        self.pointer_width.bytes()
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.pointer_width, self.byte_order)
    }
}
