use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every failure in this crate is local and synchronous: nothing is retried, and nothing is left
/// half-applied except where explicitly documented (a cross-encoding struct copy stops at the
/// first field that fails).
///
/// # Error Categories
///
/// ## Memory Access Errors
/// - [`Error::OutOfBounds`] - An address/length does not resolve or overruns its block
/// - [`Error::UnresolvedAddress`] - A dereference or copy hit an address with no backing block
/// - [`Error::BlockOverlap`] - A block was ingested on top of an existing one
/// - [`Error::AddressSpaceExhausted`] - No synthetic addresses are left (fatal)
///
/// ## Type Errors
/// - [`Error::TypeMismatch`] - A scalar conversion was requested against an incompatible type
/// - [`Error::UnspecifiedTarget`] - A `void*` was used before being cast
/// - [`Error::ValueOverflow`] - A value does not fit its destination width
/// - [`Error::Malformed`] - A type chain or struct definition is structurally invalid
///
/// ## Schema Errors
/// - [`Error::UnknownStruct`] - The schema provider has no such struct
/// - [`Error::UnknownField`] - The struct exists but has no such field
///
/// # Examples
///
/// ```rust
/// use cmemview::{BlockTable, Encoding, Error, MemoryView, SchemaRegistry};
/// use std::sync::Arc;
///
/// let view = MemoryView::new(0x40, BlockTable::new(), Encoding::LE64, Arc::new(SchemaRegistry::new()));
/// match view.read::<i32>(0x40) {
///     Err(Error::OutOfBounds { address, len }) => assert_eq!((address, len), (0x40, 4)),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An address range does not resolve to a block, or crosses the end of the block it
    /// starts in.
    ///
    /// # Fields
    ///
    /// * `address` - First address of the attempted access
    /// * `len` - Number of bytes the access spans
    #[error("Out of bound access of {len} bytes at {address:#x}")]
    OutOfBounds {
        /// First address of the attempted access
        address: u64,
        /// Number of bytes the access spans
        len: u64,
    },

    /// A dereference or copy was attempted against an address that no block backs.
    ///
    /// This covers null pointers as well as dangling or foreign addresses stored in a file.
    #[error("Address {0:#x} is not backed by any block")]
    UnresolvedAddress(u64),

    /// A scalar conversion was requested against an incompatible type descriptor.
    #[error("Type mismatch - expected {expected}, found {found}")]
    TypeMismatch {
        /// The type the operation required
        expected: String,
        /// The type that was actually present
        found: String,
    },

    /// The operation needs a target type, but the pointer is untyped (`void*`).
    ///
    /// Use [`crate::Pointer::cast`] to give the pointer a target type first.
    #[error("Target type is unspecified (void*), cast the pointer first")]
    UnspecifiedTarget,

    /// The schema provider does not know the requested struct.
    #[error("Unknown struct - {0}")]
    UnknownStruct(String),

    /// The struct is known but has no field of that name.
    #[error("Unknown field {structure}.{field}")]
    UnknownField {
        /// Name of the struct that was searched
        structure: String,
        /// Name of the field that was requested
        field: String,
    },

    /// A block could not be added because its range collides with an existing block.
    #[error("Block of {size} bytes at {address:#x} overlaps an existing block")]
    BlockOverlap {
        /// Old address of the rejected block
        address: u64,
        /// Size of the rejected block
        size: u64,
    },

    /// A value does not fit into the destination width.
    ///
    /// Raised when narrowing pointers or pointer-width integers from a 64-bit encoding into a
    /// 32-bit one, and when converting between integer kinds of different width.
    #[error("Value {value:#x} does not fit into {width} bytes")]
    ValueOverflow {
        /// The value that was about to be written
        value: i128,
        /// Width of the destination in bytes
        width: u64,
    },

    /// No synthetic address range is left for a new block.
    ///
    /// This is the only error treated as fatal: the block table cannot grow any further.
    #[error("Emulated address space exhausted")]
    AddressSpaceExhausted,

    /// Structurally invalid input, such as a type chain ending in a pointer tag.
    ///
    /// The error includes the source location where the problem was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}
