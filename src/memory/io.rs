//! Byte-order aware scalar reading and writing on raw buffers.
//!
//! This is the lowest layer of the memory model: block bytes are plain `Vec<u8>` and every
//! scalar read or write ends up here, decoded with the [`ByteOrder`] of the file the bytes came
//! from.
//!
//! # Key Components
//!
//! - [`ScalarIO`] - Trait for fixed-size scalars convertible from/to LE and BE byte arrays
//! - [`read_at`] / [`write_at`] - Bounds-checked access with offset auto-advance
//! - [`read_ptr_at`] / [`write_ptr_at`] - Pointer-width unsigned values (addresses)
//! - [`read_ptr_int_at`] / [`write_ptr_int_at`] - Pointer-width signed integers
//!
//! # Usage Examples
//!
//! ```rust
//! use cmemview::{memory::io::{read_at, write_at}, ByteOrder};
//!
//! let mut data = [0u8; 6];
//! let mut offset = 0;
//! write_at(&mut data, &mut offset, 1u16, ByteOrder::BigEndian)?;
//! write_at(&mut data, &mut offset, -2i32, ByteOrder::LittleEndian)?;
//! assert_eq!(offset, 6);
//! assert_eq!(data, [0x00, 0x01, 0xFE, 0xFF, 0xFF, 0xFF]);
//!
//! let mut offset = 2;
//! let value: i32 = read_at(&data, &mut offset, ByteOrder::LittleEndian)?;
//! assert_eq!(value, -2);
//! # Ok::<(), cmemview::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All functions return [`crate::Error::OutOfBounds`] if the buffer is too short. The `address`
//! reported in that case is the buffer offset, since the codec knows nothing about the emulated
//! address space; callers that do (the facades) check bounds before calling in here.

use crate::{
    memory::encoding::{ByteOrder, Encoding, PointerWidth},
    Error, Result,
};

/// Trait for fixed-size scalars that can be decoded from and encoded to a byte array in either
/// byte order.
///
/// The associated `Bytes` type is the fixed-size array for the scalar (e.g. `[u8; 4]` for `u32`).
pub trait ScalarIO: Sized + Copy {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;

    /// Size of the scalar in bytes.
    #[must_use]
    fn size() -> usize {
        std::mem::size_of::<Self::Bytes>()
    }
}

macro_rules! impl_scalar_io {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ScalarIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )+
    };
}

impl_scalar_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

fn short_buffer(offset: usize, len: usize) -> Error {
    Error::OutOfBounds {
        address: offset as u64,
        len: len as u64,
    }
}

/// Reads a `T` at `offset` in the given byte order and advances `offset` past it.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
/// * `offset` - Position to read at, advanced by `T::size()` on success
/// * `order` - Byte order to decode with
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than `T::size()` bytes remain.
pub fn read_at<T: ScalarIO>(data: &[u8], offset: &mut usize, order: ByteOrder) -> Result<T> {
    let size = T::size();
    let Some(end) = offset.checked_add(size) else {
        return Err(short_buffer(*offset, size));
    };
    if end > data.len() {
        return Err(short_buffer(*offset, size));
    }

    let Ok(bytes) = data[*offset..end].try_into() else {
        return Err(short_buffer(*offset, size));
    };
    *offset = end;

    Ok(match order {
        ByteOrder::LittleEndian => T::from_le_bytes(bytes),
        ByteOrder::BigEndian => T::from_be_bytes(bytes),
    })
}

/// Writes `value` at `offset` in the given byte order and advances `offset` past it.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than `T::size()` bytes remain.
pub fn write_at<T: ScalarIO>(
    data: &mut [u8],
    offset: &mut usize,
    value: T,
    order: ByteOrder,
) -> Result<()> {
    let size = T::size();
    let Some(end) = offset.checked_add(size) else {
        return Err(short_buffer(*offset, size));
    };
    if end > data.len() {
        return Err(short_buffer(*offset, size));
    }

    let bytes = match order {
        ByteOrder::LittleEndian => value.to_le_bytes(),
        ByteOrder::BigEndian => value.to_be_bytes(),
    };
    data[*offset..end].copy_from_slice(bytes.as_ref());
    *offset = end;

    Ok(())
}

/// Reads an unsigned pointer-width value (an address) under `encoding`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too short.
pub fn read_ptr_at(data: &[u8], offset: &mut usize, encoding: Encoding) -> Result<u64> {
    match encoding.pointer_width() {
        PointerWidth::Bits32 => Ok(u64::from(read_at::<u32>(
            data,
            offset,
            encoding.byte_order(),
        )?)),
        PointerWidth::Bits64 => read_at::<u64>(data, offset, encoding.byte_order()),
    }
}

/// Writes an unsigned pointer-width value (an address) under `encoding`.
///
/// # Errors
///
/// Returns [`crate::Error::ValueOverflow`] if the address needs more than 4 bytes on a 32-bit
/// encoding, or [`crate::Error::OutOfBounds`] if the buffer is too short.
pub fn write_ptr_at(data: &mut [u8], offset: &mut usize, value: u64, encoding: Encoding) -> Result<()> {
    match encoding.pointer_width() {
        PointerWidth::Bits32 => {
            let narrow = u32::try_from(value).map_err(|_| Error::ValueOverflow {
                value: i128::from(value),
                width: 4,
            })?;
            write_at(data, offset, narrow, encoding.byte_order())
        }
        PointerWidth::Bits64 => write_at(data, offset, value, encoding.byte_order()),
    }
}

/// Reads a signed pointer-width integer under `encoding`, sign-extended to 64 bits.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too short.
pub fn read_ptr_int_at(data: &[u8], offset: &mut usize, encoding: Encoding) -> Result<i64> {
    match encoding.pointer_width() {
        PointerWidth::Bits32 => Ok(i64::from(read_at::<i32>(
            data,
            offset,
            encoding.byte_order(),
        )?)),
        PointerWidth::Bits64 => read_at::<i64>(data, offset, encoding.byte_order()),
    }
}

/// Writes a signed pointer-width integer under `encoding`.
///
/// # Errors
///
/// Returns [`crate::Error::ValueOverflow`] if the value is outside the `i32` range on a 32-bit
/// encoding, or [`crate::Error::OutOfBounds`] if the buffer is too short.
pub fn write_ptr_int_at(
    data: &mut [u8],
    offset: &mut usize,
    value: i64,
    encoding: Encoding,
) -> Result<()> {
    match encoding.pointer_width() {
        PointerWidth::Bits32 => {
            let narrow = i32::try_from(value).map_err(|_| Error::ValueOverflow {
                value: i128::from(value),
                width: 4,
            })?;
            write_at(data, offset, narrow, encoding.byte_order())
        }
        PointerWidth::Bits64 => write_at(data, offset, value, encoding.byte_order()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u32() {
        let mut offset = 0;
        let result: u32 = read_at(&TEST_BUFFER, &mut offset, ByteOrder::LittleEndian).unwrap();
        assert_eq!(result, 0x0403_0201);
        assert_eq!(offset, 4);
    }

    #[test]
    fn read_be_u32() {
        let mut offset = 0;
        let result: u32 = read_at(&TEST_BUFFER, &mut offset, ByteOrder::BigEndian).unwrap();
        assert_eq!(result, 0x0102_0304);
    }

    #[test]
    fn read_le_i16_sequence() {
        let mut offset = 0;
        let first: i16 = read_at(&TEST_BUFFER, &mut offset, ByteOrder::LittleEndian).unwrap();
        let second: i16 = read_at(&TEST_BUFFER, &mut offset, ByteOrder::LittleEndian).unwrap();
        assert_eq!(first, 0x0201);
        assert_eq!(second, 0x0403);
        assert_eq!(offset, 4);
    }

    #[test]
    fn floats_roundtrip_both_orders() {
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let mut data = [0u8; 12];
            let mut offset = 0;
            write_at(&mut data, &mut offset, 1.5f32, order).unwrap();
            write_at(&mut data, &mut offset, -0.25f64, order).unwrap();

            let mut offset = 0;
            let a: f32 = read_at(&data, &mut offset, order).unwrap();
            let b: f64 = read_at(&data, &mut offset, order).unwrap();
            assert_eq!(a, 1.5);
            assert_eq!(b, -0.25);
        }
    }

    #[test]
    fn extremes_roundtrip() {
        let mut data = [0u8; 15];
        let mut offset = 0;
        write_at(&mut data, &mut offset, i8::MIN, ByteOrder::BigEndian).unwrap();
        write_at(&mut data, &mut offset, i16::MAX, ByteOrder::BigEndian).unwrap();
        write_at(&mut data, &mut offset, i32::MIN, ByteOrder::BigEndian).unwrap();
        write_at(&mut data, &mut offset, i64::MAX, ByteOrder::BigEndian).unwrap();

        let mut offset = 0;
        assert_eq!(read_at::<i8>(&data, &mut offset, ByteOrder::BigEndian).unwrap(), i8::MIN);
        assert_eq!(read_at::<i16>(&data, &mut offset, ByteOrder::BigEndian).unwrap(), i16::MAX);
        assert_eq!(read_at::<i32>(&data, &mut offset, ByteOrder::BigEndian).unwrap(), i32::MIN);
        assert_eq!(read_at::<i64>(&data, &mut offset, ByteOrder::BigEndian).unwrap(), i64::MAX);
    }

    #[test]
    fn errors() {
        let buffer = [0xFF, 0xFF, 0xFF];

        let mut offset = 0;
        let result = read_at::<u32>(&buffer, &mut offset, ByteOrder::LittleEndian);
        assert!(matches!(result, Err(Error::OutOfBounds { .. })));
        assert_eq!(offset, 0);

        let mut offset = usize::MAX;
        let result = read_at::<u8>(&buffer, &mut offset, ByteOrder::LittleEndian);
        assert!(matches!(result, Err(Error::OutOfBounds { .. })));

        let mut out = [0u8; 1];
        let mut offset = 0;
        let result = write_at(&mut out, &mut offset, 0u16, ByteOrder::BigEndian);
        assert!(matches!(result, Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn pointer_width_values() {
        let mut data = [0u8; 8];
        let mut offset = 0;
        write_ptr_at(&mut data, &mut offset, 0xDEAD_BEEF, Encoding::BE32).unwrap();
        assert_eq!(offset, 4);
        assert_eq!(&data[..4], &[0xDE, 0xAD, 0xBE, 0xEF]);

        let mut offset = 0;
        assert_eq!(read_ptr_at(&data, &mut offset, Encoding::BE32).unwrap(), 0xDEAD_BEEF);

        let mut offset = 0;
        write_ptr_at(&mut data, &mut offset, 0x1_0000_0000, Encoding::LE64).unwrap();
        assert_eq!(offset, 8);
        let mut offset = 0;
        assert_eq!(read_ptr_at(&data, &mut offset, Encoding::LE64).unwrap(), 0x1_0000_0000);
    }

    #[test]
    fn pointer_width_narrowing_fails() {
        let mut data = [0u8; 8];
        let mut offset = 0;
        let result = write_ptr_at(&mut data, &mut offset, 0x1_0000_0000, Encoding::LE32);
        assert!(matches!(result, Err(Error::ValueOverflow { width: 4, .. })));

        let result = write_ptr_int_at(&mut data, &mut offset, i64::from(i32::MIN) - 1, Encoding::LE32);
        assert!(matches!(result, Err(Error::ValueOverflow { width: 4, .. })));
    }

    #[test]
    fn pointer_width_int_sign_extends() {
        let mut data = [0u8; 4];
        let mut offset = 0;
        write_ptr_int_at(&mut data, &mut offset, -5, Encoding::LE32).unwrap();
        let mut offset = 0;
        assert_eq!(read_ptr_int_at(&data, &mut offset, Encoding::LE32).unwrap(), -5);
    }
}
