//! Blocks: contiguous regions of the emulated address space.
//!
//! A [`Block`] is what a saved file calls a block: the bytes of one allocation of the writing
//! process, together with the address that allocation had when the file was written. Blocks are
//! owned exclusively by a [`crate::BlockTable`]; everything outside the table only ever sees a
//! [`BlockInfo`] snapshot of the header.

use std::sync::RwLock;

/// Schema index of blocks that do not hold struct instances (raw and array data).
pub const NOT_A_STRUCT: i32 = -1;

/// Four character block identifier, as saved files tag their blocks (`DATA`, `OB\0\0`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockCode(pub [u8; 4]);

impl BlockCode {
    /// Generic data block, used for allocations unless told otherwise.
    pub const DATA: BlockCode = BlockCode(*b"DATA");
    /// End-of-file marker block.
    pub const ENDB: BlockCode = BlockCode(*b"ENDB");

    /// Creates a code from up to four ASCII characters, zero padded.
    ///
    /// ```rust
    /// use cmemview::BlockCode;
    ///
    /// assert_eq!(BlockCode::from_str_padded("OB"), BlockCode(*b"OB\0\0"));
    /// ```
    #[must_use]
    pub fn from_str_padded(code: &str) -> Self {
        let mut bytes = [0u8; 4];
        for (dst, src) in bytes.iter_mut().zip(code.bytes()) {
            *dst = src;
        }
        BlockCode(bytes)
    }
}

impl std::fmt::Display for BlockCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0.iter().take_while(|b| **b != 0) {
            write!(f, "{}", char::from(*byte))?;
        }
        Ok(())
    }
}

/// Header of a block, detached from its bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    /// Block identifier
    pub code: BlockCode,
    /// Base address the block had in the process that wrote the file
    pub old_address: u64,
    /// Length of the block in bytes
    pub size: u64,
    /// Number of elements stored in the block
    pub count: u32,
    /// Schema index of the struct type stored, or a negative value for raw data
    pub schema_index: i32,
}

impl BlockInfo {
    /// First address past the end of the block.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.old_address.saturating_add(self.size)
    }

    /// Returns `true` if `address` lies within `[old_address, old_address + size)`.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        address >= self.old_address && address < self.end()
    }

    /// Returns `true` if the block holds struct instances.
    #[must_use]
    pub fn is_struct(&self) -> bool {
        self.schema_index >= 0
    }
}

/// A block header plus the bytes backing it.
#[derive(Debug)]
pub(crate) struct Block {
    pub(crate) info: BlockInfo,
    pub(crate) data: RwLock<Vec<u8>>,
}

impl Block {
    pub(crate) fn new(info: BlockInfo, data: Vec<u8>) -> Self {
        Block {
            info,
            data: RwLock::new(data),
        }
    }

    pub(crate) fn zeroed(info: BlockInfo) -> Self {
        // Allocation sizes are bounded by the synthetic address range, which fits usize on
        // every supported host.
        #[allow(clippy::cast_possible_truncation)]
        let len = info.size as usize;
        Block::new(info, vec![0u8; len])
    }

    /// Offset of `address` into this block if `[address, address + len)` lies inside it.
    pub(crate) fn span(&self, address: u64, len: u64) -> Option<usize> {
        if !self.info.contains(address) && !(len == 0 && address == self.info.end()) {
            return None;
        }
        let offset = address - self.info.old_address;
        let end = offset.checked_add(len)?;
        if end > self.info.size {
            return None;
        }
        usize::try_from(offset).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(address: u64, size: u64) -> BlockInfo {
        BlockInfo {
            code: BlockCode::DATA,
            old_address: address,
            size,
            count: 1,
            schema_index: NOT_A_STRUCT,
        }
    }

    #[test]
    fn code_display() {
        assert_eq!(BlockCode::DATA.to_string(), "DATA");
        assert_eq!(BlockCode::from_str_padded("OB").to_string(), "OB");
        assert_eq!(BlockCode::from_str_padded("TOOLONG"), BlockCode(*b"TOOL"));
    }

    #[test]
    fn contains_is_half_open() {
        let header = info(0x100, 0x10);
        assert!(!header.contains(0xFF));
        assert!(header.contains(0x100));
        assert!(header.contains(0x10F));
        assert!(!header.contains(0x110));
        assert!(!header.is_struct());
    }

    #[test]
    fn span_checks_both_ends() {
        let block = Block::zeroed(info(0x100, 0x10));
        assert_eq!(block.span(0x100, 0x10), Some(0));
        assert_eq!(block.span(0x10C, 4), Some(0xC));
        assert_eq!(block.span(0x10D, 4), None);
        assert_eq!(block.span(0xFC, 8), None);
        assert_eq!(block.span(0x110, 0), Some(0x10));
        assert_eq!(block.span(0x108, u64::MAX), None);
        assert_eq!(read_lock!(block.data).len(), 0x10);
    }
}
