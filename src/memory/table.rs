//! The emulated address space.
//!
//! A [`BlockTable`] holds every block of one open file, ordered by old address, and resolves any
//! saved address back to the block and byte offset containing it. It is the only owner of block
//! bytes: facades reach them exclusively through the table, one bounded read or write at a time.
//!
//! # Shared Table Semantics
//!
//! `BlockTable` is a cheap-clone handle around an `Arc`. Every facade derived from one file holds
//! a clone, so allocations made through one handle are immediately resolvable through all others.
//!
//! # Address Assignment
//!
//! Blocks ingested from a file keep their saved addresses. Blocks created with
//! [`BlockTable::allocate`] receive synthetic addresses starting at
//! [`TableConfig::base_address`], always above the end of the highest block seen so far, so new
//! blocks never collide with file-resident ones.
//!
//! # Thread Safety
//!
//! The ordered map is a lock-free skip list and each block guards its bytes with its own
//! `RwLock`, so resolution never takes a table-wide lock. Concurrent `insert` calls for
//! overlapping ranges are not serialized against each other; loaders are expected to ingest from
//! a single thread.
//!
//! # Example
//!
//! ```rust
//! use cmemview::{BlockTable, NOT_A_STRUCT};
//!
//! let table = BlockTable::new();
//! let block = table.allocate(NOT_A_STRUCT, 16, 4)?;
//!
//! table.write(block.old_address + 4, &[0xCA, 0xFE])?;
//! assert_eq!(table.read(block.old_address + 4, 2)?, vec![0xCA, 0xFE]);
//!
//! let (info, offset) = table.resolve(block.old_address + 15).unwrap();
//! assert_eq!((info, offset), (block, 15));
//! assert!(table.resolve(block.end()).is_none());
//! # Ok::<(), cmemview::Error>(())
//! ```

use std::{
    ops::Bound,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crossbeam_skiplist::SkipMap;

use crate::{
    memory::block::{Block, BlockCode, BlockInfo},
    Error, Result,
};

/// Controls how synthetic addresses are handed out by [`BlockTable::allocate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableConfig {
    /// Lowest synthetic address. Allocations never go below it.
    pub base_address: u64,
    /// Alignment of synthetic addresses, must be a power of two.
    pub alignment: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            base_address: 0x1000_0000,
            alignment: 16,
        }
    }
}

#[derive(Debug)]
struct TableInner {
    blocks: SkipMap<u64, Arc<Block>>,
    next_address: AtomicU64,
    config: TableConfig,
}

/// Ordered collection of blocks forming one emulated address space.
#[derive(Clone, Debug)]
pub struct BlockTable {
    inner: Arc<TableInner>,
}

impl BlockTable {
    /// Creates an empty table with the default [`TableConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TableConfig::default())
    }

    /// Creates an empty table with a custom [`TableConfig`].
    ///
    /// An alignment that is zero or not a power of two is rounded up to the next power of two.
    #[must_use]
    pub fn with_config(config: TableConfig) -> Self {
        let config = TableConfig {
            base_address: config.base_address.max(1),
            alignment: config.alignment.max(1).next_power_of_two(),
        };

        BlockTable {
            inner: Arc::new(TableInner {
                blocks: SkipMap::new(),
                next_address: AtomicU64::new(config.base_address),
                config,
            }),
        }
    }

    /// The configuration this table was created with.
    #[must_use]
    pub fn config(&self) -> TableConfig {
        self.inner.config
    }

    /// Returns `true` if both handles refer to the same table.
    #[must_use]
    pub fn same_table(&self, other: &BlockTable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of blocks in the table.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.inner.blocks.len()
    }

    /// Header snapshots of all blocks in ascending address order.
    #[must_use]
    pub fn blocks(&self) -> Vec<BlockInfo> {
        self.inner
            .blocks
            .iter()
            .map(|entry| entry.value().info)
            .collect()
    }

    /// Header snapshots of all blocks carrying `code`, in ascending address order.
    #[must_use]
    pub fn find_by_code(&self, code: BlockCode) -> Vec<BlockInfo> {
        self.inner
            .blocks
            .iter()
            .map(|entry| entry.value().info)
            .filter(|info| info.code == code)
            .collect()
    }

    /// Allocates a new zero-filled [`BlockCode::DATA`] block at a fresh synthetic address.
    ///
    /// # Arguments
    ///
    /// * `schema_index` - Struct type stored in the block, or [`crate::NOT_A_STRUCT`]
    /// * `size` - Length of the block in bytes
    /// * `count` - Number of elements stored in the block
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AddressSpaceExhausted`] when no synthetic address range is left.
    /// This is fatal for the table: no later allocation can succeed either.
    pub fn allocate(&self, schema_index: i32, size: u64, count: u32) -> Result<BlockInfo> {
        self.allocate_with_code(BlockCode::DATA, schema_index, size, count)
    }

    /// Like [`BlockTable::allocate`], with an explicit block code.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AddressSpaceExhausted`] when no synthetic address range is left.
    pub fn allocate_with_code(
        &self,
        code: BlockCode,
        schema_index: i32,
        size: u64,
        count: u32,
    ) -> Result<BlockInfo> {
        if usize::try_from(size).is_err() {
            return Err(Error::AddressSpaceExhausted);
        }

        let alignment = self.inner.config.alignment;
        // Zero sized blocks still reserve one byte so that no two blocks share a base address.
        let reserve = align_up(size.max(1), alignment).ok_or(Error::AddressSpaceExhausted)?;

        let mut base = 0;
        self.inner
            .next_address
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                let start = align_up(next, alignment)?;
                let end = start.checked_add(reserve)?;
                base = start;
                Some(end)
            })
            .map_err(|_| Error::AddressSpaceExhausted)?;

        let info = BlockInfo {
            code,
            old_address: base,
            size,
            count,
            schema_index,
        };
        self.inner.blocks.insert(base, Arc::new(Block::zeroed(info)));

        log::debug!(
            "allocated block {} at {:#x}: {} bytes, {} elements, schema index {}",
            code,
            base,
            size,
            count,
            schema_index
        );
        Ok(info)
    }

    /// Ingests a block read from a file, keeping its saved address.
    ///
    /// This is the surface a file loader uses to populate the table. The block size is the
    /// length of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BlockOverlap`] if the block's range collides with an existing
    /// block, and [`crate::Error::Malformed`] for empty blocks or blocks at the null address.
    pub fn insert(
        &self,
        code: BlockCode,
        old_address: u64,
        schema_index: i32,
        count: u32,
        data: Vec<u8>,
    ) -> Result<BlockInfo> {
        let size = data.len() as u64;
        if size == 0 {
            return Err(malformed_error!("Empty block {} at {:#x}", code, old_address));
        }
        if old_address == 0 {
            return Err(malformed_error!("Block {} claims the null address", code));
        }
        let Some(end) = old_address.checked_add(size) else {
            return Err(Error::BlockOverlap {
                address: old_address,
                size,
            });
        };

        let overlaps_below = self
            .inner
            .blocks
            .upper_bound(Bound::Included(&old_address))
            .is_some_and(|entry| entry.value().info.end() > old_address);
        let overlaps_above = self
            .inner
            .blocks
            .lower_bound(Bound::Included(&old_address))
            .is_some_and(|entry| *entry.key() < end);
        if overlaps_below || overlaps_above {
            return Err(Error::BlockOverlap {
                address: old_address,
                size,
            });
        }

        let info = BlockInfo {
            code,
            old_address,
            size,
            count,
            schema_index,
        };
        self.inner
            .blocks
            .insert(old_address, Arc::new(Block::new(info, data)));
        if let Some(next) = align_up(end, self.inner.config.alignment) {
            self.inner.next_address.fetch_max(next, Ordering::SeqCst);
        }

        log::debug!(
            "ingested block {} at {:#x}: {} bytes, {} elements, schema index {}",
            code,
            old_address,
            size,
            count,
            schema_index
        );
        Ok(info)
    }

    /// Resolves `address` to the block containing it and the byte offset into that block.
    ///
    /// Returns `None` for the null address and for addresses outside every block (dangling or
    /// foreign pointers). The upper bound of a block is exclusive.
    #[must_use]
    pub fn resolve(&self, address: u64) -> Option<(BlockInfo, u64)> {
        self.resolve_block(address)
            .map(|block| (block.info, address - block.info.old_address))
    }

    /// Returns `true` if `address` lies inside some block.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        self.resolve_block(address).is_some()
    }

    pub(crate) fn resolve_block(&self, address: u64) -> Option<Arc<Block>> {
        if address == 0 {
            return None;
        }

        let block = self
            .inner
            .blocks
            .upper_bound(Bound::Included(&address))
            .map(|entry| entry.value().clone())
            .filter(|block| block.info.contains(address));
        if block.is_none() {
            log::trace!("address {:#x} does not resolve to any block", address);
        }
        block
    }

    /// Runs `f` on the bytes `[address, address + len)`, which must lie inside a single block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range does not resolve or crosses the end of
    /// its block.
    pub(crate) fn with_bytes<R>(&self, address: u64, len: u64, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let (block, offset) = self.span(address, len)?;
        let data = read_lock!(block.data);
        // span() guarantees offset + len <= block size == data.len()
        #[allow(clippy::cast_possible_truncation)]
        let end = offset + len as usize;
        Ok(f(&data[offset..end]))
    }

    /// Mutable counterpart of [`BlockTable::with_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range does not resolve or crosses the end of
    /// its block.
    pub(crate) fn with_bytes_mut<R>(
        &self,
        address: u64,
        len: u64,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R> {
        let (block, offset) = self.span(address, len)?;
        let mut data = write_lock!(block.data);
        #[allow(clippy::cast_possible_truncation)]
        let end = offset + len as usize;
        Ok(f(&mut data[offset..end]))
    }

    fn span(&self, address: u64, len: u64) -> Result<(Arc<Block>, usize)> {
        let out_of_bounds = || Error::OutOfBounds { address, len };
        let block = if len == 0 {
            // An empty range may end a block without starting inside it
            self.preceding_block(address)
        } else {
            self.resolve_block(address)
        }
        .ok_or_else(out_of_bounds)?;
        let offset = block.span(address, len).ok_or_else(out_of_bounds)?;
        Ok((block, offset))
    }

    fn preceding_block(&self, address: u64) -> Option<Arc<Block>> {
        if address == 0 {
            return None;
        }
        self.inner
            .blocks
            .upper_bound(Bound::Included(&address))
            .map(|entry| entry.value().clone())
    }

    /// Copies `len` bytes starting at `address` out of the table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range does not lie inside a single block.
    pub fn read(&self, address: u64, len: u64) -> Result<Vec<u8>> {
        self.with_bytes(address, len, |bytes| bytes.to_vec())
    }

    /// Copies `data` into the table at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range does not lie inside a single block.
    pub fn write(&self, address: u64, data: &[u8]) -> Result<()> {
        self.with_bytes_mut(address, data.len() as u64, |dst| dst.copy_from_slice(data))
    }
}

impl Default for BlockTable {
    fn default() -> Self {
        Self::new()
    }
}

fn align_up(value: u64, alignment: u64) -> Option<u64> {
    Some(value.checked_add(alignment - 1)? & !(alignment - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NOT_A_STRUCT;

    fn table_with_file_blocks() -> BlockTable {
        let table = BlockTable::new();
        table
            .insert(BlockCode::DATA, 0x1000, NOT_A_STRUCT, 1, vec![0xAA; 0x100])
            .unwrap();
        table
            .insert(BlockCode::from_str_padded("OB"), 0x1100, 3, 2, vec![0xBB; 0x40])
            .unwrap();
        table
            .insert(BlockCode::DATA, 0x2000, NOT_A_STRUCT, 1, vec![0xCC; 0x10])
            .unwrap();
        table
    }

    #[test]
    fn resolve_inside_and_outside() {
        let table = table_with_file_blocks();

        for address in 0x1000..0x1100 {
            let (info, offset) = table.resolve(address).unwrap();
            assert_eq!(info.old_address, 0x1000);
            assert_eq!(offset, address - 0x1000);
        }
        for address in 0x1100..0x1140 {
            assert_eq!(table.resolve(address).unwrap().0.old_address, 0x1100);
        }

        assert!(table.resolve(0).is_none());
        assert!(table.resolve(0xFFF).is_none());
        assert!(table.resolve(0x1140).is_none());
        assert!(table.resolve(0x1FFF).is_none());
        assert!(table.resolve(0x2010).is_none());
        assert!(table.resolve(u64::MAX).is_none());
        assert!(table.contains(0x200F));
        assert!(!table.contains(0x2010));
    }

    #[test]
    fn insert_rejects_overlap() {
        let table = table_with_file_blocks();

        let below = table.insert(BlockCode::DATA, 0xFF0, NOT_A_STRUCT, 1, vec![0; 0x11]);
        assert!(matches!(below, Err(Error::BlockOverlap { address: 0xFF0, .. })));

        let inside = table.insert(BlockCode::DATA, 0x10F0, NOT_A_STRUCT, 1, vec![0; 4]);
        assert!(matches!(inside, Err(Error::BlockOverlap { .. })));

        let same = table.insert(BlockCode::DATA, 0x2000, NOT_A_STRUCT, 1, vec![0; 1]);
        assert!(matches!(same, Err(Error::BlockOverlap { .. })));

        let wrapping = table.insert(BlockCode::DATA, u64::MAX - 1, NOT_A_STRUCT, 1, vec![0; 4]);
        assert!(matches!(wrapping, Err(Error::BlockOverlap { .. })));

        // Adjacent blocks are fine
        table
            .insert(BlockCode::DATA, 0x1140, NOT_A_STRUCT, 1, vec![0; 0x10])
            .unwrap();
        assert_eq!(table.block_count(), 4);
    }

    #[test]
    fn insert_rejects_empty_and_null() {
        let table = BlockTable::new();
        assert!(matches!(
            table.insert(BlockCode::DATA, 0x1000, NOT_A_STRUCT, 1, Vec::new()),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            table.insert(BlockCode::DATA, 0, NOT_A_STRUCT, 1, vec![0; 4]),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn allocate_is_zeroed_aligned_and_monotonic() {
        let table = BlockTable::new();
        let first = table.allocate(NOT_A_STRUCT, 10, 10).unwrap();
        let second = table.allocate(5, 24, 1).unwrap();

        assert_eq!(first.old_address, TableConfig::default().base_address);
        assert_eq!(first.old_address % 16, 0);
        assert_eq!(second.old_address % 16, 0);
        assert!(second.old_address >= first.end());
        assert_eq!(second.schema_index, 5);
        assert!(second.is_struct());
        assert_eq!(table.read(first.old_address, 10).unwrap(), vec![0; 10]);
    }

    #[test]
    fn allocate_stays_above_file_blocks() {
        let table = BlockTable::new();
        table
            .insert(BlockCode::DATA, 0x2000_0000, NOT_A_STRUCT, 1, vec![0; 0x30])
            .unwrap();

        let block = table.allocate(NOT_A_STRUCT, 8, 1).unwrap();
        assert!(block.old_address >= 0x2000_0030);
        assert_eq!(table.resolve(block.old_address).unwrap().0, block);
    }

    #[test]
    fn allocate_zero_sized() {
        let table = BlockTable::new();
        let a = table.allocate(NOT_A_STRUCT, 0, 0).unwrap();
        let b = table.allocate(NOT_A_STRUCT, 0, 0).unwrap();
        assert_ne!(a.old_address, b.old_address);
        assert_eq!(table.block_count(), 2);
        assert!(!table.contains(a.old_address));
    }

    #[test]
    fn allocate_exhausted() {
        let table = BlockTable::with_config(TableConfig {
            base_address: u64::MAX - 32,
            alignment: 16,
        });
        assert!(matches!(
            table.allocate(NOT_A_STRUCT, 64, 1),
            Err(Error::AddressSpaceExhausted)
        ));
    }

    #[test]
    fn config_alignment_normalized() {
        let table = BlockTable::with_config(TableConfig {
            base_address: 0x3001,
            alignment: 12,
        });
        assert_eq!(table.config().alignment, 16);
        let block = table.allocate(NOT_A_STRUCT, 4, 1).unwrap();
        assert_eq!(block.old_address, 0x3010);
    }

    #[test]
    fn read_write_bounds() {
        let table = table_with_file_blocks();

        table.write(0x200D, &[1, 2, 3]).unwrap();
        assert_eq!(table.read(0x200C, 4).unwrap(), vec![0xCC, 1, 2, 3]);
        assert!(table.write(0x200F, &[1, 2]).is_err());

        // Crosses the end of the block
        let result = table.read(0x200C, 8);
        assert!(matches!(
            result,
            Err(Error::OutOfBounds {
                address: 0x200C,
                len: 8
            })
        ));
        // Adjacent blocks are separate allocations, reads never span them
        assert!(table.read(0x10FF, 2).is_err());
        assert!(table.write(0, &[1]).is_err());
    }

    #[test]
    fn empty_range_at_block_end() {
        let table = table_with_file_blocks();

        assert_eq!(table.read(0x2010, 0).unwrap(), Vec::<u8>::new());
        // 0x1100 ends the first block and starts the second
        assert!(table.read(0x1100, 0).is_ok());
        assert!(matches!(
            table.read(0x2011, 0),
            Err(Error::OutOfBounds { address: 0x2011, len: 0 })
        ));
        assert!(table.read(0xFFF, 0).is_err());
        assert!(table.read(0, 0).is_err());
    }

    #[test]
    fn blocks_in_address_order() {
        let table = BlockTable::new();
        table
            .insert(BlockCode::DATA, 0x3000, NOT_A_STRUCT, 1, vec![0; 4])
            .unwrap();
        table
            .insert(BlockCode::from_str_padded("OB"), 0x1000, 1, 1, vec![0; 4])
            .unwrap();

        let addresses: Vec<u64> = table.blocks().iter().map(|b| b.old_address).collect();
        assert_eq!(addresses, vec![0x1000, 0x3000]);

        let objects = table.find_by_code(BlockCode::from_str_padded("OB"));
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].schema_index, 1);
    }

    #[test]
    fn clones_share_blocks() {
        let table = BlockTable::new();
        let other = table.clone();
        let block = other.allocate(NOT_A_STRUCT, 4, 1).unwrap();

        assert!(table.same_table(&other));
        assert!(!table.same_table(&BlockTable::new()));
        assert!(table.contains(block.old_address));
    }
}
