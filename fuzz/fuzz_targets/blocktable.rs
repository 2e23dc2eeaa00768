#![no_main]

use std::sync::Arc;

use cmemview::{
    BlockCode, BlockTable, Encoding, MemoryView, Pointer, ScalarKind, SchemaRegistry, TypeChain,
};
use libfuzzer_sys::fuzz_target;

// Input: a 32-bit big-endian dump split into up to 8 blocks, followed by pointer chasing
// through whatever addresses the dump contains.
fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    let table = BlockTable::new();
    for (i, chunk) in data.chunks(64).take(8).enumerate() {
        let address = u64::from(u32::from_be_bytes([chunk[0], chunk.get(1).copied().unwrap_or(0), 0, 0]))
            + (i as u64) * 0x100;
        let _ = table.insert(BlockCode::DATA, address, -1, 1, chunk.to_vec());
    }

    let view = MemoryView::new(0, table.clone(), Encoding::BE32, Arc::new(SchemaRegistry::new()));
    let int = TypeChain::scalar(ScalarKind::Int32);
    let target = TypeChain::pointer_to(&TypeChain::pointer_to(&int));

    for block in table.blocks() {
        let mut cursor = Pointer::new(view.at(block.old_address), target.clone());
        for _ in 0..16 {
            match cursor.dereference() {
                Ok(value) => match value.into_pointer() {
                    Ok(next) => cursor = next.cast(target.clone()),
                    Err(_) => break,
                },
                Err(_) => break,
            }
            let _ = cursor.plus(1);
            let _ = cursor.to_array_view(4);
        }
    }
});
