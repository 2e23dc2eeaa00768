//! Shared fixtures for unit tests.

use std::sync::Arc;

use crate::{
    facade::{MemoryView, Pointer, StructView},
    memory::{BlockTable, Encoding, NOT_A_STRUCT},
    schema::{CStruct, FieldDef, ScalarKind, SchemaRegistry, StructDef, TypeChain},
    Result,
};

/// Hand-written accessor type, shaped like generated ones.
pub struct Link(StructView);

impl CStruct for Link {
    const NAME: &'static str = "Link";

    fn fields(registry: &SchemaRegistry) -> Result<Vec<FieldDef>> {
        let link = TypeChain::pointer_to(&TypeChain::structure(registry.declare(Self::NAME)));
        Ok(vec![
            FieldDef::new("next", link.clone()),
            FieldDef::new("prev", link),
            FieldDef::new("value", ScalarKind::Int32),
        ])
    }

    fn from_view(view: StructView) -> Self {
        Link(view)
    }

    fn view(&self) -> &StructView {
        &self.0
    }
}

impl Link {
    pub fn next(&self) -> Result<Pointer> {
        self.0.pointer("next")
    }

    pub fn value(&self) -> Result<i32> {
        self.0.read("value")
    }

    pub fn set_value(&self, value: i32) -> Result<()> {
        self.0.write("value", value)
    }
}

/// Registry with `Vec3` (id 0), the self-referential `Link` (id 1) and `Mixed` (id 2).
///
/// `Mixed` holds one field of every kind: `tag: char`, `length: long`, `scale: double`,
/// `origin: Vec3`, `samples: short[4]`, `owner: Link*`.
pub fn sample_registry() -> SchemaRegistry {
    let registry = SchemaRegistry::new();
    let vec3 = registry
        .register(
            StructDef::new("Vec3")
                .field("x", ScalarKind::Float32)
                .field("y", ScalarKind::Float32)
                .field("z", ScalarKind::Float32),
        )
        .unwrap();
    let link = registry.register_type::<Link>().unwrap();
    registry
        .register(
            StructDef::new("Mixed")
                .field("tag", ScalarKind::Int8)
                .field("length", ScalarKind::PtrInt)
                .field("scale", ScalarKind::Float64)
                .field("origin", vec3)
                .field("samples", TypeChain::array_of(4, &ScalarKind::Int16.into()))
                .field("owner", TypeChain::pointer_to(&TypeChain::structure(link))),
        )
        .unwrap();
    registry
}

/// A view at the base of a fresh `size` byte block in a fresh table over [`sample_registry`].
pub fn sample_view(encoding: Encoding, size: usize) -> MemoryView {
    let table = BlockTable::new();
    let block = table.allocate(NOT_A_STRUCT, size as u64, 1).unwrap();
    MemoryView::new(block.old_address, table, encoding, Arc::new(sample_registry()))
}
