//! Integration tests for copying structured values between files of different encodings.
//!
//! Both sides describe the same `Record` struct, but the source was saved by a 32-bit
//! little-endian writer and the destination is a 64-bit big-endian one, so every pointer and
//! pointer-width field changes size and every later field moves.

use std::sync::Arc;

use cmemview::{prelude::*, Result};

fn record_registry(with_flags: bool) -> Result<Arc<SchemaRegistry>> {
    let registry = SchemaRegistry::new();
    let vec2 = registry.register(
        StructDef::new("Vec2")
            .field("x", ScalarKind::Float32)
            .field("y", ScalarKind::Float32),
    )?;

    let record = registry.declare("Record");
    let mut fields = vec![
        FieldDef::new("id", ScalarKind::Int32),
        FieldDef::new("length", ScalarKind::PtrInt),
        FieldDef::new("pos", vec2),
        FieldDef::new(
            "samples",
            TypeChain::array_of(3, &TypeChain::scalar(ScalarKind::Int16)),
        ),
        FieldDef::new("owner", TypeChain::pointer_to(&TypeChain::structure(record))),
    ];
    if with_flags {
        fields.push(FieldDef::new("flags", ScalarKind::Int8));
    }
    registry.define(record, fields)?;
    Ok(Arc::new(registry))
}

fn new_record(factory: &Factory, registry: &SchemaRegistry) -> Result<StructView> {
    factory.new_struct_block(registry.struct_id("Record")?)
}

fn fill(record: &StructView, length: i64) -> Result<()> {
    record.write("id", 7i32)?;
    record.set_long("length", length)?;
    let pos = record.structure("pos")?;
    pos.write("x", 1.5f32)?;
    pos.write("y", -2.25f32)?;
    record.array("samples")?.from_array(&[100i16, -200, 300])?;
    record.set("owner", &Value::Pointer(record.address_of()))?;
    Ok(())
}

#[test]
fn layouts_differ_between_encodings() -> Result<()> {
    let registry = record_registry(false)?;
    let record = registry.struct_id("Record")?;

    assert_eq!(registry.struct_size(record, Encoding::LE32)?, 26);
    assert_eq!(registry.struct_size(record, Encoding::BE64)?, 34);
    assert_eq!(registry.field_offset(record, "samples", Encoding::LE32)?, 16);
    assert_eq!(registry.field_offset(record, "samples", Encoding::BE64)?, 20);
    Ok(())
}

#[test]
fn copy_le32_to_be64() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let src_schema = record_registry(false)?;
    let src_factory = Factory::new(BlockTable::new(), Encoding::LE32, src_schema.clone());
    let src = new_record(&src_factory, &src_schema)?;
    fill(&src, -5)?;

    let dst_schema = record_registry(false)?;
    let dst_factory = Factory::new(BlockTable::new(), Encoding::BE64, dst_schema.clone());
    let dst = new_record(&dst_factory, &dst_schema)?;

    dst.view()
        .reinterpret_copy(dst.address(), &Value::Struct(src.clone()))?;

    assert_eq!(dst.read::<i32>("id")?, 7);
    assert_eq!(dst.get_long("length")?, -5);
    assert_eq!(dst.structure("pos")?.read::<f32>("x")?, 1.5);
    assert_eq!(dst.structure("pos")?.read::<f32>("y")?, -2.25);
    assert_eq!(dst.array("samples")?.to_short_array()?, vec![100, -200, 300]);
    assert_eq!(dst.pointer("owner")?.address(), src.address());

    let table = dst_factory.table();
    assert_eq!(table.read(dst.address() + 4, 8)?, (-5i64).to_be_bytes().to_vec());
    assert_eq!(table.read(dst.address() + 12, 4)?, 1.5f32.to_be_bytes().to_vec());
    assert_eq!(table.read(dst.address() + 20, 2)?, 100i16.to_be_bytes().to_vec());
    assert_eq!(
        table.read(dst.address() + 26, 8)?,
        src.address().to_be_bytes().to_vec()
    );
    Ok(())
}

#[test]
fn store_through_struct_field_reencodes() -> Result<()> {
    let src_schema = record_registry(false)?;
    let src_factory = Factory::new(BlockTable::new(), Encoding::LE32, src_schema.clone());
    let src = new_record(&src_factory, &src_schema)?;
    fill(&src, 12)?;

    let dst_schema = record_registry(false)?;
    let dst_factory = Factory::new(BlockTable::new(), Encoding::BE64, dst_schema.clone());
    let dst = new_record(&dst_factory, &dst_schema)?;

    dst.set("pos", &src.get("pos")?)?;
    dst.set("samples", &src.get("samples")?)?;

    assert_eq!(dst.structure("pos")?.read::<f32>("y")?, -2.25);
    assert_eq!(dst.array("samples")?.to_short_array()?, vec![100, -200, 300]);
    assert_eq!(dst.read::<i32>("id")?, 0);
    Ok(())
}

#[test]
fn extra_destination_fields_are_untouched() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let src_schema = record_registry(false)?;
    let src_factory = Factory::new(BlockTable::new(), Encoding::LE32, src_schema.clone());
    let src = new_record(&src_factory, &src_schema)?;
    fill(&src, 3)?;

    let dst_schema = record_registry(true)?;
    let dst_factory = Factory::new(BlockTable::new(), Encoding::LE64, dst_schema.clone());
    let dst = new_record(&dst_factory, &dst_schema)?;
    dst.write("flags", 0x5ai8)?;

    dst.view()
        .reinterpret_copy(dst.address(), &Value::Struct(src))?;

    assert_eq!(dst.read::<i32>("id")?, 7);
    assert_eq!(dst.get_long("length")?, 3);
    assert_eq!(dst.read::<i8>("flags")?, 0x5a);
    Ok(())
}

#[test]
fn narrowing_pointer_width_integer_fails() -> Result<()> {
    let src_schema = record_registry(false)?;
    let src_factory = Factory::new(BlockTable::new(), Encoding::BE64, src_schema.clone());
    let src = new_record(&src_factory, &src_schema)?;
    fill(&src, 1 << 40)?;

    let dst_schema = record_registry(false)?;
    let dst_factory = Factory::new(BlockTable::new(), Encoding::LE32, dst_schema.clone());
    let dst = new_record(&dst_factory, &dst_schema)?;

    let result = dst
        .view()
        .reinterpret_copy(dst.address(), &Value::Struct(src));
    assert!(matches!(result, Err(Error::ValueOverflow { .. })));
    Ok(())
}

#[test]
fn narrowing_pointer_fails() -> Result<()> {
    let high = BlockTable::with_config(TableConfig {
        base_address: 0x1_0000_0000,
        alignment: 16,
    });
    let src_schema = record_registry(false)?;
    let src_factory = Factory::new(high, Encoding::LE64, src_schema.clone());
    let src = new_record(&src_factory, &src_schema)?;
    fill(&src, 1)?;
    assert!(src.address() >= 0x1_0000_0000);

    let dst_schema = record_registry(false)?;
    let dst_factory = Factory::new(BlockTable::new(), Encoding::BE32, dst_schema.clone());
    let dst = new_record(&dst_factory, &dst_schema)?;

    let result = dst
        .view()
        .reinterpret_copy(dst.address(), &Value::Struct(src));
    assert!(matches!(result, Err(Error::ValueOverflow { .. })));
    Ok(())
}

#[test]
fn unknown_struct_in_destination_schema() -> Result<()> {
    let src_schema = record_registry(false)?;
    let src_factory = Factory::new(BlockTable::new(), Encoding::LE32, src_schema.clone());
    let src = new_record(&src_factory, &src_schema)?;

    let empty = Arc::new(SchemaRegistry::new());
    let table = BlockTable::new();
    let block = table.allocate(NOT_A_STRUCT, 64, 1)?;
    let dst = MemoryView::new(block.old_address, table, Encoding::LE64, empty);

    assert!(matches!(
        dst.reinterpret_copy(block.old_address, &Value::Struct(src)),
        Err(Error::UnknownStruct(name)) if name == "Record"
    ));
    Ok(())
}
