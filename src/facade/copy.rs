//! Field-by-field copying between views of different encodings or schemas.
//!
//! A raw byte copy is only correct when source and destination agree on every size and offset.
//! Otherwise values are decomposed through the source schema under the source encoding and
//! re-encoded one field at a time under the destination's. Pointer and pointer-width integer
//! fields that do not fit a narrower destination fail with [`Error::ValueOverflow`].

use crate::{
    facade::{view::checked_offset, ArrayView, MemoryView, StructView, Value},
    schema::{SchemaProvider, StructId, TypeChain, TypeTag},
    Error, Result,
};

/// Writes `source` as `ty` at `address` in `dst`, recursing into structs and arrays.
pub(crate) fn transfer(dst: &MemoryView, address: u64, ty: &TypeChain, source: &Value) -> Result<()> {
    match (ty.head(), source) {
        (TypeTag::Struct(id), Value::Struct(src)) => transfer_struct(dst, address, id, src),
        (TypeTag::Array(len), Value::Array(src)) => transfer_array(dst, address, ty, len, src),
        (TypeTag::Struct(_) | TypeTag::Array(_), other) => Err(Error::TypeMismatch {
            expected: ty.to_string(),
            found: other.type_name(),
        }),
        _ => dst.store(address, ty, source),
    }
}

fn transfer_struct(dst: &MemoryView, address: u64, id: StructId, src: &StructView) -> Result<()> {
    let dst_schema = dst.provider();
    let src_schema = src.view().provider();
    let name = dst_schema.struct_name(id)?;

    for field in dst_schema.struct_fields(id)?.iter() {
        let src_offset = match src_schema.field_offset(src.id(), &field.name, src.view().encoding()) {
            Ok(offset) => offset,
            Err(Error::UnknownField { .. }) => {
                log::warn!(
                    "{}.{} has no counterpart in the source struct, left untouched",
                    name,
                    field.name
                );
                continue;
            }
            Err(error) => return Err(error),
        };
        let src_ty = src_schema.field_type(src.id(), &field.name)?;
        let value = src
            .view()
            .load(checked_offset(src.address(), src_offset)?, &src_ty)?;

        let dst_offset = dst_schema.field_offset(id, &field.name, dst.encoding())?;
        transfer(dst, checked_offset(address, dst_offset)?, &field.ty, &value)?;
    }
    Ok(())
}

fn transfer_array(
    dst: &MemoryView,
    address: u64,
    ty: &TypeChain,
    len: u32,
    src: &ArrayView,
) -> Result<()> {
    let element = ty.tail();
    let element_size = dst.size_of(&element)?;
    if len != src.len() {
        log::warn!(
            "copying {} elements into an array of {} at {:#x}",
            src.len(),
            len,
            address
        );
    }

    for index in 0..len.min(src.len()) {
        let value = src.get(index)?;
        let offset = u64::from(index)
            .checked_mul(element_size)
            .ok_or(Error::OutOfBounds {
                address,
                len: u64::MAX,
            })?;
        transfer(dst, checked_offset(address, offset)?, &element, &value)?;
    }
    Ok(())
}

/// The type `source` has when written through `dst`: its own type with every struct looked up
/// by name in the destination schema.
pub(crate) fn destination_type(dst: &MemoryView, source: &Value) -> Result<TypeChain> {
    match source {
        Value::Struct(s) => Ok(TypeChain::structure(
            dst.provider().struct_id(&s.name()?)?,
        )),
        Value::Array(a) => translate(a.type_chain(), a.view().provider(), dst.provider()),
        Value::Pointer(p) => Ok(TypeChain::pointer_to(&translate(
            p.target_type(),
            p.view().provider(),
            dst.provider(),
        )?)),
        scalar => scalar
            .scalar_kind()
            .map(TypeChain::scalar)
            .ok_or_else(|| malformed_error!("{} is not a scalar", scalar.type_name())),
    }
}

fn translate(ty: &TypeChain, from: &dyn SchemaProvider, to: &dyn SchemaProvider) -> Result<TypeChain> {
    let tags = ty
        .tags()
        .iter()
        .map(|tag| match tag {
            TypeTag::Struct(id) => Ok(TypeTag::Struct(to.struct_id(&from.struct_name(*id)?)?)),
            other => Ok(*other),
        })
        .collect::<Result<Vec<TypeTag>>>()?;
    TypeChain::new(tags)
}
