//! Tree-based codecs for the individual asset formats.

pub mod ani;
pub mod cir;

use crate::{
    errors::FormatError,
    utils::mem_reader::MemReader,
    value::{Map, MapExt as _, TreeError, Value},
};

/// Reads one float per field name into a mapping, in the order given.
pub(crate) fn read_floats<M: MemReader>(
    reader: &mut M,
    fields: &[&'static str],
) -> Result<Map, FormatError> {
    let mut map = Map::with_capacity(fields.len());
    for &field in fields {
        map.insert(field.to_string(), Value::Float(reader.read_f32_le(field)?));
    }
    Ok(map)
}

/// Reads a u32 length followed by that many bytes, storing both in `tree`.
pub(crate) fn read_counted_bytes<M: MemReader>(
    reader: &mut M,
    tree: &mut Map,
    len_key: &'static str,
    key: &'static str,
) -> Result<(), FormatError> {
    let len = reader.read_u32_le(len_key)?;
    let bytes = reader.read_bytes(key, len as usize)?;
    tree.insert(len_key.to_string(), Value::UInt(len));
    tree.insert(key.to_string(), Value::Bytes(bytes));
    Ok(())
}

/// Reads a u32 count followed by that many records, storing both in `tree`.
///
/// Records are decoded one at a time, so a corrupt count runs out of data
/// instead of reserving memory for it.
pub(crate) fn read_records<M, F>(
    reader: &mut M,
    tree: &mut Map,
    count_key: &'static str,
    key: &'static str,
    mut read_record: F,
) -> Result<(), FormatError>
where
    M: MemReader,
    F: FnMut(&mut M) -> Result<Value, FormatError>,
{
    let count = reader.read_u32_le(count_key)?;
    let mut records = Vec::new();
    for index in 0..count as usize {
        records.push(reader.in_record(key, index, &mut read_record)?);
    }
    tree.insert(count_key.to_string(), Value::UInt(count));
    tree.insert(key.to_string(), Value::Seq(records));
    Ok(())
}

/// Runs `normalize` on every mapping in the sequence under `key`, then
/// recomputes `count_key` from the sequence length.
pub(crate) fn normalize_records<F>(
    tree: &mut Map,
    count_key: &str,
    key: &str,
    mut normalize: F,
) -> Result<(), TreeError>
where
    F: FnMut(&mut Map) -> Result<(), TreeError>,
{
    for record in tree.get_seq_mut(key)? {
        let record = record
            .as_map_mut()
            .map_err(|source| TreeError::FieldMismatch {
                key: key.to_string(),
                source,
            })?;
        normalize(record)?;
    }
    tree.set_derived_len(count_key, key)
}
