//! The load/normalize/pack lifecycle shared by the tree-based codecs.

use std::path::Path;

use bytes::BufMut;

use crate::{
    errors::{FormatError, LoadError, PackError},
    value::{self, Map, TreeError, TypeMismatch, Value, ValueKind},
};

/// A binary format decoded into an ordered [`Value`] tree.
///
/// Implementors describe how to decode their wire format and which fields of
/// the tree are derived counts. Packing is generic: the tree is flattened in
/// insertion order, so `parse_binary` must produce fields in wire order and
/// include every count field the format stores.
pub trait DataCodec {
    /// The tree owned by this codec instance.
    fn tree(&self) -> &Map;

    fn tree_mut(&mut self) -> &mut Map;

    /// Decodes a complete file.
    fn parse_binary(data: &[u8]) -> Result<Map, FormatError>;

    /// Recomputes every count and length field in `tree` from the data it
    /// describes.
    fn normalize_tree(tree: &mut Map) -> Result<(), TreeError>;

    fn clear(&mut self) {
        self.tree_mut().clear();
    }

    /// Replaces the tree with the decoded contents of `data`.
    ///
    /// On failure the tree is left empty.
    fn load_binary(&mut self, data: &[u8]) -> Result<(), FormatError> {
        self.clear();
        let tree = Self::parse_binary(data)?;
        *self.tree_mut() = tree;
        Ok(())
    }

    fn load_from_bytes(&mut self, data: &[u8]) -> Result<(), FormatError> {
        self.load_binary(data)
    }

    /// Replaces the tree with one decoded from its JSON text form, then
    /// normalizes it.
    ///
    /// On failure the tree is left empty.
    fn load_text(&mut self, text: &str) -> Result<(), LoadError> {
        self.clear();
        let mut tree = match value::from_text(text)? {
            Value::Map(map) => map,
            other => {
                return Err(TreeError::Mismatch(TypeMismatch {
                    expected: ValueKind::Map,
                    found: other.kind(),
                })
                .into());
            }
        };
        Self::normalize_tree(&mut tree)?;
        *self.tree_mut() = tree;
        Ok(())
    }

    fn load_from_text(&mut self, text: &str) -> Result<(), LoadError> {
        self.load_text(text)
    }

    /// Reads a whole binary file and decodes it.
    fn load_from_file(&mut self, path: &Path) -> Result<(), LoadError> {
        self.clear();
        let data = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_binary(&data)?;
        Ok(())
    }

    /// Loads from a source of unknown kind.
    ///
    /// In order: a UTF-8 `source` naming an existing file is loaded with
    /// [`load_from_file`](Self::load_from_file); UTF-8 text is tried with
    /// [`load_text`](Self::load_text); finally `source` is decoded as binary
    /// data, and that attempt's error is the one returned. Bytes that happen
    /// to be valid JSON are treated as text, so prefer the explicit entry
    /// points when the kind is known.
    fn load(&mut self, source: &[u8]) -> Result<(), LoadError> {
        if let Ok(text) = std::str::from_utf8(source) {
            let path = Path::new(text);
            if !text.is_empty() && path.is_file() {
                return self.load_from_file(path);
            }
            match self.load_text(text) {
                Ok(()) => return Ok(()),
                Err(err) => log::debug!("Source is not a text tree ({err}), decoding as binary"),
            }
        }
        self.load_binary(source)?;
        Ok(())
    }

    fn normalize(&mut self) -> Result<(), TreeError> {
        Self::normalize_tree(self.tree_mut())
    }

    /// Flattens the tree into its binary form. The tree is not normalized
    /// first.
    fn pack(&self) -> Result<Vec<u8>, PackError> {
        pack_map(self.tree())
    }

    fn to_text(&self) -> Result<String, serde_json::Error> {
        value::to_text(&Value::Map(self.tree().clone()))
    }
}

/// Flattens a tree depth-first in insertion order.
///
/// Integers and floats are written as four little-endian bytes; byte strings
/// are written as-is, without a length prefix.
pub fn pack_value(value: &Value) -> Result<Vec<u8>, PackError> {
    match value {
        Value::Map(map) => pack_map(map),
        other => Err(PackError::RootNotMap(other.kind())),
    }
}

pub fn pack_map(map: &Map) -> Result<Vec<u8>, PackError> {
    let mut out = Vec::new();
    for item in map.values() {
        pack_item(item, &mut out);
    }
    Ok(out)
}

fn pack_item<B: BufMut>(item: &Value, out: &mut B) {
    match item {
        Value::UInt(value) => out.put_u32_le(*value),
        Value::Float(value) => out.put_f32_le(*value),
        Value::Bytes(bytes) => out.put_slice(bytes),
        Value::Seq(items) => {
            for item in items {
                pack_item(item, out);
            }
        }
        Value::Map(map) => {
            for item in map.values() {
                pack_item(item, out);
            }
        }
    }
}
