//! The ordered value tree shared by the tree-based codecs.
//!
//! Mappings keep their insertion order, which is also the order fields are
//! written in when a tree is packed. Scalars carry their wire width in their
//! variant: [`Value::UInt`] and [`Value::Float`] are four bytes each, and
//! [`Value::Bytes`] is written verbatim.

mod text;

use std::fmt::Display;

use indexmap::IndexMap;

pub use self::text::{from_text, to_text};

pub type Map = IndexMap<String, Value>;

#[derive(Debug, Clone)]
pub enum Value {
    UInt(u32),
    Float(f32),
    Bytes(Vec<u8>),
    Seq(Vec<Value>),
    Map(Map),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    UInt,
    Float,
    Bytes,
    Seq,
    Map,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ValueKind::UInt => "integer",
            ValueKind::Float => "float",
            ValueKind::Bytes => "string",
            ValueKind::Seq => "sequence",
            ValueKind::Map => "mapping",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Expected a {expected}, found a {found}")]
pub struct TypeMismatch {
    pub expected: ValueKind,
    pub found: ValueKind,
}

/// A tree does not have the shape a codec expects.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("Missing field {0:?}")]
    MissingKey(String),
    #[error(transparent)]
    Mismatch(#[from] TypeMismatch),
    #[error("Field {key:?}: {source}")]
    FieldMismatch {
        key: String,
        #[source]
        source: TypeMismatch,
    },
    #[error("Field {key:?} has {len} entries, more than a 32-bit count can describe")]
    TooLong { key: String, len: usize },
    #[error("{what} refers to index {index}, but there are only {len} entries")]
    BadReference { what: String, index: u32, len: usize },
}

macro_rules! impl_accessors {
    ($as_ref:ident, $as_mut:ident, $variant:ident, $ty:ty) => {
        pub fn $as_ref(&self) -> Result<&$ty, TypeMismatch> {
            match self {
                Value::$variant(value) => Ok(value),
                other => Err(other.mismatch(ValueKind::$variant)),
            }
        }

        pub fn $as_mut(&mut self) -> Result<&mut $ty, TypeMismatch> {
            match self {
                Value::$variant(value) => Ok(value),
                other => Err(other.mismatch(ValueKind::$variant)),
            }
        }
    };
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::UInt(_) => ValueKind::UInt,
            Value::Float(_) => ValueKind::Float,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Seq(_) => ValueKind::Seq,
            Value::Map(_) => ValueKind::Map,
        }
    }

    fn mismatch(&self, expected: ValueKind) -> TypeMismatch {
        TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_u32(&self) -> Result<u32, TypeMismatch> {
        match self {
            Value::UInt(value) => Ok(*value),
            other => Err(other.mismatch(ValueKind::UInt)),
        }
    }

    pub fn as_f32(&self) -> Result<f32, TypeMismatch> {
        match self {
            Value::Float(value) => Ok(*value),
            other => Err(other.mismatch(ValueKind::Float)),
        }
    }

    impl_accessors!(as_bytes, as_bytes_mut, Bytes, Vec<u8>);
    impl_accessors!(as_seq, as_seq_mut, Seq, Vec<Value>);
    impl_accessors!(as_map, as_map_mut, Map, Map);
}

// Floats compare by bit pattern: a tree must equal itself even when it holds
// a NaN, and equal trees must pack to equal bytes.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::UInt(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Seq(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Value::Map(value)
    }
}

/// Builds a [`Map`] with the entries in the order given.
#[macro_export]
macro_rules! tree_map {
    ($($key:literal => $value:expr),* $(,)?) => {{
        let mut map = $crate::value::Map::new();
        $(
            map.insert(::std::string::String::from($key), $crate::value::Value::from($value));
        )*
        map
    }};
}

/// Keyed access to the fields of a mapping.
pub trait MapExt {
    fn field(&self, key: &str) -> Result<&Value, TreeError>;
    fn field_mut(&mut self, key: &str) -> Result<&mut Value, TreeError>;

    /// Sets `count_key` to the length of the sequence or string stored under
    /// `described_key`.
    ///
    /// A missing count field is inserted directly before the field it
    /// describes, which is where it sits on the wire.
    fn set_derived_len(&mut self, count_key: &str, described_key: &str) -> Result<(), TreeError>;

    fn get_u32(&self, key: &str) -> Result<u32, TreeError> {
        self.field(key)?.as_u32().map_err(with_key(key))
    }

    fn get_f32(&self, key: &str) -> Result<f32, TreeError> {
        self.field(key)?.as_f32().map_err(with_key(key))
    }

    fn get_bytes(&self, key: &str) -> Result<&[u8], TreeError> {
        Ok(self.field(key)?.as_bytes().map_err(with_key(key))?)
    }

    fn get_seq(&self, key: &str) -> Result<&[Value], TreeError> {
        Ok(self.field(key)?.as_seq().map_err(with_key(key))?)
    }

    fn get_map(&self, key: &str) -> Result<&Map, TreeError> {
        self.field(key)?.as_map().map_err(with_key(key))
    }

    fn get_seq_mut(&mut self, key: &str) -> Result<&mut Vec<Value>, TreeError> {
        self.field_mut(key)?.as_seq_mut().map_err(with_key(key))
    }
}

fn with_key(key: &str) -> impl FnOnce(TypeMismatch) -> TreeError + '_ {
    move |source| TreeError::FieldMismatch {
        key: key.to_string(),
        source,
    }
}

impl MapExt for Map {
    fn field(&self, key: &str) -> Result<&Value, TreeError> {
        self.get(key)
            .ok_or_else(|| TreeError::MissingKey(key.to_string()))
    }

    fn field_mut(&mut self, key: &str) -> Result<&mut Value, TreeError> {
        self.get_mut(key)
            .ok_or_else(|| TreeError::MissingKey(key.to_string()))
    }

    fn set_derived_len(&mut self, count_key: &str, described_key: &str) -> Result<(), TreeError> {
        let Some((index, _, described)) = self.get_full(described_key) else {
            return Err(TreeError::MissingKey(described_key.to_string()));
        };
        let len = match described {
            Value::Seq(items) => items.len(),
            Value::Bytes(bytes) => bytes.len(),
            other => {
                return Err(TreeError::FieldMismatch {
                    key: described_key.to_string(),
                    source: other.mismatch(ValueKind::Seq),
                });
            }
        };
        let count = u32::try_from(len).map_err(|_| TreeError::TooLong {
            key: described_key.to_string(),
            len,
        })?;

        if let Some(slot) = self.get_mut(count_key) {
            *slot = Value::UInt(count);
        } else {
            self.shift_insert(index, count_key.to_string(), Value::UInt(count));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_check_kinds() {
        let value = Value::UInt(7);
        assert_eq!(value.as_u32().unwrap(), 7);
        assert_eq!(
            value.as_f32(),
            Err(TypeMismatch {
                expected: ValueKind::Float,
                found: ValueKind::UInt
            })
        );
        assert!(value.as_map().is_err());
        assert!(Value::Seq(vec![]).as_seq().unwrap().is_empty());
    }

    #[test]
    fn equality_is_order_sensitive() {
        let a = tree_map! { "x" => 1u32, "y" => 2u32 };
        let b = tree_map! { "y" => 2u32, "x" => 1u32 };
        assert_ne!(Value::Map(a.clone()), Value::Map(b));
        assert_eq!(Value::Map(a.clone()), Value::Map(a));

        let s1 = Value::Seq(vec![Value::UInt(1), Value::UInt(2)]);
        let s2 = Value::Seq(vec![Value::UInt(2), Value::UInt(1)]);
        assert_ne!(s1, s2);
    }

    #[test]
    fn floats_compare_by_bits() {
        assert_eq!(Value::Float(f32::NAN), Value::Float(f32::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Float(1.0), Value::UInt(1));
    }

    #[test]
    fn keyed_access_reports_missing_and_mismatched_fields() {
        let map = tree_map! { "count" => 1u32, "name" => b"abc".to_vec() };
        assert_eq!(map.get_u32("count").unwrap(), 1);
        assert_eq!(map.get_bytes("name").unwrap(), b"abc");
        assert!(matches!(map.get_u32("nope"), Err(TreeError::MissingKey(key)) if key == "nope"));
        assert!(matches!(
            map.get_seq("name"),
            Err(TreeError::FieldMismatch { key, .. }) if key == "name"
        ));
    }

    #[test]
    fn derived_len_overwrites_in_place() {
        let mut map = tree_map! {
            "name_length" => 99u32,
            "name" => b"abc".to_vec(),
            "after" => 0u32,
        };
        map.set_derived_len("name_length", "name").unwrap();
        assert_eq!(map.get_u32("name_length").unwrap(), 3);
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            ["name_length", "name", "after"]
        );
    }

    #[test]
    fn derived_len_is_inserted_before_described_field() {
        let mut map = tree_map! {
            "first" => 0u32,
            "children" => vec![Value::UInt(4), Value::UInt(5)],
        };
        map.set_derived_len("child_count", "children").unwrap();
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            ["first", "child_count", "children"]
        );
        assert_eq!(map.get_u32("child_count").unwrap(), 2);
    }

    #[test]
    fn derived_len_needs_a_sized_field() {
        let mut map = tree_map! { "weight" => 0.5f32 };
        assert!(matches!(
            map.set_derived_len("weight_count", "weight"),
            Err(TreeError::FieldMismatch { .. })
        ));
        assert!(matches!(
            map.set_derived_len("x_count", "x"),
            Err(TreeError::MissingKey(_))
        ));
    }
}
