//! JSON rendering of value trees.

use std::fmt;

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, MapAccess, SeqAccess, Visitor},
    ser::SerializeMap,
};

use crate::utils::latin1;

use super::{Map, Value};

/// Key of the object that stands in for a float JSON cannot spell (NaN and
/// the infinities). Its value is the float's bit pattern.
const FLOAT_BITS_KEY: &str = "$f32bits";

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::UInt(value) => serializer.serialize_u32(*value),
            Value::Float(value) if value.is_finite() => serializer.serialize_f32(*value),
            Value::Float(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(FLOAT_BITS_KEY, &value.to_bits())?;
                map.end()
            }
            Value::Bytes(bytes) => serializer.serialize_str(&latin1::decode(bytes)),
            Value::Seq(items) => serializer.collect_seq(items),
            Value::Map(map) => serializer.collect_map(map),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an unsigned 32-bit integer, a float, a string, an array or an object")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Value, E> {
        u32::try_from(value)
            .map(Value::UInt)
            .map_err(|_| E::custom(format!("integer {value} does not fit in 32 bits")))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Value, E> {
        u32::try_from(value)
            .map(Value::UInt)
            .map_err(|_| E::custom(format!("integer {value} is not an unsigned 32-bit value")))
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "Floats are written from f32 values, so narrowing restores them"
    )]
    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Value, E> {
        Ok(Value::Float(value as f32))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Value, E> {
        latin1::encode(value).map(Value::Bytes).map_err(E::custom)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            map.insert(key, value);
        }
        if map.len() == 1 {
            if let Some(Value::UInt(bits)) = map.get(FLOAT_BITS_KEY) {
                return Ok(Value::Float(f32::from_bits(*bits)));
            }
        }
        Ok(Value::Map(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Renders a value as indented JSON. Object keys keep the tree's order.
pub fn to_text(value: &Value) -> Result<String, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    // The JSON serializer only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub fn from_text(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree_map;

    fn sample() -> Value {
        Value::Map(tree_map! {
            "identifier" => 3u32,
            "name" => b"caf\xe9\x00".to_vec(),
            "weights" => vec![Value::Float(0.25), Value::Float(-0.0), Value::Float(0.1)],
            "odd" => vec![Value::Float(f32::NAN), Value::Float(f32::NEG_INFINITY)],
            "nested" => tree_map! { "z" => 1u32, "a" => 2u32 },
        })
    }

    #[test]
    fn text_round_trip_is_exact() {
        let value = sample();
        let text = to_text(&value).unwrap();
        assert_eq!(from_text(&text).unwrap(), value);
    }

    #[test]
    fn keys_keep_insertion_order() {
        let text = to_text(&sample()).unwrap();
        let z = text.find("\"z\"").unwrap();
        let a = text.find("\"a\"").unwrap();
        assert!(z < a);
        assert!(text.find("\"identifier\"").unwrap() < text.find("\"nested\"").unwrap());
    }

    #[test]
    fn scalars_use_plain_json() {
        let text = to_text(&Value::Map(tree_map! {
            "count" => 2u32,
            "x" => 1.5f32,
            "name" => b"abc".to_vec(),
        }))
        .unwrap();
        assert_eq!(
            text,
            "{\n    \"count\": 2,\n    \"x\": 1.5,\n    \"name\": \"abc\"\n}"
        );
    }

    #[test]
    fn whole_floats_stay_floats() {
        let value = Value::Seq(vec![Value::Float(1.0), Value::UInt(1)]);
        let text = to_text(&value).unwrap();
        assert_eq!(from_text(&text).unwrap(), value);
    }

    #[test]
    fn rejects_values_without_a_wire_form() {
        assert!(from_text("-1").is_err());
        assert!(from_text("4294967296").is_err());
        assert!(from_text("null").is_err());
        assert!(from_text("true").is_err());
        assert!(from_text("\"\u{263A}\"").is_err());
    }
}
