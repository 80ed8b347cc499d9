//! Skeletal animations (`.ani`).
//!
//! An animation is a list of joints, each carrying its own list of keyframes
//! with a rotation quaternion and a position.

use crate::{
    codec::DataCodec,
    errors::{FormatError, expect_constant},
    formats::{normalize_records, read_floats, read_records},
    tree_map,
    utils::mem_reader::{BufferMemReader, MemReader},
    value::{Map, MapExt as _, TreeError, Value},
};

pub const IDENTIFIER: u32 = 3;
pub const SENTINEL: u32 = 0xDEAD_BABE;
/// Extra header constant present in version 256 files.
pub const V256_MAGIC: u32 = 0xA9F5_D5CE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V3,
    V256,
}

impl Version {
    #[must_use]
    pub fn from_u32(version: u32) -> Option<Self> {
        match version {
            3 => Some(Self::V3),
            256 => Some(Self::V256),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            Self::V3 => 3,
            Self::V256 => 256,
        }
    }
}

/// An animation file decoded into a value tree.
#[derive(Debug, Clone, Default)]
pub struct Ani {
    tree: Map,
}

impl Ani {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        Ok(Self {
            tree: Self::parse_binary(data)?,
        })
    }

    /// The version recorded in the header, if the tree has one.
    #[must_use]
    pub fn version(&self) -> Option<Version> {
        self.tree
            .get_u32("version")
            .ok()
            .and_then(Version::from_u32)
    }
}

fn read_keyframe(reader: &mut BufferMemReader<'_>) -> Result<Value, FormatError> {
    let time = reader.read_u32_le("time")?;
    let quaternion = read_floats(reader, &["x", "y", "z", "w"])?;
    let position = read_floats(reader, &["x", "y", "z"])?;
    Ok(Value::Map(tree_map! {
        "time" => time,
        "quaternion" => quaternion,
        "position" => position,
    }))
}

fn read_joint(reader: &mut BufferMemReader<'_>) -> Result<Value, FormatError> {
    let mut joint = tree_map! { "index" => reader.read_u32_le("index")? };
    read_records(reader, &mut joint, "key_count", "keyframes", read_keyframe)?;
    Ok(Value::Map(joint))
}

impl DataCodec for Ani {
    fn tree(&self) -> &Map {
        &self.tree
    }

    fn tree_mut(&mut self) -> &mut Map {
        &mut self.tree
    }

    fn parse_binary(data: &[u8]) -> Result<Map, FormatError> {
        let mut reader = BufferMemReader::new(data);
        let identifier = reader.read_u32_le("identifier")?;
        if identifier != IDENTIFIER {
            return Err(FormatError::UnknownId {
                expected: IDENTIFIER,
                found: identifier,
            });
        }
        let version = reader.read_u32_le("version")?;
        let mut tree = tree_map! {
            "identifier" => identifier,
            "version" => version,
        };

        match Version::from_u32(version) {
            Some(Version::V3) => {
                let animation_length = reader.read_u32_le("animation_length")?;
                let sentinel = reader.read_u32_le("sentinel")?;
                expect_constant("sentinel", SENTINEL, sentinel)?;
                tree.insert("animation_length".into(), animation_length.into());
                tree.insert("sentinel".into(), sentinel.into());
            }
            Some(Version::V256) => {
                let unknown = reader.read_u32_le("unknown")?;
                expect_constant("unknown", V256_MAGIC, unknown)?;
                let sentinel = reader.read_u32_le("sentinel")?;
                expect_constant("sentinel", SENTINEL, sentinel)?;
                let animation_length = reader.read_u32_le("animation_length")?;
                tree.insert("unknown".into(), unknown.into());
                tree.insert("sentinel".into(), sentinel.into());
                tree.insert("animation_length".into(), animation_length.into());
            }
            None => return Err(FormatError::UnsupportedVersion(version)),
        }

        read_records(&mut reader, &mut tree, "joint_count", "joints", read_joint)?;

        if !reader.is_empty() {
            log::warn!(
                "Ignoring {} bytes after the last animation joint",
                reader.remaining()
            );
        }
        log::debug!(
            "Decoded version {version} animation with {} joints",
            tree.get_seq("joints").map_or(0, <[Value]>::len)
        );
        Ok(tree)
    }

    fn normalize_tree(tree: &mut Map) -> Result<(), TreeError> {
        normalize_records(tree, "joint_count", "joints", |joint| {
            joint.set_derived_len("key_count", "keyframes")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LoadError;
    use datalit::datalit;
    use proptest::prelude::*;

    fn single_keyframe_v3() -> Vec<u8> {
        datalit! {
            @endian = le,
            3u32,           // identifier
            3u32,           // version
            0u32,           // animation_length
            0xDEADBABEu32,  // sentinel
            1u32,           // joint_count
            0u32,           // index
            1u32,           // key_count
            0u32,           // time
            0u32, 0u32, 0u32, 0x3F80_0000u32, // quaternion
            0u32, 0u32, 0u32,                  // position
        }
        .to_vec()
    }

    #[test]
    fn decodes_single_keyframe() {
        let data = single_keyframe_v3();
        let mut ani = Ani::new();
        ani.load_binary(&data).unwrap();

        let tree = ani.tree();
        assert_eq!(
            tree.keys().collect::<Vec<_>>(),
            [
                "identifier",
                "version",
                "animation_length",
                "sentinel",
                "joint_count",
                "joints"
            ]
        );
        assert_eq!(tree.get_u32("joint_count").unwrap(), 1);
        assert_eq!(ani.version(), Some(Version::V3));

        let joints = tree.get_seq("joints").unwrap();
        assert_eq!(joints.len(), 1);
        let expected = Value::Map(tree_map! {
            "index" => 0u32,
            "key_count" => 1u32,
            "keyframes" => vec![Value::Map(tree_map! {
                "time" => 0u32,
                "quaternion" => tree_map! {
                    "x" => 0.0f32,
                    "y" => 0.0f32,
                    "z" => 0.0f32,
                    "w" => 1.0f32,
                },
                "position" => tree_map! { "x" => 0.0f32, "y" => 0.0f32, "z" => 0.0f32 },
            })],
        });
        assert_eq!(joints[0], expected);

        assert_eq!(ani.pack().unwrap(), data);
    }

    #[test]
    fn decodes_version_256_header_in_wire_order() {
        let data = datalit! {
            @endian = le,
            3u32,
            256u32,
            0xA9F5D5CEu32,  // unknown
            0xDEADBABEu32,  // sentinel
            40u32,          // animation_length
            0u32,           // joint_count
        }
        .to_vec();
        let ani = Ani::from_bytes(&data).unwrap();
        assert_eq!(
            ani.tree().keys().collect::<Vec<_>>(),
            [
                "identifier",
                "version",
                "unknown",
                "sentinel",
                "animation_length",
                "joint_count",
                "joints"
            ]
        );
        assert_eq!(ani.tree().get_u32("animation_length").unwrap(), 40);
        assert_eq!(ani.version(), Some(Version::V256));
        assert_eq!(ani.pack().unwrap(), data);
    }

    #[test]
    fn unknown_identifier_leaves_tree_empty() {
        let mut ani = Ani::from_bytes(&single_keyframe_v3()).unwrap();
        let mut data = single_keyframe_v3();
        data[0] = 99;
        let err = ani.load_binary(&data).unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnknownId {
                expected: 3,
                found: 99
            }
        ));
        assert!(ani.tree().is_empty());
    }

    #[test]
    fn rejects_unknown_version() {
        let data = datalit!(3u32_le, 4u32_le);
        assert!(matches!(
            Ani::parse_binary(&data[..]),
            Err(FormatError::UnsupportedVersion(4))
        ));
    }

    #[test]
    fn rejects_bad_constants() {
        let mut data = single_keyframe_v3();
        data[12] = 0;
        assert!(matches!(
            Ani::parse_binary(&data),
            Err(FormatError::BadConstant {
                field: "sentinel",
                ..
            })
        ));

        let data = datalit! {
            @endian = le,
            3u32,
            256u32,
            0u32,
            0xDEADBABEu32,
            0u32,
            0u32,
        };
        assert!(matches!(
            Ani::parse_binary(&data[..]),
            Err(FormatError::BadConstant {
                field: "unknown",
                ..
            })
        ));
    }

    #[test]
    fn truncated_keyframe_names_its_location() {
        let data = single_keyframe_v3();
        let err = Ani::parse_binary(&data[..data.len() - 2]).unwrap_err();
        match err {
            FormatError::NotEnoughData { context, .. } => {
                assert_eq!(context, "joints[0].keyframes[0].z");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn normalize_recomputes_counts() {
        let mut ani = Ani::from_bytes(&single_keyframe_v3()).unwrap();
        {
            let joints = ani.tree_mut().get_seq_mut("joints").unwrap();
            let joint = joints[0].as_map_mut().unwrap();
            let keyframes = joint.get_seq_mut("keyframes").unwrap();
            keyframes.push(keyframes[0].clone());
            joints.push(joints[0].clone());
        }
        ani.normalize().unwrap();
        assert_eq!(ani.tree().get_u32("joint_count").unwrap(), 2);
        for joint in ani.tree().get_seq("joints").unwrap() {
            assert_eq!(joint.as_map().unwrap().get_u32("key_count").unwrap(), 2);
        }

        let once = ani.tree().clone();
        ani.normalize().unwrap();
        assert_eq!(ani.tree(), &once);

        let repacked = Ani::from_bytes(&ani.pack().unwrap()).unwrap();
        assert_eq!(repacked.tree(), ani.tree());
    }

    #[test]
    fn normalize_requires_joints() {
        let mut ani = Ani::new();
        ani.tree_mut().insert("joint_count".into(), 0u32.into());
        assert!(matches!(ani.normalize(), Err(TreeError::MissingKey(key)) if key == "joints"));
    }

    #[test]
    fn text_round_trip_matches_normalized_tree() {
        let mut ani = Ani::from_bytes(&single_keyframe_v3()).unwrap();
        let text = ani.to_text().unwrap();
        let mut loaded = Ani::new();
        loaded.load_text(&text).unwrap();
        ani.normalize().unwrap();
        assert_eq!(loaded.tree(), ani.tree());
        assert_eq!(loaded.pack().unwrap(), single_keyframe_v3());
    }

    #[test]
    fn text_with_wrong_shape_is_rejected() {
        let mut ani = Ani::new();
        let err = ani.load_text(r#"{"joints": 5}"#).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Tree(TreeError::FieldMismatch { key, .. }) if key == "joints"
        ));
        assert!(ani.tree().is_empty());
    }

    fn arb_float() -> impl Strategy<Value = Value> {
        any::<u32>().prop_map(|bits| Value::Float(f32::from_bits(bits)))
    }

    fn arb_keyframe() -> impl Strategy<Value = Value> {
        let floats = prop::collection::vec(arb_float(), 7);
        (any::<u32>(), floats).prop_map(|(time, floats)| {
            let mut floats = floats.into_iter();
            let mut next = || floats.next().unwrap_or(Value::Float(0.0));
            Value::Map(tree_map! {
                "time" => time,
                "quaternion" => tree_map! {
                    "x" => next(),
                    "y" => next(),
                    "z" => next(),
                    "w" => next(),
                },
                "position" => tree_map! { "x" => next(), "y" => next(), "z" => next() },
            })
        })
    }

    fn arb_joints() -> impl Strategy<Value = Vec<Value>> {
        let keyframes = prop::collection::vec(arb_keyframe(), 0..4);
        let joint = (any::<u32>(), keyframes).prop_map(|(index, keyframes)| {
            Value::Map(tree_map! { "index" => index, "keyframes" => keyframes })
        });
        prop::collection::vec(joint, 0..4)
    }

    proptest! {
        #[test]
        fn pack_load_round_trip(
            v256 in any::<bool>(),
            length in any::<u32>(),
            joints in arb_joints()
        ) {
            let mut ani = Ani::new();
            let tree = ani.tree_mut();
            tree.insert("identifier".into(), IDENTIFIER.into());
            if v256 {
                tree.insert("version".into(), Version::V256.as_u32().into());
                tree.insert("unknown".into(), V256_MAGIC.into());
                tree.insert("sentinel".into(), SENTINEL.into());
                tree.insert("animation_length".into(), length.into());
            } else {
                tree.insert("version".into(), Version::V3.as_u32().into());
                tree.insert("animation_length".into(), length.into());
                tree.insert("sentinel".into(), SENTINEL.into());
            }
            tree.insert("joints".into(), joints.into());
            ani.normalize()?;

            let packed = ani.pack()?;
            let mut loaded = Ani::new();
            loaded.load_binary(&packed)?;
            prop_assert_eq!(loaded.tree(), ani.tree());
            prop_assert_eq!(loaded.pack()?, packed);
        }
    }
}
