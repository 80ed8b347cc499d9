//! Rigged meshes (`.cir`).
//!
//! A mesh file lists its materials, a joint hierarchy and a set of mesh
//! groups. Each group holds faces whose vertices are bound to up to two
//! joints.

use crate::{
    codec::DataCodec,
    errors::FormatError,
    formats::{normalize_records, read_counted_bytes, read_floats, read_records},
    tree_map,
    utils::mem_reader::{BufferMemReader, MemReader},
    value::{Map, MapExt as _, TreeError, Value},
};

pub const IDENTIFIER: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V16,
    V256,
}

impl Version {
    #[must_use]
    pub fn from_u32(version: u32) -> Option<Self> {
        match version {
            16 => Some(Self::V16),
            256 => Some(Self::V256),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            Self::V16 => 16,
            Self::V256 => 256,
        }
    }
}

/// A rigged mesh decoded into a value tree.
#[derive(Debug, Clone, Default)]
pub struct Cir {
    tree: Map,
}

impl Cir {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        Ok(Self {
            tree: Self::parse_binary(data)?,
        })
    }

    #[must_use]
    pub fn version(&self) -> Option<Version> {
        self.tree
            .get_u32("version")
            .ok()
            .and_then(Version::from_u32)
    }

    /// Builds an index-based view of the joint hierarchy.
    pub fn joint_arena(&self) -> Result<JointArena, TreeError> {
        JointArena::from_tree(&self.tree)
    }
}

fn read_material(reader: &mut BufferMemReader<'_>) -> Result<Value, FormatError> {
    let mut material = Map::new();
    read_counted_bytes(reader, &mut material, "name_length", "name")?;
    material.insert("unknown".into(), reader.read_u32_le("unknown")?.into());
    read_counted_bytes(reader, &mut material, "texture_name_length", "texture_name")?;
    let color = read_floats(reader, &["r", "g", "b"])?;
    material.insert("color".into(), color.into());
    Ok(Value::Map(material))
}

fn read_joint(reader: &mut BufferMemReader<'_>) -> Result<Value, FormatError> {
    let mut joint = Map::new();
    read_counted_bytes(reader, &mut joint, "name_length", "name")?;
    joint.insert("unknown".into(), reader.read_f32_le("unknown")?.into());
    let child_count = reader.read_u32_le("child_count")?;
    let children = reader.read_values::<u32>("children", child_count as usize)?;
    let children: Vec<Value> = children.into_iter().map(Value::UInt).collect();
    joint.insert("child_count".into(), child_count.into());
    joint.insert("children".into(), Value::Seq(children));
    Ok(Value::Map(joint))
}

fn read_vertex(reader: &mut BufferMemReader<'_>) -> Result<Value, FormatError> {
    const XYZ: &[&str] = &["x", "y", "z"];
    let position_joint1 = read_floats(reader, XYZ)?;
    let position_joint2 = read_floats(reader, XYZ)?;
    let normal = read_floats(reader, XYZ)?;
    let uv = read_floats(reader, &["u", "v"])?;
    Ok(Value::Map(tree_map! {
        "position_joint1" => position_joint1,
        "position_joint2" => position_joint2,
        "normal" => normal,
        "uv" => uv,
        "joint1" => reader.read_u32_le("joint1")?,
        "joint2" => reader.read_u32_le("joint2")?,
        "weight" => reader.read_f32_le("weight")?,
    }))
}

fn read_triangle(reader: &mut BufferMemReader<'_>) -> Result<Value, FormatError> {
    let corners = reader.read_values::<u32>("triangle", 3)?;
    Ok(Value::Seq(corners.into_iter().map(Value::UInt).collect()))
}

fn read_face(reader: &mut BufferMemReader<'_>) -> Result<Value, FormatError> {
    let mut face = tree_map! { "material_index" => reader.read_u32_le("material_index")? };
    read_records(reader, &mut face, "vertex_count", "vertices", read_vertex)?;
    read_records(
        reader,
        &mut face,
        "triangle_count",
        "triangles",
        read_triangle,
    )?;
    Ok(Value::Map(face))
}

fn read_group_unknown1(reader: &mut BufferMemReader<'_>) -> Result<Value, FormatError> {
    let mut record = read_floats(reader, &["unknown1", "unknown2", "unknown3", "unknown4"])?;
    record.insert("unknown5".into(), reader.read_u32_le("unknown5")?.into());
    Ok(Value::Map(record))
}

fn read_group_unknown2(reader: &mut BufferMemReader<'_>) -> Result<Value, FormatError> {
    let mut record = Map::new();
    read_counted_bytes(reader, &mut record, "name_length", "name")?;
    record.extend(read_floats(
        reader,
        &[
            "unknown1", "unknown2", "unknown3", "unknown4", "unknown5", "unknown6", "unknown7",
            "unknown8",
        ],
    )?);
    record.insert("unknown9".into(), reader.read_u32_le("unknown9")?.into());
    Ok(Value::Map(record))
}

fn read_mesh_group(reader: &mut BufferMemReader<'_>) -> Result<Value, FormatError> {
    let mut group = Map::new();
    read_counted_bytes(reader, &mut group, "name_length", "name")?;
    read_records(reader, &mut group, "face_count", "faces", read_face)?;
    read_records(
        reader,
        &mut group,
        "unknown1_count",
        "unknowns1",
        read_group_unknown1,
    )?;
    read_records(
        reader,
        &mut group,
        "unknown2_count",
        "unknowns2",
        read_group_unknown2,
    )?;
    Ok(Value::Map(group))
}

fn read_unknown(reader: &mut BufferMemReader<'_>) -> Result<Value, FormatError> {
    let record = read_floats(reader, &["unknown1", "unknown2", "unknown3", "unknown4"])?;
    Ok(Value::Map(record))
}

impl DataCodec for Cir {
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
            Some(Version::V16) => {}
            Some(Version::V256) => {
                tree.insert("unknown1".into(), reader.read_u32_le("unknown1")?.into());
            }
            None => return Err(FormatError::UnsupportedVersion(version)),
        }
        tree.insert("unused".into(), reader.read_u32_le("unused")?.into());
        tree.insert("unknown2".into(), reader.read_f32_le("unknown2")?.into());

        let r = &mut reader;
        read_records(r, &mut tree, "material_count", "materials", read_material)?;
        read_records(r, &mut tree, "unknown_count", "unknowns", read_unknown)?;
        read_records(r, &mut tree, "joint_count", "joints", read_joint)?;
        read_records(
            r,
            &mut tree,
            "mesh_group_count",
            "mesh_groups",
            read_mesh_group,
        )?;

        if !reader.is_empty() {
            log::warn!(
                "Ignoring {} bytes after the last mesh group",
                reader.remaining()
            );
        }
        log::debug!(
            "Decoded version {version} mesh with {} materials, {} joints and {} mesh groups",
            tree.get_seq("materials").map_or(0, <[Value]>::len),
            tree.get_seq("joints").map_or(0, <[Value]>::len),
            tree.get_seq("mesh_groups").map_or(0, <[Value]>::len),
        );
        Ok(tree)
    }

    fn normalize_tree(tree: &mut Map) -> Result<(), TreeError> {
        normalize_records(tree, "material_count", "materials", |material| {
            material.set_derived_len("name_length", "name")?;
            material.set_derived_len("texture_name_length", "texture_name")
        })?;
        tree.set_derived_len("unknown_count", "unknowns")?;
        normalize_records(tree, "joint_count", "joints", |joint| {
            joint.set_derived_len("name_length", "name")?;
            joint.set_derived_len("child_count", "children")
        })?;
        normalize_records(
            tree,
            "mesh_group_count",
            "mesh_groups",
            normalize_mesh_group,
        )
    }
}

fn normalize_mesh_group(group: &mut Map) -> Result<(), TreeError> {
    group.set_derived_len("name_length", "name")?;
    normalize_records(group, "face_count", "faces", |face| {
        face.set_derived_len("vertex_count", "vertices")?;
        face.set_derived_len("triangle_count", "triangles")
    })?;
    group.set_derived_len("unknown1_count", "unknowns1")?;
    normalize_records(group, "unknown2_count", "unknowns2", |record| {
        record.set_derived_len("name_length", "name")
    })
}

/// One joint of a [`JointArena`].
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: Vec<u8>,
    pub unknown: f32,
    pub children: Vec<u32>,
}

/// The joint hierarchy of a mesh, with joints addressed by their position in
/// the file.
///
/// Child links are indices into the same arena and are checked to be in
/// range when the arena is built.
#[derive(Debug, Clone, Default)]
pub struct JointArena {
    joints: Vec<Joint>,
}

impl JointArena {
    pub fn from_tree(tree: &Map) -> Result<Self, TreeError> {
        let records = tree.get_seq("joints")?;
        let mut joints = Vec::with_capacity(records.len());
        for record in records {
            let record = record.as_map().map_err(|source| TreeError::FieldMismatch {
                key: "joints".to_string(),
                source,
            })?;
            let children = record
                .get_seq("children")?
                .iter()
                .map(Value::as_u32)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| TreeError::FieldMismatch {
                    key: "children".to_string(),
                    source,
                })?;
            joints.push(Joint {
                name: record.get_bytes("name")?.to_vec(),
                unknown: record.get_f32("unknown")?,
                children,
            });
        }

        for (index, joint) in joints.iter().enumerate() {
            if let Some(&child) = joint
                .children
                .iter()
                .find(|&&child| child as usize >= joints.len())
            {
                return Err(TreeError::BadReference {
                    what: format!("Child list of joint {index}"),
                    index: child,
                    len: joints.len(),
                });
            }
        }
        Ok(Self { joints })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Joint> {
        self.joints.iter()
    }

    /// The joints listed as children of `index`, in file order.
    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.joints
            .get(index)
            .into_iter()
            .flat_map(|joint| joint.children.iter().map(|&child| child as usize))
    }

    /// The joints that list `index` among their children.
    pub fn parents(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.joints
            .iter()
            .enumerate()
            .filter(move |(_, joint)| joint.children.iter().any(|&child| child as usize == index))
            .map(|(parent, _)| parent)
    }

    /// Joints that no other joint lists as a child.
    #[must_use]
    pub fn roots(&self) -> Vec<usize> {
        let mut is_child = vec![false; self.joints.len()];
        for joint in &self.joints {
            for &child in &joint.children {
                is_child[child as usize] = true;
            }
        }
        is_child
            .iter()
            .enumerate()
            .filter(|(_, is_child)| !**is_child)
            .map(|(index, _)| index)
            .collect()
    }
}
