//! Parsed host model and skeleton data
//!
//! These mirror the layout of the host's `.mdl` and `.sklb` files after byte
//! parsing: LOD table, flat mesh list, per-mesh vertex and index buffers, bone
//! tables and bone names. Raw byte parsing happens elsewhere.

use glam::{Quat, Vec2, Vec3, Vec4};

/// Local bone transform kept as independent components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: Vec3,
    pub rotation: Quat,
    pub translation: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        scale: Vec3::ONE,
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
    };

    pub fn new(scale: Vec3, rotation: Quat, translation: Vec3) -> Self {
        Self {
            scale,
            rotation,
            translation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }
}

/// One bone of a host skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct XivBone {
    pub name: String,
    /// Index of the parent within the same skeleton, `-1` for the root
    pub parent_index: i32,
    pub transform: Transform,
}

impl XivBone {
    pub fn new(name: impl Into<String>, parent_index: i32, transform: Transform) -> Self {
        Self {
            name: name.into(),
            parent_index,
            transform,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_index == -1
    }
}

/// A host skeleton: bones listed parents-first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XivSkeleton {
    pub bones: Vec<XivBone>,
}

impl XivSkeleton {
    pub fn new(bones: Vec<XivBone>) -> Self {
        Self { bones }
    }
}

/// Contiguous range of meshes belonging to one level of detail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MdlLod {
    pub mesh_index: u16,
    pub mesh_count: u16,
}

/// Index range of one submesh within its mesh's index buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MdlSubmesh {
    pub index_offset: u32,
    pub index_count: u32,
}

/// Per-vertex streams; an empty stream means the attribute is absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec4>,
    pub uvs: Vec<Vec2>,
    pub colors: Vec<Vec4>,
    /// Indices into the mesh's bone table
    pub blend_indices: Vec<[u8; 4]>,
    pub blend_weights: Vec<[f32; 4]>,
}

impl VertexData {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdlMesh {
    pub material_index: u16,
    /// Bone table used by the blend indices, `None` for rigid meshes
    pub bone_table_index: Option<u16>,
    pub vertices: VertexData,
    pub indices: Vec<u16>,
    pub submeshes: Vec<MdlSubmesh>,
}

/// A parsed model file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdlFile {
    pub lods: Vec<MdlLod>,
    pub meshes: Vec<MdlMesh>,
    pub materials: Vec<String>,
    /// Each table lists indices into `bone_names`
    pub bone_tables: Vec<Vec<u16>>,
    pub bone_names: Vec<String>,
}

impl MdlFile {
    pub fn lod_count(&self) -> usize {
        self.lods.len()
    }
}
