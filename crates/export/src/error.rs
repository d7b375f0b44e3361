//! Export error types

use thiserror::Error;

/// Errors raised while converting a model or skeleton
///
/// A skeleton without a root is not an error; it converts to "no skeleton".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    #[error("Bone '{bone}' has parent index {parent} outside its skeleton")]
    ParentOutOfRange { bone: String, parent: i32 },

    #[error("Bone '{bone}' is listed before its parent '{parent}'")]
    ParentNotConverted { bone: String, parent: String },

    #[error("Skeleton has more than one root bone: '{first}' and '{second}'")]
    MultipleRoots { first: String, second: String },

    #[error("LOD {lod} references meshes {start}..{end} but the model has {count}")]
    MeshOutOfRange { lod: usize, start: usize, end: usize, count: usize },

    #[error("Mesh {mesh} references material {material} but the model has {count}")]
    MaterialOutOfRange { mesh: usize, material: usize, count: usize },

    #[error("Mesh {mesh} references bone table {table} but the model has {count}")]
    BoneTableOutOfRange { mesh: usize, table: usize, count: usize },

    #[error("Mesh {mesh} references bone {bone} but the model names {count}")]
    BoneOutOfRange { mesh: usize, bone: usize, count: usize },

    #[error("Mesh {mesh} binds bone '{name}' which is not in the skeleton")]
    MissingJoint { mesh: usize, name: String },

    #[error("Mesh {mesh} vertex {vertex} uses blend index {index} outside its bone table of {count}")]
    BlendIndexOutOfRange { mesh: usize, vertex: usize, index: u8, count: usize },

    #[error("Mesh {mesh} {attribute} has {len} entries, expected {expected}")]
    AttributeLength { mesh: usize, attribute: &'static str, len: usize, expected: usize },

    #[error("Mesh {mesh} index {index} is past its {vertices} vertices")]
    IndexOutOfRange { mesh: usize, index: u32, vertices: usize },

    #[error("Mesh {mesh} submesh {submesh} covers indices {start}..{end} of {count}")]
    SubmeshOutOfRange { mesh: usize, submesh: usize, start: usize, end: usize, count: usize },

    #[error("Scene node {0} does not exist")]
    MissingNode(usize),
}
