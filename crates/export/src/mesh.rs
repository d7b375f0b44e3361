//! Mesh conversion
//!
//! Converts one host mesh into an exported [`Mesh`]: validated vertex
//! streams, widened index buffers split by submesh, and optionally a skin.
//!
//! Host blend indices point into a per-mesh bone table, which points into the
//! model's bone names. The skin resolves each table entry to a joint of the
//! converted skeleton by name, keeping table order so vertex blend indices
//! stay valid as skin-local joint slots.

use bitflags::bitflags;
use glam::{Vec2, Vec3, Vec4};

use crate::error::ExportError;
use crate::skeleton::GltfSkeleton;
use crate::xiv::{MdlFile, MdlMesh};

bitflags! {
    /// Vertex streams present on an exported mesh
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VertexAttributes: u8 {
        const POSITION = 0b0000_0001;
        const NORMAL = 0b0000_0010;
        const TANGENT = 0b0000_0100;
        const UV = 0b0000_1000;
        const COLOR = 0b0001_0000;
        /// Joint slots and weights
        const SKIN = 0b0010_0000;
    }
}

/// One primitive of a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Submesh {
    pub name: String,
    pub indices: Vec<u32>,
}

/// Skin binding of a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    /// Skeleton joint index for each skin-local slot
    pub joints: Vec<usize>,
    pub slots: Vec<[u16; 4]>,
    /// Normalised to sum to one
    pub weights: Vec<[f32; 4]>,
}

/// An exported mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub lod: usize,
    pub mesh_index: usize,
    pub material: Option<String>,
    pub attributes: VertexAttributes,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec4>,
    pub uvs: Vec<Vec2>,
    pub colors: Vec<Vec4>,
    pub submeshes: Vec<Submesh>,
    pub skin: Option<Skin>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_skinned(&self) -> bool {
        self.skin.is_some()
    }
}

/// Converts single meshes of a model
pub struct MeshExporter;

impl MeshExporter {
    /// Convert mesh `mesh_index` of `mdl`, listed under LOD `lod`
    ///
    /// With a skeleton, meshes that carry a bone table and blend data are
    /// skinned; every bone they reference must exist in the skeleton.
    pub fn export(
        mdl: &MdlFile,
        lod: usize,
        mesh_index: usize,
        skeleton: Option<&GltfSkeleton>,
    ) -> Result<Mesh, ExportError> {
        let mesh = mdl.meshes.get(mesh_index).ok_or(ExportError::MeshOutOfRange {
            lod,
            start: mesh_index,
            end: mesh_index + 1,
            count: mdl.meshes.len(),
        })?;

        let attributes = validate_streams(mesh_index, mesh)?;
        let material = material_name(mdl, mesh_index, mesh)?;
        let name = format!("mesh {}.{}", lod, mesh_index);
        let submeshes = convert_submeshes(&name, mesh_index, mesh)?;

        let skin = match skeleton {
            Some(skeleton) if attributes.contains(VertexAttributes::SKIN) => {
                Some(convert_skin(mdl, mesh_index, mesh, skeleton)?)
            }
            _ => None,
        };
        let attributes = if skin.is_some() {
            attributes
        } else {
            attributes - VertexAttributes::SKIN
        };

        let vertices = &mesh.vertices;
        tracing::trace!(
            "Exported {} ({} vertices, {} submeshes, skinned: {})",
            name,
            vertices.len(),
            submeshes.len(),
            skin.is_some()
        );

        Ok(Mesh {
            name,
            lod,
            mesh_index,
            material,
            attributes,
            positions: vertices.positions.clone(),
            normals: vertices.normals.clone(),
            tangents: vertices.tangents.clone(),
            uvs: vertices.uvs.clone(),
            colors: vertices.colors.clone(),
            submeshes,
            skin,
        })
    }
}

fn validate_streams(mesh_index: usize, mesh: &MdlMesh) -> Result<VertexAttributes, ExportError> {
    let v = &mesh.vertices;
    let expected = v.positions.len();
    let mut attributes = VertexAttributes::POSITION;

    let check = |attribute: &'static str, len: usize| {
        if len == 0 || len == expected {
            Ok(len != 0)
        } else {
            Err(ExportError::AttributeLength {
                mesh: mesh_index,
                attribute,
                len,
                expected,
            })
        }
    };

    attributes.set(VertexAttributes::NORMAL, check("normals", v.normals.len())?);
    attributes.set(VertexAttributes::TANGENT, check("tangents", v.tangents.len())?);
    attributes.set(VertexAttributes::UV, check("uvs", v.uvs.len())?);
    attributes.set(VertexAttributes::COLOR, check("colors", v.colors.len())?);
    let has_indices = check("blend indices", v.blend_indices.len())?;
    let has_weights = check("blend weights", v.blend_weights.len())?;
    attributes.set(
        VertexAttributes::SKIN,
        has_indices && has_weights && mesh.bone_table_index.is_some(),
    );

    Ok(attributes)
}

fn material_name(mdl: &MdlFile, mesh_index: usize, mesh: &MdlMesh) -> Result<Option<String>, ExportError> {
    if mdl.materials.is_empty() {
        return Ok(None);
    }
    let material = mesh.material_index as usize;
    mdl.materials
        .get(material)
        .cloned()
        .map(Some)
        .ok_or(ExportError::MaterialOutOfRange {
            mesh: mesh_index,
            material,
            count: mdl.materials.len(),
        })
}

fn convert_submeshes(name: &str, mesh_index: usize, mesh: &MdlMesh) -> Result<Vec<Submesh>, ExportError> {
    let vertices = mesh.vertices.len();
    if let Some(&index) = mesh.indices.iter().find(|&&i| i as usize >= vertices) {
        return Err(ExportError::IndexOutOfRange {
            mesh: mesh_index,
            index: index as u32,
            vertices,
        });
    }

    let widen = |indices: &[u16]| indices.iter().map(|&i| i as u32).collect::<Vec<u32>>();

    if mesh.submeshes.is_empty() {
        return Ok(vec![Submesh {
            name: name.to_string(),
            indices: widen(&mesh.indices),
        }]);
    }

    mesh.submeshes
        .iter()
        .enumerate()
        .map(|(i, submesh)| {
            let start = submesh.index_offset as usize;
            let end = start + submesh.index_count as usize;
            let indices = mesh.indices.get(start..end).ok_or(ExportError::SubmeshOutOfRange {
                mesh: mesh_index,
                submesh: i,
                start,
                end,
                count: mesh.indices.len(),
            })?;
            Ok(Submesh {
                name: format!("{}.{}", name, i),
                indices: widen(indices),
            })
        })
        .collect()
}

fn convert_skin(
    mdl: &MdlFile,
    mesh_index: usize,
    mesh: &MdlMesh,
    skeleton: &GltfSkeleton,
) -> Result<Skin, ExportError> {
    let table_index = mesh.bone_table_index.map(usize::from).unwrap_or_default();
    let table = mdl
        .bone_tables
        .get(table_index)
        .ok_or(ExportError::BoneTableOutOfRange {
            mesh: mesh_index,
            table: table_index,
            count: mdl.bone_tables.len(),
        })?;

    let joints = table
        .iter()
        .map(|&bone| {
            let bone = bone as usize;
            let name = mdl.bone_names.get(bone).ok_or(ExportError::BoneOutOfRange {
                mesh: mesh_index,
                bone,
                count: mdl.bone_names.len(),
            })?;
            skeleton.joint_index(name).ok_or_else(|| ExportError::MissingJoint {
                mesh: mesh_index,
                name: name.clone(),
            })
        })
        .collect::<Result<Vec<usize>, ExportError>>()?;

    let v = &mesh.vertices;
    let mut slots = Vec::with_capacity(v.blend_indices.len());
    let mut weights = Vec::with_capacity(v.blend_weights.len());

    for (vertex, (indices, raw)) in v.blend_indices.iter().zip(&v.blend_weights).enumerate() {
        let mut slot = [0u16; 4];
        for (out, (&index, &weight)) in slot.iter_mut().zip(indices.iter().zip(raw)) {
            // Zero-weight influences may carry garbage indices
            if weight <= 0.0 {
                continue;
            }
            if index as usize >= joints.len() {
                return Err(ExportError::BlendIndexOutOfRange {
                    mesh: mesh_index,
                    vertex,
                    index,
                    count: joints.len(),
                });
            }
            *out = index as u16;
        }
        slots.push(slot);
        weights.push(normalize_weights(*raw));
    }

    Ok(Skin {
        joints,
        slots,
        weights,
    })
}

/// Scale weights to sum to one; all-zero weights bind fully to the first slot
fn normalize_weights(weights: [f32; 4]) -> [f32; 4] {
    let clamped = weights.map(|w| w.max(0.0));
    let sum: f32 = clamped.iter().sum();
    if sum <= f32::EPSILON {
        return [1.0, 0.0, 0.0, 0.0];
    }
    clamped.map(|w| w / sum)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::skeleton::convert_skeleton;
    use crate::xiv::{MdlLod, MdlSubmesh, Transform, VertexData, XivBone, XivSkeleton};

    pub(crate) fn triangle(material_index: u16, bone_table_index: Option<u16>) -> MdlMesh {
        MdlMesh {
            material_index,
            bone_table_index,
            vertices: VertexData {
                positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                normals: vec![Vec3::Z; 3],
                uvs: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
                blend_indices: vec![[0, 1, 0, 0], [1, 0, 0, 0], [0, 0, 0, 0]],
                blend_weights: vec![[0.5, 0.5, 0.0, 0.0], [2.0, 0.0, 0.0, 0.0], [0.0; 4]],
                ..Default::default()
            },
            indices: vec![0, 1, 2, 2, 1, 0],
            submeshes: vec![
                MdlSubmesh {
                    index_offset: 0,
                    index_count: 3,
                },
                MdlSubmesh {
                    index_offset: 3,
                    index_count: 3,
                },
            ],
        }
    }

    pub(crate) fn model(lods: &[u16]) -> MdlFile {
        let mut mdl = MdlFile {
            materials: vec!["/mt_body.mtrl".to_string()],
            bone_tables: vec![vec![1, 2]],
            bone_names: vec!["root".into(), "hip".into(), "spine".into()],
            ..Default::default()
        };
        let mut next = 0u16;
        for &count in lods {
            mdl.lods.push(MdlLod {
                mesh_index: next,
                mesh_count: count,
            });
            for _ in 0..count {
                mdl.meshes.push(triangle(0, Some(0)));
            }
            next += count;
        }
        mdl
    }

    pub(crate) fn skeleton() -> GltfSkeleton {
        let bones = vec![
            XivBone::new("root", -1, Transform::IDENTITY),
            XivBone::new("hip", 0, Transform::from_translation(Vec3::Y)),
            XivBone::new("spine", 1, Transform::from_translation(Vec3::Y)),
        ];
        convert_skeleton(&[XivSkeleton::new(bones)]).unwrap().unwrap()
    }

    #[test]
    fn test_rigid_export() {
        let mdl = model(&[1]);
        let mesh = MeshExporter::export(&mdl, 0, 0, None).unwrap();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.material.as_deref(), Some("/mt_body.mtrl"));
        assert_eq!(
            mesh.attributes,
            VertexAttributes::POSITION | VertexAttributes::NORMAL | VertexAttributes::UV
        );
        assert!(!mesh.is_skinned());
        assert_eq!(mesh.submeshes.len(), 2);
        assert_eq!(mesh.submeshes[1].indices, vec![2, 1, 0]);
        assert_eq!(mesh.submeshes[1].name, "mesh 0.0.1");
    }

    #[test]
    fn test_skinned_export_maps_bone_table_to_joints() {
        let mdl = model(&[1]);
        let skeleton = skeleton();
        let mesh = MeshExporter::export(&mdl, 0, 0, Some(&skeleton)).unwrap();
        let skin = mesh.skin.as_ref().unwrap();

        // Bone table [1, 2] names hip and spine
        assert_eq!(
            skin.joints,
            vec![skeleton.joint_index("hip").unwrap(), skeleton.joint_index("spine").unwrap()]
        );
        assert_eq!(skin.slots[0], [0, 1, 0, 0]);
        assert_eq!(skin.weights[0], [0.5, 0.5, 0.0, 0.0]);
        assert_eq!(skin.weights[1], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(skin.weights[2], [1.0, 0.0, 0.0, 0.0]);
        assert!(mesh.attributes.contains(VertexAttributes::SKIN));
    }

    #[test]
    fn test_missing_joint_fails() {
        let mut mdl = model(&[1]);
        mdl.bone_names[2] = "tail".into();
        assert_eq!(
            MeshExporter::export(&mdl, 0, 0, Some(&skeleton())),
            Err(ExportError::MissingJoint {
                mesh: 0,
                name: "tail".into()
            })
        );
    }

    #[test]
    fn test_mesh_without_bone_table_is_rigid() {
        let mut mdl = model(&[1]);
        mdl.meshes[0].bone_table_index = None;
        let mesh = MeshExporter::export(&mdl, 0, 0, Some(&skeleton())).unwrap();
        assert!(!mesh.is_skinned());
        assert!(!mesh.attributes.contains(VertexAttributes::SKIN));
    }

    #[test]
    fn test_invalid_buffers() {
        let mut mdl = model(&[1]);
        mdl.meshes[0].indices.push(9);
        assert!(matches!(
            MeshExporter::export(&mdl, 0, 0, None),
            Err(ExportError::IndexOutOfRange { index: 9, .. })
        ));

        let mut mdl = model(&[1]);
        mdl.meshes[0].vertices.normals.pop();
        assert!(matches!(
            MeshExporter::export(&mdl, 0, 0, None),
            Err(ExportError::AttributeLength {
                attribute: "normals",
                ..
            })
        ));

        let mut mdl = model(&[1]);
        mdl.meshes[0].submeshes[1].index_count = 4;
        assert!(matches!(
            MeshExporter::export(&mdl, 0, 0, None),
            Err(ExportError::SubmeshOutOfRange { submesh: 1, .. })
        ));

        let mut mdl = model(&[1]);
        mdl.meshes[0].vertices.blend_indices[0] = [0, 5, 0, 0];
        assert!(matches!(
            MeshExporter::export(&mdl, 0, 0, Some(&skeleton())),
            Err(ExportError::BlendIndexOutOfRange { index: 5, .. })
        ));
    }

    #[test]
    fn test_without_submeshes_uses_whole_index_buffer() {
        let mut mdl = model(&[1]);
        mdl.meshes[0].submeshes.clear();
        mdl.materials.clear();
        let mesh = MeshExporter::export(&mdl, 0, 0, None).unwrap();
        assert_eq!(mesh.submeshes.len(), 1);
        assert_eq!(mesh.submeshes[0].indices.len(), 6);
        assert_eq!(mesh.material, None);
    }
}
