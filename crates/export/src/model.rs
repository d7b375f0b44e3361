//! Whole-model export

use crate::error::ExportError;
use crate::mesh::{Mesh, MeshExporter};
use crate::scene::SceneBuilder;
use crate::skeleton::{convert_skeleton, GltfSkeleton};
use crate::xiv::{MdlFile, XivSkeleton};

/// Output of one export: meshes in LOD-major, offset-minor order plus the
/// skeleton they are bound to
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    meshes: Vec<Mesh>,
    skeleton: Option<GltfSkeleton>,
}

impl Model {
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn skeleton(&self) -> Option<&GltfSkeleton> {
        self.skeleton.as_ref()
    }

    /// Add the model to a scene
    ///
    /// The skeleton root goes in first so skinned meshes can reference their
    /// joint nodes, then every mesh in export order.
    pub fn add_to_scene(&self, scene: &mut SceneBuilder) -> Result<(), ExportError> {
        let bound = self.skeleton.as_ref().map(|skeleton| {
            let nodes = scene.add_skeleton(skeleton);
            (nodes, skeleton.inverse_bind_matrices())
        });

        for mesh in &self.meshes {
            match (&mesh.skin, &bound) {
                (Some(skin), Some((nodes, inverse_binds))) => {
                    let joints = skin.joints.iter().map(|&j| nodes[j]).collect();
                    let binds = skin.joints.iter().map(|&j| inverse_binds[j]).collect();
                    scene.add_skinned_mesh(mesh.clone(), joints, binds)?;
                }
                _ => {
                    scene.add_rigid_mesh(mesh.clone());
                }
            }
        }
        Ok(())
    }
}

/// Converts whole models
pub struct ModelExporter;

impl ModelExporter {
    /// Export every mesh of every LOD, skinned to `skeletons` when given
    ///
    /// The skeletons are converted once. A skeleton without a root exports
    /// the model unskinned.
    pub fn export(mdl: &MdlFile, skeletons: Option<&[XivSkeleton]>) -> Result<Model, ExportError> {
        let skeleton = match skeletons {
            Some(skeletons) => convert_skeleton(skeletons)?,
            None => None,
        };
        let meshes = Self::convert_meshes(mdl, skeleton.as_ref())?;

        tracing::debug!(
            "Exported model: {} LODs, {} meshes, {} joints",
            mdl.lod_count(),
            meshes.len(),
            skeleton.as_ref().map(GltfSkeleton::len).unwrap_or(0)
        );
        Ok(Model { meshes, skeleton })
    }

    fn convert_meshes(mdl: &MdlFile, skeleton: Option<&GltfSkeleton>) -> Result<Vec<Mesh>, ExportError> {
        let mut meshes = Vec::new();

        for (lod_index, lod) in mdl.lods.iter().enumerate() {
            let start = lod.mesh_index as usize;
            let end = start + lod.mesh_count as usize;
            if end > mdl.meshes.len() {
                return Err(ExportError::MeshOutOfRange {
                    lod: lod_index,
                    start,
                    end,
                    count: mdl.meshes.len(),
                });
            }

            for mesh_index in start..end {
                meshes.push(MeshExporter::export(mdl, lod_index, mesh_index, skeleton)?);
            }
        }

        Ok(meshes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::model;
    use crate::scene::SceneEntry;
    use crate::xiv::{Transform, XivBone};

    fn skeletons() -> Vec<XivSkeleton> {
        vec![XivSkeleton::new(vec![
            XivBone::new("root", -1, Transform::IDENTITY),
            XivBone::new("hip", 0, Transform::IDENTITY),
            XivBone::new("spine", 1, Transform::IDENTITY),
        ])]
    }

    #[test]
    fn test_mesh_count_and_order() {
        let mdl = model(&[3, 2, 1]);
        let model = ModelExporter::export(&mdl, None).unwrap();

        let order: Vec<(usize, usize)> = model.meshes().iter().map(|m| (m.lod, m.mesh_index)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (0, 2), (1, 3), (1, 4), (2, 5)]);
        assert!(model.skeleton().is_none());
    }

    #[test]
    fn test_empty_lods() {
        let mdl = model(&[0, 2]);
        let model = ModelExporter::export(&mdl, None).unwrap();
        assert_eq!(model.meshes().len(), 2);
        assert!(model.meshes().iter().all(|m| m.lod == 1));
    }

    #[test]
    fn test_lod_range_past_meshes_fails() {
        let mut mdl = model(&[1]);
        mdl.lods[0].mesh_count = 4;
        assert!(matches!(
            ModelExporter::export(&mdl, None),
            Err(ExportError::MeshOutOfRange { lod: 0, end: 4, .. })
        ));
    }

    #[test]
    fn test_rootless_skeleton_exports_unskinned() {
        let mdl = model(&[1]);
        let rootless = vec![XivSkeleton::new(vec![XivBone::new("hip", 0, Transform::IDENTITY)])];
        let model = ModelExporter::export(&mdl, Some(&rootless)).unwrap();
        assert!(model.skeleton().is_none());
        assert!(!model.meshes()[0].is_skinned());
    }

    #[test]
    fn test_skeleton_root_added_before_meshes() {
        let mdl = model(&[2, 1]);
        let skeletons = skeletons();
        let model = ModelExporter::export(&mdl, Some(&skeletons)).unwrap();

        let mut scene = SceneBuilder::new();
        model.add_to_scene(&mut scene).unwrap();

        let entries = scene.entries();
        assert_eq!(entries.len(), 4);
        let SceneEntry::Node(root) = entries[0] else {
            panic!("first entry should be the skeleton root, got {:?}", entries[0]);
        };
        assert_eq!(scene.node(root).unwrap().name, "root");
        assert_eq!(&entries[1..], &[SceneEntry::Mesh(0), SceneEntry::Mesh(1), SceneEntry::Mesh(2)]);

        let skinned = &scene.meshes()[0];
        let names: Vec<&str> = skinned
            .joints
            .iter()
            .map(|&id| scene.node(id).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["hip", "spine"]);
        assert_eq!(skinned.inverse_bind_matrices.len(), 2);
    }

    #[test]
    fn test_without_skeleton_only_meshes_are_added() {
        let mdl = model(&[1]);
        let model = ModelExporter::export(&mdl, None).unwrap();
        let mut scene = SceneBuilder::new();
        model.add_to_scene(&mut scene).unwrap();
        assert_eq!(scene.entries(), &[SceneEntry::Mesh(0)]);
        assert!(scene.nodes().is_empty());
    }
}
