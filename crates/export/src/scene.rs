//! Scene graph populated by exports
//!
//! A flat arena of nodes plus the meshes attached to the scene. Every
//! insertion is recorded in order so a serialiser can replay it, and skinned
//! meshes may only reference joint nodes that are already part of the scene.

use glam::Mat4;

use crate::error::ExportError;
use crate::mesh::Mesh;
use crate::skeleton::GltfSkeleton;
use crate::xiv::Transform;

/// Index of a node in a [`SceneBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub local: Transform,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// A mesh placed in the scene
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMesh {
    pub mesh: Mesh,
    /// Scene nodes for each skin joint slot, empty for rigid meshes
    pub joints: Vec<NodeId>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// One insertion into the scene, in the order it happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEntry {
    /// A top-level node (and its subtree)
    Node(NodeId),
    /// Index into [`SceneBuilder::meshes`]
    Mesh(usize),
}

#[derive(Debug, Clone, Default)]
pub struct SceneBuilder {
    nodes: Vec<SceneNode>,
    meshes: Vec<SceneMesh>,
    entries: Vec<SceneEntry>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level node
    pub fn add_node(&mut self, name: impl Into<String>, local: Transform) -> NodeId {
        let id = self.push_node(name.into(), local, None);
        self.entries.push(SceneEntry::Node(id));
        id
    }

    /// Add a skeleton's whole hierarchy under its root
    ///
    /// Returns the scene node of every joint, indexed like the skeleton's
    /// joints.
    pub fn add_skeleton(&mut self, skeleton: &GltfSkeleton) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = Vec::with_capacity(skeleton.len());
        for joint in skeleton.joints() {
            // Joints are stored parents-first
            let parent = joint.parent.map(|p| ids[p]);
            ids.push(self.push_node(joint.name.clone(), joint.local, parent));
        }
        self.entries.push(SceneEntry::Node(ids[skeleton.root()]));
        ids
    }

    /// Add a mesh without a skin
    pub fn add_rigid_mesh(&mut self, mesh: Mesh) -> usize {
        self.push_mesh(SceneMesh {
            mesh,
            joints: Vec::new(),
            inverse_bind_matrices: Vec::new(),
        })
    }

    /// Add a mesh skinned to existing scene nodes
    pub fn add_skinned_mesh(
        &mut self,
        mesh: Mesh,
        joints: Vec<NodeId>,
        inverse_bind_matrices: Vec<Mat4>,
    ) -> Result<usize, ExportError> {
        if let Some(missing) = joints.iter().find(|id| id.0 >= self.nodes.len()) {
            return Err(ExportError::MissingNode(missing.0));
        }
        Ok(self.push_mesh(SceneMesh {
            mesh,
            joints,
            inverse_bind_matrices,
        }))
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn meshes(&self) -> &[SceneMesh] {
        &self.meshes
    }

    /// Insertions in order
    pub fn entries(&self) -> &[SceneEntry] {
        &self.entries
    }

    fn push_node(&mut self, name: String, local: Transform, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SceneNode {
            name,
            local,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    fn push_mesh(&mut self, mesh: SceneMesh) -> usize {
        let index = self.meshes.len();
        self.meshes.push(mesh);
        self.entries.push(SceneEntry::Mesh(index));
        index
    }
}
