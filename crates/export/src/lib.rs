//! xivmod Export - Model and Skeleton Conversion
//!
//! Pure transformations from already-parsed host model and skeleton data into
//! a scene graph ready for serialisation to an interchange format. Nothing
//! here touches the host process, so exports are safe to run on any thread
//! and concurrently across independent inputs.
//!
//! # Modules
//!
//! - [`xiv`] - Input model and skeleton structures
//! - [`skeleton`] - Flattening layered skeletons into one joint hierarchy
//! - [`mesh`] - Per-mesh vertex, index and skin conversion
//! - [`model`] - Whole-model export and scene assembly
//! - [`scene`] - The scene graph exports are added to
//!
//! # Example
//!
//! ```ignore
//! use xivmod_export::{ModelExporter, SceneBuilder};
//!
//! let model = ModelExporter::export(&mdl, Some(&skeletons))?;
//! let mut scene = SceneBuilder::new();
//! model.add_to_scene(&mut scene)?;
//! ```

pub mod error;
pub mod mesh;
pub mod model;
pub mod scene;
pub mod skeleton;
pub mod xiv;

pub use error::ExportError;
pub use mesh::{Mesh, MeshExporter, Submesh, VertexAttributes};
pub use model::{Model, ModelExporter};
pub use scene::{NodeId, SceneBuilder, SceneEntry, SceneMesh, SceneNode};
pub use skeleton::{convert_skeleton, GltfSkeleton, Joint};
pub use xiv::{MdlFile, MdlLod, MdlMesh, MdlSubmesh, Transform, VertexData, XivBone, XivSkeleton};
