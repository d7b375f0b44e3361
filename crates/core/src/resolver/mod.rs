//! Mapping from host draw objects to the mod collection that governs them
//!
//! - [`actors`] - typed view of the host object table
//! - [`cutscene`] - cutscene actor slot to source actor bookkeeping
//! - [`collection`] - draw object to collection resolution with identity caches

pub mod actors;
pub mod collection;
pub mod cutscene;

pub use actors::{ActorTable, DrawObjectId, HostActorTable};
pub use collection::CollectionResolver;
pub use cutscene::{CutsceneIndex, CutsceneService};
