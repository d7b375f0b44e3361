//! Mod collections and the capability the core consumes to look them up
//!
//! A collection is a named set of overrides managed by the configuration side
//! of the mod. The core never owns collections; it receives them as shared
//! `Arc`s and compares them by identity.

mod registry;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use xivmod_sdk::{ObjectIndex, ObjectKind};

pub use registry::CollectionRegistry;

/// Global render parameters a collection may override
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderParameter {
    /// Racial scaling table (the human CMP resource)
    RacialScaling = 0,
    /// First decal texture resource
    PrimaryDecal = 1,
    /// Second decal texture resource
    SecondaryDecal = 2,
}

impl RenderParameter {
    /// All parameters, in the order detours acquire them
    pub const ALL: [RenderParameter; 3] = [
        RenderParameter::RacialScaling,
        RenderParameter::PrimaryDecal,
        RenderParameter::SecondaryDecal,
    ];

    /// Decode a raw parameter id (FFI)
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::RacialScaling),
            1 => Some(Self::PrimaryDecal),
            2 => Some(Self::SecondaryDecal),
            _ => None,
        }
    }

    /// Decal parameter for the first or second decal slot
    pub fn decal(is_first: bool) -> Self {
        if is_first {
            Self::PrimaryDecal
        } else {
            Self::SecondaryDecal
        }
    }
}

/// A named set of asset overrides
///
/// Override values are opaque host values (resource handle addresses) that
/// the configuration side prepared; the core only swaps them in and out.
#[derive(Clone, PartialEq, Eq)]
pub struct ModCollection {
    name: String,
    overrides: HashMap<RenderParameter, usize>,
}

impl ModCollection {
    /// Name of the collection that changes nothing
    pub const EMPTY_NAME: &'static str = "None";

    /// Create a collection without overrides
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overrides: HashMap::new(),
        }
    }

    /// The shared empty collection
    pub fn empty() -> Arc<ModCollection> {
        static EMPTY: std::sync::LazyLock<Arc<ModCollection>> =
            std::sync::LazyLock::new(|| Arc::new(ModCollection::new(ModCollection::EMPTY_NAME)));
        EMPTY.clone()
    }

    /// Builder-style override
    pub fn with_override(mut self, parameter: RenderParameter, value: usize) -> Self {
        self.overrides.insert(parameter, value);
        self
    }

    /// Set or replace an override
    pub fn set_override(&mut self, parameter: RenderParameter, value: usize) {
        self.overrides.insert(parameter, value);
    }

    /// Remove an override
    pub fn clear_override(&mut self, parameter: RenderParameter) -> Option<usize> {
        self.overrides.remove(&parameter)
    }

    /// Name of the collection
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Override value for a parameter, if any
    pub fn override_for(&self, parameter: RenderParameter) -> Option<usize> {
        self.overrides.get(&parameter).copied()
    }

    /// Returns true if this collection overrides nothing
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

impl fmt::Debug for ModCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModCollection")
            .field("name", &self.name)
            .field("overrides", &self.overrides.len())
            .finish()
    }
}

/// Who an actor is, as far as collection assignment is concerned
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorIdentity {
    pub object_index: ObjectIndex,
    pub kind: ObjectKind,
    pub name: String,
}

/// Read-only capability provided by the configuration subsystem
pub trait CollectionSource: Send + Sync {
    /// Collection explicitly assigned to an actor
    fn for_actor(&self, actor: &ActorIdentity) -> Option<Arc<ModCollection>>;

    /// Collection used when no explicit assignment exists and fallback is allowed
    fn default_collection(&self) -> Arc<ModCollection>;
}

/// A collection resolved for one hook invocation
///
/// Resolved once at detour entry and threaded through the call; nothing
/// downstream re-resolves.
#[derive(Debug, Clone)]
pub struct ResolveData {
    pub collection: Arc<ModCollection>,
    /// Game object the draw object belongs to, if one was identified
    pub game_object: Option<ObjectIndex>,
}

impl ResolveData {
    /// Resolution result for an unidentified object
    pub fn unassociated(collection: Arc<ModCollection>) -> Self {
        Self {
            collection,
            game_object: None,
        }
    }

    /// Returns true if both results resolve to the same collection instance
    pub fn same_collection(&self, other: &ResolveData) -> bool {
        Arc::ptr_eq(&self.collection, &other.collection)
    }

    /// Returns true if this is the shared empty collection
    pub fn is_empty_collection(&self) -> bool {
        Arc::ptr_eq(&self.collection, &ModCollection::empty())
    }
}
