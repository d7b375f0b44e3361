//! In-memory collection store
//!
//! Implements [`CollectionSource`] for the plugin: the configuration side
//! pushes collections, overrides and assignments in through FFI and the
//! resolver reads them back.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{ActorIdentity, CollectionSource, ModCollection, RenderParameter};

#[derive(Default)]
struct RegistryState {
    collections: HashMap<String, Arc<ModCollection>>,
    /// Actor name -> collection name
    assignments: HashMap<String, String>,
    default: Option<String>,
}

/// Thread-safe store of collections and per-actor assignments
#[derive(Default)]
pub struct CollectionRegistry {
    state: RwLock<RegistryState>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection (no-op if it exists)
    pub fn create(&self, name: &str) {
        let mut state = self.state.write();
        if !state.collections.contains_key(name) {
            state
                .collections
                .insert(name.to_string(), Arc::new(ModCollection::new(name)));
            tracing::debug!("Created collection '{}'", name);
        }
    }

    /// Set an override on a collection
    ///
    /// Collections are immutable once handed out, so this publishes a new
    /// instance; callers holding the old one keep a consistent view.
    pub fn set_override(&self, name: &str, parameter: RenderParameter, value: Option<usize>) -> bool {
        let mut state = self.state.write();
        let Some(existing) = state.collections.get(name) else {
            tracing::warn!("Cannot set override on unknown collection '{}'", name);
            return false;
        };

        let mut updated = ModCollection::clone(existing);
        match value {
            Some(v) => updated.set_override(parameter, v),
            None => {
                updated.clear_override(parameter);
            }
        }
        state.collections.insert(name.to_string(), Arc::new(updated));
        true
    }

    /// Assign a collection to an actor by name; `None` clears the assignment
    pub fn assign(&self, actor_name: &str, collection: Option<&str>) -> bool {
        let mut state = self.state.write();
        match collection {
            Some(c) if !state.collections.contains_key(c) => {
                tracing::warn!("Cannot assign unknown collection '{}' to '{}'", c, actor_name);
                false
            }
            Some(c) => {
                state.assignments.insert(actor_name.to_string(), c.to_string());
                true
            }
            None => state.assignments.remove(actor_name).is_some(),
        }
    }

    /// Choose the default collection; `None` makes the default the empty collection
    pub fn set_default(&self, collection: Option<&str>) -> bool {
        let mut state = self.state.write();
        match collection {
            Some(c) if !state.collections.contains_key(c) => false,
            Some(c) => {
                state.default = Some(c.to_string());
                true
            }
            None => {
                state.default = None;
                true
            }
        }
    }

    /// Look up a collection by name
    pub fn get(&self, name: &str) -> Option<Arc<ModCollection>> {
        self.state.read().collections.get(name).cloned()
    }
}

impl CollectionSource for CollectionRegistry {
    fn for_actor(&self, actor: &ActorIdentity) -> Option<Arc<ModCollection>> {
        let state = self.state.read();
        let name = state.assignments.get(&actor.name)?;
        state.collections.get(name).cloned()
    }

    fn default_collection(&self) -> Arc<ModCollection> {
        let state = self.state.read();
        state
            .default
            .as_ref()
            .and_then(|name| state.collections.get(name).cloned())
            .unwrap_or_else(ModCollection::empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xivmod_sdk::{ObjectIndex, ObjectKind};

    fn actor(name: &str) -> ActorIdentity {
        ActorIdentity {
            object_index: ObjectIndex(0),
            kind: ObjectKind::Player,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_assignment_and_default() {
        let registry = CollectionRegistry::new();
        registry.create("Base");
        registry.create("Glamour");
        assert!(registry.assign("Alpha", Some("Glamour")));
        assert!(!registry.assign("Beta", Some("Missing")));

        assert_eq!(registry.for_actor(&actor("Alpha")).unwrap().name(), "Glamour");
        assert!(registry.for_actor(&actor("Beta")).is_none());

        assert_eq!(registry.default_collection().name(), ModCollection::EMPTY_NAME);
        assert!(registry.set_default(Some("Base")));
        assert_eq!(registry.default_collection().name(), "Base");

        assert!(registry.assign("Alpha", None));
        assert!(registry.for_actor(&actor("Alpha")).is_none());
    }

    #[test]
    fn test_override_publishes_new_instance() {
        let registry = CollectionRegistry::new();
        registry.create("Base");
        let before = registry.get("Base").unwrap();
        assert!(registry.set_override("Base", RenderParameter::RacialScaling, Some(0x10)));
        let after = registry.get("Base").unwrap();

        assert_eq!(before.override_for(RenderParameter::RacialScaling), None);
        assert_eq!(after.override_for(RenderParameter::RacialScaling), Some(0x10));
        assert!(!registry.set_override("Missing", RenderParameter::RacialScaling, Some(1)));
    }
}
