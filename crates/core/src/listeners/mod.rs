//! Listeners for host character lifecycle events
//!
//! Callbacks are stored in a thread-safe registry and invoked by the detours
//! of the corresponding host functions. Every registration returns a
//! [`ListenerKey`] that unsubscribes it again.
//!
//! # Example
//!
//! ```ignore
//! use xivmod_core::listeners::{self, Priority};
//!
//! let key = listeners::on_character_destructor(Priority::Default, |character| {
//!     tracing::info!("Character {:?} destroyed", character.object_index());
//! });
//!
//! // Later, unregister if needed
//! listeners::remove_listener(key);
//! ```

pub mod character;

use std::sync::LazyLock;

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Key for registered listeners, used for removal
    pub struct ListenerKey;
}

/// Ordering of callbacks for one event: lower values run first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Cutscene bookkeeping must observe copies before anything resolves collections
    CutsceneService = 0,
    /// Identity caches are evicted after bookkeeping
    CollectionResolver = 10,
    Default = 100,
}

/// Internal enum to track which registry a listener belongs to
#[derive(Clone, Copy, Debug)]
enum ListenerType {
    CharacterCopy,
    CharacterDestructor,
}

/// Mapping from ListenerKey to its type for removal
struct KeyRegistry {
    keys: SlotMap<ListenerKey, ListenerType>,
}

static KEY_REGISTRY: LazyLock<RwLock<KeyRegistry>> = LazyLock::new(|| {
    RwLock::new(KeyRegistry {
        keys: SlotMap::with_key(),
    })
});

/// Register a key in the global registry
fn register_key(listener_type: ListenerType) -> ListenerKey {
    KEY_REGISTRY.write().keys.insert(listener_type)
}

/// Remove a listener by its key
///
/// Returns `true` if the listener was found and removed.
pub fn remove_listener(key: ListenerKey) -> bool {
    let listener_type = KEY_REGISTRY.write().keys.remove(key);

    match listener_type {
        Some(ListenerType::CharacterCopy) => character::remove_character_copy(key),
        Some(ListenerType::CharacterDestructor) => character::remove_character_destructor(key),
        None => false,
    }
}

// Re-export public API
pub use character::{on_character_copy, on_character_destructor, CharacterRef};

// Re-export fire functions for the detours
pub use character::{fire_character_copy, fire_character_destructor};
