//! Character lifecycle listeners
//!
//! - OnCharacterCopy: a character's state is being copied onto another
//!   (cutscene actors, GPose actors)
//! - OnCharacterDestructor: a character is about to be destroyed

use std::sync::LazyLock;

use parking_lot::RwLock;
use slotmap::SecondaryMap;
use xivmod_sdk::{Character, ObjectIndex};

use super::{register_key, ListenerKey, ListenerType, Priority};
use crate::memory;
use crate::offsets::offsets;

/// A host character seen by a listener
///
/// The object index is read once (guarded) when the event fires, so
/// callbacks never touch host memory themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterRef {
    address: usize,
    object_index: Option<ObjectIndex>,
}

impl CharacterRef {
    /// Read the identity of a host character
    ///
    /// Returns `None` for a null pointer.
    pub fn from_ptr(character: *mut Character) -> Option<Self> {
        if character.is_null() {
            return None;
        }
        let address = character as usize;
        // SAFETY: u16 is valid for any bit pattern
        let raw: Option<u16> = unsafe { memory::read_field(address, offsets().game_object_index) };
        Some(Self {
            address,
            object_index: raw.map(ObjectIndex).filter(|idx| idx.is_valid()),
        })
    }

    /// Build a reference from already-known values
    pub fn new(address: usize, object_index: Option<ObjectIndex>) -> Self {
        Self {
            address,
            object_index,
        }
    }

    /// Address of the character
    pub fn address(&self) -> usize {
        self.address
    }

    /// Index in the object table, if it could be read
    pub fn object_index(&self) -> Option<ObjectIndex> {
        self.object_index
    }
}

// Callback types
/// Callback for character copies: `(target, source)`
pub type CharacterCopyCallback = Box<dyn Fn(Option<CharacterRef>, Option<CharacterRef>) + Send + Sync>;

/// Callback for character destruction
pub type CharacterDestructorCallback = Box<dyn Fn(CharacterRef) + Send + Sync>;

struct Registry<C> {
    callbacks: SecondaryMap<ListenerKey, (Priority, C)>,
    /// Keys in firing order
    order: Vec<ListenerKey>,
}

impl<C> Registry<C> {
    fn new() -> Self {
        Self {
            callbacks: SecondaryMap::new(),
            order: Vec::new(),
        }
    }

    fn insert(&mut self, key: ListenerKey, priority: Priority, callback: C) {
        self.callbacks.insert(key, (priority, callback));
        // Stable: equal priorities fire in registration order
        let pos = self
            .order
            .partition_point(|k| self.callbacks.get(*k).map(|(p, _)| *p <= priority).unwrap_or(true));
        self.order.insert(pos, key);
    }

    fn remove(&mut self, key: ListenerKey) -> bool {
        self.order.retain(|k| *k != key);
        self.callbacks.remove(key).is_some()
    }

    fn iter(&self) -> impl Iterator<Item = &C> {
        self.order
            .iter()
            .filter_map(|k| self.callbacks.get(*k).map(|(_, c)| c))
    }
}

static CHARACTER_COPY_REGISTRY: LazyLock<RwLock<Registry<CharacterCopyCallback>>> =
    LazyLock::new(|| RwLock::new(Registry::new()));

static CHARACTER_DESTRUCTOR_REGISTRY: LazyLock<RwLock<Registry<CharacterDestructorCallback>>> =
    LazyLock::new(|| RwLock::new(Registry::new()));

// === OnCharacterCopy ===

/// Register a callback to be called when a character is copied onto another
///
/// Called before the host performs the copy. Either side may be absent.
///
/// # Returns
/// A key that can be used to unregister the callback via `remove_listener`.
pub fn on_character_copy<F>(priority: Priority, callback: F) -> ListenerKey
where
    F: Fn(Option<CharacterRef>, Option<CharacterRef>) + Send + Sync + 'static,
{
    let key = register_key(ListenerType::CharacterCopy);
    CHARACTER_COPY_REGISTRY
        .write()
        .insert(key, priority, Box::new(callback));
    key
}

pub(super) fn remove_character_copy(key: ListenerKey) -> bool {
    CHARACTER_COPY_REGISTRY.write().remove(key)
}

/// Fire all character copy callbacks
pub fn fire_character_copy(target: Option<CharacterRef>, source: Option<CharacterRef>) {
    tracing::trace!("Firing OnCharacterCopy: {:?} <- {:?}", target, source);
    let registry = CHARACTER_COPY_REGISTRY.read();
    for callback in registry.iter() {
        callback(target, source);
    }
}

// === OnCharacterDestructor ===

/// Register a callback to be called when a character is destroyed
///
/// The character is still valid during this callback but will be freed afterward.
///
/// # Returns
/// A key that can be used to unregister the callback via `remove_listener`.
pub fn on_character_destructor<F>(priority: Priority, callback: F) -> ListenerKey
where
    F: Fn(CharacterRef) + Send + Sync + 'static,
{
    let key = register_key(ListenerType::CharacterDestructor);
    CHARACTER_DESTRUCTOR_REGISTRY
        .write()
        .insert(key, priority, Box::new(callback));
    key
}

pub(super) fn remove_character_destructor(key: ListenerKey) -> bool {
    CHARACTER_DESTRUCTOR_REGISTRY.write().remove(key)
}

/// Fire all character destructor callbacks
pub fn fire_character_destructor(character: CharacterRef) {
    tracing::trace!("Firing OnCharacterDestructor: {:?}", character);
    let registry = CHARACTER_DESTRUCTOR_REGISTRY.read();
    for callback in registry.iter() {
        callback(character);
    }
}
