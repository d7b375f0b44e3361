//! Draw object to collection resolution
//!
//! The host hands detours a draw object. Resolution walks back to the owning
//! actor through the object table, redirects cutscene copies to the actor
//! they were copied from, then asks the [`CollectionSource`] for an explicit
//! assignment. Both steps are cached:
//!
//! - draw object -> object index, validated against the table on every hit
//! - draw objects missing from the table, remembered for [`MISS_TTL`]
//! - owning object index -> assignment, evicted on copy and destruction
//!
//! Assignments are cached under the actor whose identity produced them, so a
//! cutscene copy never outlives the actor it was copied from.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use xivmod_sdk::ObjectIndex;

use crate::collections::{CollectionSource, ModCollection, ResolveData};
use crate::listeners::{self, ListenerKey, Priority};

use super::actors::{ActorTable, DrawObjectId};
use super::cutscene::CutsceneIndex;

/// How long a draw object without an owner skips the table scan
pub const MISS_TTL: Duration = Duration::from_millis(500);

/// Expired misses are pruned once the cache grows past this
const MISS_PRUNE_LEN: usize = 256;

#[derive(Default)]
struct Caches {
    owners: DashMap<DrawObjectId, ObjectIndex>,
    misses: DashMap<DrawObjectId, Instant>,
    /// `None` records "identified, but nothing assigned"
    assignments: DashMap<ObjectIndex, Option<Arc<ModCollection>>>,
}

impl Caches {
    fn evict_index(&self, index: ObjectIndex) {
        self.assignments.remove(&index);
        self.owners.retain(|_, owner| *owner != index);
        // The slot may now own a draw object that was missing before
        self.misses.clear();
    }

    fn clear(&self) {
        self.owners.clear();
        self.misses.clear();
        self.assignments.clear();
    }

    fn is_recent_miss(&self, draw_object: DrawObjectId) -> bool {
        self.misses
            .get(&draw_object)
            .is_some_and(|seen| seen.elapsed() < MISS_TTL)
    }

    fn record_miss(&self, draw_object: DrawObjectId) {
        if self.misses.len() >= MISS_PRUNE_LEN {
            self.misses.retain(|_, seen| seen.elapsed() < MISS_TTL);
        }
        self.misses.insert(draw_object, Instant::now());
    }
}

/// Resolves the collection governing a draw object
pub struct CollectionResolver {
    actors: Arc<dyn ActorTable>,
    source: Arc<dyn CollectionSource>,
    cutscenes: Arc<CutsceneIndex>,
    caches: Arc<Caches>,
    listeners: Vec<ListenerKey>,
}

impl CollectionResolver {
    pub fn new(
        actors: Arc<dyn ActorTable>,
        source: Arc<dyn CollectionSource>,
        cutscenes: Arc<CutsceneIndex>,
    ) -> Self {
        Self {
            actors,
            source,
            cutscenes,
            caches: Arc::new(Caches::default()),
            listeners: Vec::new(),
        }
    }

    /// Evict cached state when characters are copied or destroyed
    pub fn subscribe(&mut self) {
        if !self.listeners.is_empty() {
            return;
        }

        let caches = self.caches.clone();
        self.listeners.push(listeners::on_character_copy(
            Priority::CollectionResolver,
            move |target, _source| {
                if let Some(index) = target.and_then(|t| t.object_index()) {
                    caches.evict_index(index);
                }
            },
        ));

        let caches = self.caches.clone();
        self.listeners.push(listeners::on_character_destructor(
            Priority::CollectionResolver,
            move |character| {
                if let Some(index) = character.object_index() {
                    caches.evict_index(index);
                }
            },
        ));
    }

    /// Determine the collection for `draw_object`
    ///
    /// An explicit assignment is returned regardless of `allow_fallback`.
    /// Without one the default collection is returned when `allow_fallback`
    /// is set, the empty collection otherwise. Unreadable or unknown objects
    /// take the same fallback path.
    pub fn identify_collection(&self, draw_object: DrawObjectId, allow_fallback: bool) -> ResolveData {
        if draw_object.is_null() {
            return self.fallback(allow_fallback, None);
        }

        let Some(index) = self.find_owner(draw_object) else {
            tracing::trace!("No owner found for draw object {:?}", draw_object);
            return self.fallback(allow_fallback, None);
        };

        match self.assignment(index) {
            Some(collection) => ResolveData {
                collection,
                game_object: Some(index),
            },
            None => self.fallback(allow_fallback, Some(index)),
        }
    }

    /// Collection for an actor by object index, with cutscene redirection
    pub fn collection_for_actor(&self, index: ObjectIndex, allow_fallback: bool) -> ResolveData {
        match self.assignment(index) {
            Some(collection) => ResolveData {
                collection,
                game_object: Some(index),
            },
            None => self.fallback(allow_fallback, Some(index)),
        }
    }

    /// Drop every cached result, e.g. after assignments changed
    pub fn invalidate_all(&self) {
        self.caches.clear();
        tracing::debug!("Collection resolver caches cleared");
    }

    /// Evict everything cached for one object index
    pub fn invalidate(&self, index: ObjectIndex) {
        self.caches.evict_index(index);
    }

    fn fallback(&self, allow_fallback: bool, game_object: Option<ObjectIndex>) -> ResolveData {
        let collection = if allow_fallback {
            self.source.default_collection()
        } else {
            ModCollection::empty()
        };
        ResolveData {
            collection,
            game_object,
        }
    }

    fn find_owner(&self, draw_object: DrawObjectId) -> Option<ObjectIndex> {
        let cached = self.caches.owners.get(&draw_object).map(|entry| *entry);
        if let Some(index) = cached {
            if self.actors.draw_object_of(index) == Some(draw_object) {
                return Some(index);
            }
            // Slot now holds a different draw object
            self.caches.owners.remove(&draw_object);
        }

        if self.caches.is_recent_miss(draw_object) {
            return None;
        }

        let len = u16::try_from(self.actors.len()).unwrap_or(u16::MAX);
        let Some(index) = (0..len)
            .map(ObjectIndex)
            .find(|&i| self.actors.draw_object_of(i) == Some(draw_object))
        else {
            self.caches.record_miss(draw_object);
            return None;
        };
        self.caches.misses.remove(&draw_object);
        self.caches.owners.insert(draw_object, index);
        Some(index)
    }

    fn assignment(&self, index: ObjectIndex) -> Option<Arc<ModCollection>> {
        let owner = self.cutscenes.resolve(index);
        if let Some(cached) = self.caches.assignments.get(&owner) {
            return cached.clone();
        }

        // Unreadable actors are not cached; the read may succeed next time
        let identity = self.actors.identity_of(owner)?;
        let collection = self.source.for_actor(&identity);
        self.caches.assignments.insert(owner, collection.clone());
        collection
    }
}

impl Drop for CollectionResolver {
    fn drop(&mut self) {
        for key in self.listeners.drain(..) {
            listeners::remove_listener(key);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::collections::{CollectionRegistry, RenderParameter};
    use crate::listeners::{fire_character_copy, fire_character_destructor, CharacterRef};
    use crate::resolver::actors::fake::FakeActorTable;
    use crate::resolver::cutscene::CutsceneService;
    use std::sync::atomic::Ordering;
    use xivmod_sdk::CUTSCENE_START_INDEX;

    pub(crate) struct Fixture {
        pub actors: Arc<FakeActorTable>,
        pub registry: Arc<CollectionRegistry>,
        pub cutscenes: Arc<CutsceneIndex>,
        pub resolver: CollectionResolver,
    }

    pub(crate) fn fixture() -> Fixture {
        let actors = Arc::new(FakeActorTable::new());
        let registry = Arc::new(CollectionRegistry::new());
        registry.create("Default");
        registry.create("Glamour");
        registry.set_override("Glamour", RenderParameter::RacialScaling, Some(0xAAAA));
        registry.set_default(Some("Default"));
        registry.assign("Alpha", Some("Glamour"));

        actors.spawn(0, 0x1000, "Alpha");
        actors.spawn(1, 0x2000, "Beta");

        let cutscenes = Arc::new(CutsceneIndex::new());
        let resolver = CollectionResolver::new(actors.clone(), registry.clone(), cutscenes.clone());
        Fixture {
            actors,
            registry,
            cutscenes,
            resolver,
        }
    }

    #[test]
    fn test_explicit_assignment_ignores_fallback() {
        let f = fixture();
        let glamour = f.registry.get("Glamour").unwrap();
        for allow in [true, false] {
            let data = f.resolver.identify_collection(DrawObjectId::new(0x1000), allow);
            assert!(Arc::ptr_eq(&data.collection, &glamour));
            assert_eq!(data.game_object, Some(ObjectIndex(0)));
        }
    }

    #[test]
    fn test_unassigned_uses_fallback() {
        let f = fixture();
        let data = f.resolver.identify_collection(DrawObjectId::new(0x2000), true);
        assert_eq!(data.collection.name(), "Default");
        assert_eq!(data.game_object, Some(ObjectIndex(1)));

        let data = f.resolver.identify_collection(DrawObjectId::new(0x2000), false);
        assert!(data.is_empty_collection());
    }

    #[test]
    fn test_unknown_and_null_handles() {
        let f = fixture();
        assert_eq!(
            f.resolver.identify_collection(DrawObjectId::NULL, true).collection.name(),
            "Default"
        );
        let data = f.resolver.identify_collection(DrawObjectId::new(0xDEAD), false);
        assert!(data.is_empty_collection());
        assert_eq!(data.game_object, None);
    }

    #[test]
    fn test_owner_cache_hit_revalidates() {
        let f = fixture();
        f.resolver.identify_collection(DrawObjectId::new(0x2000), true);
        let before = f.actors.reads.load(Ordering::Relaxed);
        f.resolver.identify_collection(DrawObjectId::new(0x2000), true);
        // One validation read, no table scan
        assert_eq!(f.actors.reads.load(Ordering::Relaxed) - before, 1);
    }

    #[test]
    fn test_reassigned_draw_object_is_rescanned() {
        let f = fixture();
        let data = f.resolver.identify_collection(DrawObjectId::new(0x1000), false);
        assert_eq!(data.collection.name(), "Glamour");

        // Slot 0 gets a new draw object; 0x1000 now belongs to Beta at slot 5
        f.actors.spawn(0, 0x9000, "Alpha");
        f.actors.spawn(5, 0x1000, "Beta");
        f.resolver.invalidate(ObjectIndex(5));

        let data = f.resolver.identify_collection(DrawObjectId::new(0x1000), false);
        assert_eq!(data.game_object, Some(ObjectIndex(5)));
        assert!(data.is_empty_collection());
    }

    #[test]
    fn test_cutscene_actor_uses_parent_collection() {
        let f = fixture();
        let cutscene = ObjectIndex(CUTSCENE_START_INDEX);
        f.actors.spawn(cutscene.get(), 0x5000, "Cutscene Copy");
        f.cutscenes.on_copy(Some(cutscene), Some(ObjectIndex(0)));

        let data = f.resolver.identify_collection(DrawObjectId::new(0x5000), false);
        assert_eq!(data.collection.name(), "Glamour");
        assert_eq!(data.game_object, Some(cutscene));
    }

    #[test]
    fn test_invalidate_all_picks_up_new_assignment() {
        let f = fixture();
        let draw = DrawObjectId::new(0x2000);
        assert_eq!(f.resolver.identify_collection(draw, false).collection.name(), "None");

        f.registry.assign("Beta", Some("Glamour"));
        // Still cached
        assert_eq!(f.resolver.identify_collection(draw, false).collection.name(), "None");

        f.resolver.invalidate_all();
        assert_eq!(f.resolver.identify_collection(draw, false).collection.name(), "Glamour");
    }

    #[test]
    fn test_despawned_actor_falls_back() {
        let f = fixture();
        let draw = DrawObjectId::new(0x1000);
        f.resolver.identify_collection(draw, false);
        f.actors.despawn(0);
        f.resolver.invalidate(ObjectIndex(0));

        let data = f.resolver.identify_collection(draw, true);
        assert_eq!(data.collection.name(), "Default");
        assert_eq!(data.game_object, None);
    }

    #[test]
    fn test_collection_for_actor() {
        let f = fixture();
        assert_eq!(f.resolver.collection_for_actor(ObjectIndex(0), false).collection.name(), "Glamour");
        assert_eq!(f.resolver.collection_for_actor(ObjectIndex(42), true).collection.name(), "Default");
    }

    #[test]
    fn test_destroyed_parent_does_not_leak_into_cutscene_copy() {
        let f = fixture();
        let cutscene = ObjectIndex(CUTSCENE_START_INDEX);
        let draw = DrawObjectId::new(0x5000);
        f.actors.spawn(cutscene.get(), 0x5000, "Cutscene Copy");
        f.cutscenes.on_copy(Some(cutscene), Some(ObjectIndex(0)));
        assert_eq!(f.resolver.identify_collection(draw, false).collection.name(), "Glamour");

        // Alpha leaves and an unassigned actor takes over its slot
        f.resolver.invalidate(ObjectIndex(0));
        f.actors.despawn(0);
        f.actors.spawn(0, 0x1000, "Beta");

        let data = f.resolver.identify_collection(draw, false);
        assert!(data.is_empty_collection());
        assert_eq!(data.game_object, Some(cutscene));
    }

    #[test]
    fn test_missing_draw_object_is_not_rescanned() {
        let f = fixture();
        let draw = DrawObjectId::new(0x7000);
        assert!(f.resolver.identify_collection(draw, false).is_empty_collection());

        let before = f.actors.reads.load(Ordering::Relaxed);
        assert!(f.resolver.identify_collection(draw, false).is_empty_collection());
        assert_eq!(f.actors.reads.load(Ordering::Relaxed), before);

        // A lifecycle event for the new owner forgets the miss
        f.actors.spawn(7, 0x7000, "Alpha");
        f.resolver.invalidate(ObjectIndex(7));
        let data = f.resolver.identify_collection(draw, false);
        assert_eq!(data.collection.name(), "Glamour");
        assert_eq!(data.game_object, Some(ObjectIndex(7)));

        f.resolver.identify_collection(DrawObjectId::new(0x7100), false);
        f.resolver.invalidate_all();
        let before = f.actors.reads.load(Ordering::Relaxed);
        f.resolver.identify_collection(DrawObjectId::new(0x7100), false);
        assert_eq!(f.actors.reads.load(Ordering::Relaxed) - before, f.actors.len());
    }

    #[test]
    fn test_lifecycle_listeners_drive_resolution() {
        let f = fixture();
        let cutscene = ObjectIndex(CUTSCENE_START_INDEX + 10);
        let draw = DrawObjectId::new(0x5A00);
        f.actors.spawn(cutscene.get(), 0x5A00, "Cutscene Copy");

        let mut cutscenes = CutsceneService::new(f.actors.clone());
        cutscenes.subscribe();
        let mut resolver = CollectionResolver::new(f.actors.clone(), f.registry.clone(), cutscenes.index());
        resolver.subscribe();

        // Not yet a copy of anyone: resolves as itself
        assert!(resolver.identify_collection(draw, false).is_empty_collection());

        fire_character_copy(
            Some(CharacterRef::new(0x5A00_0001, Some(cutscene))),
            Some(CharacterRef::new(0x5A00_0002, Some(ObjectIndex(0)))),
        );
        assert_eq!(cutscenes.parent_of(cutscene), Some(ObjectIndex(0)));
        assert_eq!(resolver.identify_collection(draw, false).collection.name(), "Glamour");

        // Destroying the parent evicts its cached assignment
        fire_character_destructor(CharacterRef::new(0x5A00_0002, Some(ObjectIndex(0))));
        f.actors.spawn(0, 0x1000, "Beta");
        assert!(resolver.identify_collection(draw, false).is_empty_collection());

        // Destroying the copy forgets its parent
        fire_character_destructor(CharacterRef::new(0x5A00_0001, Some(cutscene)));
        assert_eq!(cutscenes.parent_of(cutscene), None);

        let keys: Vec<ListenerKey> = cutscenes
            .listener_keys()
            .iter()
            .chain(&resolver.listeners)
            .copied()
            .collect();
        assert_eq!(keys.len(), 4);
        drop(resolver);
        drop(cutscenes);
        for key in keys {
            assert!(!listeners::remove_listener(key));
        }
    }
}
