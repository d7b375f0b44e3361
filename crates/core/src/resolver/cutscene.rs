//! Cutscene actor bookkeeping
//!
//! During cutscenes the host copies real actors into a reserved range of the
//! object table. The copy keeps the look of the source actor, so anything that
//! resolves per-actor state needs to know which real actor a cutscene slot
//! was copied from.

use std::ops::Range;
use std::sync::atomic::{AtomicI16, Ordering};
use std::sync::Arc;

use xivmod_sdk::{ObjectIndex, CUTSCENE_END_INDEX, CUTSCENE_START_INDEX};

use crate::collections::ActorIdentity;
use crate::listeners::{self, ListenerKey, Priority};

use super::actors::ActorTable;

/// Slot value for "not copied from anything"
const NO_PARENT: i16 = -1;

/// Fixed-size table from cutscene slot to source actor index
pub struct CutsceneIndex {
    range: Range<u16>,
    slots: Box<[AtomicI16]>,
}

impl Default for CutsceneIndex {
    fn default() -> Self {
        Self::with_range(CUTSCENE_START_INDEX..CUTSCENE_END_INDEX)
    }
}

impl CutsceneIndex {
    /// Table covering the host's cutscene range
    pub fn new() -> Self {
        Self::default()
    }

    /// Table covering an arbitrary index range
    pub fn with_range(range: Range<u16>) -> Self {
        let slots = range.clone().map(|_| AtomicI16::new(NO_PARENT)).collect();
        Self { range, slots }
    }

    /// Object indices covered by this table
    pub fn range(&self) -> Range<u16> {
        self.range.clone()
    }

    fn slot(&self, index: ObjectIndex) -> Option<&AtomicI16> {
        if !self.range.contains(&index.get()) {
            return None;
        }
        self.slots.get((index.get() - self.range.start) as usize)
    }

    /// Record that `target` was copied from `source`
    ///
    /// Targets outside the cutscene range are ignored. A missing or invalid
    /// source clears the slot.
    pub fn on_copy(&self, target: Option<ObjectIndex>, source: Option<ObjectIndex>) {
        let Some(slot) = target.and_then(|t| self.slot(t)) else {
            return;
        };
        let parent = source
            .filter(|s| s.is_valid())
            .and_then(|s| i16::try_from(s.get()).ok())
            .unwrap_or(NO_PARENT);
        slot.store(parent, Ordering::Release);
    }

    /// Forget the source of a destroyed cutscene actor
    pub fn on_destroy(&self, character: Option<ObjectIndex>) {
        if let Some(slot) = character.and_then(|c| self.slot(c)) {
            slot.store(NO_PARENT, Ordering::Release);
        }
    }

    /// Index of the actor `index` was copied from
    ///
    /// Returns `None` for indices outside the cutscene range.
    pub fn parent_of(&self, index: ObjectIndex) -> Option<ObjectIndex> {
        let raw = self.slot(index)?.load(Ordering::Acquire);
        u16::try_from(raw).ok().map(ObjectIndex)
    }

    /// Source actor if `index` is a copied cutscene actor, else `index` itself
    pub fn resolve(&self, index: ObjectIndex) -> ObjectIndex {
        self.parent_of(index).unwrap_or(index)
    }

    /// Every slot that currently has a parent, as `(cutscene index, parent index)`
    pub fn entries(&self) -> impl Iterator<Item = (ObjectIndex, ObjectIndex)> + '_ {
        self.range
            .clone()
            .filter_map(move |i| self.parent_of(ObjectIndex(i)).map(|p| (ObjectIndex(i), p)))
    }

    /// Clear every slot
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.store(NO_PARENT, Ordering::Release);
        }
    }
}

/// Cutscene table kept current by the character lifecycle listeners
pub struct CutsceneService {
    index: Arc<CutsceneIndex>,
    actors: Arc<dyn ActorTable>,
    listeners: Vec<ListenerKey>,
}

impl CutsceneService {
    pub fn new(actors: Arc<dyn ActorTable>) -> Self {
        Self {
            index: Arc::new(CutsceneIndex::new()),
            actors,
            listeners: Vec::new(),
        }
    }

    /// Subscribe to character copy and destruction
    ///
    /// Registered at [`Priority::CutsceneService`] so the table is current
    /// before any other listener resolves collections for the copy.
    pub fn subscribe(&mut self) {
        if !self.listeners.is_empty() {
            return;
        }

        let index = self.index.clone();
        self.listeners.push(listeners::on_character_copy(
            Priority::CutsceneService,
            move |target, source| {
                let target = target.and_then(|t| t.object_index());
                let source = source.and_then(|s| s.object_index());
                index.on_copy(target, source);
            },
        ));

        let index = self.index.clone();
        self.listeners.push(listeners::on_character_destructor(
            Priority::CutsceneService,
            move |character| index.on_destroy(character.object_index()),
        ));
        tracing::debug!("Cutscene service subscribed to character lifecycle");
    }

    /// The shared table, for the collection resolver
    pub fn index(&self) -> Arc<CutsceneIndex> {
        self.index.clone()
    }

    pub fn parent_of(&self, index: ObjectIndex) -> Option<ObjectIndex> {
        self.index.parent_of(index)
    }

    #[cfg(test)]
    pub(crate) fn listener_keys(&self) -> &[ListenerKey] {
        &self.listeners
    }

    /// Identity of the live actor a cutscene actor was copied from
    pub fn parent_actor(&self, index: ObjectIndex) -> Option<ActorIdentity> {
        self.actors.identity_of(self.parent_of(index)?)
    }

    /// Live cutscene actors paired with the actor they stand in for
    ///
    /// Actors without a recorded parent are paired with themselves.
    pub fn actors(&self) -> impl Iterator<Item = (ObjectIndex, ObjectIndex)> + '_ {
        self.index
            .range()
            .map(ObjectIndex)
            .filter(move |&i| self.actors.draw_object_of(i).is_some())
            .map(move |i| (i, self.index.resolve(i)))
    }
}

impl Drop for CutsceneService {
    fn drop(&mut self) {
        for key in self.listeners.drain(..) {
            listeners::remove_listener(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::actors::fake::FakeActorTable;

    #[test]
    fn test_copy_then_destroy() {
        let table = CutsceneIndex::with_range(0..40);
        table.on_copy(Some(ObjectIndex(5)), Some(ObjectIndex(2)));
        assert_eq!(table.parent_of(ObjectIndex(5)), Some(ObjectIndex(2)));

        table.on_destroy(Some(ObjectIndex(5)));
        assert_eq!(table.parent_of(ObjectIndex(5)), None);
    }

    #[test]
    fn test_copy_without_source_clears() {
        let table = CutsceneIndex::new();
        let target = ObjectIndex(CUTSCENE_START_INDEX + 3);
        table.on_copy(Some(target), Some(ObjectIndex(7)));
        table.on_copy(Some(target), None);
        assert_eq!(table.parent_of(target), None);

        table.on_copy(Some(target), Some(ObjectIndex::INVALID));
        assert_eq!(table.parent_of(target), None);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let table = CutsceneIndex::new();
        table.on_copy(Some(ObjectIndex(5)), Some(ObjectIndex(2)));
        table.on_copy(None, Some(ObjectIndex(2)));
        table.on_destroy(Some(ObjectIndex(CUTSCENE_END_INDEX)));
        table.on_destroy(None);

        for raw in [0, 5, CUTSCENE_START_INDEX - 1, CUTSCENE_END_INDEX, u16::MAX] {
            assert_eq!(table.parent_of(ObjectIndex(raw)), None);
        }
        assert_eq!(table.entries().count(), 0);
    }

    #[test]
    fn test_entries_and_clear() {
        let table = CutsceneIndex::new();
        let first = ObjectIndex(CUTSCENE_START_INDEX);
        let last = ObjectIndex(CUTSCENE_END_INDEX - 1);
        table.on_copy(Some(first), Some(ObjectIndex(0)));
        table.on_copy(Some(last), Some(ObjectIndex(12)));

        let entries: Vec<_> = table.entries().collect();
        assert_eq!(entries, vec![(first, ObjectIndex(0)), (last, ObjectIndex(12))]);
        assert_eq!(table.resolve(last), ObjectIndex(12));
        assert_eq!(table.resolve(ObjectIndex(3)), ObjectIndex(3));

        table.clear();
        assert_eq!(table.entries().count(), 0);
    }

    #[test]
    fn test_service_parent_actor() {
        let actors = Arc::new(FakeActorTable::new());
        actors.spawn(0, 0x1000, "Alpha");
        actors.spawn(CUTSCENE_START_INDEX, 0x2000, "Alpha");
        actors.spawn(CUTSCENE_START_INDEX + 1, 0x3000, "Extra");

        let service = CutsceneService::new(actors);
        service
            .index()
            .on_copy(Some(ObjectIndex(CUTSCENE_START_INDEX)), Some(ObjectIndex(0)));

        let parent = service.parent_actor(ObjectIndex(CUTSCENE_START_INDEX)).unwrap();
        assert_eq!(parent.object_index, ObjectIndex(0));
        assert!(service.parent_actor(ObjectIndex(CUTSCENE_START_INDEX + 1)).is_none());

        let live: Vec<_> = service.actors().collect();
        assert_eq!(
            live,
            vec![
                (ObjectIndex(CUTSCENE_START_INDEX), ObjectIndex(0)),
                (ObjectIndex(CUTSCENE_START_INDEX + 1), ObjectIndex(CUTSCENE_START_INDEX + 1)),
            ]
        );
    }
}
