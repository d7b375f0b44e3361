//! Scoped overrides of global render state
//!
//! Some host resources are global rather than per-actor: the racial scaling
//! table and the decal textures live on the CharacterUtility singleton. To
//! apply a collection's version of them to one actor, the detour swaps the
//! global in for the duration of the original call and swaps it back after.
//!
//! Overrides are stacked per parameter. A release restores whatever the
//! remaining stack says should be live, or the value captured before the
//! first override, so releases in any order end at the original value.

mod scope;
mod utility;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::collections::{ModCollection, RenderParameter, ResolveData};

pub use scope::{current_customize_change, CustomizeChangeScope};
pub use utility::CharacterUtilitySlots;

/// Read/write access to the host's global render parameters
pub trait RenderGlobals: Send + Sync {
    /// Current value, `None` if it cannot be read right now
    fn read(&self, parameter: RenderParameter) -> Option<usize>;

    /// Replace the current value; returns false if nothing was written
    fn write(&self, parameter: RenderParameter, value: usize) -> bool;
}

#[derive(Default)]
struct OverrideStack {
    /// Value live before the first active override
    base: Option<usize>,
    entries: Vec<(u64, usize)>,
}

/// Owner of every scoped override of global render state
pub struct MetaState {
    globals: Arc<dyn RenderGlobals>,
    enabled: AtomicBool,
    stacks: [Mutex<OverrideStack>; RenderParameter::ALL.len()],
    next_token: AtomicU64,
}

impl MetaState {
    pub fn new(globals: Arc<dyn RenderGlobals>) -> Self {
        Self {
            globals,
            enabled: AtomicBool::new(true),
            stacks: Default::default(),
            next_token: AtomicU64::new(1),
        }
    }

    /// Turn every override producer into a no-op
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Swap in the collection's racial scaling table
    pub fn resolve_rsp_data(&self, collection: &ModCollection) -> ScopedOverride<'_> {
        self.acquire(RenderParameter::RacialScaling, collection)
    }

    /// Swap in the collection's first or second decal texture
    pub fn resolve_decal(&self, resolve: &ResolveData, is_first: bool) -> ScopedOverride<'_> {
        self.acquire(RenderParameter::decal(is_first), &resolve.collection)
    }

    /// Swap in the collection's value for `parameter`, if it has one
    pub fn acquire(&self, parameter: RenderParameter, collection: &ModCollection) -> ScopedOverride<'_> {
        if !self.is_enabled() {
            return ScopedOverride::noop(parameter);
        }
        let Some(value) = collection.override_for(parameter) else {
            return ScopedOverride::noop(parameter);
        };

        let mut stack = self.stack(parameter).lock();
        if stack.entries.is_empty() {
            let Some(current) = self.globals.read(parameter) else {
                tracing::warn!("Cannot read {:?}, skipping override from '{}'", parameter, collection.name());
                return ScopedOverride::noop(parameter);
            };
            stack.base = Some(current);
        }

        if !self.globals.write(parameter, value) {
            tracing::warn!("Cannot write {:?}, skipping override from '{}'", parameter, collection.name());
            if stack.entries.is_empty() {
                stack.base = None;
            }
            return ScopedOverride::noop(parameter);
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        stack.entries.push((token, value));
        tracing::trace!("Override {:?} -> {:#x} ({})", parameter, value, collection.name());

        ScopedOverride {
            state: Some(self),
            parameter,
            token,
        }
    }

    /// Number of overrides currently held for `parameter`
    pub fn active_overrides(&self, parameter: RenderParameter) -> usize {
        self.stack(parameter).lock().entries.len()
    }

    fn stack(&self, parameter: RenderParameter) -> &Mutex<OverrideStack> {
        &self.stacks[parameter as usize]
    }

    fn release(&self, parameter: RenderParameter, token: u64) {
        let mut stack = self.stack(parameter).lock();
        let Some(position) = stack.entries.iter().position(|(t, _)| *t == token) else {
            return;
        };
        let was_top = position + 1 == stack.entries.len();
        stack.entries.remove(position);

        if !was_top {
            return;
        }

        let restore = match stack.entries.last() {
            Some(&(_, value)) => Some(value),
            None => stack.base.take(),
        };
        if let Some(value) = restore {
            if !self.globals.write(parameter, value) {
                tracing::error!("Failed to restore {:?} to {:#x}", parameter, value);
            }
        }
    }
}

/// Handle to one active override; restores on drop
#[must_use = "the override is released as soon as the handle is dropped"]
pub struct ScopedOverride<'a> {
    state: Option<&'a MetaState>,
    parameter: RenderParameter,
    token: u64,
}

impl ScopedOverride<'_> {
    /// A handle that changed nothing
    pub fn noop(parameter: RenderParameter) -> Self {
        Self {
            state: None,
            parameter,
            token: 0,
        }
    }

    /// Returns true if this handle installed an override
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn parameter(&self) -> RenderParameter {
        self.parameter
    }

    /// Release now instead of at end of scope
    pub fn release(self) {}
}

impl Drop for ScopedOverride<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.release(self.parameter, self.token);
        }
    }
}
