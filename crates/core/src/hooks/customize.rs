//! ChangeCustomize detour
//!
//! The host re-evaluates racial scaling and face decals while applying new
//! customization data. Both are read from global CharacterUtility slots, so
//! the detour swaps in the resolved collection's versions around the
//! original call.

use std::sync::Arc;

use parking_lot::RwLock;
use xivmod_sdk::{signatures, ChangeCustomizeFn, CustomizeArray, Human};

use super::hook::{Hook, InstalledHook};
use super::inline::HookError;
use super::manager::HookManager;
use crate::meta::{CustomizeChangeScope, MetaState};
use crate::resolver::{CollectionResolver, DrawObjectId};

#[derive(Clone)]
struct DetourState {
    resolver: Arc<CollectionResolver>,
    meta: Arc<MetaState>,
    original: ChangeCustomizeFn,
}

static STATE: RwLock<Option<DetourState>> = RwLock::new(None);

/// Installed ChangeCustomize hook
pub struct ChangeCustomize {
    hook: Hook<ChangeCustomizeFn>,
}

impl ChangeCustomize {
    pub const NAME: &'static str = "Change Customize";

    /// Install the hook
    ///
    /// The hook is created disabled and only enabled once the detour can reach
    /// the original function.
    pub fn install(
        resolver: Arc<CollectionResolver>,
        meta: Arc<MetaState>,
        enabled: bool,
    ) -> Result<Self, HookError> {
        // SAFETY: the signature locates a function with the ChangeCustomizeFn ABI
        let hook = unsafe {
            HookManager::create_hook::<ChangeCustomizeFn>(
                Self::NAME,
                signatures::CHANGE_CUSTOMIZE,
                change_customize_detour,
                false,
            )?
        };
        Self::adopt(hook, resolver, meta, enabled)
    }

    /// Install the hook at a known address
    ///
    /// # Safety
    /// `target` must be a function with the [`ChangeCustomizeFn`] ABI.
    pub unsafe fn install_at(
        target: usize,
        resolver: Arc<CollectionResolver>,
        meta: Arc<MetaState>,
        enabled: bool,
    ) -> Result<Self, HookError> {
        let hook = Hook::<ChangeCustomizeFn>::at(Self::NAME, target, change_customize_detour, false)?;
        Self::adopt(hook, resolver, meta, enabled)
    }

    /// Publish the detour state for a freshly created, disabled hook
    ///
    /// On any error the hook is removed again, so installation can be retried.
    fn adopt(
        hook: Hook<ChangeCustomizeFn>,
        resolver: Arc<CollectionResolver>,
        meta: Arc<MetaState>,
        enabled: bool,
    ) -> Result<Self, HookError> {
        {
            let mut state = STATE.write();
            if state.is_some() {
                if let Err(e) = HookManager::remove(hook.key()) {
                    tracing::error!("Failed to remove '{}' hook: {}", Self::NAME, e);
                }
                return Err(HookError::AlreadyHooked(hook.target()));
            }
            *state = Some(DetourState {
                resolver,
                meta,
                original: hook.original(),
            });
        }

        let installed = Self { hook };
        if enabled {
            if let Err(e) = installed.hook.enable() {
                if let Err(cleanup) = installed.uninstall() {
                    tracing::error!("Failed to remove '{}' hook: {}", Self::NAME, cleanup);
                }
                return Err(e);
            }
        }
        tracing::info!("Installed '{}' hook at {:x}", Self::NAME, installed.hook.target());
        Ok(installed)
    }

    pub fn hook(&self) -> &Hook<ChangeCustomizeFn> {
        &self.hook
    }

    /// Restore the original function entry
    pub fn uninstall(&self) -> Result<(), HookError> {
        let removed = HookManager::remove(self.hook.key());
        *STATE.write() = None;
        removed
    }
}

/// Run one customize change under the collection governing `draw_object`
///
/// The collection is resolved once; the thread-local scope and the override
/// handles are released in reverse order after `original` returns or unwinds.
pub fn with_customize_overrides<R>(
    resolver: &CollectionResolver,
    meta: &MetaState,
    draw_object: DrawObjectId,
    original: impl FnOnce() -> R,
) -> R {
    let resolved = resolver.identify_collection(draw_object, true);
    let _scope = CustomizeChangeScope::enter(resolved.clone());
    let _rsp = meta.resolve_rsp_data(&resolved.collection);
    let _decal1 = meta.resolve_decal(&resolved, true);
    let _decal2 = meta.resolve_decal(&resolved, false);
    original()
}

extern "C" fn change_customize_detour(
    human: *mut Human,
    data: *mut CustomizeArray,
    skip_equipment: u8,
) -> bool {
    let Some(state) = STATE.read().clone() else {
        return false;
    };

    let draw_object = DrawObjectId::from_ptr(Human::as_draw_object(human));
    let ret = with_customize_overrides(&state.resolver, &state.meta, draw_object, || {
        // SAFETY: forwarding the host's own arguments to the original function
        unsafe { (state.original)(human, data, skip_equipment) }
    });

    tracing::trace!(
        "[Change Customize] Invoked on {:x} with {:x}, {} -> {}",
        human as usize,
        data as usize,
        skip_equipment,
        ret
    );
    ret
}
