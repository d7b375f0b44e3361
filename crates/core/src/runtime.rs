//! Runtime wiring
//!
//! Builds the services in dependency order and installs the detours:
//!
//! ```text
//! gamedata + offsets
//!   -> CutsceneService (listeners first)
//!   -> CollectionResolver (reads the cutscene table)
//!   -> MetaState (CharacterUtility slots)
//!   -> character hooks, then ChangeCustomize
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::collections::CollectionRegistry;
use crate::config::{self, ConfigError, CoreConfig};
use crate::gamedata::{self, Gamedata, GamedataError};
use crate::hooks::{ChangeCustomize, CharacterHooks, HookError, HookManager};
use crate::meta::{CharacterUtilitySlots, MetaState};
use crate::offsets::{self, HostOffsets};
use crate::resolver::{ActorTable, CollectionResolver, CutsceneService, HostActorTable};

/// Errors that abort runtime startup
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gamedata error: {0}")]
    Gamedata(#[from] GamedataError),

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    #[error("Runtime already initialized")]
    AlreadyRunning,
}

struct Runtime {
    registry: Arc<CollectionRegistry>,
    resolver: Arc<CollectionResolver>,
    meta: Arc<MetaState>,
    // Held for its listener subscriptions
    _cutscenes: CutsceneService,
    change_customize: ChangeCustomize,
    character_hooks: CharacterHooks,
}

static RUNTIME: RwLock<Option<Runtime>> = RwLock::new(None);

/// Load gamedata, build the services and install every detour
///
/// Any hook that cannot be installed is fatal: hooks installed before the
/// failure are removed again and the error is returned.
pub fn init(config: &CoreConfig) -> Result<(), RuntimeError> {
    let mut slot = RUNTIME.write();
    if slot.is_some() {
        return Err(RuntimeError::AlreadyRunning);
    }

    let gd = match gamedata::gamedata() {
        Some(gd) => gd,
        None => {
            let path = config::gamedata_path()?;
            tracing::info!("Loading gamedata from {:?}", path);
            gamedata::init_gamedata(Gamedata::load_from_file(&path)?)?;
            gamedata::gamedata().ok_or(GamedataError::NotInitialized)?
        }
    };
    offsets::init_offsets(HostOffsets::from_gamedata(gd));

    let actors: Arc<dyn ActorTable> = Arc::new(HostActorTable);
    let registry = Arc::new(CollectionRegistry::new());

    let mut cutscenes = CutsceneService::new(actors.clone());
    cutscenes.subscribe();

    let mut resolver = CollectionResolver::new(actors, registry.clone(), cutscenes.index());
    resolver.subscribe();
    let resolver = Arc::new(resolver);

    let meta = Arc::new(MetaState::new(Arc::new(CharacterUtilitySlots::from_gamedata()?)));
    meta.set_enabled(config.enable_mods);

    let hooks = &config.hooks;
    let character_hooks = CharacterHooks::install(hooks.copy_character, hooks.character_destructor)?;
    let change_customize = match ChangeCustomize::install(resolver.clone(), meta.clone(), hooks.change_customize) {
        Ok(hook) => hook,
        Err(e) => {
            if let Err(cleanup) = character_hooks.uninstall() {
                tracing::error!("Failed to remove character hooks: {}", cleanup);
            }
            return Err(e.into());
        }
    };

    for (name, enabled) in HookManager::installed() {
        tracing::debug!("Hook '{}' installed ({})", name, if enabled { "enabled" } else { "disabled" });
    }

    *slot = Some(Runtime {
        registry,
        resolver,
        meta,
        _cutscenes: cutscenes,
        change_customize,
        character_hooks,
    });
    tracing::info!("Runtime initialized (mods {})", if config.enable_mods { "enabled" } else { "disabled" });
    Ok(())
}

/// Remove every detour and drop the services
pub fn shutdown() {
    let Some(runtime) = RUNTIME.write().take() else {
        return;
    };

    if let Err(e) = runtime.change_customize.uninstall() {
        tracing::error!("Failed to remove '{}' hook: {}", ChangeCustomize::NAME, e);
    }
    if let Err(e) = runtime.character_hooks.uninstall() {
        tracing::error!("Failed to remove character hooks: {}", e);
    }
    tracing::info!("Runtime shut down");
}

/// Returns true between a successful [`init`] and [`shutdown`]
pub fn is_running() -> bool {
    RUNTIME.read().is_some()
}

/// Mutate the collection registry, then drop every cached resolution
///
/// Returns `None` when the runtime is not running.
pub fn update_collections<R>(f: impl FnOnce(&CollectionRegistry) -> R) -> Option<R> {
    let runtime = RUNTIME.read();
    let runtime = runtime.as_ref()?;
    let result = f(&runtime.registry);
    runtime.resolver.invalidate_all();
    Some(result)
}

/// Drop every cached resolution, e.g. after the object table moved
pub fn invalidate_caches() -> bool {
    match RUNTIME.read().as_ref() {
        Some(runtime) => {
            runtime.resolver.invalidate_all();
            true
        }
        None => false,
    }
}

/// Toggle every override at runtime
pub fn set_mods_enabled(enabled: bool) -> bool {
    match RUNTIME.read().as_ref() {
        Some(runtime) => {
            runtime.meta.set_enabled(enabled);
            tracing::info!("Mods {}", if enabled { "enabled" } else { "disabled" });
            true
        }
        None => false,
    }
}
