//! xivmod Core - Runtime Modification Logic
//!
//! This crate contains everything that runs inside the host process:
//! signature hooks, collection resolution, scoped render overrides and the
//! detours tying them together.
//!
//! # Re-exports
//!
//! This crate re-exports the SDK and engine crates for convenience:
//! - [`sdk`] - Host type definitions and signature keys
//! - [`engine`] - Host module and object table globals

use tracing::info;

// Re-export SDK and engine crates
pub use xivmod_engine as engine;
pub use xivmod_sdk as sdk;

pub mod collections;
pub mod config;
pub mod gamedata;
pub mod hooks;
pub mod listeners;
pub mod memory;
pub mod meta;
pub mod offsets;
pub mod resolver;
pub mod runtime;

// Re-export commonly used items
pub use collections::{
    ActorIdentity, CollectionRegistry, CollectionSource, ModCollection, RenderParameter, ResolveData,
};
pub use hooks::{ChangeCustomize, CharacterHooks, Hook, HookError, HookManager, InlineHookKey, InstalledHook};
pub use meta::{current_customize_change, CustomizeChangeScope, MetaState, RenderGlobals, ScopedOverride};
pub use resolver::{ActorTable, CollectionResolver, CutsceneIndex, CutsceneService, DrawObjectId};

// Re-export listeners
pub use listeners::{on_character_copy, on_character_destructor, remove_listener, CharacterRef, ListenerKey, Priority};

// Re-export config types
pub use config::{ConfigError, ConfigResult, CoreConfig, HookToggles};

pub use runtime::RuntimeError;

/// Shutdown the runtime
///
/// Called from the FFI layer when the loader unloads the plugin.
pub fn shutdown() {
    info!("xivmod shutting down...");
    runtime::shutdown();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_sdk_types_exist() {
        // Verify SDK types are accessible
        use crate::sdk::DrawObject;
        let _: *const DrawObject = std::ptr::null();
    }
}
