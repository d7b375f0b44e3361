//! Hook system
//!
//! - [`inline`] - inline detours: prologue relocation into a trampoline and
//!   a jump patched over the target's entry
//! - [`hook`] - typed [`Hook`] bound to a gamedata signature
//! - [`manager`] - creation entry point used by the runtime
//! - [`customize`] / [`character`] - the detours themselves

pub mod character;
pub mod customize;
pub mod hook;
pub mod inline;
pub mod manager;
mod trampoline;

pub use character::CharacterHooks;
pub use customize::{with_customize_overrides, ChangeCustomize};
pub use hook::{Hook, InstalledHook};
pub use inline::{HookError, InlineHookKey};
pub use manager::HookManager;
