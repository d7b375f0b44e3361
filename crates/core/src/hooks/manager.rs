//! Hook manager API
//!
//! Single entry point for creating the hooks the runtime depends on.

use super::hook::Hook;
use super::inline::{self, HookError, InlineHookKey};

/// Central hook manager
pub struct HookManager;

impl HookManager {
    /// Create a typed hook from a gamedata signature
    ///
    /// A signature that does not resolve to exactly one site is fatal for the
    /// feature relying on it: the error is logged here and returned so plugin
    /// load can abort rather than run without the hook.
    ///
    /// # Safety
    /// The signature must locate a function whose signature matches `F`.
    ///
    /// # Example
    /// ```ignore
    /// let hook = unsafe {
    ///     HookManager::create_hook::<ChangeCustomizeFn>(
    ///         "Change Customize",
    ///         signatures::CHANGE_CUSTOMIZE,
    ///         change_customize_detour,
    ///         true,
    ///     )?
    /// };
    /// ```
    pub unsafe fn create_hook<F: Copy + 'static>(
        name: &'static str,
        signature: &str,
        detour: F,
        enabled: bool,
    ) -> Result<Hook<F>, HookError> {
        match Hook::from_signature(name, signature, detour, enabled) {
            Ok(hook) => Ok(hook),
            Err(e) => {
                tracing::error!("Failed to create hook '{}': {}", name, e);
                Err(e)
            }
        }
    }

    /// Enable a hook by key
    pub fn enable(key: InlineHookKey) -> Result<(), HookError> {
        inline::enable_inline_hook(key)
    }

    /// Disable a hook by key
    pub fn disable(key: InlineHookKey) -> Result<(), HookError> {
        inline::disable_inline_hook(key)
    }

    /// Remove a hook completely, restoring the original bytes
    pub fn remove(key: InlineHookKey) -> Result<(), HookError> {
        inline::remove_inline_hook(key)
    }

    /// Check if a hook is enabled
    pub fn is_enabled(key: InlineHookKey) -> bool {
        inline::is_inline_hook_enabled(key)
    }

    /// Names and enabled state of every installed hook
    pub fn installed() -> Vec<(String, bool)> {
        inline::installed_inline_hooks()
    }
}
