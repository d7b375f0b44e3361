//! Typed hooks bound to a named signature
//!
//! A [`Hook`] owns exactly one installed trampoline. It is created once when
//! the runtime initializes and lives until the plugin unloads; it is never
//! reinstalled.

use std::mem::{size_of, transmute_copy};

use super::inline::{self, HookError, InlineHookKey};
use crate::gamedata;

/// A redirectable call site
///
/// The detour receives every call to the target; [`InstalledHook::original`]
/// is the only way back into the host's behavior.
pub trait InstalledHook {
    /// Function pointer type of the hooked function
    type Fn: Copy;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Callable that runs the un-hooked function
    fn original(&self) -> Self::Fn;

    /// The function calls are redirected to
    fn detour(&self) -> Self::Fn;
}

/// A typed inline hook
///
/// `F` must be a plain `unsafe extern "C" fn(..)` pointer type matching the
/// host function's signature and calling convention exactly.
pub struct Hook<F: Copy + 'static> {
    name: &'static str,
    key: InlineHookKey,
    target: usize,
    original: F,
    detour: F,
}

// SAFETY: function pointers are plain addresses; the registry behind `key` is locked
unsafe impl<F: Copy + 'static> Send for Hook<F> {}
unsafe impl<F: Copy + 'static> Sync for Hook<F> {}

fn fn_to_address<F: Copy>(f: F) -> Result<usize, HookError> {
    if size_of::<F>() != size_of::<usize>() {
        return Err(HookError::IncompatibleSignature);
    }
    // SAFETY: F is pointer-sized and, by contract, a function pointer
    Ok(unsafe { transmute_copy::<F, usize>(&f) })
}

unsafe fn address_to_fn<F: Copy>(address: usize) -> F {
    transmute_copy::<usize, F>(&address)
}

impl<F: Copy + 'static> Hook<F> {
    /// Install a hook at a known address
    ///
    /// # Safety
    /// `target` must be the entry of a function with signature `F`.
    pub unsafe fn at(name: &'static str, target: usize, detour: F, enabled: bool) -> Result<Self, HookError> {
        let detour_address = fn_to_address(detour)?;
        let (key, original) = inline::create_inline_hook(name, target, detour_address, enabled)?;
        Ok(Self {
            name,
            key,
            target,
            original: address_to_fn(original),
            detour,
        })
    }

    /// Locate `signature` (a gamedata key) in the host module and install a hook there
    ///
    /// The signature must resolve to exactly one site; zero or several matches
    /// are reported as [`HookError::Signature`] and the hook is not installed.
    ///
    /// # Safety
    /// The signature must locate a function with signature `F`.
    pub unsafe fn from_signature(
        name: &'static str,
        signature: &str,
        detour: F,
        enabled: bool,
    ) -> Result<Self, HookError> {
        let target = gamedata::find_function(signature)?;
        tracing::debug!("Signature '{}' for hook '{}' resolved to {:x}", signature, name, target);
        Self::at(name, target, detour, enabled)
    }

    /// Address of the hooked function
    pub fn target(&self) -> usize {
        self.target
    }

    /// Registry key
    pub fn key(&self) -> InlineHookKey {
        self.key
    }

    /// Check if the hook is enabled
    pub fn is_enabled(&self) -> bool {
        inline::is_inline_hook_enabled(self.key)
    }

    /// Enable the hook
    pub fn enable(&self) -> Result<(), HookError> {
        inline::enable_inline_hook(self.key)
    }

    /// Disable the hook
    pub fn disable(&self) -> Result<(), HookError> {
        inline::disable_inline_hook(self.key)
    }
}

impl<F: Copy + 'static> InstalledHook for Hook<F> {
    type Fn = F;

    fn name(&self) -> &'static str {
        self.name
    }

    fn original(&self) -> F {
        self.original
    }

    fn detour(&self) -> F {
        self.detour
    }
}

impl<F: Copy + 'static> std::fmt::Debug for Hook<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("target", &format_args!("{:x}", self.target))
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
