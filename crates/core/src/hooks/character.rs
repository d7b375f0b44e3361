//! CopyCharacter and CharacterDestructor detours
//!
//! Both only fire the character lifecycle listeners before handing control
//! back to the host.

use parking_lot::RwLock;
use xivmod_sdk::{signatures, Character, CharacterDestructorFn, CopyCharacterFn};

use super::hook::{Hook, InstalledHook};
use super::inline::HookError;
use super::manager::HookManager;
use crate::listeners::{fire_character_copy, fire_character_destructor, CharacterRef};

static COPY_ORIGINAL: RwLock<Option<CopyCharacterFn>> = RwLock::new(None);
static DESTRUCTOR_ORIGINAL: RwLock<Option<CharacterDestructorFn>> = RwLock::new(None);

/// Remove a hook that is being abandoned on an error path
fn discard<F: Copy + 'static>(hook: &Hook<F>) {
    if let Err(e) = HookManager::remove(hook.key()) {
        tracing::error!("Failed to remove '{}' hook: {}", hook.name(), e);
    }
}

/// Installed character lifecycle hooks
pub struct CharacterHooks {
    pub copy: Hook<CopyCharacterFn>,
    pub destructor: Hook<CharacterDestructorFn>,
}

impl CharacterHooks {
    pub const COPY_NAME: &'static str = "Copy Character";
    pub const DESTRUCTOR_NAME: &'static str = "Character Destructor";

    pub fn install(copy_enabled: bool, destructor_enabled: bool) -> Result<Self, HookError> {
        // SAFETY: the signatures locate functions with the declared ABIs
        unsafe {
            Self::build(
                || {
                    HookManager::create_hook(
                        Self::COPY_NAME,
                        signatures::COPY_CHARACTER,
                        copy_character_detour as CopyCharacterFn,
                        false,
                    )
                },
                || {
                    HookManager::create_hook(
                        Self::DESTRUCTOR_NAME,
                        signatures::CHARACTER_DESTRUCTOR,
                        character_destructor_detour as CharacterDestructorFn,
                        false,
                    )
                },
                copy_enabled,
                destructor_enabled,
            )
        }
    }

    /// Install both hooks at known addresses
    ///
    /// Either both hooks end up installed or neither does.
    ///
    /// # Safety
    /// The targets must be functions with the [`CopyCharacterFn`] and
    /// [`CharacterDestructorFn`] ABIs.
    pub unsafe fn install_at(
        copy_target: usize,
        destructor_target: usize,
        copy_enabled: bool,
        destructor_enabled: bool,
    ) -> Result<Self, HookError> {
        Self::build(
            || Hook::at(Self::COPY_NAME, copy_target, copy_character_detour as CopyCharacterFn, false),
            || {
                Hook::at(
                    Self::DESTRUCTOR_NAME,
                    destructor_target,
                    character_destructor_detour as CharacterDestructorFn,
                    false,
                )
            },
            copy_enabled,
            destructor_enabled,
        )
    }

    /// Create both hooks disabled, publish their originals, then enable them
    fn build(
        create_copy: impl FnOnce() -> Result<Hook<CopyCharacterFn>, HookError>,
        create_destructor: impl FnOnce() -> Result<Hook<CharacterDestructorFn>, HookError>,
        copy_enabled: bool,
        destructor_enabled: bool,
    ) -> Result<Self, HookError> {
        let copy = create_copy()?;
        let destructor = match create_destructor() {
            Ok(hook) => hook,
            Err(e) => {
                discard(&copy);
                return Err(e);
            }
        };

        {
            let mut copy_original = COPY_ORIGINAL.write();
            let mut destructor_original = DESTRUCTOR_ORIGINAL.write();
            if copy_original.is_some() || destructor_original.is_some() {
                discard(&copy);
                discard(&destructor);
                return Err(HookError::AlreadyHooked(copy.target()));
            }
            *copy_original = Some(copy.original());
            *destructor_original = Some(destructor.original());
        }

        let hooks = Self { copy, destructor };
        if let Err(e) = hooks.enable(copy_enabled, destructor_enabled) {
            if let Err(cleanup) = hooks.uninstall() {
                tracing::error!("Failed to remove character hooks: {}", cleanup);
            }
            return Err(e);
        }

        tracing::info!(
            "Installed character hooks: copy at {:x}, destructor at {:x}",
            hooks.copy.target(),
            hooks.destructor.target()
        );
        Ok(hooks)
    }

    fn enable(&self, copy_enabled: bool, destructor_enabled: bool) -> Result<(), HookError> {
        if copy_enabled {
            self.copy.enable()?;
        } else {
            tracing::warn!("'{}' disabled; cutscene actors will not inherit collections", Self::COPY_NAME);
        }
        if destructor_enabled {
            self.destructor.enable()?;
        }
        Ok(())
    }

    /// Restore both original function entries
    pub fn uninstall(&self) -> Result<(), HookError> {
        let copy = HookManager::remove(self.copy.key());
        let destructor = HookManager::remove(self.destructor.key());
        *COPY_ORIGINAL.write() = None;
        *DESTRUCTOR_ORIGINAL.write() = None;
        copy.and(destructor)
    }
}

extern "C" fn copy_character_detour(target: *mut Character, source: *mut Character, unk: u32) -> u64 {
    let target_ref = CharacterRef::from_ptr(target);
    let source_ref = CharacterRef::from_ptr(source);
    tracing::trace!(
        "[Copy Character] {:?} <- {:?}",
        target_ref.and_then(|c| c.object_index()),
        source_ref.and_then(|c| c.object_index())
    );
    fire_character_copy(target_ref, source_ref);

    let original = *COPY_ORIGINAL.read();
    match original {
        // SAFETY: forwarding the host's own arguments
        Some(original) => unsafe { original(target, source, unk) },
        None => 0,
    }
}

extern "C" fn character_destructor_detour(character: *mut Character) -> *mut Character {
    if let Some(character_ref) = CharacterRef::from_ptr(character) {
        fire_character_destructor(character_ref);
    }

    let original = *DESTRUCTOR_ORIGINAL.read();
    match original {
        // SAFETY: forwarding the host's own argument
        Some(original) => unsafe { original(character) },
        None => character,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use xivmod_sdk::ObjectIndex;

    use super::*;
    use crate::listeners::{on_character_copy, on_character_destructor, remove_listener, Priority};
    use crate::offsets::HostOffsets;

    #[repr(C, align(8))]
    struct FakeCharacter([u8; 0x200]);

    impl FakeCharacter {
        fn with_index(index: u16) -> Box<Self> {
            let mut c = Box::new(Self([0; 0x200]));
            let at = HostOffsets::default().game_object_index as usize;
            c.0[at..at + 2].copy_from_slice(&index.to_le_bytes());
            c
        }

        fn ptr(&mut self) -> *mut Character {
            (self as *mut Self).cast()
        }
    }

    #[test]
    fn test_copy_detour_fires_listeners() {
        let mut target = FakeCharacter::with_index(201);
        let mut source = FakeCharacter::with_index(4);
        let target_ptr = target.ptr();
        let marker = target_ptr as usize;

        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        let key = on_character_copy(Priority::Default, move |t, src| {
            if t.map(|t| t.address()) == Some(marker) {
                *s.lock() = Some((t.and_then(|c| c.object_index()), src.and_then(|c| c.object_index())));
            }
        });

        // No original installed in tests
        let ret = copy_character_detour(target_ptr, source.ptr(), 0);
        assert_eq!(ret, 0);
        assert_eq!(*seen.lock(), Some((Some(ObjectIndex(201)), Some(ObjectIndex(4)))));
        assert!(remove_listener(key));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_failed_install_leaves_nothing_behind() {
        let mut page = region::alloc(4096, region::Protection::READ_WRITE_EXECUTE).unwrap();
        let base = page.as_mut_ptr::<u8>();
        // lea eax, [rcx+1]; nops; ret  /  xor eax, eax; ret
        let copy_code: &[u8] = &[0x8D, 0x41, 0x01, 0x90, 0x90, 0x90, 0x90, 0x90, 0xC3];
        let short_code: &[u8] = &[0x31, 0xC0, 0xC3];
        unsafe {
            std::ptr::write_bytes(base, 0xCC, page.len());
            std::ptr::copy_nonoverlapping(copy_code.as_ptr(), base, copy_code.len());
            std::ptr::copy_nonoverlapping(short_code.as_ptr(), base.add(0x40), short_code.len());
        }
        let copy_target = base as usize;
        let destructor_target = copy_target + 0x40;

        let result = unsafe { CharacterHooks::install_at(copy_target, destructor_target, true, true) };
        assert!(matches!(result, Err(HookError::NotEnoughSpace(_))));

        assert!(COPY_ORIGINAL.read().is_none());
        assert!(DESTRUCTOR_ORIGINAL.read().is_none());
        assert!(!HookManager::installed()
            .iter()
            .any(|(name, _)| name == CharacterHooks::COPY_NAME));

        // The copy target is free to be hooked again
        let hook = unsafe {
            Hook::<CopyCharacterFn>::at("Copy Character Retry", copy_target, copy_character_detour, false).unwrap()
        };
        HookManager::remove(hook.key()).unwrap();
    }

    #[test]
    fn test_destructor_detour_fires_listeners() {
        let mut character = FakeCharacter::with_index(205);
        let ptr = character.ptr();
        let marker = ptr as usize;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let key = on_character_destructor(Priority::Default, move |c| {
            if c.address() == marker {
                s.lock().push(c.object_index());
            }
        });

        let ret = character_destructor_detour(ptr);
        assert_eq!(ret, ptr);
        assert_eq!(*seen.lock(), vec![Some(ObjectIndex(205))]);

        // Null characters are passed through without firing
        assert!(character_destructor_detour(std::ptr::null_mut()).is_null());
        assert_eq!(seen.lock().len(), 1);
        assert!(remove_listener(key));
    }
}
