//! Inline function detours
//!
//! Rewrites the entry of a host function with a jump to a relay that lands in
//! our detour. The overwritten instructions are relocated (with iced-x86) into
//! a trampoline that ends with a jump back into the function body; that
//! trampoline is the "original" the detour calls to preserve host behavior.
//!
//! ```text
//! target:      jmp rel32 relay
//! relay:       jmp [rip+0] -> detour
//! original:    <relocated prologue> ; jmp [rip+0] -> target + stolen
//! ```
//!
//! Only the five jump bytes are ever written to the target, always with a
//! single 8-byte store, so threads running the function concurrently see
//! either the old or the new entry. Bytes between the jump and the end of the
//! relocated prologue are left untouched; nothing executes them while the
//! hook is enabled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use iced_x86::{BlockEncoder, BlockEncoderOptions, Decoder, DecoderOptions, FlowControl, Instruction, InstructionBlock};
use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

use super::trampoline::{alloc_trampoline, within_rel32, TRAMPOLINE_SIZE};
use crate::gamedata::GamedataError;

new_key_type! {
    /// Handle for an inline hook
    pub struct InlineHookKey;
}

/// Error type for hook operations
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Failed to resolve signature: {0}")]
    Signature(#[from] GamedataError),

    #[error("Failed to decode instruction at {0:x}")]
    Decode(usize),

    #[error("Function at {0:x} is too short to hold a jump")]
    NotEnoughSpace(usize),

    #[error("Failed to allocate trampoline near {0:x}")]
    Allocation(usize),

    #[error("Instruction relocation failed: {0}")]
    RelocationFailed(String),

    #[error("Memory protection failed: {0}")]
    MemoryProtection(String),

    #[error("Entry at {0:x} straddles an 8-byte boundary and cannot be patched atomically")]
    NotAtomic(usize),

    #[error("Invalid address: {0:x}")]
    InvalidAddress(usize),

    #[error("Function at {0:x} is already hooked")]
    AlreadyHooked(usize),

    #[error("Detour type is not a plain function pointer")]
    IncompatibleSignature,

    #[error("Hook not found")]
    NotFound,
}

/// Bytes needed for `jmp rel32`
const JMP_REL32_LEN: usize = 5;

/// Width of the single store that publishes a patch
const PATCH_WORD: usize = 8;

/// Bytes needed for `jmp [rip+0]; dq target`
const JMP_ABS_LEN: usize = 14;

/// Offset of the relocated prologue inside a trampoline
const ORIGINAL_OFFSET: usize = 16;

/// How many bytes of the target we are willing to decode
const DECODE_WINDOW: usize = 32;

fn encode_abs_jmp(destination: usize) -> [u8; JMP_ABS_LEN] {
    let mut bytes = [0u8; JMP_ABS_LEN];
    bytes[0] = 0xFF;
    bytes[1] = 0x25;
    bytes[6..].copy_from_slice(&(destination as u64).to_le_bytes());
    bytes
}

fn encode_rel32_jmp(from: usize, to: usize) -> [u8; JMP_REL32_LEN] {
    let disp = (to as i64 - (from as i64 + JMP_REL32_LEN as i64)) as i32;
    let mut bytes = [0u8; JMP_REL32_LEN];
    bytes[0] = 0xE9;
    bytes[1..].copy_from_slice(&disp.to_le_bytes());
    bytes
}

/// Decode whole instructions at `target` until at least `min_len` bytes are covered
///
/// # Safety
/// `target` must point at executable code.
unsafe fn decode_prologue(target: usize, min_len: usize) -> Result<(Vec<Instruction>, usize), HookError> {
    if !crate::memory::is_readable(target, DECODE_WINDOW) {
        return Err(HookError::InvalidAddress(target));
    }

    let window = std::slice::from_raw_parts(target as *const u8, DECODE_WINDOW);
    let mut decoder = Decoder::with_ip(64, window, target as u64, DecoderOptions::NONE);

    let mut instructions = Vec::new();
    let mut covered = 0usize;

    while covered < min_len {
        if !decoder.can_decode() {
            return Err(HookError::NotEnoughSpace(target));
        }

        let instruction = decoder.decode();
        if instruction.is_invalid() {
            return Err(HookError::Decode(instruction.ip() as usize));
        }

        covered += instruction.len();
        instructions.push(instruction);

        // The function ends before the patch would: we would clobber whatever follows
        let terminal = matches!(
            instruction.flow_control(),
            FlowControl::Return | FlowControl::UnconditionalBranch | FlowControl::IndirectBranch
        );
        if terminal && covered < min_len {
            return Err(HookError::NotEnoughSpace(target));
        }
    }

    Ok((instructions, covered))
}

/// Returns true if `len` bytes at `address` lie within one aligned 8-byte word
fn fits_patch_word(address: usize, len: usize) -> bool {
    address % PATCH_WORD + len <= PATCH_WORD
}

/// Write `bytes` over executable code at `address` with one atomic store
///
/// The aligned word containing the patch is read, merged and stored back in
/// one piece. Patches that do not fit one word are refused.
///
/// # Safety
/// `address` must be executable code owned by a hook entry.
unsafe fn write_code(address: usize, bytes: &[u8]) -> Result<(), HookError> {
    if !fits_patch_word(address, bytes.len()) {
        return Err(HookError::NotAtomic(address));
    }

    let word_address = address - address % PATCH_WORD;
    let offset = address - word_address;

    let _guard = region::protect_with_handle(
        word_address as *const u8,
        PATCH_WORD,
        region::Protection::READ_WRITE_EXECUTE,
    )
    .map_err(|e| HookError::MemoryProtection(e.to_string()))?;

    let slot = &*(word_address as *const AtomicU64);
    let mut word = slot.load(Ordering::Acquire).to_le_bytes();
    word[offset..offset + bytes.len()].copy_from_slice(bytes);
    slot.store(u64::from_le_bytes(word), Ordering::Release);

    Ok(())
}

/// Internal storage for an inline hook
struct InlineHookEntry {
    /// Target function address
    target: usize,

    /// Entry of the relocated original function
    original: usize,

    /// Bytes at the target before patching, as many as `patch` covers
    stolen: Vec<u8>,

    /// `jmp rel32` written to the target while enabled
    patch: [u8; JMP_REL32_LEN],

    /// Whether the hook is currently enabled
    enabled: bool,

    /// Description for debugging
    name: String,
}

/// Global inline hook registry
struct InlineHookRegistry {
    hooks: SlotMap<InlineHookKey, InlineHookEntry>,
    by_target: HashMap<usize, InlineHookKey>,
}

static INLINE_HOOKS: LazyLock<RwLock<InlineHookRegistry>> = LazyLock::new(|| {
    RwLock::new(InlineHookRegistry {
        hooks: SlotMap::with_key(),
        by_target: HashMap::new(),
    })
});

/// Create an inline hook for a function
///
/// The trampoline is built immediately; the target is only patched if
/// `enable` is set, otherwise call [`enable_inline_hook`] later.
///
/// # Safety
/// - `target` must be the entry of a function
/// - `detour` must be a function with the same signature and calling convention
///
/// # Returns
/// A key to manage the hook, and the address to call the original function
pub unsafe fn create_inline_hook(
    name: &str,
    target: usize,
    detour: usize,
    enable: bool,
) -> Result<(InlineHookKey, usize), HookError> {
    tracing::debug!(
        "Creating inline hook '{}' at {:x} -> {:x}",
        name,
        target,
        detour
    );

    if target == 0 {
        return Err(HookError::InvalidAddress(target));
    }
    if !fits_patch_word(target, JMP_REL32_LEN) {
        tracing::error!("Inline hook '{}' target {:x} cannot be patched with one store", name, target);
        return Err(HookError::NotAtomic(target));
    }

    let mut registry = INLINE_HOOKS.write();
    if registry.by_target.contains_key(&target) {
        tracing::error!("Inline hook '{}' targets already hooked {:x}", name, target);
        return Err(HookError::AlreadyHooked(target));
    }

    let trampoline = alloc_trampoline(target as *const u8)
        .ok_or(HookError::Allocation(target))?
        .as_ptr() as usize;
    let relay = trampoline;
    let original = trampoline + ORIGINAL_OFFSET;

    if !within_rel32(target, relay) {
        return Err(HookError::Allocation(target));
    }

    let (instructions, stolen_len) = decode_prologue(target, JMP_REL32_LEN)?;

    let block = InstructionBlock::new(&instructions, original as u64);
    let relocated = BlockEncoder::encode(64, block, BlockEncoderOptions::NONE)
        .map_err(|e| HookError::RelocationFailed(e.to_string()))?
        .code_buffer;

    let back = encode_abs_jmp(target + stolen_len);
    if ORIGINAL_OFFSET + relocated.len() + back.len() > TRAMPOLINE_SIZE {
        return Err(HookError::RelocationFailed(format!(
            "relocated prologue of {} bytes does not fit",
            relocated.len()
        )));
    }

    // Fill the trampoline: relay first, then the relocated prologue and the way back
    let relay_bytes = encode_abs_jmp(detour);
    std::ptr::copy_nonoverlapping(relay_bytes.as_ptr(), relay as *mut u8, relay_bytes.len());
    std::ptr::copy_nonoverlapping(relocated.as_ptr(), original as *mut u8, relocated.len());
    std::ptr::copy_nonoverlapping(
        back.as_ptr(),
        (original + relocated.len()) as *mut u8,
        back.len(),
    );

    let patch = encode_rel32_jmp(target, relay);
    let stolen = std::slice::from_raw_parts(target as *const u8, JMP_REL32_LEN).to_vec();

    let mut entry = InlineHookEntry {
        target,
        original,
        stolen,
        patch,
        enabled: false,
        name: name.to_string(),
    };

    if enable {
        write_code(entry.target, &entry.patch)?;
        entry.enabled = true;
    }

    let key = registry.hooks.insert(entry);
    registry.by_target.insert(target, key);

    tracing::info!(
        "Created inline hook '{}' at {:x} ({} bytes relocated, {})",
        name,
        target,
        stolen_len,
        if enable { "enabled" } else { "disabled" }
    );

    Ok((key, original))
}

/// Enable an inline hook
pub fn enable_inline_hook(key: InlineHookKey) -> Result<(), HookError> {
    let mut registry = INLINE_HOOKS.write();
    let entry = registry.hooks.get_mut(key).ok_or(HookError::NotFound)?;

    if entry.enabled {
        return Ok(());
    }

    unsafe { write_code(entry.target, &entry.patch)? };

    entry.enabled = true;
    tracing::info!("Enabled inline hook '{}' at {:x}", entry.name, entry.target);
    Ok(())
}

/// Disable an inline hook (keeps the trampoline but restores original bytes)
pub fn disable_inline_hook(key: InlineHookKey) -> Result<(), HookError> {
    let mut registry = INLINE_HOOKS.write();
    let entry = registry.hooks.get_mut(key).ok_or(HookError::NotFound)?;

    if !entry.enabled {
        return Ok(());
    }

    unsafe { write_code(entry.target, &entry.stolen)? };

    entry.enabled = false;
    tracing::info!("Disabled inline hook '{}' at {:x}", entry.name, entry.target);
    Ok(())
}

/// Remove an inline hook completely
///
/// The target is restored; the trampoline stays mapped.
pub fn remove_inline_hook(key: InlineHookKey) -> Result<(), HookError> {
    disable_inline_hook(key)?;

    let mut registry = INLINE_HOOKS.write();
    let entry = registry.hooks.remove(key).ok_or(HookError::NotFound)?;
    registry.by_target.remove(&entry.target);

    tracing::info!("Removed inline hook '{}' at {:x}", entry.name, entry.target);
    Ok(())
}

/// Check if an inline hook is enabled
pub fn is_inline_hook_enabled(key: InlineHookKey) -> bool {
    INLINE_HOOKS
        .read()
        .hooks
        .get(key)
        .map(|e| e.enabled)
        .unwrap_or(false)
}

/// Get the target address of an inline hook
pub fn get_inline_hook_target(key: InlineHookKey) -> Option<usize> {
    INLINE_HOOKS.read().hooks.get(key).map(|e| e.target)
}

/// Names and enabled state of every installed hook
pub fn installed_inline_hooks() -> Vec<(String, bool)> {
    INLINE_HOOKS
        .read()
        .hooks
        .values()
        .map(|e| (e.name.clone(), e.enabled))
        .collect()
}

#[cfg(all(test, target_arch = "x86_64"))]
mod tests {
    use super::*;

    /// `lea eax, [rdi+1]; ret` (SysV) / `lea eax, [rcx+1]; ret` (Win64), padded with int3
    fn write_add_one(page: &mut region::Allocation) -> usize {
        #[cfg(windows)]
        let code: &[u8] = &[0x8D, 0x41, 0x01, 0x90, 0x90, 0x90, 0x90, 0x90, 0x90, 0xC3];
        #[cfg(not(windows))]
        let code: &[u8] = &[0x8D, 0x47, 0x01, 0x90, 0x90, 0x90, 0x90, 0x90, 0x90, 0xC3];

        let base = page.as_mut_ptr::<u8>();
        unsafe {
            std::ptr::write_bytes(base, 0xCC, page.len());
            std::ptr::copy_nonoverlapping(code.as_ptr(), base, code.len());
        }
        base as usize
    }

    static ORIGINAL: std::sync::OnceLock<extern "C" fn(i32) -> i32> = std::sync::OnceLock::new();

    extern "C" fn plus_hundred(x: i32) -> i32 {
        let original = ORIGINAL.get().unwrap();
        original(x) + 100
    }

    #[test]
    fn test_detour_and_original() {
        let mut page = region::alloc(4096, region::Protection::READ_WRITE_EXECUTE).unwrap();
        let target = write_add_one(&mut page);
        let unhooked: extern "C" fn(i32) -> i32 = unsafe { std::mem::transmute(target) };
        assert_eq!(unhooked(41), 42);

        let (key, original) =
            unsafe { create_inline_hook("AddOne", target, plus_hundred as usize, true).unwrap() };
        let original: extern "C" fn(i32) -> i32 = unsafe { std::mem::transmute(original) };
        ORIGINAL.set(original).unwrap();

        // Original callable behaves exactly like the unhooked function
        assert_eq!(original(41), 42);
        assert_eq!(original(-1), 0);

        // The target now runs the detour
        assert_eq!(unhooked(41), 142);

        disable_inline_hook(key).unwrap();
        assert_eq!(unhooked(41), 42);
        assert!(!is_inline_hook_enabled(key));

        enable_inline_hook(key).unwrap();
        assert_eq!(unhooked(1), 102);

        // Installing twice on the same function is rejected
        assert!(matches!(
            unsafe { create_inline_hook("AddOneAgain", target, plus_hundred as usize, true) },
            Err(HookError::AlreadyHooked(_))
        ));

        remove_inline_hook(key).unwrap();
        assert_eq!(unhooked(41), 42);
        assert!(get_inline_hook_target(key).is_none());
    }

    #[test]
    fn test_too_short_function() {
        let mut page = region::alloc(4096, region::Protection::READ_WRITE_EXECUTE).unwrap();
        let base = page.as_mut_ptr::<u8>();
        unsafe {
            std::ptr::write_bytes(base, 0xCC, page.len());
            // xor eax, eax; ret
            std::ptr::copy_nonoverlapping([0x31u8, 0xC0, 0xC3].as_ptr(), base, 3);
        }
        let result = unsafe { create_inline_hook("Short", base as usize, plus_hundred as usize, false) };
        assert!(matches!(result, Err(HookError::NotEnoughSpace(_))));
    }

    static PROLOGUE_ORIGINAL: std::sync::OnceLock<extern "C" fn(i32) -> i32> = std::sync::OnceLock::new();

    extern "C" fn plus_thousand(x: i32) -> i32 {
        let original = PROLOGUE_ORIGINAL.get().unwrap();
        original(x) + 1000
    }

    #[test]
    fn test_long_prologue_patches_one_word() {
        // sub rsp, 28h; lea rax, [rip]; add rsp, 28h; lea eax, [arg+1]; ret
        #[cfg(windows)]
        let arg: u8 = 0x41;
        #[cfg(not(windows))]
        let arg: u8 = 0x47;
        let code: [u8; 19] = [
            0x48, 0x83, 0xEC, 0x28, 0x48, 0x8D, 0x05, 0x00, 0x00, 0x00, 0x00, 0x48, 0x83, 0xC4, 0x28, 0x8D,
            arg, 0x01, 0xC3,
        ];

        let mut page = region::alloc(4096, region::Protection::READ_WRITE_EXECUTE).unwrap();
        let base = page.as_mut_ptr::<u8>();
        unsafe {
            std::ptr::write_bytes(base, 0xCC, page.len());
            std::ptr::copy_nonoverlapping(code.as_ptr(), base, code.len());
        }
        let target = base as usize;
        let function: extern "C" fn(i32) -> i32 = unsafe { std::mem::transmute(target) };
        assert_eq!(function(1), 2);

        let (key, original) =
            unsafe { create_inline_hook("LongPrologue", target, plus_thousand as usize, true).unwrap() };
        let original: extern "C" fn(i32) -> i32 = unsafe { std::mem::transmute(original) };
        PROLOGUE_ORIGINAL.set(original).unwrap();

        // Only the jump is written; the rest of the relocated prologue is untouched
        let entry = unsafe { std::slice::from_raw_parts(target as *const u8, code.len()) };
        assert_eq!(entry[0], 0xE9);
        assert_eq!(&entry[JMP_REL32_LEN..], &code[JMP_REL32_LEN..]);

        assert_eq!(original(1), 2);
        assert_eq!(function(1), 1002);

        disable_inline_hook(key).unwrap();
        let entry = unsafe { std::slice::from_raw_parts(target as *const u8, code.len()) };
        assert_eq!(entry, &code[..]);
        remove_inline_hook(key).unwrap();
    }

    #[test]
    fn test_entry_straddling_word_is_refused() {
        assert!(fits_patch_word(0x1000, JMP_REL32_LEN));
        assert!(fits_patch_word(0x1003, JMP_REL32_LEN));
        assert!(!fits_patch_word(0x1004, JMP_REL32_LEN));
        assert!(!fits_patch_word(0x1007, JMP_REL32_LEN));

        let mut page = region::alloc(4096, region::Protection::READ_WRITE_EXECUTE).unwrap();
        let target = write_add_one(&mut page) + 4;
        let result = unsafe { create_inline_hook("Straddling", target, plus_thousand as usize, true) };
        assert!(matches!(result, Err(HookError::NotAtomic(t)) if t == target));
    }

    #[test]
    fn test_jump_encodings() {
        let rel = encode_rel32_jmp(0x1000, 0x2000);
        assert_eq!(rel[0], 0xE9);
        assert_eq!(i32::from_le_bytes(rel[1..].try_into().unwrap()), 0x2000 - 0x1005);

        let abs = encode_abs_jmp(0x1122_3344_5566_7788);
        assert_eq!(&abs[..6], &[0xFF, 0x25, 0, 0, 0, 0]);
        assert_eq!(u64::from_le_bytes(abs[6..].try_into().unwrap()), 0x1122_3344_5566_7788);
    }
}
