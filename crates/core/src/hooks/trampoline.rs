//! Trampoline memory allocation
//!
//! Allocates executable memory within ±2GB of target addresses so the hooked
//! function can reach its relay with a 5-byte relative jump.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ptr::NonNull;

/// Size of each page requested from the OS
const PAGE_SIZE: usize = 0x1_0000;

/// Trampoline allocation size (relay + relocated prologue + jump back)
pub const TRAMPOLINE_SIZE: usize = 128;

/// Maximum search range for near allocation (2GB)
const MAX_RANGE: usize = 0x7FFF_0000;

/// Global trampoline allocator
static ALLOCATOR: Mutex<TrampolineAllocator> = Mutex::new(TrampolineAllocator::new());

/// Allocator for executable trampolines
struct TrampolineAllocator {
    /// Pages allocated, keyed by base address
    pages: BTreeMap<usize, PageInfo>,
}

struct PageInfo {
    /// Keeps the mapping alive; trampolines are never freed because a thread
    /// may still be executing inside one after its hook is removed
    allocation: region::Allocation,
    used: usize,
}

// SAFETY: The allocator is protected by a mutex and pages are only accessed through it
unsafe impl Send for PageInfo {}

impl PageInfo {
    fn base(&self) -> usize {
        self.allocation.as_ptr::<u8>() as usize
    }
}

fn is_unmapped(address: usize, len: usize) -> bool {
    match region::query_range(address as *const u8, len) {
        Ok(mut regions) => regions.next().is_none(),
        Err(_) => true,
    }
}

#[inline]
fn distance(a: usize, b: usize) -> usize {
    a.abs_diff(b)
}

impl TrampolineAllocator {
    const fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    /// Allocate a trampoline near the target address
    fn alloc_near(&mut self, target: usize, size: usize) -> Option<NonNull<u8>> {
        // First, try to find an existing page within range
        for page in self.pages.values_mut() {
            if distance(page.base(), target) < MAX_RANGE && page.used + size <= page.allocation.len() {
                let ptr = page.base() + page.used;
                page.used += size;
                return NonNull::new(ptr as *mut u8);
            }
        }

        // Allocate a new page near the target
        let base = self.alloc_page_near(target)?;
        let page = self.pages.get_mut(&base)?;
        page.used = size;
        NonNull::new(base as *mut u8)
    }

    fn try_alloc_at(&mut self, hint: usize, target: usize) -> Option<usize> {
        // A fixed-address mapping may replace whatever lives there on some
        // platforms, so only ask for ranges that are currently unmapped
        if !is_unmapped(hint, PAGE_SIZE) {
            return None;
        }

        let allocation = unsafe {
            region::alloc_at(
                hint as *const u8,
                PAGE_SIZE,
                region::Protection::READ_WRITE_EXECUTE,
            )
        }
        .ok()?;

        let base = allocation.as_ptr::<u8>() as usize;
        if distance(base, target) < MAX_RANGE {
            self.pages.insert(base, PageInfo { allocation, used: 0 });
            Some(base)
        } else {
            // Allocation was too far, dropping it unmaps it
            None
        }
    }

    fn alloc_page_near(&mut self, target: usize) -> Option<usize> {
        let step = PAGE_SIZE * 16;
        let base = target & !(PAGE_SIZE - 1);

        // Walk outwards from the target so the closest free page wins
        for i in 1..MAX_RANGE / step {
            let candidates = [
                base.checked_sub(i * step),
                base.checked_add(i * step),
            ];
            for hint in candidates.into_iter().flatten() {
                if hint == 0 || distance(hint, target) >= MAX_RANGE {
                    continue;
                }
                if let Some(page) = self.try_alloc_at(hint, target) {
                    return Some(page);
                }
            }
        }

        // Try without hint as a fallback; the caller then needs an absolute jump
        match region::alloc(PAGE_SIZE, region::Protection::READ_WRITE_EXECUTE) {
            Ok(allocation) => {
                let base = allocation.as_ptr::<u8>() as usize;
                tracing::warn!(
                    "Trampoline allocation fallback: allocated at {:x} for target {:x}",
                    base,
                    target
                );
                self.pages.insert(base, PageInfo { allocation, used: 0 });
                Some(base)
            }
            Err(e) => {
                tracing::error!("Failed to allocate page near {:x}: {}", target, e);
                None
            }
        }
    }
}

/// Allocate a trampoline buffer near the target address
pub fn alloc_trampoline(target: *const u8) -> Option<NonNull<u8>> {
    ALLOCATOR.lock().alloc_near(target as usize, TRAMPOLINE_SIZE)
}

/// Returns true if a rel32 jump at `from` can reach `to`
pub fn within_rel32(from: usize, to: usize) -> bool {
    let delta = to as i128 - (from as i128 + 5);
    delta >= i32::MIN as i128 && delta <= i32::MAX as i128
}
