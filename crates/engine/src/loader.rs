//! Host module description handed over by the loader

use std::ptr::NonNull;

use xivmod_sdk::{GameObject, ObjectIndex, OBJECT_TABLE_SIZE};

use crate::error::HostError;
use crate::globals::HostGlobals;

/// The executable code region of the host process
///
/// Signature scans run over this region. It is valid for the lifetime of the
/// process, so the slice it hands out is `'static`.
#[derive(Clone, Copy)]
pub struct HostModule {
    base: NonNull<u8>,
    size: usize,
    name: &'static str,
}

// SAFETY: The region is immutable host code mapped for the process lifetime.
unsafe impl Send for HostModule {}
unsafe impl Sync for HostModule {}

impl HostModule {
    /// Describe a code region
    ///
    /// # Safety
    /// `base..base + size` must be mapped and readable for the process lifetime.
    pub unsafe fn from_raw(base: *const u8, size: usize, name: &'static str) -> Result<Self, HostError> {
        let base = NonNull::new(base as *mut u8).ok_or(HostError::NullPointer("module base"))?;
        if size == 0 {
            return Err(HostError::EmptyModule(name.to_string()));
        }
        Ok(Self { base, size, name })
    }

    /// Base address of the region
    pub fn base(&self) -> usize {
        self.base.as_ptr() as usize
    }

    /// Size of the region in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Debug name of the module
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if `address` lies within the region
    pub fn contains(&self, address: usize) -> bool {
        address >= self.base() && address < self.base() + self.size
    }

    /// The region as a byte slice
    pub fn bytes(&self) -> &'static [u8] {
        // SAFETY: from_raw requires the region to be readable for the process lifetime
        unsafe { std::slice::from_raw_parts(self.base.as_ptr(), self.size) }
    }
}

impl std::fmt::Debug for HostModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostModule({} @ {:x}+{:x})", self.name, self.base(), self.size)
    }
}

/// The host object table: an array of game object pointers indexed by [`ObjectIndex`]
#[derive(Clone, Copy)]
pub struct ObjectTable {
    entries: NonNull<*mut GameObject>,
    len: usize,
}

// SAFETY: The table array itself is a static allocation of the host; entries are
// read with plain loads and may be null.
unsafe impl Send for ObjectTable {}
unsafe impl Sync for ObjectTable {}

impl ObjectTable {
    /// Wrap the host's object pointer array
    ///
    /// # Safety
    /// `entries` must point to `len` pointer-sized slots valid for the process lifetime.
    pub unsafe fn from_raw(entries: *const *mut GameObject, len: usize) -> Result<Self, HostError> {
        let entries =
            NonNull::new(entries as *mut *mut GameObject).ok_or(HostError::NullPointer("object table"))?;
        if len > OBJECT_TABLE_SIZE {
            return Err(HostError::ObjectTableTooLarge(len, OBJECT_TABLE_SIZE));
        }
        Ok(Self { entries, len })
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the table has no slots
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Game object at `index`, or `None` for out-of-range or empty slots
    pub fn get(&self, index: ObjectIndex) -> Option<NonNull<GameObject>> {
        let idx = index.get() as usize;
        if idx >= self.len {
            return None;
        }
        // SAFETY: idx < len and from_raw guarantees len valid slots
        let ptr = unsafe { self.entries.as_ptr().add(idx).read_volatile() };
        NonNull::new(ptr)
    }
}

impl std::fmt::Debug for ObjectTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectTable({:p}, {} slots)", self.entries.as_ptr(), self.len)
    }
}

/// Build host globals from the values the loader passes at plugin load
///
/// # Safety
/// `module_base..module_base + module_size` must be the host's mapped,
/// readable code region.
#[tracing::instrument(skip_all)]
pub unsafe fn load_host(module_base: *const u8, module_size: usize) -> Result<HostGlobals, HostError> {
    let module = HostModule::from_raw(module_base, module_size, "host")?;
    tracing::info!(
        "Host code region: {:x} ({} bytes)",
        module.base(),
        module.size()
    );
    Ok(HostGlobals::new(module))
}
