//! Guarded reads of host memory
//!
//! Detours run inside the host's call stack, so a fault here takes the whole
//! process down. Every read of a host structure whose lifetime we do not
//! control goes through [`read_guarded`], which checks that the bytes are
//! mapped and readable before touching them.
//!
//! This does not make concurrent frees safe. It only turns "pointer to
//! something that is not there" into `None`.

use std::mem::size_of;

/// Lowest address we consider plausible for a host object
const MIN_ADDRESS: usize = 0x1_0000;

/// Returns true if `len` bytes starting at `address` are mapped and readable
pub fn is_readable(address: usize, len: usize) -> bool {
    is_accessible(address, len, |region| region.is_readable())
}

/// Returns true if `len` bytes starting at `address` are mapped and writable
pub fn is_writable(address: usize, len: usize) -> bool {
    is_accessible(address, len, |region| region.is_writable())
}

fn is_accessible(address: usize, len: usize, allowed: impl Fn(&region::Region) -> bool) -> bool {
    if address < MIN_ADDRESS || len == 0 {
        return false;
    }
    let Some(end) = address.checked_add(len) else {
        return false;
    };

    let regions = match region::query_range(address as *const u8, len) {
        Ok(regions) => regions,
        Err(_) => return false,
    };

    let mut covered = address;
    for region in regions {
        let Ok(region) = region else {
            return false;
        };
        if !allowed(&region) || region.is_guarded() {
            return false;
        }
        let range = region.as_range();
        if range.start > covered {
            // Hole between regions
            return false;
        }
        covered = covered.max(range.end);
    }

    covered >= end
}

/// Read a `T` from host memory if the bytes are readable
///
/// # Safety
/// `T` must be valid for any bit pattern (plain integers, raw pointers).
pub unsafe fn read_guarded<T: Copy>(address: usize) -> Option<T> {
    if !is_readable(address, size_of::<T>()) {
        return None;
    }
    Some(std::ptr::read_unaligned(address as *const T))
}

/// Read a field at `base + offset`
///
/// # Safety
/// Same as [`read_guarded`].
pub unsafe fn read_field<T: Copy>(base: usize, offset: i64) -> Option<T> {
    let address = base.checked_add_signed(offset as isize)?;
    read_guarded(address)
}

/// Read a fixed-size, NUL-terminated UTF-8 name buffer at `base + offset`
pub fn read_name<const N: usize>(base: usize, offset: i64) -> Option<String> {
    // SAFETY: byte arrays are valid for any bit pattern
    let raw: [u8; N] = unsafe { read_field(base, offset)? };
    let len = raw.iter().position(|&b| b == 0).unwrap_or(N);
    Some(String::from_utf8_lossy(&raw[..len]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_valid_memory() {
        let value: u64 = 0xDEAD_BEEF_CAFE_F00D;
        let address = &value as *const u64 as usize;
        assert_eq!(unsafe { read_guarded::<u64>(address) }, Some(value));
        assert!(is_writable(address, 8));
    }

    #[test]
    fn test_read_null_and_low_addresses() {
        assert_eq!(unsafe { read_guarded::<u64>(0) }, None);
        assert_eq!(unsafe { read_guarded::<u64>(0x10) }, None);
        assert!(!is_readable(usize::MAX - 2, 8));
        assert!(!is_writable(0, 8));
    }

    #[test]
    fn test_read_field_and_name() {
        #[repr(C)]
        struct Fake {
            index: u16,
            pad: [u8; 6],
            name: [u8; 16],
        }
        let mut fake = Fake {
            index: 201,
            pad: [0; 6],
            name: [0; 16],
        };
        fake.name[..5].copy_from_slice(b"Alpha");
        let base = &fake as *const Fake as usize;

        assert_eq!(unsafe { read_field::<u16>(base, 0) }, Some(201));
        assert_eq!(read_name::<16>(base, 8).as_deref(), Some("Alpha"));
    }
}
