//! [`RenderGlobals`] backed by the host CharacterUtility singleton

use xivmod_sdk::signatures;

use crate::collections::RenderParameter;
use crate::gamedata::{find_static, GamedataError};
use crate::memory;
use crate::offsets::{offsets, HostOffsets};

use super::RenderGlobals;

/// Resource slots on the CharacterUtility instance
pub struct CharacterUtilitySlots {
    /// Address of the static holding the instance pointer
    instance: usize,
    offsets: HostOffsets,
}

impl CharacterUtilitySlots {
    /// Locate the instance pointer via the `CharacterUtility` signature
    pub fn from_gamedata() -> Result<Self, GamedataError> {
        let instance = find_static(signatures::CHARACTER_UTILITY)?;
        tracing::debug!("CharacterUtility instance pointer at {:#x}", instance);
        Ok(Self::at(instance, offsets()))
    }

    /// Use an already resolved instance pointer address
    pub fn at(instance: usize, offsets: HostOffsets) -> Self {
        Self { instance, offsets }
    }

    fn field_offset(&self, parameter: RenderParameter) -> i64 {
        match parameter {
            RenderParameter::RacialScaling => self.offsets.utility_human_cmp,
            RenderParameter::PrimaryDecal => self.offsets.utility_decal_primary,
            RenderParameter::SecondaryDecal => self.offsets.utility_decal_secondary,
        }
    }

    fn field_address(&self, parameter: RenderParameter) -> Option<usize> {
        // SAFETY: pointer-sized integer
        let utility: usize = unsafe { memory::read_guarded(self.instance)? };
        if utility == 0 {
            return None;
        }
        utility.checked_add_signed(self.field_offset(parameter) as isize)
    }
}

impl RenderGlobals for CharacterUtilitySlots {
    fn read(&self, parameter: RenderParameter) -> Option<usize> {
        let address = self.field_address(parameter)?;
        // SAFETY: pointer-sized integer
        unsafe { memory::read_guarded(address) }
    }

    fn write(&self, parameter: RenderParameter, value: usize) -> bool {
        let Some(address) = self.field_address(parameter) else {
            return false;
        };
        if !memory::is_writable(address, std::mem::size_of::<usize>()) {
            return false;
        }
        // SAFETY: the slot is mapped writable; the host reads it as a plain pointer
        unsafe { std::ptr::write_volatile(address as *mut usize, value) };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    struct FakeUtility {
        slots: [usize; 0x60],
    }

    #[test]
    fn test_reads_and_writes_through_instance_pointer() {
        let mut utility = Box::new(FakeUtility { slots: [0; 0x60] });
        utility.slots[0x298 / 8] = 0x1111;
        let instance = Box::new(utility.as_mut() as *mut FakeUtility as usize);

        let slots = CharacterUtilitySlots::at(instance.as_ref() as *const usize as usize, HostOffsets::default());
        assert_eq!(slots.read(RenderParameter::RacialScaling), Some(0x1111));
        assert!(slots.write(RenderParameter::SecondaryDecal, 0x2222));
        assert_eq!(utility.slots[0x2B0 / 8], 0x2222);
    }

    #[test]
    fn test_null_instance() {
        let instance = Box::new(0usize);
        let slots = CharacterUtilitySlots::at(instance.as_ref() as *const usize as usize, HostOffsets::default());
        assert_eq!(slots.read(RenderParameter::RacialScaling), None);
        assert!(!slots.write(RenderParameter::RacialScaling, 1));
    }
}
