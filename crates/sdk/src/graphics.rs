//! Host draw object type definitions and detoured function signatures
//!
//! Draw objects are the renderable side of a game object. The resolver only
//! ever compares their addresses; it never dereferences them.

use crate::customize::CustomizeArray;
use crate::objects::Character;

/// Opaque type for a host DrawObject
#[repr(C)]
pub struct DrawObject {
    _opaque: [u8; 0],
}

/// Opaque type for a human CharacterBase
///
/// A Human begins with its DrawObject.
#[repr(C)]
pub struct Human {
    _opaque: [u8; 0],
}

impl Human {
    /// View a human pointer as its embedded draw object
    #[inline]
    pub fn as_draw_object(ptr: *mut Human) -> *mut DrawObject {
        ptr.cast()
    }
}

/// Opaque type for the host CharacterUtility singleton
///
/// Holds the resource handles for global render data such as racial scaling
/// tables and decal textures.
#[repr(C)]
pub struct CharacterUtility {
    _opaque: [u8; 0],
}

/// `Human::UpdateCustomize`-style function: applies new customization data
///
/// # Arguments
/// * `human` - The draw object being changed
/// * `data` - The new customization array
/// * `skip_equipment` - Non-zero to skip re-evaluating equipment models
///
/// # Returns
/// True if the draw object accepted the change in place
pub type ChangeCustomizeFn =
    unsafe extern "C" fn(human: *mut Human, data: *mut CustomizeArray, skip_equipment: u8) -> bool;

/// Copies one character's appearance and state onto another (cutscenes, GPose)
pub type CopyCharacterFn =
    unsafe extern "C" fn(target: *mut Character, source: *mut Character, unk: u32) -> u64;

/// Character destructor
pub type CharacterDestructorFn = unsafe extern "C" fn(character: *mut Character) -> *mut Character;
