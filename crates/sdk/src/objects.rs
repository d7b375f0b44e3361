//! Host game object type definitions
//!
//! Game objects live in a fixed-size object table owned by the host. Their
//! layout changes between host versions, so fields are read through offsets
//! supplied by gamedata rather than through struct fields.

use std::fmt;

/// Opaque type for a host GameObject
#[repr(C)]
pub struct GameObject {
    _opaque: [u8; 0],
}

/// Opaque type for a host Character
///
/// A Character begins with its GameObject, so a `*mut Character` is also a
/// valid `*mut GameObject`.
#[repr(C)]
pub struct Character {
    _opaque: [u8; 0],
}

impl Character {
    /// View a character pointer as its embedded game object
    #[inline]
    pub fn as_game_object(ptr: *mut Character) -> *mut GameObject {
        ptr.cast()
    }
}

/// Number of entries in the host object table
pub const OBJECT_TABLE_SIZE: usize = 599;

/// First object-table index used for cutscene actors
pub const CUTSCENE_START_INDEX: u16 = 200;

/// One past the last object-table index used for cutscene actors
pub const CUTSCENE_END_INDEX: u16 = 240;

/// Number of cutscene actor slots
pub const CUTSCENE_SLOTS: usize = (CUTSCENE_END_INDEX - CUTSCENE_START_INDEX) as usize;

/// Index of an object in the host object table
///
/// The host uses `0xFFFF` as its "no object" marker.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectIndex(pub u16);

impl ObjectIndex {
    /// The host's invalid index sentinel
    pub const INVALID: ObjectIndex = ObjectIndex(u16::MAX);

    /// Create an index from a raw value
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw table index
    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Returns true unless this is the invalid sentinel
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u16::MAX
    }
}

impl fmt::Debug for ObjectIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "ObjectIndex({})", self.0)
        } else {
            write!(f, "ObjectIndex(invalid)")
        }
    }
}

impl fmt::Display for ObjectIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for ObjectIndex {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

/// Kind byte stored on every game object
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    None = 0,
    Player = 1,
    BattleNpc = 2,
    EventNpc = 3,
    Treasure = 4,
    Aetheryte = 5,
    GatheringPoint = 6,
    EventObj = 7,
    MountType = 8,
    Companion = 9,
    Retainer = 10,
    Area = 11,
    Housing = 12,
    Cutscene = 13,
    CardStand = 14,
    Ornament = 15,
}

impl ObjectKind {
    /// Decode the raw kind byte, mapping unknown values to `None`
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Player,
            2 => Self::BattleNpc,
            3 => Self::EventNpc,
            4 => Self::Treasure,
            5 => Self::Aetheryte,
            6 => Self::GatheringPoint,
            7 => Self::EventObj,
            8 => Self::MountType,
            9 => Self::Companion,
            10 => Self::Retainer,
            11 => Self::Area,
            12 => Self::Housing,
            13 => Self::Cutscene,
            14 => Self::CardStand,
            15 => Self::Ornament,
            _ => Self::None,
        }
    }
}
