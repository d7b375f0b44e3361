//! Typed access to the host object table
//!
//! Resolution logic never touches raw host memory directly. It asks an
//! [`ActorTable`] which performs one guarded read per question and hands back
//! typed tokens.

use xivmod_engine::try_host;
use xivmod_sdk::{DrawObject, ObjectIndex, ObjectKind};

use crate::collections::ActorIdentity;
use crate::memory;
use crate::offsets::offsets;

/// Maximum length of a game object's name buffer
const NAME_LENGTH: usize = 64;

/// Identity token for a host draw object
///
/// Only compared and hashed; never dereferenced by the resolver.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawObjectId(usize);

impl DrawObjectId {
    pub const NULL: DrawObjectId = DrawObjectId(0);

    pub const fn new(address: usize) -> Self {
        Self(address)
    }

    pub fn from_ptr(ptr: *mut DrawObject) -> Self {
        Self(ptr as usize)
    }

    pub const fn address(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Debug for DrawObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DrawObjectId({:#x})", self.0)
    }
}

/// Read access to the actors the host currently knows about
pub trait ActorTable: Send + Sync {
    /// Number of slots in the table
    fn len(&self) -> usize;

    /// Draw object currently attached to the actor at `index`
    fn draw_object_of(&self, index: ObjectIndex) -> Option<DrawObjectId>;

    /// Identity of the actor at `index`, `None` if the slot is empty or unreadable
    fn identity_of(&self, index: ObjectIndex) -> Option<ActorIdentity>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`ActorTable`] backed by the host object table registered with the engine
#[derive(Debug, Default, Clone, Copy)]
pub struct HostActorTable;

impl HostActorTable {
    fn game_object(index: ObjectIndex) -> Option<usize> {
        let table = try_host()?.object_table()?;
        table.get(index).map(|ptr| ptr.as_ptr() as usize)
    }
}

impl ActorTable for HostActorTable {
    fn len(&self) -> usize {
        try_host()
            .and_then(|host| host.object_table())
            .map(|table| table.len())
            .unwrap_or(0)
    }

    fn draw_object_of(&self, index: ObjectIndex) -> Option<DrawObjectId> {
        let object = Self::game_object(index)?;
        // SAFETY: pointer-sized integer, valid for any bit pattern
        let draw: usize = unsafe { memory::read_field(object, offsets().game_object_draw_object)? };
        (draw != 0).then_some(DrawObjectId(draw))
    }

    fn identity_of(&self, index: ObjectIndex) -> Option<ActorIdentity> {
        let object = Self::game_object(index)?;
        let offsets = offsets();
        // SAFETY: plain byte
        let kind: u8 = unsafe { memory::read_field(object, offsets.game_object_kind)? };
        let name = memory::read_name::<NAME_LENGTH>(object, offsets.game_object_name)?;
        Some(ActorIdentity {
            object_index: index,
            kind: ObjectKind::from_raw(kind),
            name,
        })
    }
}
