//! Field offsets into host structures
//!
//! Loaded from gamedata at startup; built-in defaults match the host build
//! the bundled gamedata was written for.

use std::sync::OnceLock;

use xivmod_sdk::signatures;

use crate::gamedata::Gamedata;

/// Field offsets used for guarded host-memory reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostOffsets {
    pub game_object_name: i64,
    pub game_object_index: i64,
    pub game_object_kind: i64,
    pub game_object_draw_object: i64,
    pub utility_human_cmp: i64,
    pub utility_decal_primary: i64,
    pub utility_decal_secondary: i64,
}

impl Default for HostOffsets {
    fn default() -> Self {
        Self {
            game_object_name: 0x30,
            game_object_index: 0x8C,
            game_object_kind: 0x90,
            game_object_draw_object: 0x100,
            utility_human_cmp: 0x298,
            utility_decal_primary: 0x2A8,
            utility_decal_secondary: 0x2B0,
        }
    }
}

impl HostOffsets {
    /// Read every offset from gamedata, keeping defaults for missing keys
    pub fn from_gamedata(gd: &Gamedata) -> Self {
        let d = Self::default();
        Self {
            game_object_name: gd.offset_or(signatures::OFFSET_GAME_OBJECT_NAME, d.game_object_name),
            game_object_index: gd.offset_or(signatures::OFFSET_GAME_OBJECT_INDEX, d.game_object_index),
            game_object_kind: gd.offset_or(signatures::OFFSET_GAME_OBJECT_KIND, d.game_object_kind),
            game_object_draw_object: gd
                .offset_or(signatures::OFFSET_GAME_OBJECT_DRAW_OBJECT, d.game_object_draw_object),
            utility_human_cmp: gd.offset_or(signatures::OFFSET_UTILITY_HUMAN_CMP, d.utility_human_cmp),
            utility_decal_primary: gd
                .offset_or(signatures::OFFSET_UTILITY_DECAL_PRIMARY, d.utility_decal_primary),
            utility_decal_secondary: gd
                .offset_or(signatures::OFFSET_UTILITY_DECAL_SECONDARY, d.utility_decal_secondary),
        }
    }
}

static OFFSETS: OnceLock<HostOffsets> = OnceLock::new();

/// Install the global offsets; later calls are ignored
pub fn init_offsets(offsets: HostOffsets) {
    if OFFSETS.set(offsets).is_err() {
        tracing::warn!("Host offsets already initialized");
    }
}

/// Current offsets (defaults until initialized)
pub fn offsets() -> HostOffsets {
    OFFSETS.get().copied().unwrap_or_default()
}
