//! xivmod SDK - Host Process Type Definitions
//!
//! This crate contains opaque type definitions for the host's in-memory
//! structures and the function signatures of the host functions we detour.
//! It has no dependencies and compiles quickly, allowing parallel compilation
//! of dependent crates.
//!
//! # Modules
//!
//! - [`objects`] - Game objects, characters and object-table indices
//! - [`graphics`] - Draw objects and the function signatures touching them
//! - [`customize`] - The customization byte array passed to ChangeCustomize
//! - [`signatures`] - Gamedata keys for signatures and offsets

pub mod customize;
pub mod graphics;
pub mod objects;
pub mod signatures;

pub use customize::*;
pub use graphics::*;
pub use objects::*;
pub use signatures::{HOOK_SIGNATURES, STATIC_SIGNATURES};
