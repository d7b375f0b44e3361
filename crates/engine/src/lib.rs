//! xivmod Engine - Host Module Discovery and Global Storage
//!
//! This crate handles:
//! - Describing the host executable's code region for signature scanning
//! - Storing the host object table once the loader hands it over
//! - Providing access to host state throughout the framework
//!
//! # Architecture
//!
//! The host module is described once during plugin load via
//! [`loader::load_host`] and stored in [`globals::HostGlobals`]. Access is
//! provided via the [`try_host()`] function.
//!
//! # Thread Safety
//!
//! The code region is valid for the process lifetime. The object table may
//! arrive after load and is guarded by a lock.

pub mod error;
pub mod globals;
pub mod loader;

pub use error::HostError;
pub use globals::{init_host, try_host, HostGlobals};
pub use loader::{load_host, HostModule, ObjectTable};
