//! xivmod Plugin - FFI Layer
//!
//! This crate provides the FFI boundary between the host-side loader and the
//! Rust core logic. It compiles to a cdylib (.dll/.so).

pub mod ffi;
mod logging;

pub use xivmod_core::shutdown;
