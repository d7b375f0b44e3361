//! C ABI consumed by the host-side loader

pub mod exports;
