//! Error types for host global acquisition

/// Error type for host loading operations
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The loader passed a null pointer where one is required
    #[error("Null pointer for: {0}")]
    NullPointer(&'static str),

    /// The executable region has no bytes
    #[error("Host module {0} has an empty code region")]
    EmptyModule(String),

    /// Object table length does not match what the host build uses
    #[error("Object table length {0} exceeds the supported maximum of {1}")]
    ObjectTableTooLarge(usize, usize),

    /// Host globals already initialized
    #[error("Host already initialized")]
    AlreadyInitialized,
}
