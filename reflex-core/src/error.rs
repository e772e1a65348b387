//! Error types for the reflex-cache core.

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds the core produces and routes (spec.md §7).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cartridge storage error: {0}")]
    Storage(String),

    #[error("cartridge not found: {0}")]
    CartridgeNotFound(String),

    #[error("fact not found: {0}")]
    FactNotFound(u64),

    #[error("grain not found: {0}")]
    GrainNotFound(String),

    #[error("crystallisation rejected: {0}")]
    CrystallisationRejected(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a caller may reasonably retry this operation.
    ///
    /// Used by the scheduler and orchestrator to decide whether to log and
    /// continue or to treat a failure as fatal. Mirrors the teacher's
    /// `Error::is_recoverable` convention.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Storage(_) | Error::Engine(_) | Error::Io(_) => true,
            Error::InvalidInput(_)
            | Error::CartridgeNotFound(_)
            | Error::FactNotFound(_)
            | Error::GrainNotFound(_)
            | Error::CrystallisationRejected(_)
            | Error::Config(_)
            | Error::Serialization(_)
            | Error::Yaml(_) => false,
        }
    }
}
