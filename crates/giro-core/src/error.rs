use thiserror::Error;

/// Top-level error type for Giro.
#[derive(Debug, Error)]
pub enum GiroError {
    /// Error from the reasoning collaborator.
    #[error("agent error: {0}")]
    Agent(String),

    /// Error from the messaging transport.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Memory/storage error.
    #[error("memory error: {0}")]
    Memory(String),

    /// The retrieval index and the item store disagree. Fatal, never retried:
    /// it means ingestion desynchronized the two, not a transient condition.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
