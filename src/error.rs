//! Error types for the pod runtime adapter.

use std::path::PathBuf;

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the adapter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Identity Errors
    // =========================================================================
    /// An encoded pod or container name could not be decoded.
    #[error("malformed identity '{name}': {reason}")]
    MalformedIdentity { name: String, reason: String },

    /// Caller supplied an input that cannot be encoded or parsed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // =========================================================================
    // Spec Build Errors
    // =========================================================================
    /// The volume resolver had no volumes for the pod.
    #[error("cannot get the volumes for pod '{pod}'")]
    VolumeResolutionFailed { pod: String },

    /// Backend metadata for a volume is missing fields or has the wrong shape.
    #[error("invalid metadata for volume '{volume}': {reason}")]
    InvalidVolumeMetadata { volume: String, reason: String },

    /// Run options could not be generated for a container.
    #[error("failed to generate run options for container '{container}': {reason}")]
    RunOptionsFailed { container: String, reason: String },

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// An engine call returned an error.
    #[error("engine {operation} failed: {reason}")]
    EngineCallFailed { operation: String, reason: String },

    /// Pod not known to the engine.
    #[error("pod not found: {0}")]
    PodNotFound(String),

    /// Image pull failed.
    #[error("failed to pull image '{image}': {reason}")]
    ImagePullFailed { image: String, reason: String },

    /// Operation not supported by this engine.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    // =========================================================================
    // Network Errors
    // =========================================================================
    /// Network plugin failed to set up or tear down a pod.
    #[error("network {operation} failed for pod '{pod}': {reason}")]
    NetworkFailed {
        operation: String,
        pod: String,
        reason: String,
    },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Spec store initialization failed.
    #[error("failed to initialize spec store at {path}: {reason}")]
    StorageInitFailed { path: PathBuf, reason: String },

    /// No persisted spec for the key.
    #[error("pod spec not found: {key}")]
    SpecNotFound { key: String },

    /// Spec store write failed.
    #[error("failed to write to spec store: {0}")]
    StorageWriteFailed(String),

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Engine timestamp could not be parsed.
    #[error("invalid timestamp '{value}': {reason}")]
    Time { value: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Builds a `MalformedIdentity` error.
    pub(crate) fn malformed(name: &str, reason: impl Into<String>) -> Self {
        Self::MalformedIdentity {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Builds an `EngineCallFailed` error.
    pub fn engine(operation: &str, reason: impl ToString) -> Self {
        Self::EngineCallFailed {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
