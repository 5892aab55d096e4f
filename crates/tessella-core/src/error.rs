//! Error types for dispatch and coherence operations

use tessella_backends::{Device, KernelStatus};

/// Result type for tessella-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving and dispatching operations
///
/// Configuration defects (`Configuration`, `UndeclaredOperation`,
/// `SetupAlreadyComplete`, `NotInitialized`) are fatal and never retried.
/// `ResourceExhausted` and `BackendRejected` wrap the backend's verdict;
/// retry policy belongs to the caller, never to this layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Declared slot count does not match the supplied argument count
    #[error("operation {operation:?} declares {declared} array slots, call supplied {supplied}")]
    Configuration {
        operation: String,
        declared: usize,
        supplied: usize,
    },

    /// The operation was never declared in the access table
    #[error("operation {0:?} is not declared in the access table")]
    UndeclaredOperation(String),

    /// `setup` ran twice; the access table is write-once
    #[error("runtime setup ran twice; the access table is write-once")]
    SetupAlreadyComplete,

    /// Dispatch before setup installed the access table, or on a device
    /// with no registered queue
    #[error("runtime used before setup completed")]
    NotInitialized,

    /// Device allocation failure
    #[error("device {device} allocation failed: requested {requested} bytes")]
    ResourceExhausted { device: Device, requested: usize },

    /// The backend reported a non-success status
    ///
    /// `status` and `context` are distinct fields so callers can assert on
    /// the backend's verdict and on the originating call independently.
    #[error("{context}: {status}")]
    BackendRejected { status: KernelStatus, context: String },

    /// Element counts of related operands disagree
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Invalid view construction or a non-conforming operand window
    #[error("invalid view: {0}")]
    InvalidView(String),
}
