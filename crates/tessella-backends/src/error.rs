//! Error types for backend operations

use crate::status::KernelStatus;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur while managing device memory or running kernels
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Invalid buffer handle
    #[error("invalid buffer handle: {0}")]
    InvalidBufferHandle(u64),

    /// Device allocation failed
    #[error("device out of memory: requested {requested} bytes")]
    OutOfDeviceMemory { requested: usize },

    /// Transfer outside the buffer's bounds
    #[error("buffer access out of bounds: offset {offset} + len {len} > buffer size {size}")]
    CopyOutOfBounds { offset: usize, len: usize, size: usize },

    /// A kernel routine returned a non-success status
    #[error("kernel rejected: {0}")]
    Rejected(#[from] KernelStatus),
}
