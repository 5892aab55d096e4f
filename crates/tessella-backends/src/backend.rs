//! Backend trait and per-device queues
//!
//! A [`Backend`] owns device memory and executes kernel routines against
//! it. The trait is the whole contract the rest of the workspace relies
//! on: buffer management plus a single [`Backend::enqueue_kernel`] entry
//! point taking a resolved [`KernelCall`].
//!
//! A [`DeviceQueue`] pairs a [`Device`] with a shared, lock-guarded
//! backend. There is one queue per device, and everything submitted
//! through a queue executes in submission order; that is the only
//! ordering guarantee the workspace offers.

use crate::device::Device;
use crate::error::Result;
use crate::handle::BufferHandle;
use crate::kernel::KernelCall;
use crate::status::KernelStatus;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared, lock-guarded backend reference used by queues and buffer owners.
pub type SharedBackend = Arc<RwLock<Box<dyn Backend + Send + Sync>>>;

/// Backend trait for device memory and kernel execution
///
/// Implementations manage opaque buffers addressed by [`BufferHandle`]
/// and execute routines from a fixed catalog. A routine either succeeds
/// or reports a [`KernelStatus`]; there is no partial success.
pub trait Backend {
    /// Allocate a buffer of the given size in bytes.
    ///
    /// Returns [`crate::BackendError::OutOfDeviceMemory`] if the device
    /// cannot satisfy the request; no buffer is retained in that case.
    fn allocate_buffer(&mut self, size: usize) -> Result<BufferHandle>;

    /// Free a previously allocated buffer.
    fn free_buffer(&mut self, handle: BufferHandle) -> Result<()>;

    /// Copy host bytes into a buffer at a byte offset.
    fn write_buffer(&mut self, handle: BufferHandle, offset: usize, data: &[u8]) -> Result<()>;

    /// Copy bytes out of a buffer at a byte offset.
    fn read_buffer(&self, handle: BufferHandle, offset: usize, data: &mut [u8]) -> Result<()>;

    /// Size in bytes of an allocated buffer.
    fn buffer_size(&self, handle: BufferHandle) -> Result<usize>;

    /// Execute one routine against resolved operands.
    ///
    /// The call's operands must reference buffers owned by this backend.
    /// Returns the routine's status on rejection; the backend must leave
    /// operand buffers untouched when it rejects a call.
    fn enqueue_kernel(&mut self, call: &KernelCall<'_>) -> std::result::Result<(), KernelStatus>;
}

/// One command queue bound to one device.
///
/// Cloning a queue clones the shared backend reference, not the backend.
/// All submissions through clones of the same queue serialize on the
/// backend lock, which is what gives submission-order execution.
pub struct DeviceQueue {
    device: Device,
    backend: SharedBackend,
}

impl DeviceQueue {
    /// Create a queue owning the given backend.
    pub fn new(device: Device, backend: Box<dyn Backend + Send + Sync>) -> Self {
        Self {
            device,
            backend: Arc::new(RwLock::new(backend)),
        }
    }

    /// The device this queue submits to.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Shared reference to the queue's backend.
    pub fn backend(&self) -> SharedBackend {
        Arc::clone(&self.backend)
    }
}

impl Clone for DeviceQueue {
    fn clone(&self) -> Self {
        Self {
            device: self.device,
            backend: Arc::clone(&self.backend),
        }
    }
}

impl std::fmt::Debug for DeviceQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceQueue").field("device", &self.device).finish()
    }
}
