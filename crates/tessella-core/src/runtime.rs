//! Runtime: queue registry, access table, and the dispatch entry points
//!
//! The [`Runtime`] owns what a dispatched call needs to find: the
//! write-once access table, one [`DeviceQueue`] per registered device,
//! and the heterogeneous data manager. Routine wrappers drive it in
//! three steps:
//!
//! ```text
//! let frame = rt.dispatch(op, device, &args)?;   // resolve buffers, move data in
//! rt.enqueue(device, &kernel_call, op)?;         // run the routine
//! rt.finalize(op, device, &args)?;               // flip freshness flags
//! ```
//!
//! Calls are synchronous end-to-end: when `enqueue` returns, the routine
//! ran (or was rejected) and any transfer `dispatch` scheduled on the
//! same queue completed before it.

use crate::access::{AccessMode, AccessTable};
use crate::array::RootArray;
use crate::dispatch::{DispatchFrame, Operand, ResolvedFrame};
use crate::error::{Error, Result};
use crate::hdm::Hdm;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::OnceLock;
use tessella_backends::{Backend, Device, DeviceQueue, KernelCall};

/// Dispatch façade over the access table, device queues, and the HDM
pub struct Runtime {
    table: OnceLock<AccessTable>,
    queues: RwLock<HashMap<Device, DeviceQueue>>,
    hdm: Hdm,
}

impl Runtime {
    /// Create a runtime with no table and no devices.
    ///
    /// Dispatching before [`Runtime::setup`] and device registration
    /// fails with [`Error::NotInitialized`].
    pub fn new() -> Self {
        Self {
            table: OnceLock::new(),
            queues: RwLock::new(HashMap::new()),
            hdm: Hdm::new(),
        }
    }

    /// Install the access table. May run exactly once.
    pub fn setup(&self, table: AccessTable) -> Result<()> {
        let declared = table.len();
        self.table.set(table).map_err(|_| Error::SetupAlreadyComplete)?;
        tracing::info!(operations = declared, "access_table_installed");
        Ok(())
    }

    /// Whether setup already installed the access table.
    pub fn is_initialized(&self) -> bool {
        self.table.get().is_some()
    }

    /// Register a device and the backend executing on it.
    ///
    /// Creates the device's one command queue. Registering the same
    /// device again replaces its queue, dropping the old backend once
    /// no buffer references it.
    pub fn register_device(&self, device: Device, backend: Box<dyn Backend + Send + Sync>) -> DeviceQueue {
        let queue = DeviceQueue::new(device, backend);
        self.queues.write().insert(device, queue.clone());
        tracing::info!(device = %device, "device_registered");
        queue
    }

    /// The command queue of a registered device.
    pub fn queue(&self, device: Device) -> Result<DeviceQueue> {
        self.queues.read().get(&device).cloned().ok_or(Error::NotInitialized)
    }

    /// The heterogeneous data manager, for residency and transfer stats.
    pub fn hdm(&self) -> &Hdm {
        &self.hdm
    }

    fn modes(&self, operation: &'static str) -> Result<&[AccessMode]> {
        let table = self.table.get().ok_or(Error::NotInitialized)?;
        table
            .modes(operation)
            .ok_or_else(|| Error::UndeclaredOperation(operation.to_string()))
    }

    fn checked_frame<'a, T: bytemuck::Pod>(
        &self,
        operation: &'static str,
        device: Device,
        args: &[Operand<'a, T>],
    ) -> Result<DispatchFrame<'a, T>> {
        let modes = self.modes(operation)?;
        if modes.len() != args.len() {
            return Err(Error::Configuration {
                operation: operation.to_string(),
                declared: modes.len(),
                supplied: args.len(),
            });
        }
        let mut frame = DispatchFrame::new(operation, device);
        for (operand, mode) in args.iter().zip(modes) {
            frame.push(*operand, *mode);
        }
        Ok(frame)
    }

    /// Resolve an operation's operands to device buffers.
    ///
    /// Consults the access table, builds the dispatch frame, and runs the
    /// resolver: alias or allocate each slot's buffer and move host data
    /// in where the declared mode requires it.
    #[tracing::instrument(skip(self, args), fields(device = %device, slots = args.len()))]
    pub fn dispatch<T: bytemuck::Pod>(
        &self,
        operation: &'static str,
        device: Device,
        args: &[Operand<'_, T>],
    ) -> Result<ResolvedFrame> {
        let frame = self.checked_frame(operation, device, args)?;
        let queue = self.queue(device)?;
        frame.resolve(&self.hdm, &queue)
    }

    /// Run a resolved kernel call on a device's queue.
    ///
    /// A non-success status is wrapped with the caller-supplied context
    /// string; nothing is retried here.
    pub fn enqueue(&self, device: Device, call: &KernelCall<'_>, context: &str) -> Result<()> {
        let queue = self.queue(device)?;
        queue
            .backend()
            .write()
            .enqueue_kernel(call)
            .map_err(|status| Error::BackendRejected {
                status,
                context: context.to_string(),
            })
    }

    /// Update freshness flags after a routine ran.
    ///
    /// Write and read-write slots become host-dirty / device-fresh; read
    /// slots are left untouched.
    pub fn finalize<T: bytemuck::Pod>(
        &self,
        operation: &'static str,
        device: Device,
        args: &[Operand<'_, T>],
    ) -> Result<()> {
        let frame = self.checked_frame(operation, device, args)?;
        frame.finalize(&self.hdm);
        Ok(())
    }

    /// Read the newest device copy of a root back into host storage.
    #[tracing::instrument(skip(self, root), fields(root = %root.id()))]
    pub fn sync_to_host<T: bytemuck::Pod>(&self, root: &mut RootArray<T>) -> Result<()> {
        self.hdm.sync_to_host(root)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("initialized", &self.is_initialized())
            .field("devices", &self.queues.read().len())
            .finish()
    }
}
