//! Heterogeneous data manager
//!
//! The manager keeps one device buffer per (root, device) pair alive in
//! the root's residency map and decides, per dispatched slot, whether the
//! slot aliases an existing buffer, forces an allocation, or needs a
//! host-to-device refresh. Freshness is two flags per entry:
//!
//! - `host_dirty` - the device buffer holds newer data than host storage
//! - `device_dirty` - host storage holds newer data than the device buffer
//!
//! At most one entry per root is ever host-dirty: a write on one device
//! marks every sibling entry device-dirty and clears its host-dirty flag,
//! so readback always has a single source of truth.
//!
//! All transfers are counted in [`TransferSnapshot`] and logged with
//! duration, size, and bandwidth fields.

use crate::access::AccessMode;
use crate::array::RootArray;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use tessella_backends::{BackendError, BufferHandle, Device, DeviceQueue, KernelStatus, SharedBackend};

/// One device-resident mirror of a root array
///
/// Sized to the root's full extent so every view of the root can alias
/// it. The entry holds a shared reference to the owning backend, so
/// dropping it releases the device allocation.
pub struct DeviceBuffer {
    handle: BufferHandle,
    device: Device,
    size_bytes: usize,
    pub(crate) host_dirty: bool,
    pub(crate) device_dirty: bool,
    backend: SharedBackend,
}

impl DeviceBuffer {
    fn new(handle: BufferHandle, device: Device, size_bytes: usize, backend: SharedBackend) -> Self {
        Self {
            handle,
            device,
            size_bytes,
            host_dirty: false,
            // A fresh allocation holds garbage until the first refresh.
            device_dirty: true,
            backend,
        }
    }

    /// Opaque backend handle of the allocation.
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Device the allocation lives on.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Allocation size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Snapshot of the freshness flags.
    pub fn state(&self) -> BufferState {
        BufferState {
            host_dirty: self.host_dirty,
            device_dirty: self.device_dirty,
        }
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        if let Err(err) = self.backend.write().free_buffer(self.handle) {
            tracing::warn!(handle = %self.handle, device = %self.device, error = %err, "buffer_release_failed");
        }
    }
}

impl std::fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("handle", &self.handle)
            .field("device", &self.device)
            .field("size_bytes", &self.size_bytes)
            .field("host_dirty", &self.host_dirty)
            .field("device_dirty", &self.device_dirty)
            .finish()
    }
}

/// Freshness flags of one residency entry, for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferState {
    /// Host storage is stale relative to this buffer
    pub host_dirty: bool,
    /// This buffer is stale relative to host storage
    pub device_dirty: bool,
}

#[derive(Default)]
struct TransferCounters {
    allocations: AtomicU64,
    h2d_transfers: AtomicU64,
    h2d_bytes: AtomicU64,
    d2h_transfers: AtomicU64,
    d2h_bytes: AtomicU64,
}

/// Point-in-time copy of the manager's transfer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSnapshot {
    /// Device buffers allocated
    pub allocations: u64,
    /// Host-to-device transfers performed
    pub h2d_transfers: u64,
    /// Bytes moved host-to-device
    pub h2d_bytes: u64,
    /// Device-to-host transfers performed
    pub d2h_transfers: u64,
    /// Bytes moved device-to-host
    pub d2h_bytes: u64,
}

fn bandwidth_mbps(bytes: usize, duration_us: u64) -> f64 {
    if duration_us == 0 {
        return 0.0;
    }
    (bytes as f64 / duration_us as f64) * 1_000_000.0 / (1024.0 * 1024.0)
}

/// Heterogeneous data manager: per-(root, device) buffer residency
pub struct Hdm {
    counters: TransferCounters,
}

impl Hdm {
    /// Create a manager with zeroed counters.
    pub fn new() -> Self {
        Self {
            counters: TransferCounters::default(),
        }
    }

    /// Snapshot of the transfer counters.
    pub fn stats(&self) -> TransferSnapshot {
        TransferSnapshot {
            allocations: self.counters.allocations.load(Ordering::Relaxed),
            h2d_transfers: self.counters.h2d_transfers.load(Ordering::Relaxed),
            h2d_bytes: self.counters.h2d_bytes.load(Ordering::Relaxed),
            d2h_transfers: self.counters.d2h_transfers.load(Ordering::Relaxed),
            d2h_bytes: self.counters.d2h_bytes.load(Ordering::Relaxed),
        }
    }

    /// Non-creating lookup of the root's buffer on `device`.
    pub fn get_existing<T: bytemuck::Pod>(&self, root: &RootArray<T>, device: Device) -> Option<BufferHandle> {
        root.residency.lock().get(&device).map(DeviceBuffer::handle)
    }

    /// Cached buffer for (root, device), allocating on first touch.
    ///
    /// The allocation is sized to the root's full extent, never to a
    /// view's window. On allocation failure no entry is inserted, so a
    /// later call starts from a clean slate.
    pub fn get_or_create<T: bytemuck::Pod>(&self, root: &RootArray<T>, queue: &DeviceQueue) -> Result<BufferHandle> {
        let device = queue.device();
        let mut residency = root.residency.lock();
        if let Some(entry) = residency.get(&device) {
            return Ok(entry.handle());
        }

        let size_bytes = root.size_bytes();
        let handle = queue
            .backend()
            .write()
            .allocate_buffer(size_bytes)
            .map_err(|err| alloc_error(err, device, size_bytes))?;
        self.counters.allocations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            root = %root.id(),
            device = %device,
            handle = %handle,
            size_bytes = size_bytes,
            "device_buffer_allocated"
        );

        residency.insert(device, DeviceBuffer::new(handle, device, size_bytes, queue.backend()));
        Ok(handle)
    }

    /// Make the root's buffer on `queue` fresh enough for `mode`.
    ///
    /// Reads require the device copy to reflect host storage, so a stale
    /// buffer is refreshed with a host-to-device transfer of the root's
    /// full contents. Write-only access overwrites the buffer anyway, so
    /// the transfer is skipped entirely.
    pub fn refresh<T: bytemuck::Pod>(
        &self,
        root: &RootArray<T>,
        queue: &DeviceQueue,
        mode: AccessMode,
        context: &str,
    ) -> Result<()> {
        if !mode.reads() {
            return Ok(());
        }
        let device = queue.device();
        let mut residency = root.residency.lock();
        let Some(entry) = residency.get_mut(&device) else {
            return Ok(());
        };
        if !entry.device_dirty {
            return Ok(());
        }

        let start = std::time::Instant::now();
        let bytes = root.as_bytes();
        queue
            .backend()
            .write()
            .write_buffer(entry.handle, 0, bytes)
            .map_err(|err| reject(err, format!("{context}: host-to-device transfer")))?;
        entry.device_dirty = false;

        let duration_us = start.elapsed().as_micros() as u64;
        self.counters.h2d_transfers.fetch_add(1, Ordering::Relaxed);
        self.counters.h2d_bytes.fetch_add(bytes.len() as u64, Ordering::Relaxed);
        tracing::debug!(
            root = %root.id(),
            device = %device,
            duration_us = duration_us,
            bytes = bytes.len(),
            bandwidth_mbps = bandwidth_mbps(bytes.len(), duration_us),
            direction = "H2D",
            "buffer_transfer"
        );
        Ok(())
    }

    /// Record that `device` now holds the newest copy of the root.
    ///
    /// The local entry becomes host-dirty and device-fresh; every sibling
    /// entry becomes stale, keeping at most one host-dirty entry per root.
    pub fn mark_dirty_on_device<T: bytemuck::Pod>(&self, root: &RootArray<T>, device: Device) {
        let mut residency = root.residency.lock();
        for (entry_device, entry) in residency.iter_mut() {
            if *entry_device == device {
                entry.host_dirty = true;
                entry.device_dirty = false;
            } else {
                entry.host_dirty = false;
                entry.device_dirty = true;
            }
        }
    }

    /// Record that host storage now holds the newest copy of the root.
    pub fn mark_dirty_on_host<T: bytemuck::Pod>(&self, root: &RootArray<T>) {
        let mut residency = root.residency.lock();
        for entry in residency.values_mut() {
            entry.host_dirty = false;
            entry.device_dirty = true;
        }
    }

    /// Drop every cached buffer of the root, releasing device memory.
    pub fn invalidate<T: bytemuck::Pod>(&self, root: &RootArray<T>) {
        let mut residency = root.residency.lock();
        let released = residency.len();
        residency.clear();
        if released > 0 {
            tracing::debug!(root = %root.id(), released = released, "residency_invalidated");
        }
    }

    /// Read the newest device copy back into host storage, if any.
    ///
    /// No-op when no entry is host-dirty. At most one entry can be, so a
    /// single device-to-host transfer settles the root.
    pub fn sync_to_host<T: bytemuck::Pod>(&self, root: &mut RootArray<T>) -> Result<()> {
        let root_id = root.id();
        let (data, residency) = root.readback_parts();
        let Some(entry) = residency.values_mut().find(|entry| entry.host_dirty) else {
            return Ok(());
        };

        let start = std::time::Instant::now();
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(data);
        let len = bytes.len();
        entry
            .backend
            .read()
            .read_buffer(entry.handle, 0, bytes)
            .map_err(|err| reject(err, format!("readback of {root_id}")))?;
        entry.host_dirty = false;

        let duration_us = start.elapsed().as_micros() as u64;
        self.counters.d2h_transfers.fetch_add(1, Ordering::Relaxed);
        self.counters.d2h_bytes.fetch_add(len as u64, Ordering::Relaxed);
        tracing::debug!(
            root = %root_id,
            device = %entry.device,
            duration_us = duration_us,
            bytes = len,
            bandwidth_mbps = bandwidth_mbps(len, duration_us),
            direction = "D2H",
            "buffer_transfer"
        );
        Ok(())
    }
}

impl Default for Hdm {
    fn default() -> Self {
        Self::new()
    }
}

fn alloc_error(err: BackendError, device: Device, requested: usize) -> Error {
    let requested = match err {
        BackendError::OutOfDeviceMemory { requested } => requested,
        _ => requested,
    };
    Error::ResourceExhausted { device, requested }
}

pub(crate) fn reject(err: BackendError, context: String) -> Error {
    let status = match err {
        BackendError::Rejected(status) => status,
        _ => KernelStatus::InternalError,
    };
    Error::BackendRejected { status, context }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessella_backends::HostBackend;

    fn queue(device: Device) -> DeviceQueue {
        DeviceQueue::new(device, Box::new(HostBackend::new()))
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let hdm = Hdm::new();
        let queue = queue(Device::gpu(0));
        let root = RootArray::from_vec(vec![1.0f32; 16], &[16]).unwrap();

        let first = hdm.get_or_create(&root, &queue).unwrap();
        let second = hdm.get_or_create(&root, &queue).unwrap();
        assert_eq!(first, second);
        assert_eq!(hdm.stats().allocations, 1);
    }

    #[test]
    fn test_allocation_is_sized_to_the_root() {
        let hdm = Hdm::new();
        let queue = queue(Device::gpu(0));
        let root = RootArray::from_vec(vec![0.0f32; 25], &[5, 5]).unwrap();

        let handle = hdm.get_or_create(&root, &queue).unwrap();
        assert_eq!(queue.backend().read().buffer_size(handle).unwrap(), 100);
    }

    #[test]
    fn test_refresh_skips_write_only_access() {
        let hdm = Hdm::new();
        let queue = queue(Device::gpu(0));
        let root = RootArray::from_vec(vec![1.0f32; 8], &[8]).unwrap();
        hdm.get_or_create(&root, &queue).unwrap();

        hdm.refresh(&root, &queue, AccessMode::Write, "test").unwrap();
        assert_eq!(hdm.stats().h2d_transfers, 0);
        assert!(root.buffer_state(Device::gpu(0)).unwrap().device_dirty);

        hdm.refresh(&root, &queue, AccessMode::Read, "test").unwrap();
        assert_eq!(hdm.stats().h2d_transfers, 1);
        assert!(!root.buffer_state(Device::gpu(0)).unwrap().device_dirty);

        // Already fresh: no second transfer.
        hdm.refresh(&root, &queue, AccessMode::ReadWrite, "test").unwrap();
        assert_eq!(hdm.stats().h2d_transfers, 1);
    }

    #[test]
    fn test_write_marks_siblings_stale() {
        let hdm = Hdm::new();
        let gpu_queue = queue(Device::gpu(0));
        let cpu_queue = queue(Device::cpu(0));
        let root = RootArray::from_vec(vec![1.0f32; 8], &[8]).unwrap();
        hdm.get_or_create(&root, &gpu_queue).unwrap();
        hdm.get_or_create(&root, &cpu_queue).unwrap();
        hdm.refresh(&root, &cpu_queue, AccessMode::Read, "test").unwrap();

        hdm.mark_dirty_on_device(&root, Device::gpu(0));

        let gpu = root.buffer_state(Device::gpu(0)).unwrap();
        assert!(gpu.host_dirty);
        assert!(!gpu.device_dirty);
        let cpu = root.buffer_state(Device::cpu(0)).unwrap();
        assert!(!cpu.host_dirty);
        assert!(cpu.device_dirty);
    }

    #[test]
    fn test_host_mutation_marks_devices_stale() {
        let hdm = Hdm::new();
        let queue = queue(Device::gpu(0));
        let mut root = RootArray::from_vec(vec![1.0f32; 8], &[8]).unwrap();
        hdm.get_or_create(&root, &queue).unwrap();
        hdm.refresh(&root, &queue, AccessMode::Read, "test").unwrap();

        root.as_mut_slice()[0] = 7.0;
        assert!(root.buffer_state(Device::gpu(0)).unwrap().device_dirty);
    }

    #[test]
    fn test_sync_to_host_reads_back_the_dirty_entry() {
        let hdm = Hdm::new();
        let queue = queue(Device::gpu(0));
        let mut root = RootArray::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[4]).unwrap();
        let handle = hdm.get_or_create(&root, &queue).unwrap();

        // Simulate a kernel writing on the device.
        queue
            .backend()
            .write()
            .write_buffer(handle, 0, bytemuck::cast_slice(&[9.0f32, 8.0, 7.0, 6.0]))
            .unwrap();
        hdm.mark_dirty_on_device(&root, Device::gpu(0));

        hdm.sync_to_host(&mut root).unwrap();
        assert_eq!(root.as_slice(), &[9.0, 8.0, 7.0, 6.0]);
        assert!(!root.buffer_state(Device::gpu(0)).unwrap().host_dirty);
        assert_eq!(hdm.stats().d2h_transfers, 1);

        // Nothing dirty: readback is a no-op.
        hdm.sync_to_host(&mut root).unwrap();
        assert_eq!(hdm.stats().d2h_transfers, 1);
    }

    #[test]
    fn test_invalidate_releases_buffers() {
        let hdm = Hdm::new();
        let queue = queue(Device::gpu(0));
        let root = RootArray::from_vec(vec![1.0f32; 8], &[8]).unwrap();
        hdm.get_or_create(&root, &queue).unwrap();

        hdm.invalidate(&root);
        assert!(root.buffer_state(Device::gpu(0)).is_none());
        assert_eq!(
            queue
                .backend()
                .read()
                .buffer_size(BufferHandle::new(1))
                .err()
                .map(|e| e.to_string()),
            Some("invalid buffer handle: 1".to_string())
        );
    }

    #[test]
    fn test_drop_of_root_releases_buffers() {
        let hdm = Hdm::new();
        let queue = queue(Device::gpu(0));
        {
            let root = RootArray::from_vec(vec![1.0f32; 8], &[8]).unwrap();
            hdm.get_or_create(&root, &queue).unwrap();
        }
        // The entry dropped with the root and freed the allocation.
        assert!(queue.backend().read().buffer_size(BufferHandle::new(1)).is_err());
    }
}
