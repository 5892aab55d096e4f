//! Dispatch frames and the buffer resolver
//!
//! A [`DispatchFrame`] binds one call's device, operands, and declared
//! access modes for the moment of resolution, then is discarded.
//! Resolution turns every slot into a concrete device buffer plus the
//! geometry the kernel needs, in three steps per slot:
//!
//! 1. A view whose root is already resident on the device aliases the
//!    root's buffer: same handle, window offset, root pitch.
//! 2. Anything else goes through [`Hdm::get_or_create`], allocating a
//!    buffer sized to the full root on first touch.
//! 3. The declared mode drives the transfer: reading slots refresh a
//!    stale buffer from host storage, write-only slots never do.
//!
//! After the kernel ran, [`DispatchFrame::finalize`] flips freshness for
//! every writing slot; read-only slots leave the flags untouched.

use crate::access::AccessMode;
use crate::array::{ArrayView, RootArray};
use crate::error::Result;
use crate::hdm::Hdm;
use std::ops::Range;
use tessella_backends::{BufferHandle, Device, DeviceQueue};

/// One array argument of a dispatched call: a root or a view.
pub enum Operand<'a, T> {
    /// A whole root array
    Root(&'a RootArray<T>),
    /// A rectangular window into a root
    View(&'a ArrayView<'a, T>),
}

impl<'a, T: bytemuck::Pod> Operand<'a, T> {
    /// The root array backing this operand.
    pub fn root(&self) -> &'a RootArray<T> {
        match self {
            Operand::Root(root) => root,
            Operand::View(view) => view.root(),
        }
    }

    /// Whether the operand is a window rather than a whole root.
    pub fn is_view(&self) -> bool {
        matches!(self, Operand::View(_))
    }

    /// Element offset of the operand's origin inside the root's storage.
    pub fn offset(&self) -> usize {
        match self {
            Operand::Root(_) => 0,
            Operand::View(view) => view.offset(),
        }
    }

    /// Extents of the window this operand covers.
    pub fn window_extents(&self) -> Vec<usize> {
        match self {
            Operand::Root(root) => root.extents().to_vec(),
            Operand::View(view) => view.extents(),
        }
    }

    /// Number of elements the operand covers.
    pub fn len(&self) -> usize {
        match self {
            Operand::Root(root) => root.len(),
            Operand::View(view) => view.len(),
        }
    }

    /// Whether the operand covers no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for Operand<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Operand<'_, T> {}

impl<'a, T> From<&'a RootArray<T>> for Operand<'a, T> {
    fn from(root: &'a RootArray<T>) -> Self {
        Operand::Root(root)
    }
}

impl<'a, T> From<&'a ArrayView<'a, T>> for Operand<'a, T> {
    fn from(view: &'a ArrayView<'a, T>) -> Self {
        Operand::View(view)
    }
}

/// One slot of a dispatch frame.
pub struct FrameSlot<'a, T> {
    /// The array argument
    pub operand: Operand<'a, T>,
    /// Declared access intent for this slot
    pub mode: AccessMode,
    /// Sub-range of the operand this call touches. `0..0` selects the
    /// whole operand; carried for range-restricted dispatch, not yet
    /// interpreted by the resolver.
    pub partition: Range<usize>,
}

/// Ephemeral binding of device, operands, and access modes for one call.
pub struct DispatchFrame<'a, T> {
    operation: &'static str,
    device: Device,
    slots: Vec<FrameSlot<'a, T>>,
}

/// Resolved geometry of one slot, positionally matching the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArg {
    /// Device buffer backing the slot's root
    pub handle: BufferHandle,
    /// Element offset of the operand's origin within the buffer
    pub offset: usize,
    /// The ROOT's row-major strides; a window embedded in the buffer must
    /// be addressed with the root's pitch, never its own extents
    pub strides: Vec<usize>,
    /// Extents of the operand's window
    pub extents: Vec<usize>,
}

/// Positional output of resolution, handed to the kernel wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFrame {
    /// One entry per frame slot, in slot order
    pub args: Vec<ResolvedArg>,
}

impl<'a, T: bytemuck::Pod> DispatchFrame<'a, T> {
    /// Create an empty frame for one operation on one device.
    pub fn new(operation: &'static str, device: Device) -> Self {
        Self {
            operation,
            device,
            slots: Vec::new(),
        }
    }

    /// The operation this frame dispatches.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// The device this frame dispatches to.
    pub fn device(&self) -> Device {
        self.device
    }

    /// The registered slots, in order.
    pub fn slots(&self) -> &[FrameSlot<'a, T>] {
        &self.slots
    }

    /// Register the next operand with its declared mode.
    pub fn push(&mut self, operand: impl Into<Operand<'a, T>>, mode: AccessMode) {
        self.push_partitioned(operand, mode, 0..0);
    }

    /// Register an operand restricted to a sub-range.
    ///
    /// The range is carried into the slot but not interpreted yet; `0..0`
    /// keeps the whole operand.
    pub fn push_partitioned(&mut self, operand: impl Into<Operand<'a, T>>, mode: AccessMode, partition: Range<usize>) {
        self.slots.push(FrameSlot {
            operand: operand.into(),
            mode,
            partition,
        });
    }

    /// Resolve every slot to a device buffer plus addressing geometry.
    pub(crate) fn resolve(&self, hdm: &Hdm, queue: &DeviceQueue) -> Result<ResolvedFrame> {
        let mut args = Vec::with_capacity(self.slots.len());
        for (slot_index, slot) in self.slots.iter().enumerate() {
            let root = slot.operand.root();
            let context = format!("{} slot {}", self.operation, slot_index);

            let handle = match hdm.get_existing(root, self.device) {
                // Resident: the slot aliases the existing allocation. For a
                // view this is the sub-buffer case; the window only moves
                // the origin.
                Some(handle) => {
                    tracing::trace!(
                        operation = self.operation,
                        slot = slot_index,
                        root = %root.id(),
                        handle = %handle,
                        aliased = slot.operand.is_view(),
                        "slot_resolved_resident"
                    );
                    handle
                }
                // First touch of (root, device): allocate sized to the
                // full root so later views can alias this buffer.
                None => hdm.get_or_create(root, queue)?,
            };

            hdm.refresh(root, queue, slot.mode, &context)?;

            args.push(ResolvedArg {
                handle,
                offset: slot.operand.offset(),
                strides: root.strides().to_vec(),
                extents: slot.operand.window_extents(),
            });
        }
        Ok(ResolvedFrame { args })
    }

    /// Flip freshness for every writing slot after the kernel ran.
    pub(crate) fn finalize(&self, hdm: &Hdm) {
        for slot in &self.slots {
            if slot.mode.writes() {
                hdm.mark_dirty_on_device(slot.operand.root(), self.device);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessella_backends::HostBackend;

    fn queue(device: Device) -> DeviceQueue {
        DeviceQueue::new(device, Box::new(HostBackend::new()))
    }

    #[test]
    fn test_operand_geometry() {
        let root = RootArray::from_vec((0..20).map(|v| v as f32).collect(), &[4, 5]).unwrap();
        let view = root.view(&[1..3, 2..5]).unwrap();

        let as_root = Operand::from(&root);
        assert!(!as_root.is_view());
        assert_eq!(as_root.offset(), 0);
        assert_eq!(as_root.window_extents(), vec![4, 5]);
        assert_eq!(as_root.len(), 20);

        let as_view = Operand::from(&view);
        assert!(as_view.is_view());
        assert_eq!(as_view.offset(), 7); // 1*5 + 2
        assert_eq!(as_view.window_extents(), vec![2, 3]);
        assert_eq!(as_view.len(), 6);
    }

    #[test]
    fn test_push_defaults_to_whole_operand() {
        let root: RootArray<f32> = RootArray::zeroed(&[8]);
        let mut frame = DispatchFrame::new("sscal", Device::cpu(0));
        frame.push(&root, AccessMode::ReadWrite);

        assert_eq!(frame.slots().len(), 1);
        assert_eq!(frame.slots()[0].partition, 0..0);
        assert_eq!(frame.operation(), "sscal");
        assert_eq!(frame.device(), Device::cpu(0));
    }

    #[test]
    fn test_resolve_allocates_then_aliases() {
        let hdm = Hdm::new();
        let queue = queue(Device::gpu(0));
        let root = RootArray::from_vec((0..25).map(|v| v as f32).collect(), &[5, 5]).unwrap();
        let view = root.view(&[2..4, 2..4]).unwrap();

        // First dispatch touches the root itself and allocates.
        let mut first = DispatchFrame::new("sgemv", Device::gpu(0));
        first.push(&root, AccessMode::Read);
        let resolved_root = first.resolve(&hdm, &queue).unwrap();

        // Second dispatch uses a view: same handle, window geometry.
        let mut second = DispatchFrame::new("sgemv", Device::gpu(0));
        second.push(&view, AccessMode::Read);
        let resolved_view = second.resolve(&hdm, &queue).unwrap();

        assert_eq!(resolved_root.args[0].handle, resolved_view.args[0].handle);
        assert_eq!(resolved_view.args[0].offset, 12);
        assert_eq!(resolved_view.args[0].strides, vec![5, 1]);
        assert_eq!(resolved_view.args[0].extents, vec![2, 2]);
        assert_eq!(hdm.stats().allocations, 1);
        assert_eq!(hdm.stats().h2d_transfers, 1);
    }

    #[test]
    fn test_resolve_skips_transfer_for_write_slots() {
        let hdm = Hdm::new();
        let queue = queue(Device::gpu(0));
        let root: RootArray<f32> = RootArray::zeroed(&[16]);

        let mut frame = DispatchFrame::new("scopy", Device::gpu(0));
        frame.push(&root, AccessMode::Write);
        frame.resolve(&hdm, &queue).unwrap();

        assert_eq!(hdm.stats().allocations, 1);
        assert_eq!(hdm.stats().h2d_transfers, 0);
    }

    #[test]
    fn test_finalize_flips_writing_slots_only() {
        let hdm = Hdm::new();
        let queue = queue(Device::gpu(0));
        let x: RootArray<f32> = RootArray::zeroed(&[8]);
        let y: RootArray<f32> = RootArray::zeroed(&[8]);

        let mut frame = DispatchFrame::new("saxpy", Device::gpu(0));
        frame.push(&x, AccessMode::Read);
        frame.push(&y, AccessMode::ReadWrite);
        frame.resolve(&hdm, &queue).unwrap();
        frame.finalize(&hdm);

        let x_state = x.buffer_state(Device::gpu(0)).unwrap();
        assert!(!x_state.host_dirty);
        let y_state = y.buffer_state(Device::gpu(0)).unwrap();
        assert!(y_state.host_dirty);
        assert!(!y_state.device_dirty);
    }
}
