//! Host array model: owning roots and rectangular views
//!
//! A [`RootArray`] owns contiguous row-major host storage plus the
//! per-device buffer residency for that storage. An [`ArrayView`] is a
//! non-owning rectangular window into a root; views never own device
//! memory and always address through their root's geometry.
//!
//! # Memory Layout
//!
//! Storage is row-major (C-contiguous). For extents `[d0, d1, ..., dk]`
//! the stride of dimension `i` is the product of the extents after it,
//! so element `(i0, i1, ...)` lives at `Σ i_n * stride[n]`.
//!
//! # Examples
//!
//! ```text
//! use tessella_core::RootArray;
//!
//! let a = RootArray::from_vec((0..25).map(|v| v as f32).collect(), &[5, 5])?;
//! let block = a.view(&[0..2, 0..2])?;   // top-left 2x2 window
//! assert_eq!(block.offset(), 0);
//! assert_eq!(block.extents(), vec![2, 2]);
//! ```

use crate::error::{Error, Result};
use crate::hdm::{BufferState, DeviceBuffer};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use tessella_backends::Device;

static NEXT_ROOT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a root array.
///
/// The id, not the address, keys device-buffer residency, so it stays
/// meaningful in logs after the root is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootId(u64);

impl RootId {
    fn next() -> Self {
        RootId(NEXT_ROOT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value, for logging.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root{}", self.0)
    }
}

fn row_major_strides(extents: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; extents.len()];
    for i in (0..extents.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * extents[i + 1];
    }
    strides
}

fn check_ranges(extents: &[usize], ranges: &[Range<usize>]) -> Result<()> {
    if ranges.len() != extents.len() {
        return Err(Error::InvalidView(format!(
            "rank mismatch: {} ranges for rank-{} array",
            ranges.len(),
            extents.len()
        )));
    }
    for (dim, (range, &extent)) in ranges.iter().zip(extents).enumerate() {
        if range.start > range.end || range.end > extent {
            return Err(Error::InvalidView(format!(
                "range {}..{} exceeds extent {} in dimension {}",
                range.start, range.end, extent, dim
            )));
        }
    }
    Ok(())
}

/// N-dimensional array owning its host storage
///
/// The root also owns its device-buffer residency: a lazily-populated map
/// from [`Device`] to the one buffer mirroring this root there. Dropping
/// the root drops the entries, which releases the device allocations.
pub struct RootArray<T> {
    id: RootId,
    extents: Vec<usize>,
    strides: Vec<usize>,
    data: Vec<T>,
    pub(crate) residency: Mutex<HashMap<Device, DeviceBuffer>>,
}

impl<T: bytemuck::Pod> RootArray<T> {
    /// Create a root array from existing host data.
    ///
    /// The data length must equal the product of the extents.
    pub fn from_vec(data: Vec<T>, extents: &[usize]) -> Result<Self> {
        let expected: usize = extents.iter().product();
        if data.len() != expected {
            return Err(Error::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            id: RootId::next(),
            extents: extents.to_vec(),
            strides: row_major_strides(extents),
            data,
            residency: Mutex::new(HashMap::new()),
        })
    }

    /// Create a zero-initialized root array.
    pub fn zeroed(extents: &[usize]) -> Self {
        let len = extents.iter().product();
        Self {
            id: RootId::next(),
            extents: extents.to_vec(),
            strides: row_major_strides(extents),
            data: vec![T::zeroed(); len],
            residency: Mutex::new(HashMap::new()),
        }
    }

    /// Process-unique root identity.
    pub fn id(&self) -> RootId {
        self.id
    }

    /// Extents per dimension.
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Row-major strides per dimension, in elements.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Total host storage size in bytes.
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of_val(self.data.as_slice())
    }

    /// Read-only host storage.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable host storage.
    ///
    /// Mutating the host copy outside a dispatched call makes every cached
    /// device buffer stale, so this marks all residency entries
    /// device-dirty before handing out the slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let mut residency = self.residency.lock();
        for entry in residency.values_mut() {
            entry.host_dirty = false;
            entry.device_dirty = true;
        }
        drop(residency);
        &mut self.data
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Host storage and residency, mutably and at once, for readback.
    pub(crate) fn readback_parts(&mut self) -> (&mut [T], &mut HashMap<Device, DeviceBuffer>) {
        (&mut self.data, self.residency.get_mut())
    }

    /// Freshness flags of this root's buffer on `device`, if resident.
    pub fn buffer_state(&self, device: Device) -> Option<BufferState> {
        self.residency.lock().get(&device).map(DeviceBuffer::state)
    }

    /// Rectangular window into this root.
    pub fn view(&self, ranges: &[Range<usize>]) -> Result<ArrayView<'_, T>> {
        check_ranges(&self.extents, ranges)?;
        Ok(ArrayView {
            root: self,
            ranges: ranges.to_vec(),
        })
    }
}

impl<T: bytemuck::Pod> fmt::Debug for RootArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootArray")
            .field("id", &self.id)
            .field("extents", &self.extents)
            .finish()
    }
}

/// Non-owning rectangular window into a [`RootArray`]
///
/// A view carries its root and one half-open range per dimension.
/// Overlapping views over the same root are permitted; nothing here
/// checks for aliasing, matching the backend's own behavior.
#[derive(Clone)]
pub struct ArrayView<'a, T> {
    root: &'a RootArray<T>,
    ranges: Vec<Range<usize>>,
}

impl<'a, T: bytemuck::Pod> ArrayView<'a, T> {
    /// The root array this view windows into.
    pub fn root(&self) -> &'a RootArray<T> {
        self.root
    }

    /// Half-open ranges per dimension, in root coordinates.
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Window extents per dimension.
    pub fn extents(&self) -> Vec<usize> {
        self.ranges.iter().map(|range| range.end - range.start).collect()
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.ranges.len()
    }

    /// Number of elements in the window.
    pub fn len(&self) -> usize {
        self.ranges.iter().map(|range| range.end - range.start).product()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.ranges.iter().any(|r| r.is_empty())
    }

    /// Element offset of the window origin inside the root's storage.
    ///
    /// Computed from the root's strides: a window embedded in a root must
    /// be addressed with the root's pitch, not its own extents.
    pub fn offset(&self) -> usize {
        self.ranges
            .iter()
            .zip(self.root.strides())
            .map(|(range, stride)| range.start * stride)
            .sum()
    }

    /// Sub-window of this view, in view-relative coordinates.
    ///
    /// The result still references the root directly; nesting views does
    /// not build a chain.
    pub fn view(&self, ranges: &[Range<usize>]) -> Result<ArrayView<'a, T>> {
        let extents = self.extents();
        check_ranges(&extents, ranges)?;
        let composed: Vec<Range<usize>> = self
            .ranges
            .iter()
            .zip(ranges)
            .map(|(outer, inner)| (outer.start + inner.start)..(outer.start + inner.end))
            .collect();
        Ok(ArrayView {
            root: self.root,
            ranges: composed,
        })
    }
}

impl<T: bytemuck::Pod> fmt::Debug for ArrayView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayView")
            .field("root", &self.root.id())
            .field("ranges", &self.ranges)
            .finish()
    }
}
