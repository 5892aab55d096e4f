//! # tessella-backends - Device contract and reference backend
//!
//! This crate defines everything the array and resolution layers need to
//! know about a compute backend, and nothing more:
//!
//! - [`Device`] / [`DeviceKind`] - comparable device identity keys
//! - [`BufferHandle`] - opaque handles to device allocations
//! - [`Backend`] - the kernel-library contract: buffer management plus
//!   [`Backend::enqueue_kernel`]
//! - [`KernelCall`] / [`KernelArg`] / [`Scalar`] - the flattened routine
//!   invocation a backend consumes
//! - [`KernelStatus`] - the fixed status taxonomy routines report
//! - [`DeviceQueue`] - one lock-guarded backend per device; submission
//!   order is execution order
//! - [`HostBackend`] - an in-process reference implementation used for
//!   tests and as the CPU fallback
//!
//! Real device backends (OpenCL, CUDA, ...) implement [`Backend`] and
//! slot in behind a [`DeviceQueue`] without the layers above changing.

pub mod backend;
pub mod device;
pub mod error;
pub mod handle;
pub mod host;
pub mod kernel;
pub mod status;

pub use backend::{Backend, DeviceQueue, SharedBackend};
pub use device::{Device, DeviceKind};
pub use error::{BackendError, Result};
pub use handle::BufferHandle;
pub use host::HostBackend;
pub use kernel::{KernelArg, KernelCall, Scalar};
pub use status::KernelStatus;
