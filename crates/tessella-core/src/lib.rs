//! # tessella-core - Host arrays bound to device kernel libraries
//!
//! tessella-core binds an N-dimensional host array model to dense
//! linear-algebra backends running on heterogeneous devices. The crate's
//! center is not the arithmetic (backends own that) but the buffer
//! resolution every dispatched call goes through: which device buffer
//! backs each operand, whether that buffer is freshly allocated, reused,
//! or an aliased sub-region of a parent array's allocation, and what
//! host/device data movement the operand's declared access intent
//! requires.
//!
//! ## Architecture
//!
//! ```text
//! routine wrappers (routines::blas1/2/3)
//!   v consult
//! access table (per-operation READ/WRITE/READ_WRITE slots)
//!   v build
//! dispatch frame -> buffer resolver (alias / allocate / transfer)
//!   v hand handles to
//! backend queue (tessella-backends, one queue per device)
//! ```
//!
//! ## Coherence Model
//!
//! Each root array owns at most one device buffer per device, sized to
//! the full root so views alias it. Two flags per buffer track which
//! side holds the newest copy; write-declared slots flip them after the
//! kernel runs, and `Runtime::sync_to_host` moves results back when the
//! host actually needs them. Write-only slots never pay for a
//! host-to-device transfer.
//!
//! ## Example
//!
//! ```text
//! use tessella_backends::{Device, HostBackend};
//! use tessella_core::{routines, RootArray, Runtime};
//!
//! let rt = Runtime::new();
//! rt.setup(routines::catalog())?;
//! rt.register_device(Device::cpu(0), Box::new(HostBackend::new()));
//!
//! let a = RootArray::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2])?;
//! let b = RootArray::from_vec(vec![5.0f32, 6.0, 7.0, 8.0], &[2, 2])?;
//! let mut c = RootArray::zeroed(&[2, 2]);
//!
//! routines::blas3::gemm(&rt, Device::cpu(0), 1.0f32, &a, &b, 0.0f32, &c)?;
//! rt.sync_to_host(&mut c)?;
//! ```

pub mod access;
pub mod array;
pub mod dispatch;
pub mod error;
pub mod hdm;
pub mod routines;
pub mod runtime;

pub use access::{AccessMode, AccessTable, AccessTableBuilder};
pub use array::{ArrayView, RootArray, RootId};
pub use dispatch::{DispatchFrame, FrameSlot, Operand, ResolvedArg, ResolvedFrame};
pub use error::{Error, Result};
pub use hdm::{BufferState, DeviceBuffer, Hdm, TransferSnapshot};
pub use routines::Element;
pub use runtime::Runtime;
