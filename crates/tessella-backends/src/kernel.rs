//! Kernel call descriptors
//!
//! A [`KernelCall`] is the flattened form every routine takes on its way
//! into a backend: the routine name, the ordered buffer operands (each an
//! opaque handle plus element offset and pitch), and the scalar tail
//! (counts, coefficients, flags). Backends interpret the operands and
//! scalars per routine; this module only defines the carrier types.

use crate::handle::BufferHandle;

/// Scalar parameter forwarded to a kernel routine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// Single-precision coefficient
    F32(f32),
    /// Double-precision coefficient
    F64(f64),
    /// Mode flag (transpose, triangle, side, ...)
    I32(i32),
    /// Element count or dimension
    Dim(usize),
}

impl Scalar {
    /// The value as a dimension, if it is one.
    pub fn dim(&self) -> Option<usize> {
        match self {
            Scalar::Dim(n) => Some(*n),
            _ => None,
        }
    }

    /// The value as an `f32` coefficient, if it is one.
    pub fn f32(&self) -> Option<f32> {
        match self {
            Scalar::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as an `f64` coefficient, if it is one.
    pub fn f64(&self) -> Option<f64> {
        match self {
            Scalar::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a mode flag, if it is one.
    pub fn flag(&self) -> Option<i32> {
        match self {
            Scalar::I32(v) => Some(*v),
            _ => None,
        }
    }
}

/// One buffer operand of a kernel call.
///
/// `offset` and `pitch` are in elements of the routine's precision.
/// For matrix operands `pitch` is the leading dimension (the physical row
/// pitch of the allocation, not of any window into it); for vector
/// operands it is the increment between consecutive elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelArg {
    /// Backend buffer holding the operand
    pub buffer: BufferHandle,
    /// Element offset of the operand's first element
    pub offset: usize,
    /// Leading dimension (matrices) or increment (vectors), in elements
    pub pitch: usize,
}

impl KernelArg {
    /// Create an operand descriptor.
    pub const fn new(buffer: BufferHandle, offset: usize, pitch: usize) -> Self {
        Self { buffer, offset, pitch }
    }
}

/// A fully-resolved routine invocation.
#[derive(Debug, Clone, Copy)]
pub struct KernelCall<'a> {
    /// Routine name, e.g. `"saxpy"` or `"dgemm"`
    pub routine: &'static str,
    /// Ordered buffer operands
    pub args: &'a [KernelArg],
    /// Scalar tail, interpreted per routine
    pub scalars: &'a [Scalar],
}
