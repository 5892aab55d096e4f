//! Dense linear-algebra routine wrappers
//!
//! Thin forwarders over the runtime's dispatch/enqueue/finalize cycle,
//! one per routine and precision. Every wrapper does the same four
//! things: derive operand geometry from the arrays, resolve buffers
//! through the runtime, forward the flattened kernel call, and flip
//! freshness flags.
//!
//! ## Modules
//!
//! - `blas1` - vector routines (copy, swap, scal, axpy)
//! - `blas2` - matrix-vector routines (gemv)
//! - `blas3` - matrix-matrix routines (gemm)
//!
//! [`catalog`] builds the access table declaring every routine's slot
//! modes for both precisions; pass it to the runtime's setup call.

pub mod blas1;
pub mod blas2;
pub mod blas3;

use crate::access::{AccessMode, AccessTable, AccessTableBuilder};
use crate::dispatch::Operand;
use crate::error::{Error, Result};
use tessella_backends::Scalar;

/// Element precision dispatched by the routine wrappers.
///
/// Associates each precision with the routine names the backend knows
/// it by, and injects coefficients into kernel scalars.
pub trait Element: bytemuck::Pod {
    const COPY: &'static str;
    const SWAP: &'static str;
    const SCAL: &'static str;
    const AXPY: &'static str;
    const GEMV: &'static str;
    const GEMM: &'static str;

    /// Wrap a coefficient of this precision as a kernel scalar.
    fn scalar(self) -> Scalar;
}

impl Element for f32 {
    const COPY: &'static str = "scopy";
    const SWAP: &'static str = "sswap";
    const SCAL: &'static str = "sscal";
    const AXPY: &'static str = "saxpy";
    const GEMV: &'static str = "sgemv";
    const GEMM: &'static str = "sgemm";

    fn scalar(self) -> Scalar {
        Scalar::F32(self)
    }
}

impl Element for f64 {
    const COPY: &'static str = "dcopy";
    const SWAP: &'static str = "dswap";
    const SCAL: &'static str = "dscal";
    const AXPY: &'static str = "daxpy";
    const GEMV: &'static str = "dgemv";
    const GEMM: &'static str = "dgemm";

    fn scalar(self) -> Scalar {
        Scalar::F64(self)
    }
}

fn declare<T: Element>(builder: AccessTableBuilder) -> AccessTableBuilder {
    use AccessMode::*;
    builder
        .operation(T::COPY, &[Read, Write])
        .operation(T::SWAP, &[ReadWrite, ReadWrite])
        .operation(T::SCAL, &[ReadWrite])
        .operation(T::AXPY, &[Read, ReadWrite])
        .operation(T::GEMV, &[Read, Read, ReadWrite])
        .operation(T::GEMM, &[Read, Read, ReadWrite])
}

/// Access declarations for the whole routine catalog, both precisions.
pub fn catalog() -> AccessTable {
    declare::<f64>(declare::<f32>(AccessTable::builder())).build()
}

/// Vector geometry of an operand: element count and increment.
///
/// Accepts rank-1 operands and single-row or single-column windows; the
/// increment is the root stride of the traversed dimension, so a column
/// of a matrix walks with the matrix's row pitch.
pub(crate) fn vector_shape<T: bytemuck::Pod>(operand: &Operand<'_, T>) -> Result<(usize, usize)> {
    let extents = operand.window_extents();
    let strides = operand.root().strides();
    match extents.as_slice() {
        [n] => Ok((*n, strides[0])),
        [n, 1] => Ok((*n, strides[0])),
        [1, n] => Ok((*n, strides[1])),
        _ => Err(Error::InvalidView(format!(
            "operand with extents {extents:?} is not usable as a vector"
        ))),
    }
}

/// Matrix geometry of an operand: rows, columns, and leading dimension.
///
/// The leading dimension is always the ROOT's row stride; a sub-matrix
/// window keeps the pitch of the allocation it is embedded in.
pub(crate) fn matrix_shape<T: bytemuck::Pod>(operand: &Operand<'_, T>) -> Result<(usize, usize, usize)> {
    let extents = operand.window_extents();
    match extents.as_slice() {
        [rows, cols] => Ok((*rows, *cols, operand.root().strides()[0])),
        _ => Err(Error::InvalidView(format!(
            "operand with extents {extents:?} is not a matrix"
        ))),
    }
}

pub(crate) fn expect_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::ShapeMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::RootArray;
    use AccessMode::*;

    #[test]
    fn test_catalog_declares_both_precisions() {
        let table = catalog();
        assert_eq!(table.len(), 12);
        assert_eq!(table.modes("sswap"), Some([ReadWrite, ReadWrite].as_slice()));
        assert_eq!(table.modes("daxpy"), Some([Read, ReadWrite].as_slice()));
        assert_eq!(table.modes("sgemm"), Some([Read, Read, ReadWrite].as_slice()));
        assert_eq!(table.modes("dcopy"), Some([Read, Write].as_slice()));
    }

    #[test]
    fn test_vector_shape_of_rank_one_root() {
        let x: RootArray<f32> = RootArray::zeroed(&[6]);
        let (n, inc) = vector_shape(&Operand::from(&x)).unwrap();
        assert_eq!((n, inc), (6, 1));
    }

    #[test]
    fn test_vector_shape_of_matrix_column() {
        let a: RootArray<f32> = RootArray::zeroed(&[4, 7]);
        let col = a.view(&[0..4, 2..3]).unwrap();
        let (n, inc) = vector_shape(&Operand::from(&col)).unwrap();
        // Walking a column steps by the root's row pitch.
        assert_eq!((n, inc), (4, 7));
    }

    #[test]
    fn test_vector_shape_of_matrix_row() {
        let a: RootArray<f32> = RootArray::zeroed(&[4, 7]);
        let row = a.view(&[1..2, 0..7]).unwrap();
        let (n, inc) = vector_shape(&Operand::from(&row)).unwrap();
        assert_eq!((n, inc), (7, 1));
    }

    #[test]
    fn test_vector_shape_rejects_blocks() {
        let a: RootArray<f32> = RootArray::zeroed(&[4, 7]);
        let block = a.view(&[0..2, 0..2]).unwrap();
        assert!(matches!(
            vector_shape(&Operand::from(&block)),
            Err(Error::InvalidView(_))
        ));
    }

    #[test]
    fn test_matrix_shape_keeps_root_pitch() {
        let a: RootArray<f32> = RootArray::zeroed(&[5, 5]);
        let block = a.view(&[2..4, 2..4]).unwrap();
        let (rows, cols, lda) = matrix_shape(&Operand::from(&block)).unwrap();
        assert_eq!((rows, cols, lda), (2, 2, 5));
    }
}
