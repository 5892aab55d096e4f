//! Matrix-matrix routines

use super::{expect_len, matrix_shape, Element};
use crate::dispatch::Operand;
use crate::error::Result;
use crate::runtime::Runtime;
use tessella_backends::{Device, KernelArg, KernelCall, Scalar};

/// General matrix multiply: C = alpha * A * B + beta * C
///
/// A is m x k, B is k x n, C is m x n. Any operand may be a window into
/// a larger root; each one is addressed with its own root's pitch.
#[tracing::instrument(skip(rt, alpha, a, b, beta, c), fields(device = %device))]
pub fn gemm<'a, T: Element>(
    rt: &Runtime,
    device: Device,
    alpha: T,
    a: impl Into<Operand<'a, T>>,
    b: impl Into<Operand<'a, T>>,
    beta: T,
    c: impl Into<Operand<'a, T>>,
) -> Result<()> {
    let a = a.into();
    let b = b.into();
    let c = c.into();
    let (m, k, lda) = matrix_shape(&a)?;
    let (kb, n, ldb) = matrix_shape(&b)?;
    expect_len(k, kb)?;
    let (mc, nc, ldc) = matrix_shape(&c)?;
    expect_len(m, mc)?;
    expect_len(n, nc)?;

    let args = [a, b, c];
    let frame = rt.dispatch(T::GEMM, device, &args)?;
    let kargs = [
        KernelArg::new(frame.args[0].handle, frame.args[0].offset, lda),
        KernelArg::new(frame.args[1].handle, frame.args[1].offset, ldb),
        KernelArg::new(frame.args[2].handle, frame.args[2].offset, ldc),
    ];
    let scalars = [
        Scalar::Dim(m),
        Scalar::Dim(n),
        Scalar::Dim(k),
        alpha.scalar(),
        beta.scalar(),
    ];
    rt.enqueue(
        device,
        &KernelCall {
            routine: T::GEMM,
            args: &kargs,
            scalars: &scalars,
        },
        T::GEMM,
    )?;
    rt.finalize(T::GEMM, device, &args)
}
