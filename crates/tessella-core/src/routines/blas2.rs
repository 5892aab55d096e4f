//! Matrix-vector routines

use super::{expect_len, matrix_shape, vector_shape, Element};
use crate::dispatch::Operand;
use crate::error::Result;
use crate::runtime::Runtime;
use tessella_backends::{Device, KernelArg, KernelCall, Scalar};

/// General matrix-vector multiply: y = alpha * A * x + beta * y
///
/// A is an m x n matrix operand (root or window), x an n-element vector,
/// y an m-element vector.
#[tracing::instrument(skip(rt, alpha, a, x, beta, y), fields(device = %device))]
pub fn gemv<'a, T: Element>(
    rt: &Runtime,
    device: Device,
    alpha: T,
    a: impl Into<Operand<'a, T>>,
    x: impl Into<Operand<'a, T>>,
    beta: T,
    y: impl Into<Operand<'a, T>>,
) -> Result<()> {
    let a = a.into();
    let x = x.into();
    let y = y.into();
    let (m, n, lda) = matrix_shape(&a)?;
    let (xn, incx) = vector_shape(&x)?;
    expect_len(n, xn)?;
    let (ym, incy) = vector_shape(&y)?;
    expect_len(m, ym)?;

    let args = [a, x, y];
    let frame = rt.dispatch(T::GEMV, device, &args)?;
    let kargs = [
        KernelArg::new(frame.args[0].handle, frame.args[0].offset, lda),
        KernelArg::new(frame.args[1].handle, frame.args[1].offset, incx),
        KernelArg::new(frame.args[2].handle, frame.args[2].offset, incy),
    ];
    let scalars = [Scalar::Dim(m), Scalar::Dim(n), alpha.scalar(), beta.scalar()];
    rt.enqueue(
        device,
        &KernelCall {
            routine: T::GEMV,
            args: &kargs,
            scalars: &scalars,
        },
        T::GEMV,
    )?;
    rt.finalize(T::GEMV, device, &args)
}
