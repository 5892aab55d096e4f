//! Vector routines

use super::{expect_len, vector_shape, Element};
use crate::dispatch::Operand;
use crate::error::Result;
use crate::runtime::Runtime;
use tessella_backends::{Device, KernelArg, KernelCall, Scalar};

/// Copy a vector: y = x
#[tracing::instrument(skip(rt, x, y), fields(device = %device))]
pub fn copy<'a, T: Element>(
    rt: &Runtime,
    device: Device,
    x: impl Into<Operand<'a, T>>,
    y: impl Into<Operand<'a, T>>,
) -> Result<()> {
    let x = x.into();
    let y = y.into();
    let (n, incx) = vector_shape(&x)?;
    let (ny, incy) = vector_shape(&y)?;
    expect_len(n, ny)?;

    let args = [x, y];
    let frame = rt.dispatch(T::COPY, device, &args)?;
    let kargs = [
        KernelArg::new(frame.args[0].handle, frame.args[0].offset, incx),
        KernelArg::new(frame.args[1].handle, frame.args[1].offset, incy),
    ];
    let scalars = [Scalar::Dim(n)];
    rt.enqueue(
        device,
        &KernelCall {
            routine: T::COPY,
            args: &kargs,
            scalars: &scalars,
        },
        T::COPY,
    )?;
    rt.finalize(T::COPY, device, &args)
}

/// Exchange two vectors in place: x <-> y
#[tracing::instrument(skip(rt, x, y), fields(device = %device))]
pub fn swap<'a, T: Element>(
    rt: &Runtime,
    device: Device,
    x: impl Into<Operand<'a, T>>,
    y: impl Into<Operand<'a, T>>,
) -> Result<()> {
    let x = x.into();
    let y = y.into();
    let (n, incx) = vector_shape(&x)?;
    let (ny, incy) = vector_shape(&y)?;
    expect_len(n, ny)?;

    let args = [x, y];
    let frame = rt.dispatch(T::SWAP, device, &args)?;
    let kargs = [
        KernelArg::new(frame.args[0].handle, frame.args[0].offset, incx),
        KernelArg::new(frame.args[1].handle, frame.args[1].offset, incy),
    ];
    let scalars = [Scalar::Dim(n)];
    rt.enqueue(
        device,
        &KernelCall {
            routine: T::SWAP,
            args: &kargs,
            scalars: &scalars,
        },
        T::SWAP,
    )?;
    rt.finalize(T::SWAP, device, &args)
}

/// Scale a vector in place: x = alpha * x
#[tracing::instrument(skip(rt, alpha, x), fields(device = %device))]
pub fn scal<'a, T: Element>(rt: &Runtime, device: Device, alpha: T, x: impl Into<Operand<'a, T>>) -> Result<()> {
    let x = x.into();
    let (n, incx) = vector_shape(&x)?;

    let args = [x];
    let frame = rt.dispatch(T::SCAL, device, &args)?;
    let kargs = [KernelArg::new(frame.args[0].handle, frame.args[0].offset, incx)];
    let scalars = [Scalar::Dim(n), alpha.scalar()];
    rt.enqueue(
        device,
        &KernelCall {
            routine: T::SCAL,
            args: &kargs,
            scalars: &scalars,
        },
        T::SCAL,
    )?;
    rt.finalize(T::SCAL, device, &args)
}

/// Scaled vector accumulation: y = alpha * x + y
#[tracing::instrument(skip(rt, alpha, x, y), fields(device = %device))]
pub fn axpy<'a, T: Element>(
    rt: &Runtime,
    device: Device,
    alpha: T,
    x: impl Into<Operand<'a, T>>,
    y: impl Into<Operand<'a, T>>,
) -> Result<()> {
    let x = x.into();
    let y = y.into();
    let (n, incx) = vector_shape(&x)?;
    let (ny, incy) = vector_shape(&y)?;
    expect_len(n, ny)?;

    let args = [x, y];
    let frame = rt.dispatch(T::AXPY, device, &args)?;
    let kargs = [
        KernelArg::new(frame.args[0].handle, frame.args[0].offset, incx),
        KernelArg::new(frame.args[1].handle, frame.args[1].offset, incy),
    ];
    let scalars = [Scalar::Dim(n), alpha.scalar()];
    rt.enqueue(
        device,
        &KernelCall {
            routine: T::AXPY,
            args: &kargs,
            scalars: &scalars,
        },
        T::AXPY,
    )?;
    rt.finalize(T::AXPY, device, &args)
}
