//! Host reference backend
//!
//! `HostBackend` keeps every buffer in heap memory and executes the
//! routine catalog with plain loops. It exists so the resolution and
//! coherence layers above it can run end-to-end without a device, and it
//! reports the same status taxonomy a device backend would.
//!
//! Operand addressing honors the pitch convention of [`crate::KernelArg`]:
//! matrices are row-major blocks addressed `offset + row * pitch + col`,
//! vectors are strided sequences addressed `offset + i * pitch`. Kernels
//! load operands out, compute, and store results back, so a rejected call
//! never leaves a buffer half-written.

use crate::backend::Backend;
use crate::error::{BackendError, Result};
use crate::handle::BufferHandle;
use crate::kernel::{KernelArg, KernelCall, Scalar};
use crate::status::KernelStatus;
use std::collections::HashMap;

/// Element types the host kernels can execute.
trait HostElem: bytemuck::Pod + std::ops::Add<Output = Self> + std::ops::Mul<Output = Self> {
    const ZERO: Self;

    /// Pull a coefficient of this precision out of a scalar argument.
    fn coeff(scalar: &Scalar) -> Option<Self>;
}

impl HostElem for f32 {
    const ZERO: Self = 0.0;

    fn coeff(scalar: &Scalar) -> Option<Self> {
        scalar.f32()
    }
}

impl HostElem for f64 {
    const ZERO: Self = 0.0;

    fn coeff(scalar: &Scalar) -> Option<Self> {
        scalar.f64()
    }
}

/// In-process backend backed by heap buffers
pub struct HostBackend {
    buffers: HashMap<u64, Vec<u8>>,
    next_id: u64,
}

impl HostBackend {
    /// Create an empty host backend.
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Number of live buffers, for allocation accounting in tests.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    fn typed<T: HostElem>(&self, arg: &KernelArg, slot: usize) -> std::result::Result<&[T], KernelStatus> {
        let bytes = self
            .buffers
            .get(&arg.buffer.id())
            .ok_or(KernelStatus::InvalidOperand { slot })?;
        bytemuck::try_cast_slice(bytes).map_err(|_| KernelStatus::InvalidOperand { slot })
    }

    fn load_vector<T: HostElem>(
        &self,
        arg: &KernelArg,
        n: usize,
        slot: usize,
    ) -> std::result::Result<Vec<T>, KernelStatus> {
        if n == 0 {
            return Ok(Vec::new());
        }
        if n > 1 && arg.pitch == 0 {
            return Err(KernelStatus::InvalidIncrement { slot });
        }
        let elems = self.typed::<T>(arg, slot)?;
        let required = arg.offset + (n - 1) * arg.pitch + 1;
        if required > elems.len() {
            return Err(KernelStatus::InsufficientBuffer { slot });
        }
        Ok((0..n).map(|i| elems[arg.offset + i * arg.pitch]).collect())
    }

    fn store_vector<T: HostElem>(
        &mut self,
        arg: &KernelArg,
        slot: usize,
        values: &[T],
    ) -> std::result::Result<(), KernelStatus> {
        let n = values.len();
        if n == 0 {
            return Ok(());
        }
        if n > 1 && arg.pitch == 0 {
            return Err(KernelStatus::InvalidIncrement { slot });
        }
        let bytes = self
            .buffers
            .get_mut(&arg.buffer.id())
            .ok_or(KernelStatus::InvalidOperand { slot })?;
        let elems: &mut [T] = bytemuck::try_cast_slice_mut(bytes).map_err(|_| KernelStatus::InvalidOperand { slot })?;
        let required = arg.offset + (n - 1) * arg.pitch + 1;
        if required > elems.len() {
            return Err(KernelStatus::InsufficientBuffer { slot });
        }
        for (i, value) in values.iter().enumerate() {
            elems[arg.offset + i * arg.pitch] = *value;
        }
        Ok(())
    }

    fn load_matrix<T: HostElem>(
        &self,
        arg: &KernelArg,
        rows: usize,
        cols: usize,
        slot: usize,
    ) -> std::result::Result<Vec<T>, KernelStatus> {
        if rows == 0 || cols == 0 {
            return Ok(Vec::new());
        }
        if rows > 1 && arg.pitch < cols {
            return Err(KernelStatus::InvalidLeadingDimension { slot });
        }
        let elems = self.typed::<T>(arg, slot)?;
        let required = arg.offset + (rows - 1) * arg.pitch + cols;
        if required > elems.len() {
            return Err(KernelStatus::InsufficientBuffer { slot });
        }
        let mut block = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            let start = arg.offset + row * arg.pitch;
            block.extend_from_slice(&elems[start..start + cols]);
        }
        Ok(block)
    }

    fn store_matrix<T: HostElem>(
        &mut self,
        arg: &KernelArg,
        rows: usize,
        cols: usize,
        slot: usize,
        block: &[T],
    ) -> std::result::Result<(), KernelStatus> {
        if rows == 0 || cols == 0 {
            return Ok(());
        }
        if rows > 1 && arg.pitch < cols {
            return Err(KernelStatus::InvalidLeadingDimension { slot });
        }
        let bytes = self
            .buffers
            .get_mut(&arg.buffer.id())
            .ok_or(KernelStatus::InvalidOperand { slot })?;
        let elems: &mut [T] = bytemuck::try_cast_slice_mut(bytes).map_err(|_| KernelStatus::InvalidOperand { slot })?;
        let required = arg.offset + (rows - 1) * arg.pitch + cols;
        if required > elems.len() {
            return Err(KernelStatus::InsufficientBuffer { slot });
        }
        for row in 0..rows {
            let start = arg.offset + row * arg.pitch;
            elems[start..start + cols].copy_from_slice(&block[row * cols..(row + 1) * cols]);
        }
        Ok(())
    }

    // ============================================================================================
    // Routine kernels
    // ============================================================================================

    fn copy_kernel<T: HostElem>(&mut self, call: &KernelCall<'_>) -> std::result::Result<(), KernelStatus> {
        let [x, y] = expect_args(call)?;
        let n = dim_at(call.scalars, 0)?;
        let src = self.load_vector::<T>(&x, n, 0)?;
        self.store_vector::<T>(&y, 1, &src)
    }

    fn swap_kernel<T: HostElem>(&mut self, call: &KernelCall<'_>) -> std::result::Result<(), KernelStatus> {
        let [x, y] = expect_args(call)?;
        let n = dim_at(call.scalars, 0)?;
        let xs = self.load_vector::<T>(&x, n, 0)?;
        let ys = self.load_vector::<T>(&y, n, 1)?;
        self.store_vector::<T>(&x, 0, &ys)?;
        self.store_vector::<T>(&y, 1, &xs)
    }

    fn scal_kernel<T: HostElem>(&mut self, call: &KernelCall<'_>) -> std::result::Result<(), KernelStatus> {
        let [x] = expect_args(call)?;
        let n = dim_at(call.scalars, 0)?;
        let alpha = coeff_at::<T>(call.scalars, 1)?;
        let mut xs = self.load_vector::<T>(&x, n, 0)?;
        for value in &mut xs {
            *value = alpha * *value;
        }
        self.store_vector::<T>(&x, 0, &xs)
    }

    fn axpy_kernel<T: HostElem>(&mut self, call: &KernelCall<'_>) -> std::result::Result<(), KernelStatus> {
        let [x, y] = expect_args(call)?;
        let n = dim_at(call.scalars, 0)?;
        let alpha = coeff_at::<T>(call.scalars, 1)?;
        let xs = self.load_vector::<T>(&x, n, 0)?;
        let mut ys = self.load_vector::<T>(&y, n, 1)?;
        for (y_i, x_i) in ys.iter_mut().zip(&xs) {
            *y_i = *y_i + alpha * *x_i;
        }
        self.store_vector::<T>(&y, 1, &ys)
    }

    fn gemv_kernel<T: HostElem>(&mut self, call: &KernelCall<'_>) -> std::result::Result<(), KernelStatus> {
        let [a, x, y] = expect_args(call)?;
        let m = dim_at(call.scalars, 0)?;
        let n = dim_at(call.scalars, 1)?;
        let alpha = coeff_at::<T>(call.scalars, 2)?;
        let beta = coeff_at::<T>(call.scalars, 3)?;

        let a_block = self.load_matrix::<T>(&a, m, n, 0)?;
        let xs = self.load_vector::<T>(&x, n, 1)?;
        let ys = self.load_vector::<T>(&y, m, 2)?;

        let mut out = Vec::with_capacity(m);
        for i in 0..m {
            let mut acc = T::ZERO;
            for j in 0..n {
                acc = acc + a_block[i * n + j] * xs[j];
            }
            out.push(alpha * acc + beta * ys[i]);
        }
        self.store_vector::<T>(&y, 2, &out)
    }

    fn gemm_kernel<T: HostElem>(&mut self, call: &KernelCall<'_>) -> std::result::Result<(), KernelStatus> {
        let [a, b, c] = expect_args(call)?;
        let m = dim_at(call.scalars, 0)?;
        let n = dim_at(call.scalars, 1)?;
        let k = dim_at(call.scalars, 2)?;
        let alpha = coeff_at::<T>(call.scalars, 3)?;
        let beta = coeff_at::<T>(call.scalars, 4)?;

        let a_block = self.load_matrix::<T>(&a, m, k, 0)?;
        let b_block = self.load_matrix::<T>(&b, k, n, 1)?;
        let c_block = self.load_matrix::<T>(&c, m, n, 2)?;

        let mut out = vec![T::ZERO; m * n];
        for i in 0..m {
            for j in 0..n {
                let mut acc = T::ZERO;
                for p in 0..k {
                    acc = acc + a_block[i * k + p] * b_block[p * n + j];
                }
                out[i * n + j] = alpha * acc + beta * c_block[i * n + j];
            }
        }
        self.store_matrix::<T>(&c, m, n, 2, &out)
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_args<const N: usize>(call: &KernelCall<'_>) -> std::result::Result<[KernelArg; N], KernelStatus> {
    call.args.try_into().map_err(|_| KernelStatus::InternalError)
}

fn dim_at(scalars: &[Scalar], slot: usize) -> std::result::Result<usize, KernelStatus> {
    scalars
        .get(slot)
        .and_then(Scalar::dim)
        .ok_or(KernelStatus::InvalidDimension { slot })
}

fn coeff_at<T: HostElem>(scalars: &[Scalar], slot: usize) -> std::result::Result<T, KernelStatus> {
    scalars
        .get(slot)
        .and_then(T::coeff)
        .ok_or(KernelStatus::InvalidScalar { slot })
}

impl Backend for HostBackend {
    fn allocate_buffer(&mut self, size: usize) -> Result<BufferHandle> {
        let id = self.next_id;
        self.next_id += 1;
        self.buffers.insert(id, vec![0u8; size]);
        Ok(BufferHandle::new(id))
    }

    fn free_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        if self.buffers.remove(&handle.id()).is_none() {
            return Err(BackendError::InvalidBufferHandle(handle.id()));
        }
        Ok(())
    }

    fn write_buffer(&mut self, handle: BufferHandle, offset: usize, data: &[u8]) -> Result<()> {
        let buffer = self
            .buffers
            .get_mut(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))?;
        if offset + data.len() > buffer.len() {
            return Err(BackendError::CopyOutOfBounds {
                offset,
                len: data.len(),
                size: buffer.len(),
            });
        }
        buffer[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, handle: BufferHandle, offset: usize, data: &mut [u8]) -> Result<()> {
        let buffer = self
            .buffers
            .get(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))?;
        if offset + data.len() > buffer.len() {
            return Err(BackendError::CopyOutOfBounds {
                offset,
                len: data.len(),
                size: buffer.len(),
            });
        }
        data.copy_from_slice(&buffer[offset..offset + data.len()]);
        Ok(())
    }

    fn buffer_size(&self, handle: BufferHandle) -> Result<usize> {
        self.buffers
            .get(&handle.id())
            .map(Vec::len)
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))
    }

    fn enqueue_kernel(&mut self, call: &KernelCall<'_>) -> std::result::Result<(), KernelStatus> {
        tracing::trace!(routine = call.routine, args = call.args.len(), "host_kernel");
        match call.routine {
            "scopy" => self.copy_kernel::<f32>(call),
            "dcopy" => self.copy_kernel::<f64>(call),
            "sswap" => self.swap_kernel::<f32>(call),
            "dswap" => self.swap_kernel::<f64>(call),
            "sscal" => self.scal_kernel::<f32>(call),
            "dscal" => self.scal_kernel::<f64>(call),
            "saxpy" => self.axpy_kernel::<f32>(call),
            "daxpy" => self.axpy_kernel::<f64>(call),
            "sgemv" => self.gemv_kernel::<f32>(call),
            "dgemv" => self.gemv_kernel::<f64>(call),
            "sgemm" => self.gemm_kernel::<f32>(call),
            "dgemm" => self.gemm_kernel::<f64>(call),
            other => Err(KernelStatus::UnsupportedRoutine(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_with<T: HostElem>(data: &[T]) -> (HostBackend, BufferHandle) {
        let mut backend = HostBackend::new();
        let handle = backend.allocate_buffer(std::mem::size_of_val(data)).unwrap();
        backend.write_buffer(handle, 0, bytemuck::cast_slice(data)).unwrap();
        (backend, handle)
    }

    fn read_out<T: HostElem>(backend: &HostBackend, handle: BufferHandle, n: usize) -> Vec<T> {
        let mut bytes = vec![0u8; n * std::mem::size_of::<T>()];
        backend.read_buffer(handle, 0, &mut bytes).unwrap();
        bytemuck::cast_slice(&bytes).to_vec()
    }

    #[test]
    fn test_buffer_lifecycle() {
        let mut backend = HostBackend::new();
        let handle = backend.allocate_buffer(1024).unwrap();
        assert_eq!(backend.buffer_size(handle).unwrap(), 1024);
        assert_eq!(backend.buffer_count(), 1);

        backend.free_buffer(handle).unwrap();
        assert_eq!(backend.buffer_count(), 0);
        assert!(matches!(
            backend.buffer_size(handle),
            Err(BackendError::InvalidBufferHandle(_))
        ));
    }

    #[test]
    fn test_write_out_of_bounds() {
        let mut backend = HostBackend::new();
        let handle = backend.allocate_buffer(8).unwrap();
        let result = backend.write_buffer(handle, 4, &[0u8; 8]);
        assert!(matches!(result, Err(BackendError::CopyOutOfBounds { .. })));
    }

    #[test]
    fn test_swap_kernel() {
        let (mut backend, x) = backend_with(&[1.0f32, 2.0, 3.0, 4.0]);
        let y = backend.allocate_buffer(16).unwrap();
        backend
            .write_buffer(y, 0, bytemuck::cast_slice(&[5.0f32, 10.0, 15.0, 20.0]))
            .unwrap();

        let args = [KernelArg::new(x, 0, 1), KernelArg::new(y, 0, 1)];
        let scalars = [Scalar::Dim(4)];
        backend
            .enqueue_kernel(&KernelCall {
                routine: "sswap",
                args: &args,
                scalars: &scalars,
            })
            .unwrap();

        assert_eq!(read_out::<f32>(&backend, x, 4), vec![5.0, 10.0, 15.0, 20.0]);
        assert_eq!(read_out::<f32>(&backend, y, 4), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_axpy_kernel_strided() {
        // y stored every other element: axpy must honor the pitch.
        let (mut backend, x) = backend_with(&[1.0f32, 2.0, 3.0]);
        let y = backend.allocate_buffer(24).unwrap();
        backend
            .write_buffer(y, 0, bytemuck::cast_slice(&[10.0f32, 0.0, 20.0, 0.0, 30.0, 0.0]))
            .unwrap();

        let args = [KernelArg::new(x, 0, 1), KernelArg::new(y, 0, 2)];
        let scalars = [Scalar::Dim(3), Scalar::F32(2.0)];
        backend
            .enqueue_kernel(&KernelCall {
                routine: "saxpy",
                args: &args,
                scalars: &scalars,
            })
            .unwrap();

        assert_eq!(
            read_out::<f32>(&backend, y, 6),
            vec![12.0, 0.0, 24.0, 0.0, 36.0, 0.0]
        );
    }

    #[test]
    fn test_gemm_kernel_with_leading_dimension() {
        // A is the top-left 2x2 block of a 2x3 row-major allocation.
        let (mut backend, a) = backend_with(&[1.0f64, 2.0, 9.0, 3.0, 4.0, 9.0]);
        let identity = [1.0f64, 0.0, 0.0, 1.0];
        let b = backend.allocate_buffer(32).unwrap();
        backend.write_buffer(b, 0, bytemuck::cast_slice(&identity)).unwrap();
        let c = backend.allocate_buffer(32).unwrap();

        let args = [
            KernelArg::new(a, 0, 3),
            KernelArg::new(b, 0, 2),
            KernelArg::new(c, 0, 2),
        ];
        let scalars = [
            Scalar::Dim(2),
            Scalar::Dim(2),
            Scalar::Dim(2),
            Scalar::F64(1.0),
            Scalar::F64(0.0),
        ];
        backend
            .enqueue_kernel(&KernelCall {
                routine: "dgemm",
                args: &args,
                scalars: &scalars,
            })
            .unwrap();

        // C = A * I picks out the 2x2 block, skipping the pad column.
        assert_eq!(read_out::<f64>(&backend, c, 4), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_insufficient_buffer_is_reported_per_slot() {
        let (mut backend, x) = backend_with(&[1.0f32, 2.0]);
        let y = backend.allocate_buffer(4).unwrap(); // one f32, too small for n=2

        let args = [KernelArg::new(x, 0, 1), KernelArg::new(y, 0, 1)];
        let scalars = [Scalar::Dim(2)];
        let status = backend
            .enqueue_kernel(&KernelCall {
                routine: "scopy",
                args: &args,
                scalars: &scalars,
            })
            .unwrap_err();
        assert_eq!(status, KernelStatus::InsufficientBuffer { slot: 1 });
    }

    #[test]
    fn test_zero_increment_is_rejected() {
        let (mut backend, x) = backend_with(&[1.0f32, 2.0]);
        let args = [KernelArg::new(x, 0, 0)];
        let scalars = [Scalar::Dim(2), Scalar::F32(3.0)];
        let status = backend
            .enqueue_kernel(&KernelCall {
                routine: "sscal",
                args: &args,
                scalars: &scalars,
            })
            .unwrap_err();
        assert_eq!(status, KernelStatus::InvalidIncrement { slot: 0 });
    }

    #[test]
    fn test_wrong_precision_scalar_is_rejected() {
        let (mut backend, x) = backend_with(&[1.0f32, 2.0]);
        let args = [KernelArg::new(x, 0, 1)];
        // alpha passed as f64 to an f32 routine
        let scalars = [Scalar::Dim(2), Scalar::F64(3.0)];
        let status = backend
            .enqueue_kernel(&KernelCall {
                routine: "sscal",
                args: &args,
                scalars: &scalars,
            })
            .unwrap_err();
        assert_eq!(status, KernelStatus::InvalidScalar { slot: 1 });
    }

    #[test]
    fn test_unknown_routine() {
        let mut backend = HostBackend::new();
        let status = backend
            .enqueue_kernel(&KernelCall {
                routine: "ztrsm",
                args: &[],
                scalars: &[],
            })
            .unwrap_err();
        assert_eq!(status, KernelStatus::UnsupportedRoutine("ztrsm"));
    }

    #[test]
    fn test_rejected_call_leaves_operands_untouched() {
        let (mut backend, x) = backend_with(&[1.0f32, 2.0, 3.0, 4.0]);
        let y = backend.allocate_buffer(8).unwrap(); // room for 2 elements only

        let args = [KernelArg::new(x, 0, 1), KernelArg::new(y, 0, 1)];
        let scalars = [Scalar::Dim(4)];
        assert!(backend
            .enqueue_kernel(&KernelCall {
                routine: "sswap",
                args: &args,
                scalars: &scalars,
            })
            .is_err());

        // x still holds its original contents.
        assert_eq!(read_out::<f32>(&backend, x, 4), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
