use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tessella_backends::{Device, HostBackend};
use tessella_core::{routines, Operand, RootArray, Runtime};

fn bench_dispatch(c: &mut Criterion) {
    let rt = Runtime::new();
    rt.setup(routines::catalog()).unwrap();
    rt.register_device(Device::cpu(0), Box::new(HostBackend::new()));

    let x = RootArray::from_vec(vec![1.0f32; 4096], &[4096]).unwrap();
    let y = RootArray::from_vec(vec![2.0f32; 4096], &[4096]).unwrap();

    // Warm the residency cache so the loop measures steady-state cost.
    routines::blas1::axpy(&rt, Device::cpu(0), 1.0f32, &x, &y).unwrap();

    c.bench_function("resolve_cached_pair", |b| {
        b.iter(|| {
            rt.dispatch("saxpy", Device::cpu(0), &[Operand::from(&x), Operand::from(&y)])
                .unwrap()
        })
    });

    c.bench_function("axpy_cached_4096", |b| {
        b.iter(|| routines::blas1::axpy(&rt, Device::cpu(0), black_box(1.0f32), &x, &y).unwrap())
    });

    let a = RootArray::from_vec(vec![1.0f32; 64 * 64], &[64, 64]).unwrap();
    let bm = RootArray::from_vec(vec![1.0f32; 64 * 64], &[64, 64]).unwrap();
    let cm = RootArray::from_vec(vec![0.0f32; 64 * 64], &[64, 64]).unwrap();
    c.bench_function("gemm_cached_64", |b| {
        b.iter(|| routines::blas3::gemm(&rt, Device::cpu(0), 1.0f32, &a, &bm, black_box(0.0f32), &cm).unwrap())
    });
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
