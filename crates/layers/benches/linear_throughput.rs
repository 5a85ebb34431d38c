use candle_core::{DType, Device, Tensor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use layers::{
    dtypes::PrecisionPolicy,
    linear::{Linear, LinearConfig, LinearInit, LinearLayer},
};

/// Projections the summarizer runs every decode step, at the default widths.
fn bench_linear(c: &mut Criterion) {
    let device = Device::Cpu;
    let batch = 16usize;
    let source_len = 400usize;
    let shapes = &[
        ("attention.features", 512usize, 512usize, source_len),
        ("decoder.context", 640, 128, 1),
        ("decoder.out", 768, 256, 1),
    ];

    for &dtype in &[DType::F32, DType::BF16] {
        let mut group = c.benchmark_group(format!("linear/{dtype:?}"));
        for &(name, input_dim, output_dim, positions) in shapes {
            let linear = Linear::with_init(
                LinearConfig::new(input_dim, output_dim),
                &LinearInit::XavierUniform,
                &device,
                dtype,
            )
            .expect("linear init");
            let input = Tensor::randn(0f32, 1.0, (positions, batch, input_dim), &device)
                .expect("input")
                .to_dtype(dtype)
                .expect("cast input");
            let policy = PrecisionPolicy::from_parameter_dtype(dtype);
            group.throughput(Throughput::Elements(
                (positions * batch * input_dim * output_dim) as u64,
            ));
            group.bench_with_input(
                BenchmarkId::from_parameter(name),
                &(linear, input, policy),
                |b, (linear, input, policy)| {
                    b.iter(|| black_box(linear.forward(black_box(input), policy).expect("forward")));
                },
            );
        }
        group.finish();
    }
}

criterion_group!(benches, bench_linear);
criterion_main!(benches);
