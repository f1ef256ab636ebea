use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quality_core::{ColorScale, QualityValue};

fn sweep(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| match i % 50 {
            0 => -77.0,
            1 => 0.0,
            _ => (i % 1000) as f64 / 1000.0,
        })
        .collect()
}

fn color_scale_benchmark(c: &mut Criterion) {
    let scale = ColorScale::default();
    let mut group = c.benchmark_group("color_scale");
    for size in [1_000usize, 100_000] {
        let values = sweep(size);
        group.bench_with_input(BenchmarkId::new("fill_for_raw", size), &values, |b, values| {
            b.iter(|| {
                let mut patterns = 0usize;
                for value in values {
                    if scale.fill_for_raw(black_box(*value)).is_pattern() {
                        patterns += 1;
                    }
                }
                patterns
            });
        });
        group.bench_with_input(BenchmarkId::new("classify", size), &values, |b, values| {
            b.iter(|| {
                values
                    .iter()
                    .filter(|value| scale.classify(black_box(**value)) == QualityValue::NoData)
                    .count()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, color_scale_benchmark);
criterion_main!(benches);
