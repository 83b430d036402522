//! FFT engine benchmarks

use bp_core::Complex32;
use bp_fft::FftEngine;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn bench_fft_1024(c: &mut Criterion) {
    let engine = FftEngine::new(1024).unwrap();
    let input: Vec<Complex32> = (0..1024)
        .map(|i| Complex32::new((i as f32 * 0.01).sin(), 0.0))
        .collect();
    let mut output = vec![Complex32::new(0.0, 0.0); 1024];

    c.bench_function("fft_complex_1024", |b| {
        b.iter(|| {
            engine.fft(black_box(&input), black_box(&mut output)).unwrap();
        })
    });
}

fn bench_rfft_1024(c: &mut Criterion) {
    let mut engine = FftEngine::new(1024).unwrap();
    let input: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.01).sin()).collect();
    let mut output = vec![Complex32::new(0.0, 0.0); 513];

    c.bench_function("rfft_1024", |b| {
        b.iter(|| {
            engine.rfft(black_box(&input), black_box(&mut output));
        })
    });
}

fn bench_rfft_1000_mixed_radix(c: &mut Criterion) {
    let mut engine = FftEngine::new(1000).unwrap();
    let input: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).sin()).collect();
    let mut output = vec![Complex32::new(0.0, 0.0); 501];

    c.bench_function("rfft_1000_mixed_radix", |b| {
        b.iter(|| {
            engine.rfft(black_box(&input), black_box(&mut output));
        })
    });
}

criterion_group!(benches, bench_fft_1024, bench_rfft_1024, bench_rfft_1000_mixed_radix);
criterion_main!(benches);
