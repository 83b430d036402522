//! IIR kernel benchmarks

use bp_dsp::design;
use bp_dsp::iir::DirectForm1;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn bench_biquad_block(c: &mut Criterion) {
    let coeffs = design::butterworth_low_pass(0.1, 2).unwrap();
    let mut filter = DirectForm1::new(&coeffs.b, &coeffs.a).unwrap();
    let input: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.01).sin()).collect();
    let mut output = vec![0.0f32; 1024];

    c.bench_function("iir_biquad_1024", |b| {
        b.iter(|| {
            filter.process_block(black_box(&input), black_box(&mut output));
        })
    });
}

fn bench_fir_block(c: &mut Criterion) {
    let taps: Vec<f64> = (0..51).map(|i| ((i as f64) * 0.1).sin() * 0.02).collect();
    let mut filter = DirectForm1::new(&taps, &[]).unwrap();
    let input: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.01).sin()).collect();
    let mut output = vec![0.0f32; 1024];

    c.bench_function("fir_51tap_1024", |b| {
        b.iter(|| {
            filter.process_block(black_box(&input), black_box(&mut output));
        })
    });
}

criterion_group!(benches, bench_biquad_block, bench_fir_block);
criterion_main!(benches);
