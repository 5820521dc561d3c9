//! Benchmarks for circuit finalization and fixed-step integration.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use gpac_blocks::{power_power2, sin};
use gpac_core::{SimulateParams, simulate};

fn bench_finalize_composed(c: &mut Criterion) {
    c.bench_function("finalize_sin_of_t2", |b| {
        b.iter(|| {
            let mut circuit = sin().compose(&power_power2(1)).unwrap();
            circuit.finalize().unwrap();
            black_box(circuit.len())
        });
    });
}

fn bench_rk4_sin(c: &mut Criterion) {
    let mut circuit = sin();
    circuit.finalize().unwrap();
    let params = SimulateParams::new(0.0, 1.0, 0.001);
    c.bench_function("rk4_sin_1000_steps", |b| {
        b.iter(|| {
            let y = simulate(&circuit, black_box(&params)).unwrap();
            black_box(y[0])
        });
    });
}

criterion_group!(benches, bench_finalize_composed, bench_rk4_sin);
criterion_main!(benches);
