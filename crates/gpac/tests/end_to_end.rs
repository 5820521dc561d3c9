//! End-to-end scenarios across the whole toolkit: blocks, operators,
//! normalization, simplification and the ODE driver.

use gpac::blocks;
use gpac::{Circuit, GateKind, SimulateParams, simulate_observed};

fn output_at(circuit: &Circuit, t_stop: f64, dt: f64) -> f64 {
    let series = simulate_observed(circuit, &SimulateParams::new(0.0, t_stop, dt))
        .expect("simulation should succeed");
    series.last().expect("series is non-empty").1
}

fn int_gate_count(circuit: &Circuit) -> usize {
    circuit.gates().filter(|(_, g)| g.is_int()).count()
}

/// exp(1) within 1e-4 with the default step.
#[test]
fn test_exp_at_one() {
    let mut circuit = blocks::exp();
    circuit.finalize().unwrap();
    let v = output_at(&circuit, 1.0, 0.001);
    assert!((v - 2.71828).abs() < 1e-4, "exp(1) = {}", v);
}

/// Composition with the identity is a structural clone on either side.
#[test]
fn test_compose_identity_is_clone() {
    let sin = blocks::sin();
    let id = blocks::identity();

    let left = sin.compose(&id).unwrap();
    assert_eq!(left.gate_names(), sin.gate_names());
    assert_eq!(left.output(), sin.output());
    assert_eq!(left.init_values(), sin.init_values());

    let right = id.compose(&sin).unwrap();
    assert_eq!(right.gate_names(), sin.gate_names());
    assert_eq!(right.output(), sin.output());
}

/// sin ∘ Id crosses zero at t = π.
#[test]
fn test_sin_over_identity_crosses_zero_at_pi() {
    let mut circuit = blocks::sin().compose(&blocks::identity()).unwrap();
    circuit.finalize().unwrap();
    let v = output_at(&circuit, std::f64::consts::PI, 0.001);
    assert!(v.abs() < 1e-3, "sin(pi) = {}", v);
}

/// sin(t²): the substituted integrators must be rewritten onto t. The
/// normalizer splits both of sin's integrators over the product t·t, so
/// four integration gates exist right after normalization; merging the
/// mirror-image halves brings the finalized circuit down to two.
#[test]
fn test_sin_of_t_squared_normalization() {
    let mut circuit = blocks::sin().compose(&blocks::power_power2(1)).unwrap();

    // compose() already normalized; count before simplification
    let mut unsimplified = circuit.clone();
    unsimplified.finalize_with(false).unwrap();
    assert_eq!(int_gate_count(&unsimplified), 4);
    for name in unsimplified.int_gates() {
        assert_eq!(unsimplified.as_int(name).unwrap().y, "t");
    }

    circuit.finalize().unwrap();
    assert_eq!(int_gate_count(&circuit), 2);

    let t = 1.5f64;
    let v = output_at(&circuit, t, 0.0001);
    assert!(
        (v - (t * t).sin()).abs() < 1e-4,
        "sin(t^2) at {} = {}",
        t,
        v
    );
}

/// Polynomial circuits fold to exact values and simulate exactly.
#[test]
fn test_polynomial_value_and_simulation() {
    let mut circuit = blocks::polynomial(&[1.0, 0.0, 1.0]);
    assert_eq!(circuit.value_at(3.0).unwrap(), 10.0);

    circuit.finalize().unwrap();
    let series = simulate_observed(&circuit, &SimulateParams::new(0.0, 3.0, 0.001)).unwrap();
    for (t, v) in series.times.iter().zip(&series.values) {
        assert!(
            (v - (1.0 + t * t)).abs() < 1e-6,
            "1 + t^2 at {} = {}",
            t,
            v
        );
    }
}

/// Exp + Exp shares the single exponential integrator after simplification.
#[test]
fn test_cse_merges_shared_exponential() {
    let mut circuit = blocks::exp().sum(&blocks::exp()).unwrap();
    circuit.finalize().unwrap();

    assert_eq!(int_gate_count(&circuit), 1);
    assert_eq!(
        circuit
            .gates()
            .filter(|(_, g)| g.kind() == GateKind::Add)
            .count(),
        1
    );
    let mut constant_bits: Vec<u64> = circuit
        .gates()
        .filter_map(|(_, g)| g.as_constant())
        .map(f64::to_bits)
        .collect();
    let total = constant_bits.len();
    constant_bits.sort_unstable();
    constant_bits.dedup();
    assert_eq!(constant_bits.len(), total, "no duplicate constant gates");

    let v = output_at(&circuit, 1.0, 0.001);
    assert!(
        (v - 2.0 * std::f64::consts::E).abs() < 1e-3,
        "2 exp(1) = {}",
        v
    );
}

/// An integration gate over a bare constant is reported, not a crash.
#[test]
fn test_normalization_failure_is_an_error() {
    let mut circuit = Circuit::new("broken");
    circuit.set_validation(false);
    circuit.add_const(Some("c"), 1.0).unwrap();
    circuit.add_int(Some("g"), "t", "c").unwrap();
    circuit.set_output("g");

    let err = circuit.finalize().unwrap_err();
    assert!(matches!(err, gpac::CoreError::NonNormalizable(_)), "{err}");
}

/// Simplification preserves the computed function.
#[test]
fn test_simplification_is_semantic_preserving() {
    let build = || {
        blocks::sin()
            .compose(&blocks::polynomial(&[0.0, 0.5, 0.25]))
            .unwrap()
    };

    let mut plain = build();
    plain.finalize_with(false).unwrap();
    let mut simplified = build();
    simplified.finalize_with(true).unwrap();

    let params = SimulateParams::new(0.0, 2.0, 0.001);
    let a = simulate_observed(&plain, &params).unwrap();
    let b = simulate_observed(&simplified, &params).unwrap();
    for (x, y) in a.values.iter().zip(&b.values) {
        assert!((x - y).abs() < 1e-9, "{} vs {}", x, y);
    }
}

/// power_power2(n) integrated numerically matches t^(2^n) on [0, 2].
#[test]
fn test_power_power2_trajectory() {
    for n in [1u32, 2] {
        let mut circuit = blocks::power_power2(n);
        circuit.finalize().unwrap();
        let series = simulate_observed(&circuit, &SimulateParams::new(0.0, 2.0, 0.001)).unwrap();
        let p = 2u32.pow(n) as i32;
        for (t, v) in series.times.iter().zip(&series.values) {
            assert!(
                (v - t.powi(p)).abs() < 1e-6,
                "t^{} at {} = {}",
                p,
                t,
                v
            );
        }
    }
}

/// Inverse(Inverse(C)) agrees with C within RK4 tolerance.
#[test]
fn test_double_inversion_round_trip() {
    let base = blocks::polynomial(&[1.0, 0.0, 1.0]); // 1 + t², never 0
    let mut twice = base.inverted().unwrap().inverted().unwrap();
    twice.finalize().unwrap();

    let t = 1.0f64;
    let v = output_at(&twice, t, 0.0001);
    let expected = 1.0 + t * t;
    assert!(
        (v - expected).abs() < 1e-3,
        "1/(1/(1+t^2)) at {} = {} (expected {})",
        t,
        v,
        expected
    );
}

/// The derivative operator on a polynomial matches the symbolic derivative.
#[test]
fn test_derivative_of_polynomial() {
    // (2 - 3t + t³)' = -3 + 3t²
    let circuit = blocks::polynomial(&[2.0, -3.0, 0.0, 1.0]);
    let derivative = circuit.derive().unwrap();
    for t in [0.0, 0.7, 2.0] {
        let v = derivative.value_at(t).unwrap();
        let expected = -3.0 + 3.0 * t * t;
        assert!(
            (v - expected).abs() < 1e-9,
            "p'({}) = {} (expected {})",
            t,
            v,
            expected
        );
    }
}

/// Finalize twice: the second call must not change the circuit.
#[test]
fn test_finalize_idempotence_end_to_end() {
    let mut circuit = blocks::sin().compose(&blocks::power_power2(1)).unwrap();
    circuit.finalize().unwrap();
    let names = circuit.gate_names();
    let values = circuit.init_values().clone();
    circuit.finalize().unwrap();
    assert_eq!(circuit.gate_names(), names);
    assert_eq!(circuit.init_values(), &values);
}

/// Composition transports initial values: exp ∘ (t + 1) starts at exp(1).
#[test]
fn test_compose_transports_initial_values() {
    let shifted = blocks::polynomial(&[1.0, 1.0]); // t + 1
    let mut circuit = blocks::exp().compose(&shifted).unwrap();
    circuit.finalize().unwrap();

    let v0 = circuit.value_at(0.0).unwrap();
    assert!(
        (v0 - std::f64::consts::E).abs() < 1e-4,
        "exp(0 + 1) = {} (expected e)",
        v0
    );
    let v = output_at(&circuit, 1.0, 0.001);
    assert!(
        (v - 2.0f64.exp()).abs() < 1e-3,
        "exp(1 + 1) = {} (expected {})",
        v,
        2.0f64.exp()
    );
}
