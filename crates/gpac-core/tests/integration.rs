//! Integration tests for the core pipeline: hand-built circuits through
//! normalization, simplification, finalization and simulation.

use gpac_core::{Circuit, Error, SimulateParams, simulate_observed};

/// The coupled sine/cosine pair, built gate by gate.
fn oscillator() -> Circuit {
    let mut c = Circuit::new("osc");
    c.add_const(Some("m"), -1.0).unwrap();
    c.add_prod(Some("p"), "s", "m").unwrap();
    c.add_int(Some("z"), "p", "t").unwrap();
    c.add_int(Some("s"), "z", "t").unwrap();
    c.set_init_value("z", 1.0).unwrap();
    c.set_init_value("s", 0.0).unwrap();
    c.set_output("s");
    c
}

#[test]
fn test_oscillator_tracks_sine() {
    let mut circuit = oscillator();
    circuit.finalize().unwrap();
    let series = simulate_observed(&circuit, &SimulateParams::new(0.0, 6.0, 0.001)).unwrap();
    for (t, v) in series.times.iter().zip(&series.values).step_by(500) {
        assert!(
            (v - t.sin()).abs() < 1e-5,
            "sin({}) = {} (expected {})",
            t,
            v,
            t.sin()
        );
    }
}

/// After validation every binary input resolves, and after finalization
/// every integrator runs over t with an initial value.
#[test]
fn test_finalized_invariants() {
    let mut circuit = oscillator();
    circuit.finalize().unwrap();

    for (name, gate) in circuit.gates() {
        if let Some(b) = gate.as_binary() {
            for input in [&b.x, &b.y] {
                assert!(
                    input == "t" || circuit.has(input),
                    "gate {} has dangling input {}",
                    name,
                    input
                );
            }
        }
        if gate.is_int() {
            assert_eq!(gate.as_binary().unwrap().y, "t");
            assert!(circuit.init_value(name).is_some());
        }
    }
    assert_eq!(circuit.int_gates().len(), 2);
}

/// Sum of a circuit with itself keeps both operands intact and doubles the
/// output.
#[test]
fn test_sum_with_self_doubles() {
    let a = oscillator();
    let mut doubled = a.sum(&a).unwrap();
    doubled.finalize_with(false).unwrap();
    let series = simulate_observed(&doubled, &SimulateParams::new(0.0, 1.0, 0.001)).unwrap();
    let (t, v) = series.last().unwrap();
    assert!(
        (v - 2.0 * t.sin()).abs() < 1e-5,
        "2 sin({}) = {}",
        t,
        v
    );
}

/// Normalization of an integral over an integrator: chain rule in action.
/// g = int 1 d(s) with s = sin gives g(t) = sin(t) (+ g(0)).
#[test]
fn test_integral_over_integrator() {
    let mut circuit = oscillator();
    circuit.add_const(Some("one"), 1.0).unwrap();
    circuit.add_int(Some("g"), "one", "s").unwrap();
    circuit.set_init_value("g", 0.0).unwrap();
    circuit.set_output("g");

    circuit.finalize().unwrap();
    let series = simulate_observed(&circuit, &SimulateParams::new(0.0, 2.0, 0.001)).unwrap();
    let (t, v) = series.last().unwrap();
    assert!(
        (v - t.sin()).abs() < 1e-5,
        "int 1 d(sin) at {} = {} (expected {})",
        t,
        v,
        t.sin()
    );
}

/// Erasing a gate de-finalizes; re-finalization catches the dangling input.
#[test]
fn test_erase_breaks_finalization() {
    let mut circuit = oscillator();
    circuit.finalize().unwrap();
    circuit.erase_gate("m");
    assert!(!circuit.is_finalized());
    assert!(matches!(
        circuit.finalize(),
        Err(Error::MissingInput { .. })
    ));
}

/// import_values only touches integration gates that exist.
#[test]
fn test_import_values_filters() {
    let mut circuit = oscillator();
    let mut incoming = std::collections::BTreeMap::new();
    incoming.insert("z".to_string(), 0.25);
    incoming.insert("m".to_string(), 9.0); // constant gate: ignored
    incoming.insert("ghost".to_string(), 9.0); // absent: ignored
    circuit.import_values(&incoming);
    assert_eq!(circuit.init_value("z"), Some(0.25));
    assert_eq!(circuit.init_value("s"), Some(0.0));
    assert!(circuit.init_value("m").is_none());
}
