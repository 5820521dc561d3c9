//! Switching and shaping blocks: smooth steps, staircases, rectangular
//! signals, absolute value, sign, selection and maximum.
//!
//! These are smooth surrogates for discontinuous functions, built entirely
//! out of the elementary blocks and the construction operators. Sharpness
//! parameters trade approximation quality against stiffness of the
//! resulting ODE system.

use std::f64::consts::{LN_2, TAU};

use gpac_core::Circuit;
use nalgebra::{DMatrix, DVector};

use crate::basic::{constant, identity, sin, sqrt, tanh};

/// Smooth 0 → 1 switch: the logistic solution of `y' = α(y - y²)` with
/// `y(0) = ½`. Larger `alpha` gives a sharper transition around `t = 0`.
pub fn l2(alpha: f64) -> Circuit {
    let mut res = Circuit::new("");
    res.with_const("l2_a", alpha)
        .with_const("l2_na", -alpha)
        .with_gate("l2_2", "x", "l2", "l2")
        .with_gate("l2_P1", "x", "l2_a", "l2")
        .with_gate("l2_P2", "x", "l2_na", "l2_2")
        .with_gate("l2_A", "+", "l2_P1", "l2_P2")
        .with_gate("l2", "I", "l2_A", "t");
    res.set_output("l2");
    res.set_init_value("l2", 0.5)
        .expect("l2 is an integration gate");
    res.into_block("L2")
}

/// Smooth staircase `t - sin(2πt)/(2π)`: equals `k` at every integer `k`
/// and flattens there (the derivative `1 - cos(2πt)` vanishes).
pub fn round() -> Circuit {
    let wave = sin()
        .compose(&(&identity() * TAU))
        .expect("sine accepts a scaled time argument");
    let res = &identity() + &(&wave * (-1.0 / TAU));
    res.into_block("Round")
}

/// `t mod 10`, as the 10-point trigonometric interpolation through
/// `(k, k mod 10)` for `k = 0..9`.
///
/// The interpolation basis is `1, cos(jωt), sin(jωt)` for `j = 1..4` plus
/// `cos(5ωt)` with `ω = 2π/10`; the ten coefficients come from solving the
/// 10×10 collocation system once at construction time.
pub fn mod10() -> Circuit {
    let omega = TAU / 10.0;
    let mut m = DMatrix::<f64>::zeros(10, 10);
    for k in 0..10 {
        let t = k as f64;
        m[(k, 0)] = 1.0;
        for j in 1..=4 {
            m[(k, 2 * j - 1)] = (j as f64 * omega * t).cos();
            m[(k, 2 * j)] = (j as f64 * omega * t).sin();
        }
        m[(k, 9)] = (5.0 * omega * t).cos();
    }
    let rhs = DVector::from_fn(10, |k, _| k as f64);
    let coeffs = m
        .lu()
        .solve(&rhs)
        .expect("trigonometric collocation system is invertible");

    let id = identity();
    let mut res = constant(coeffs[0]);
    for j in 1..=4 {
        let arg = &id * (j as f64 * omega);
        let cos_j = crate::basic::cos()
            .compose(&arg)
            .expect("cosine accepts a scaled time argument");
        let sin_j = sin()
            .compose(&arg)
            .expect("sine accepts a scaled time argument");
        res = &res + &(&cos_j * coeffs[2 * j - 1]);
        res = &res + &(&sin_j * coeffs[2 * j]);
    }
    let nyquist = crate::basic::cos()
        .compose(&(&id * (5.0 * omega)))
        .expect("cosine accepts a scaled time argument");
    res = &res + &(&nyquist * coeffs[9]);
    res.into_block("Mod10")
}

/// Smooth rectangular signal of period 1: `½(1 + tanh(20 sin(2πt)))`,
/// close to 1 on the first half of each period and 0 on the second.
pub fn upsilon() -> Circuit {
    let wave = sin()
        .compose(&(&identity() * TAU))
        .expect("sine accepts a scaled time argument");
    let squared_up = tanh()
        .compose(&(&wave * 20.0))
        .expect("tanh accepts a bounded argument");
    let res = &(&squared_up + 1.0) * 0.5;
    res.into_block("Upsilon")
}

/// Smooth absolute value `sqrt(t² + δ)`.
pub fn abs_delta(delta: f64) -> Circuit {
    let id = identity();
    let arg = &(&id * &id) + (delta - 1.0);
    let res = sqrt()
        .compose(&arg)
        .expect("sqrt argument stays above its singularity for positive delta");
    res.into_block("Abs")
}

/// Smooth sign `tanh(μt)`.
pub fn sgn(mu: f64) -> Circuit {
    let res = tanh()
        .compose(&(&identity() * mu))
        .expect("tanh accepts a scaled time argument");
    res.into_block("Sgn")
}

/// Smooth indicator of `t ≥ 1`: `½(1 + tanh(μ(t - 1)))`.
pub fn ip1(mu: f64) -> Circuit {
    let arg = &(&identity() + (-1.0)) * mu;
    let step = tanh()
        .compose(&arg)
        .expect("tanh accepts a shifted, scaled time argument");
    let res = &(&step + 1.0) * 0.5;
    res.into_block("Ip1")
}

/// Softplus `ln(1 + e^t)`: integrates the logistic switch, `lxh(0) = ln 2`.
pub fn lxh() -> Circuit {
    let res = l2(1.0)
        .integrate(&identity(), LN_2)
        .expect("integrating a block with an output set");
    res.into_block("Lxh")
}

/// Smooth two-sided selection: `a` outside `[t0, t1]`, `b` inside, with
/// transition width `delta`:
/// `a + (b - a) · (tanh((t - t0)/δ) - tanh((t - t1)/δ)) / 2`.
pub fn select(t0: f64, t1: f64, delta: f64, a: f64, b: f64) -> Circuit {
    let step_at = |x: f64| {
        let arg = &(&identity() + (-x)) * (1.0 / delta);
        tanh()
            .compose(&arg)
            .expect("tanh accepts a shifted, scaled time argument")
    };
    let window = &(&step_at(t0) - &step_at(t1)) * 0.5;
    let res = &constant(a) + &(&window * (b - a));
    res.into_block("Select")
}

/// Smooth maximum of two circuits: `(A + B + |A - B|_δ) / 2` with the
/// smooth absolute value [`abs_delta`].
pub fn max_of(a: &Circuit, b: &Circuit, delta: f64) -> Circuit {
    let diff = a - b;
    let magnitude = abs_delta(delta)
        .compose(&diff)
        .expect("smooth absolute value accepts any argument");
    let res = &(&(a + b) + &magnitude) * 0.5;
    res.into_block("Max")
}
