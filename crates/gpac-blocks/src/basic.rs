//! Elementary blocks: identity, constants, exponentials, trigonometry,
//! powers and polynomials.

use gpac_core::Circuit;

/// The identity circuit: no gates, output `t`.
pub fn identity() -> Circuit {
    let mut res = Circuit::new("");
    res.set_output("t");
    res.into_block("Id")
}

/// A single constant gate.
///
/// Use this as a standalone circuit; when combining with an existing circuit
/// prefer the scalar operators, which reuse constant gates.
pub fn constant(c: f64) -> Circuit {
    let mut res = Circuit::new("");
    res.with_const("c", c);
    res.set_output("c");
    res.into_block("Const")
}

/// `exp(t)`: the integrator feeding on itself, `e' = e`, `e(0) = 1`.
pub fn exp() -> Circuit {
    let mut res = Circuit::new("");
    res.with_gate("exp", "I", "exp", "t");
    res.set_output("exp");
    res.set_init_value("exp", 1.0)
        .expect("exp is an integration gate");
    res.into_block("Exp")
}

/// `2^t`: `y' = ln(2) · y`, `y(0) = 1`.
pub fn exp2() -> Circuit {
    let mut res = Circuit::new("");
    res.with_const("exp2_c", std::f64::consts::LN_2)
        .with_gate("exp2_P", "x", "exp2_c", "exp2")
        .with_gate("exp2", "I", "exp2_P", "t");
    res.set_output("exp2");
    res.set_init_value("exp2", 1.0)
        .expect("exp2 is an integration gate");
    res.into_block("Exp2")
}

fn sin_cos_pair() -> Circuit {
    let mut res = Circuit::new("");
    res.with_const("sin_c", -1.0)
        .with_gate("sin_P", "x", "sin", "sin_c")
        .with_gate("cos", "I", "sin_P", "t")
        .with_gate("sin", "I", "cos", "t");
    res.set_init_value("cos", 1.0)
        .expect("cos is an integration gate");
    res.set_init_value("sin", 0.0)
        .expect("sin is an integration gate");
    res
}

/// `sin(t)` via the coupled pair `sin' = cos`, `cos' = -sin`.
pub fn sin() -> Circuit {
    let mut res = sin_cos_pair();
    res.set_output("sin");
    res.into_block("Sin")
}

/// `cos(t)`, sharing the structure of [`sin`].
pub fn cos() -> Circuit {
    let mut res = sin_cos_pair();
    res.set_output("cos");
    res.into_block("Cos")
}

/// `tan(t)`: `y' = 1 + y²`, `y(0) = 0`.
pub fn tan() -> Circuit {
    let mut res = Circuit::new("");
    res.with_const("tan_c", 1.0)
        .with_gate("tan_2", "x", "tan", "tan")
        .with_gate("tan_A", "+", "tan_c", "tan_2")
        .with_gate("tan", "I", "tan_A", "t");
    res.set_output("tan");
    res.set_init_value("tan", 0.0)
        .expect("tan is an integration gate");
    res.into_block("Tan")
}

/// `arctan(t)`: the derivative gate integrates `1/(1+t²)` via
/// `d' = -2t · d²`, `d(0) = 1`.
pub fn arctan() -> Circuit {
    let mut res = Circuit::new("");
    res.with_const("arctan_c", -2.0)
        .with_gate("der", "I", "arctan_P3", "t")
        .with_gate("arctan_P1", "x", "arctan_c", "t")
        .with_gate("arctan_P2", "x", "der", "der")
        .with_gate("arctan_P3", "x", "arctan_P1", "arctan_P2")
        .with_gate("arctan", "I", "der", "t");
    res.set_output("arctan");
    res.set_init_value("der", 1.0)
        .expect("der is an integration gate");
    res.set_init_value("arctan", 0.0)
        .expect("arctan is an integration gate");
    res.into_block("Arctan")
}

/// `tanh(t)`: `y' = 1 - y²`, `y(0) = 0`.
pub fn tanh() -> Circuit {
    let mut res = Circuit::new("");
    res.with_const("tanh_c1", 1.0)
        .with_const("tanh_cm", -1.0)
        .with_gate("tanh_2", "x", "tanh", "tanh")
        .with_gate("tanh_N", "x", "tanh_cm", "tanh_2")
        .with_gate("tanh_A", "+", "tanh_c1", "tanh_N")
        .with_gate("tanh", "I", "tanh_A", "t");
    res.set_output("tanh");
    res.set_init_value("tanh", 0.0)
        .expect("tanh is an integration gate");
    res.into_block("Tanh")
}

/// `sqrt(1 + t)`, through the auxiliary `z = (1 + t)^(-1/2)`:
/// `z' = -z³/2`, `z(0) = 1` and `s' = z/2`, `s(0) = 1`.
pub fn sqrt() -> Circuit {
    let mut res = Circuit::new("");
    res.with_const("sqrt_ch", 0.5)
        .with_const("sqrt_cmh", -0.5)
        .with_gate("sqrt_z2", "x", "sqrt_z", "sqrt_z")
        .with_gate("sqrt_z3", "x", "sqrt_z2", "sqrt_z")
        .with_gate("sqrt_zP", "x", "sqrt_cmh", "sqrt_z3")
        .with_gate("sqrt_z", "I", "sqrt_zP", "t")
        .with_gate("sqrt_P", "x", "sqrt_ch", "sqrt_z")
        .with_gate("sqrt", "I", "sqrt_P", "t");
    res.set_output("sqrt");
    res.set_init_value("sqrt_z", 1.0)
        .expect("sqrt_z is an integration gate");
    res.set_init_value("sqrt", 1.0)
        .expect("sqrt is an integration gate");
    res.into_block("Sqrt")
}

/// `1/(1 + t)`: `y' = -y²`, `y(0) = 1`.
pub fn inverse() -> Circuit {
    let mut res = Circuit::new("");
    res.with_const("inv_c", -1.0)
        .with_gate("inv_2", "x", "inv", "inv")
        .with_gate("inv_P", "x", "inv_c", "inv_2")
        .with_gate("inv", "I", "inv_P", "t");
    res.set_output("inv");
    res.set_init_value("inv", 1.0)
        .expect("inv is an integration gate");
    res.into_block("Inverse")
}

/// `t^(2^n)` by repeated squaring; `power_power2(0)` is the constant 1.
pub fn power_power2(n: u32) -> Circuit {
    let name = format!("PP2{}", n);
    if n == 0 {
        let mut res = Circuit::new("");
        res.with_const("c1", 1.0);
        res.set_output("c1");
        return res.into_block(name);
    }
    let mut res = Circuit::new("");
    res.with_gate("P1", "x", "t", "t");
    res.set_output("P1");
    for _ in 0..n - 1 {
        res = &res * &res;
    }
    res.into_block(name)
}

/// Polynomial in `t` with the given coefficients (increasing degree),
/// evaluated by Horner's method.
pub fn polynomial(coeffs: &[f64]) -> Circuit {
    let Some((&highest, rest)) = coeffs.split_last() else {
        return constant(0.0).into_block("Poly");
    };
    let mut res = constant(highest);
    let id = identity();
    for &c in rest.iter().rev() {
        res = &res * &id;
        if c != 0.0 {
            res = &res + c;
        }
    }
    res.into_block("Poly")
}
