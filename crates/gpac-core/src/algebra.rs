//! Construction operators: build new circuits out of existing ones.
//!
//! All operators work by value: the operands are copied, colliding gate
//! names are moved to fresh generated names, and the graphs are spliced
//! together. The results are generally not normalized (composition runs the
//! normalizer itself, since substituting the inner output for `t` almost
//! always de-normalizes integration gates).
//!
//! The `std::ops` impls on `&Circuit` are sugar over the fallible methods
//! and panic when an operand has no output, like matrix operators panic on a
//! dimension mismatch. Use the named methods to handle errors.

use std::collections::BTreeMap;
use std::ops::{Add, Div, Mul, Sub};

use log::warn;

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::gate::{Gate, TIME};
use crate::ode;

/// Step count used when pre-integrating a circuit to transport initial
/// values through a composition.
const COMPOSE_PRESIM_STEPS: usize = 1024;

impl Circuit {
    /// New circuit computing `self + other`.
    pub fn sum(&self, other: &Circuit) -> Result<Circuit> {
        self.combine(other, Gate::add)
    }

    /// New circuit computing `self * other`.
    pub fn product(&self, other: &Circuit) -> Result<Circuit> {
        self.combine(other, Gate::prod)
    }

    /// New circuit computing `self - other`, built as `self + (-1) * other`.
    pub fn difference(&self, other: &Circuit) -> Result<Circuit> {
        self.sum(&other.times_const(-1.0)?)
    }

    /// New circuit computing `self / other`, built with the inversion
    /// operator. Fails when `other` evaluates to 0 at `t = 0`.
    pub fn quotient(&self, other: &Circuit) -> Result<Circuit> {
        self.product(&other.inverted()?)
    }

    fn combine(
        &self,
        other: &Circuit,
        gate: impl Fn(String, String) -> Gate,
    ) -> Result<Circuit> {
        self.checked_output()?;
        other.checked_output()?;

        let mut result = self.operand_copy();
        result.ensure_unique_names(other);
        let left = match result.output() {
            Some(o) => o.to_string(),
            None => return Err(Error::NoOutput),
        };
        result.copy_into(other);
        let right = other.checked_output()?.to_string();
        let out = result.add_gate_unchecked(None, gate(left, right));
        result.set_output(out);
        Ok(result)
    }

    /// New circuit computing `self + c`. An existing constant gate with
    /// value `c` is reused; otherwise one is created.
    pub fn plus_const(&self, c: f64) -> Result<Circuit> {
        self.combine_const(c, Gate::add)
    }

    /// New circuit computing `self * c`, reusing an existing constant gate
    /// with value `c` when there is one.
    pub fn times_const(&self, c: f64) -> Result<Circuit> {
        self.combine_const(c, Gate::prod)
    }

    fn combine_const(&self, c: f64, gate: impl Fn(String, String) -> Gate) -> Result<Circuit> {
        let old_output = self.checked_output()?.to_string();
        let mut result = self.operand_copy();
        let constant = result.find_or_add_constant(c);
        let out = result.add_gate_unchecked(None, gate(old_output, constant));
        result.set_output(out);
        Ok(result)
    }

    /// New circuit computing the integral of `self` with respect to `wrt`,
    /// with initial value `v0`.
    pub fn integrate(&self, wrt: &Circuit, v0: f64) -> Result<Circuit> {
        let mut result = self.combine(wrt, Gate::int)?;
        let out = result.checked_output()?.to_string();
        result.set_init_value(&out, v0)?;
        Ok(result)
    }

    /// New circuit computing `self ∘ other` (apply `self` to the output of
    /// `other`).
    ///
    /// If either side is the identity (its output is `t`) the other side is
    /// returned as a structural clone. Otherwise `other` is spliced into a
    /// copy of `self` and every `t` reference in the `self` portion is
    /// replaced by `other`'s output. Because the substitution usually leaves
    /// integration gates running over something other than `t`, the result
    /// is normalized before it is returned.
    ///
    /// Initial values for the `self` portion are transported to the new
    /// starting point: with `b0 = other(0)`, a throwaway clone of `self` is
    /// finalized without simplification and integrated over `[0, b0]`
    /// (backwards when `b0 < 0`), and the end state is imported for the
    /// integration gates that survive in the composition. When `other`'s
    /// initial output cannot be evaluated the declared values are kept and a
    /// warning is logged.
    pub fn compose(&self, other: &Circuit) -> Result<Circuit> {
        self.checked_output()?;
        other.checked_output()?;
        if other.output() == Some(TIME) {
            return Ok(self.operand_copy());
        }
        if self.output() == Some(TIME) {
            return Ok(other.operand_copy());
        }

        let mut result = other.operand_copy();
        result.ensure_unique_names(self);
        let inner_out = match result.output() {
            Some(o) => o.to_string(),
            None => return Err(Error::NoOutput),
        };
        result.copy_into(self);

        // Transport the outer circuit's initial values to t = other(0).
        match other.value_at(0.0) {
            Ok(b0) if b0 != 0.0 => match self.state_at(b0) {
                Ok(state) => result.import_values(&state),
                Err(e) => warn!(
                    "compose: cannot transport initial values of {:?} to t = {}: {}",
                    self.name(),
                    b0,
                    e
                ),
            },
            Ok(_) => {}
            Err(e) => warn!(
                "compose: cannot evaluate {:?} at t = 0, keeping declared initial values: {}",
                other.name(),
                e
            ),
        }

        // Substitute the inner output for every t reference in the outer
        // portion. The outer gates kept their names: only the inner copy was
        // renamed for uniqueness.
        for name in self.gate_names() {
            if let Some(b) = result.as_binary_mut(&name) {
                if b.x == TIME {
                    b.x = inner_out.clone();
                }
                if b.y == TIME {
                    b.y = inner_out.clone();
                }
            }
        }
        result.set_output(self.checked_output()?.to_string());
        result.normalize()?;
        Ok(result)
    }

    /// Integration-gate values of this circuit at time `t_end`, obtained by
    /// finalizing a clone without simplification (so gate names are kept
    /// stable) and integrating from 0.
    fn state_at(&self, t_end: f64) -> Result<BTreeMap<String, f64>> {
        let mut probe = self.clone();
        probe.finalize_with(false)?;
        ode::end_state(&probe, t_end, COMPOSE_PRESIM_STEPS)
    }

    /// New circuit whose output is the derivative of this circuit's output
    /// with respect to `t`.
    ///
    /// Uses `(x + y)' = x' + y'`, `(x y)' = x' y + x y'`, `(int x d(t))' = x`
    /// and `t' = 1`; constants differentiate to 0. The circuit is normalized
    /// first so every integration gate differentiates away, and constant
    /// sub-expressions of the result are folded.
    pub fn derive(&self) -> Result<Circuit> {
        self.checked_output()?;
        let mut result = self.operand_copy();
        result.normalize()?;
        let output = result.checked_output()?.to_string();
        let mut memo: BTreeMap<String, String> = BTreeMap::new();
        let mut visiting: Vec<String> = Vec::new();
        let d_out = derive_gate(&mut result, &output, &mut memo, &mut visiting)?;
        result.set_output(d_out);
        result.fold_constants();
        Ok(result)
    }

    /// New circuit computing `1 / self`.
    ///
    /// With `a0 = self(0)` and `d = self'`, the inverse `z` satisfies
    /// `z' = -d z²` with `z(0) = 1 / a0`. Fails when `a0 = 0`.
    pub fn inverted(&self) -> Result<Circuit> {
        let a0 = self.value_at(0.0)?;
        if a0 == 0.0 {
            return Err(Error::InverseAtZero(self.name().to_string()));
        }
        let mut result = self.derive()?;
        let d_out = result.checked_output()?.to_string();
        let z = result.mint_name();
        let z2 = result.add_gate_unchecked(None, Gate::prod(&z, &z));
        let neg = result.find_or_add_constant(-1.0);
        let dz2 = result.add_gate_unchecked(None, Gate::prod(&d_out, &z2));
        let integrand = result.add_gate_unchecked(None, Gate::prod(&neg, &dz2));
        result.add_gate_unchecked(Some(&z), Gate::int(integrand, TIME));
        result.set_init_value(&z, 1.0 / a0)?;
        result.set_output(z);
        Ok(result)
    }

    /// New circuit computing the `n`-fold composition of `self` with itself,
    /// by repeated squaring. `iterate(0)` is the identity.
    pub fn iterate(&self, n: u32) -> Result<Circuit> {
        match n {
            0 => {
                let mut id = Circuit::new("Id");
                id.set_output(TIME);
                Ok(id.into_block("Id"))
            }
            1 => Ok(self.operand_copy()),
            _ => {
                let half = self.iterate(n / 2)?;
                let squared = half.compose(&half)?;
                if n % 2 == 1 {
                    self.compose(&squared)
                } else {
                    Ok(squared)
                }
            }
        }
    }
}

/// Build the derivative gate of `name` inside `circuit`, memoizing per gate.
/// Returns the name of the gate computing the derivative.
fn derive_gate(
    circuit: &mut Circuit,
    name: &str,
    memo: &mut BTreeMap<String, String>,
    visiting: &mut Vec<String>,
) -> Result<String> {
    if let Some(d) = memo.get(name) {
        return Ok(d.clone());
    }
    if visiting.iter().any(|n| n == name) {
        // a cycle through algebraic gates cannot be differentiated
        return Err(Error::Propagation(name.to_string()));
    }
    visiting.push(name.to_string());

    let derived = if name == TIME {
        circuit.find_or_add_constant(1.0)
    } else {
        match circuit
            .gate(name)
            .cloned()
            .ok_or_else(|| Error::UnknownGate(name.to_string()))?
        {
            Gate::Constant(_) => circuit.find_or_add_constant(0.0),
            Gate::Add(b) => {
                let dx = derive_gate(circuit, &b.x, memo, visiting)?;
                let dy = derive_gate(circuit, &b.y, memo, visiting)?;
                circuit.add_gate_unchecked(None, Gate::add(dx, dy))
            }
            Gate::Prod(b) => {
                let dx = derive_gate(circuit, &b.x, memo, visiting)?;
                let dy = derive_gate(circuit, &b.y, memo, visiting)?;
                let p1 = circuit.add_gate_unchecked(None, Gate::prod(dx, &b.y));
                let p2 = circuit.add_gate_unchecked(None, Gate::prod(&b.x, dy));
                circuit.add_gate_unchecked(None, Gate::add(p1, p2))
            }
            Gate::Int(b) => {
                if b.y != TIME {
                    return Err(Error::NotNormalized(name.to_string()));
                }
                b.x
            }
        }
    };

    visiting.pop();
    memo.insert(name.to_string(), derived.clone());
    Ok(derived)
}

// ----- operator sugar -----

impl Add<&Circuit> for &Circuit {
    type Output = Circuit;

    /// Panics when an operand has no output gate; see [`Circuit::sum`].
    fn add(self, rhs: &Circuit) -> Circuit {
        self.sum(rhs).expect("adding circuits with outputs set")
    }
}

impl Mul<&Circuit> for &Circuit {
    type Output = Circuit;

    /// Panics when an operand has no output gate; see [`Circuit::product`].
    fn mul(self, rhs: &Circuit) -> Circuit {
        self.product(rhs)
            .expect("multiplying circuits with outputs set")
    }
}

impl Sub<&Circuit> for &Circuit {
    type Output = Circuit;

    /// Panics when an operand has no output gate; see
    /// [`Circuit::difference`].
    fn sub(self, rhs: &Circuit) -> Circuit {
        self.difference(rhs)
            .expect("subtracting circuits with outputs set")
    }
}

impl Div<&Circuit> for &Circuit {
    type Output = Circuit;

    /// Panics when the divisor has no output or is 0 at `t = 0`; see
    /// [`Circuit::quotient`].
    fn div(self, rhs: &Circuit) -> Circuit {
        self.quotient(rhs)
            .expect("dividing by a circuit that is invertible at 0")
    }
}

impl Add<f64> for &Circuit {
    type Output = Circuit;

    fn add(self, c: f64) -> Circuit {
        self.plus_const(c)
            .expect("adding a constant to a circuit with an output set")
    }
}

impl Add<&Circuit> for f64 {
    type Output = Circuit;

    fn add(self, rhs: &Circuit) -> Circuit {
        rhs + self
    }
}

impl Mul<f64> for &Circuit {
    type Output = Circuit;

    fn mul(self, c: f64) -> Circuit {
        self.times_const(c)
            .expect("scaling a circuit with an output set")
    }
}

impl Mul<&Circuit> for f64 {
    type Output = Circuit;

    fn mul(self, rhs: &Circuit) -> Circuit {
        rhs * self
    }
}
