//! ODE driver: turn a finalized circuit into a vector field and integrate
//! it with a classical fixed-step fourth-order Runge–Kutta method.
//!
//! A finalized circuit defines the system `x_i' = X_i(x, t)` where `x_i` is
//! the value of the i-th integration gate (in [`Circuit::int_gates`] order)
//! and `X_i` is the sub-DAG rooted at that gate's integrand. Evaluating the
//! field assigns the state vector and `t` into a value table, propagates
//! through addition and product gates to a fixpoint, and reads the integrand
//! values back out. A gate left without a value at the fixpoint means the
//! user closed a cycle through algebraic gates, which is a hard error.

use std::collections::HashMap;

use log::warn;
use nalgebra::DVector;

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::gate::{Gate, TIME};

/// Recorded output trajectory of a simulation: one `(t, output)` pair per
/// step boundary, both ends of the interval included.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Last recorded output value.
    pub fn last(&self) -> Option<(f64, f64)> {
        match (self.times.last(), self.values.last()) {
            (Some(&t), Some(&v)) => Some((t, v)),
            _ => None,
        }
    }
}

/// Integration parameters: integrate over `[t_start, t_stop]` with fixed
/// step `dt`. A negative step integrates backwards (`t_stop < t_start`).
#[derive(Debug, Clone)]
pub struct SimulateParams {
    pub t_start: f64,
    pub t_stop: f64,
    pub dt: f64,
}

impl SimulateParams {
    pub fn new(t_start: f64, t_stop: f64, dt: f64) -> Self {
        Self {
            t_start,
            t_stop,
            dt,
        }
    }

    fn steps(&self) -> usize {
        let n = ((self.t_stop - self.t_start) / self.dt).round();
        if n.is_finite() && n > 0.0 {
            n as usize
        } else {
            0
        }
    }
}

/// Per-run table of gate values, seeded with the constants of one circuit.
struct Evaluator<'c> {
    circuit: &'c Circuit,
    values: HashMap<String, f64>,
}

impl<'c> Evaluator<'c> {
    fn new(circuit: &'c Circuit) -> Self {
        let mut values = HashMap::new();
        for (name, gate) in circuit.gates() {
            if let Some(v) = gate.as_constant() {
                values.insert(name.to_string(), v);
            }
        }
        Self { circuit, values }
    }

    /// Drop everything except constants, then assign the integration-gate
    /// state and the time variable.
    fn reset(&mut self, state: &DVector<f64>, t: f64) {
        let circuit = self.circuit;
        self.values
            .retain(|name, _| circuit.gate(name).is_some_and(Gate::is_constant));
        for (i, name) in circuit.int_gates().iter().enumerate() {
            self.values.insert(name.clone(), state[i]);
        }
        self.values.insert(TIME.to_string(), t);
    }

    /// Propagate known values through addition and product gates until every
    /// gate has one.
    fn propagate(&mut self) -> Result<()> {
        let mut changed = true;
        while changed {
            changed = false;
            for (name, gate) in self.circuit.gates() {
                if self.values.contains_key(name) {
                    continue;
                }
                let Some(b) = gate.as_binary() else {
                    continue;
                };
                if gate.is_int() {
                    continue;
                }
                if let (Some(&x), Some(&y)) = (self.values.get(&b.x), self.values.get(&b.y)) {
                    if let Some(v) = gate.eval(x, y) {
                        self.values.insert(name.to_string(), v);
                        changed = true;
                    }
                }
            }
        }
        for (name, _) in self.circuit.gates() {
            if !self.values.contains_key(name) {
                return Err(Error::Propagation(name.to_string()));
            }
        }
        Ok(())
    }

    fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Evaluate the vector field at `(state, t)`.
    fn vector_field(&mut self, state: &DVector<f64>, t: f64, dydt: &mut DVector<f64>) -> Result<()> {
        self.reset(state, t);
        self.propagate()?;
        for (i, name) in self.circuit.int_gates().iter().enumerate() {
            let integrand = match self.circuit.as_int(name) {
                Some(b) => b.x.clone(),
                None => return Err(Error::NotAnIntGate(name.clone())),
            };
            dydt[i] = self
                .value(&integrand)
                .ok_or(Error::Propagation(integrand))?;
        }
        Ok(())
    }
}

fn initial_state(circuit: &Circuit) -> Result<DVector<f64>> {
    let mut y = DVector::zeros(circuit.int_gates().len());
    for (i, name) in circuit.int_gates().iter().enumerate() {
        y[i] = circuit
            .init_value(name)
            .ok_or_else(|| Error::MissingInitValue(name.clone()))?;
    }
    Ok(y)
}

fn require_finalized(circuit: &Circuit) -> Result<()> {
    if !circuit.is_finalized() {
        warn!(
            "circuit {:?} is not finalized, refusing to simulate",
            circuit.name()
        );
        return Err(Error::NotFinalized(circuit.name().to_string()));
    }
    Ok(())
}

/// One classical Runge–Kutta step of size `dt` from `(t, y)`.
fn rk4_step(ev: &mut Evaluator<'_>, t: f64, dt: f64, y: &DVector<f64>) -> Result<DVector<f64>> {
    let n = y.len();
    let mut k1 = DVector::zeros(n);
    let mut k2 = DVector::zeros(n);
    let mut k3 = DVector::zeros(n);
    let mut k4 = DVector::zeros(n);

    ev.vector_field(y, t, &mut k1)?;
    ev.vector_field(&(y + &k1 * (dt / 2.0)), t + dt / 2.0, &mut k2)?;
    ev.vector_field(&(y + &k2 * (dt / 2.0)), t + dt / 2.0, &mut k3)?;
    ev.vector_field(&(y + &k3 * dt), t + dt, &mut k4)?;

    Ok(y + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0))
}

/// Integrate a finalized circuit, returning the final integration-gate
/// state.
pub fn simulate(circuit: &Circuit, params: &SimulateParams) -> Result<DVector<f64>> {
    require_finalized(circuit)?;
    let mut ev = Evaluator::new(circuit);
    let mut y = initial_state(circuit)?;
    let mut t = params.t_start;
    for _ in 0..params.steps() {
        y = rk4_step(&mut ev, t, params.dt, &y)?;
        t += params.dt;
    }
    Ok(y)
}

/// Integrate a finalized circuit, recording the output gate's value at
/// every step boundary.
pub fn simulate_observed(circuit: &Circuit, params: &SimulateParams) -> Result<TimeSeries> {
    require_finalized(circuit)?;
    let output = circuit.checked_output()?.to_string();
    let mut ev = Evaluator::new(circuit);
    let mut y = initial_state(circuit)?;
    let mut t = params.t_start;
    let mut series = TimeSeries::default();

    let observe =
        |ev: &mut Evaluator<'_>, y: &DVector<f64>, t: f64, series: &mut TimeSeries| -> Result<()> {
            ev.reset(y, t);
            ev.propagate()?;
            let v = ev
                .value(&output)
                .ok_or_else(|| Error::Propagation(output.clone()))?;
            series.times.push(t);
            series.values.push(v);
            Ok(())
        };

    observe(&mut ev, &y, t, &mut series)?;
    for _ in 0..params.steps() {
        y = rk4_step(&mut ev, t, params.dt, &y)?;
        t += params.dt;
        observe(&mut ev, &y, t, &mut series)?;
    }
    Ok(series)
}

/// Integrate a finalized circuit from 0 to `t_end` and report the end-state
/// keyed by integration-gate name. Used by the composition operator to
/// propagate initial values; `t_end` may be negative.
pub fn end_state(
    circuit: &Circuit,
    t_end: f64,
    steps: usize,
) -> Result<std::collections::BTreeMap<String, f64>> {
    require_finalized(circuit)?;
    let steps = steps.max(1);
    let params = SimulateParams::new(0.0, t_end, t_end / steps as f64);
    let y = simulate(circuit, &params)?;
    Ok(circuit
        .int_gates()
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), y[i]))
        .collect())
}

impl Circuit {
    /// Evaluate the output at time `t` with every integration gate pinned to
    /// its initial value. At `t = 0` this is the circuit's initial output;
    /// the circuit need not be finalized, but every integration gate must
    /// have an initial value and the output must be set.
    pub fn value_at(&self, t: f64) -> Result<f64> {
        let output = self.checked_output()?;
        let mut ev = Evaluator::new(self);
        for (name, gate) in self.gates() {
            if gate.is_int() {
                let v = self
                    .init_value(name)
                    .ok_or_else(|| Error::MissingInitValue(name.to_string()))?;
                ev.values.insert(name.to_string(), v);
            }
        }
        ev.values.insert(TIME.to_string(), t);
        ev.propagate()?;
        ev.value(output)
            .ok_or_else(|| Error::Propagation(output.to_string()))
    }
}
