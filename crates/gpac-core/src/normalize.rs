//! Normalization: rewrite every integration gate to integrate with respect
//! to `t`.
//!
//! An integration gate `g = int w d(y)` with `y != t` is rewritten by case
//! analysis on `y`:
//!
//! 1. `y = int u d(t)`: then `g = int (u * w) d(t)`.
//! 2. `y = u * v`: if one factor is a constant sub-expression `c`,
//!    `g = int (c * w) d(other)`; otherwise `g` splits into
//!    `int (u * w) d(v) + int (w * v) d(u)`.
//! 3. `y = u + v`: if one term is a constant sub-expression it is dropped
//!    (`d(u + c) = d(u)`); otherwise `g` splits into
//!    `int w d(u) + int w d(v)`.
//!
//! Splits hand each successor half of the parent's initial value. Pending
//! gates are processed smallest-rewrite-first: gates falling under case 1
//! before case 2 before case 3, ties broken lexicographically. The priority
//! of every pending gate is re-evaluated against the current circuit at each
//! pop, so rewrites that change a gate's case are picked up immediately.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::gate::{Gate, TIME};

/// Rewrite priority of a pending integration gate; lower is handled first.
fn rewrite_rank(circuit: &Circuit, name: &str) -> u8 {
    let Some(b) = circuit.as_int(name) else {
        return u8::MAX;
    };
    match circuit.gate(&b.y) {
        Some(Gate::Int(inner)) if inner.y == TIME => 0,
        Some(Gate::Prod(_)) => 1,
        Some(Gate::Add(_)) => 2,
        _ => 3,
    }
}

/// Remove and return the highest-priority pending gate, ignoring entries
/// that a previous rewrite already normalized or replaced.
fn pop_pending(circuit: &Circuit, pending: &mut BTreeSet<String>) -> Option<String> {
    let best = pending
        .iter()
        .filter(|n| circuit.as_int(n).is_some_and(|b| b.y != TIME))
        .min_by_key(|n| (rewrite_rank(circuit, n), n.as_str().to_string()))
        .cloned();
    match best {
        Some(name) => {
            pending.remove(&name);
            Some(name)
        }
        None => {
            pending.clear();
            None
        }
    }
}

impl Circuit {
    /// True if the entire sub-DAG above `name` consists of constant,
    /// addition and product gates only: no `t`, no integration gate.
    ///
    /// Results are memoized per gate; a cycle through addition or product
    /// gates (invalid, caught later by value propagation) reports `false`.
    pub(crate) fn is_constant_subexpr(
        &self,
        name: &str,
        memo: &mut BTreeMap<String, bool>,
    ) -> bool {
        if name == TIME {
            return false;
        }
        if let Some(&known) = memo.get(name) {
            return known;
        }
        // Seed with false so a cycle terminates as non-constant.
        memo.insert(name.to_string(), false);
        let result = match self.gate(name) {
            Some(Gate::Constant(_)) => true,
            Some(Gate::Add(b)) | Some(Gate::Prod(b)) => {
                let (x, y) = (b.x.clone(), b.y.clone());
                self.is_constant_subexpr(&x, memo) && self.is_constant_subexpr(&y, memo)
            }
            Some(Gate::Int(_)) | None => false,
        };
        memo.insert(name.to_string(), result);
        result
    }

    /// Rewrite the circuit so that every integration gate has `t` as its
    /// differential variable. No-op on a finalized circuit.
    pub fn normalize(&mut self) -> Result<()> {
        if self.is_finalized() {
            return Ok(());
        }

        let mut pending: BTreeSet<String> = self
            .gates()
            .filter_map(|(name, gate)| match gate {
                Gate::Int(b) if b.y != TIME => Some(name.to_string()),
                _ => None,
            })
            .collect();
        let mut const_memo: BTreeMap<String, bool> = BTreeMap::new();

        while let Some(name) = pop_pending(self, &mut pending) {
            let b = match self.as_int(&name) {
                Some(b) => b.clone(),
                None => continue,
            };
            let w = b.x;
            let y_gate = self.gate(&b.y).cloned();
            match y_gate {
                // Case 1: y is an already-normalized integration gate.
                Some(Gate::Int(inner)) if inner.y == TIME => {
                    debug!("normalize {}: absorbing integrator {}", name, b.y);
                    let prod = self.add_gate_unchecked(None, Gate::prod(&inner.x, &w));
                    if let Some(g) = self.gate_mut(&name) {
                        *g = Gate::int(prod, TIME);
                    }
                }
                // Case 2: y is a product gate.
                Some(Gate::Prod(inner)) => {
                    let (u, v) = (inner.x, inner.y);
                    let const_u = self.is_constant_subexpr(&u, &mut const_memo);
                    let const_v = self.is_constant_subexpr(&v, &mut const_memo);
                    if const_u || const_v {
                        // d(c * v) = c * d(v): move the constant factor into
                        // the integrand.
                        let (c, other) = if const_u { (u, v) } else { (v, u) };
                        debug!("normalize {}: moving constant factor {} inward", name, c);
                        let prod = self.add_gate_unchecked(None, Gate::prod(&c, &w));
                        if let Some(g) = self.gate_mut(&name) {
                            *g = Gate::int(prod, &other);
                        }
                        if other != TIME {
                            pending.insert(name);
                        }
                    } else {
                        // d(u * v) = u d(v) + v d(u): split.
                        debug!("normalize {}: splitting over product {}", name, b.y);
                        let p1 = self.add_gate_unchecked(None, Gate::prod(&u, &w));
                        let p2 = self.add_gate_unchecked(None, Gate::prod(&w, &v));
                        let i1 = self.add_gate_unchecked(None, Gate::int(p1, &v));
                        let i2 = self.add_gate_unchecked(None, Gate::int(p2, &u));
                        self.split_init_value(&name, &i1, &i2)?;
                        if v != TIME {
                            pending.insert(i1.clone());
                        }
                        if u != TIME {
                            pending.insert(i2.clone());
                        }
                        if let Some(g) = self.gate_mut(&name) {
                            *g = Gate::add(i1, i2);
                        }
                    }
                }
                // Case 3: y is an addition gate.
                Some(Gate::Add(inner)) => {
                    let (u, v) = (inner.x, inner.y);
                    let const_u = self.is_constant_subexpr(&u, &mut const_memo);
                    let const_v = self.is_constant_subexpr(&v, &mut const_memo);
                    if const_u || const_v {
                        // d(u + c) = d(u): drop the constant term.
                        let keep = if const_u { v } else { u };
                        debug!("normalize {}: dropping constant term of {}", name, b.y);
                        if let Some(g) = self.gate_mut(&name) {
                            *g = Gate::int(&w, &keep);
                        }
                        if keep != TIME {
                            pending.insert(name);
                        }
                    } else {
                        // d(u + v) = d(u) + d(v): split.
                        debug!("normalize {}: splitting over sum {}", name, b.y);
                        let i1 = self.add_gate_unchecked(None, Gate::int(&w, &u));
                        let i2 = self.add_gate_unchecked(None, Gate::int(&w, &v));
                        self.split_init_value(&name, &i1, &i2)?;
                        if u != TIME {
                            pending.insert(i1.clone());
                        }
                        if v != TIME {
                            pending.insert(i2.clone());
                        }
                        if let Some(g) = self.gate_mut(&name) {
                            *g = Gate::add(i1, i2);
                        }
                    }
                }
                // A standalone constant (or missing) differential variable
                // cannot be rewritten.
                _ => return Err(Error::NonNormalizable(name)),
            }
        }
        Ok(())
    }

    /// Hand half of a split gate's initial value to each successor. The
    /// parent stops being an integration gate, so its entry is removed.
    fn split_init_value(&mut self, parent: &str, i1: &str, i2: &str) -> Result<()> {
        if let Some(iv) = self.remove_init_value(parent) {
            self.set_init_value(i1, 0.5 * iv)?;
            self.set_init_value(i2, 0.5 * iv)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// exp-like integrator already over t is untouched.
    #[test]
    fn test_normalized_circuit_is_untouched() {
        let mut c = Circuit::new("test");
        c.add_int(Some("e"), "e", "t").unwrap();
        c.set_init_value("e", 1.0).unwrap();
        c.set_output("e");
        let before = c.gate_names();
        c.normalize().unwrap();
        assert_eq!(c.gate_names(), before);
    }

    /// Case 1: int over an integrator becomes int over t with a product
    /// integrand.
    #[test]
    fn test_case1_absorbs_inner_integrator() {
        let mut c = Circuit::new("test");
        c.add_int(Some("inner"), "w", "t").unwrap();
        c.add_const(Some("w"), 2.0).unwrap();
        c.add_int(Some("g"), "w", "inner").unwrap();
        c.set_init_value("inner", 0.0).unwrap();
        c.set_init_value("g", 0.0).unwrap();
        c.set_output("g");

        c.normalize().unwrap();

        let b = c.as_int("g").unwrap();
        assert_eq!(b.y, "t");
        let prod = c.as_prod(&b.x).expect("integrand is a product");
        assert_eq!((prod.x.as_str(), prod.y.as_str()), ("w", "w"));
    }

    /// Case 2 with a constant factor: the factor moves into the integrand
    /// and the gate stays a single integrator.
    #[test]
    fn test_case2_constant_factor() {
        let mut c = Circuit::new("test");
        c.add_const(Some("c"), 3.0).unwrap();
        c.add_prod(Some("p"), "c", "t").unwrap();
        c.add_const(Some("w"), 1.0).unwrap();
        c.set_validation(false);
        c.add_int(Some("g"), "w", "p").unwrap();
        c.set_init_value("g", 0.25).unwrap();
        c.set_output("g");

        c.normalize().unwrap();

        let b = c.as_int("g").unwrap();
        assert_eq!(b.y, "t");
        let prod = c.as_prod(&b.x).expect("integrand is a product");
        assert_eq!((prod.x.as_str(), prod.y.as_str()), ("c", "w"));
        // the gate was rewritten in place, so its initial value is kept
        assert_eq!(c.init_value("g"), Some(0.25));
    }

    /// Case 2 split: g = int w d(u * v) becomes an addition of two new
    /// integrators, each carrying half the initial value.
    #[test]
    fn test_case2_split_halves_init_value() {
        let mut c = Circuit::new("test");
        c.add_int(Some("u"), "u", "t").unwrap();
        c.add_int(Some("v"), "v", "t").unwrap();
        c.set_init_value("u", 1.0).unwrap();
        c.set_init_value("v", 1.0).unwrap();
        c.add_prod(Some("p"), "u", "v").unwrap();
        c.add_const(Some("w"), 1.0).unwrap();
        c.add_int(Some("g"), "w", "p").unwrap();
        c.set_init_value("g", 1.0).unwrap();
        c.set_output("g");

        c.normalize().unwrap();

        let add = c.as_add("g").expect("split gate became an addition");
        let (i1, i2) = (add.x.clone(), add.y.clone());
        assert_eq!(c.init_value(&i1), Some(0.5));
        assert_eq!(c.init_value(&i2), Some(0.5));
        assert!(c.init_value("g").is_none());
        // every integration gate now runs over t
        for (_, gate) in c.gates() {
            if let Gate::Int(b) = gate {
                assert_eq!(b.y, "t");
            }
        }
    }

    /// Case 3 with a constant term: d(u + c) = d(u).
    #[test]
    fn test_case3_drops_constant_term() {
        let mut c = Circuit::new("test");
        c.add_const(Some("c"), 5.0).unwrap();
        c.add_add(Some("s"), "t", "c").unwrap();
        c.add_const(Some("w"), 1.0).unwrap();
        c.add_int(Some("g"), "w", "s").unwrap();
        c.set_init_value("g", 0.0).unwrap();
        c.set_output("g");

        c.normalize().unwrap();

        let b = c.as_int("g").unwrap();
        assert_eq!(b.x, "w");
        assert_eq!(b.y, "t");
    }

    /// A standalone constant differential variable cannot be normalized.
    #[test]
    fn test_constant_differential_fails() {
        let mut c = Circuit::new("test");
        c.set_validation(false);
        c.add_const(Some("c"), 1.0).unwrap();
        c.add_int(Some("g"), "t", "c").unwrap();
        c.set_output("g");

        assert!(matches!(c.normalize(), Err(Error::NonNormalizable(_))));
    }

    #[test]
    fn test_constant_subexpr_detection() {
        let mut c = Circuit::new("test");
        c.add_const(Some("a"), 1.0).unwrap();
        c.add_const(Some("b"), 2.0).unwrap();
        c.add_add(Some("s"), "a", "b").unwrap();
        c.add_prod(Some("p"), "s", "b").unwrap();
        c.add_prod(Some("q"), "s", "t").unwrap();
        c.add_int(Some("i"), "a", "t").unwrap();
        c.add_add(Some("r"), "a", "i").unwrap();

        let mut memo = BTreeMap::new();
        assert!(c.is_constant_subexpr("p", &mut memo));
        assert!(!c.is_constant_subexpr("q", &mut memo), "t in the cone");
        assert!(!c.is_constant_subexpr("r", &mut memo), "integrator in the cone");
        assert!(!c.is_constant_subexpr("t", &mut memo));
    }
}
