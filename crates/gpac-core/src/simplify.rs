//! Simplification, structural validation and finalization.
//!
//! Simplification runs four passes in order: constant folding, dead-gate
//! elimination, input canonicalization for the commutative gates, and
//! common-subexpression elimination to a fixpoint. All passes preserve the
//! function computed by the output gate.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info};

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::gate::{Gate, GateKind, TIME};

/// Ordering that keeps user-defined names alive when merging duplicates:
/// names without a leading underscore sort before generated ones,
/// lexicographic within each group.
fn prefer_user_names(a: &String, b: &String) -> std::cmp::Ordering {
    match (a.starts_with('_'), b.starts_with('_')) {
        (false, true) => std::cmp::Ordering::Less,
        (true, false) => std::cmp::Ordering::Greater,
        _ => a.cmp(b),
    }
}

/// Placeholder for an input that names its own gate, so that two
/// self-referential gates (`e = int e d(t)` and `f = int f d(t)`) compare
/// equal and can be merged.
const SELF: &str = "\u{1}self";

fn input_key(gate_name: &str, input: &str) -> String {
    if input == gate_name {
        SELF.to_string()
    } else {
        input.to_string()
    }
}

impl Circuit {
    /// Replace every gate whose whole upstream cone is constant (no `t`, no
    /// integration gate) by a single constant gate with the evaluated value.
    pub(crate) fn fold_constants(&mut self) {
        let mut memo = BTreeMap::new();
        let names = self.gate_names();
        for name in names {
            if self.gate(&name).is_some_and(Gate::is_constant) {
                continue;
            }
            if self.is_constant_subexpr(&name, &mut memo) {
                if let Some(v) = self.eval_constant(&name) {
                    debug!("fold {} = {}", name, v);
                    self.replace_gate(&name, Gate::Constant(v));
                }
            }
        }
    }

    /// Evaluate a constant sub-expression. `None` if the cone reaches `t`,
    /// an integration gate or a missing gate.
    fn eval_constant(&self, name: &str) -> Option<f64> {
        match self.gate(name)? {
            Gate::Constant(v) => Some(*v),
            Gate::Add(b) => Some(self.eval_constant(&b.x)? + self.eval_constant(&b.y)?),
            Gate::Prod(b) => Some(self.eval_constant(&b.x)? * self.eval_constant(&b.y)?),
            Gate::Int(_) => None,
        }
    }

    /// Erase every gate not reachable from the output by input edges.
    pub(crate) fn eliminate_dead_gates(&mut self) {
        let Some(output) = self.output().map(str::to_string) else {
            return;
        };
        let mut reachable: BTreeSet<String> = BTreeSet::new();
        let mut stack = vec![output];
        while let Some(name) = stack.pop() {
            if name == TIME || !reachable.insert(name.clone()) {
                continue;
            }
            if let Some(b) = self.as_binary(&name) {
                stack.push(b.x.clone());
                stack.push(b.y.clone());
            }
        }
        let dead: Vec<String> = self
            .gate_names()
            .into_iter()
            .filter(|n| !reachable.contains(n))
            .collect();
        for name in &dead {
            self.erase_gate(name);
        }
        if !dead.is_empty() {
            debug!("circuit {}: erased {} unreachable gates", self.name(), dead.len());
        }
    }

    /// Order the inputs of addition and product gates so equal gates become
    /// syntactically equal.
    pub(crate) fn canonicalize_inputs(&mut self) {
        for (_, gate) in self.gates_mut() {
            if matches!(gate.kind(), GateKind::Add | GateKind::Prod) {
                if let Some(b) = gate.as_binary_mut() {
                    if b.x > b.y {
                        std::mem::swap(&mut b.x, &mut b.y);
                    }
                }
            }
        }
    }

    /// Merge duplicate gates until a fixpoint: constants with equal values,
    /// binary gates of the same kind with identical inputs — integration
    /// gates additionally need equal initial values. Inputs that name their
    /// own gate are compared as a self marker, so two copies of a
    /// self-referential integrator merge as well.
    pub(crate) fn merge_duplicates(&mut self) {
        loop {
            let mut renames: BTreeMap<String, String> = BTreeMap::new();

            let mut constants: Vec<String> = Vec::new();
            let mut binaries: Vec<String> = Vec::new();
            for (name, gate) in self.gates() {
                if gate.is_constant() {
                    constants.push(name.to_string());
                } else {
                    binaries.push(name.to_string());
                }
            }
            constants.sort_by(prefer_user_names);
            binaries.sort_by(prefer_user_names);

            let mut const_survivors: HashMap<u64, String> = HashMap::new();
            for name in constants {
                let Some(v) = self.as_constant(&name) else {
                    continue;
                };
                match const_survivors.entry(v.to_bits()) {
                    std::collections::hash_map::Entry::Occupied(e) => {
                        renames.insert(name, e.get().clone());
                    }
                    std::collections::hash_map::Entry::Vacant(e) => {
                        e.insert(name);
                    }
                }
            }

            type BinaryKey = (GateKind, String, String, Option<u64>);
            let mut binary_survivors: HashMap<BinaryKey, String> = HashMap::new();
            for name in binaries {
                let Some(gate) = self.gate(&name) else {
                    continue;
                };
                let Some(b) = gate.as_binary() else {
                    continue;
                };
                let iv = if gate.is_int() {
                    self.init_value(&name).map(f64::to_bits)
                } else {
                    None
                };
                let key = (
                    gate.kind(),
                    input_key(&name, &b.x),
                    input_key(&name, &b.y),
                    iv,
                );
                match binary_survivors.entry(key) {
                    std::collections::hash_map::Entry::Occupied(e) => {
                        renames.insert(name, e.get().clone());
                    }
                    std::collections::hash_map::Entry::Vacant(e) => {
                        e.insert(name);
                    }
                }
            }

            if renames.is_empty() {
                return;
            }
            debug!("circuit {}: merging {} duplicate gates", self.name(), renames.len());

            for (_, gate) in self.gates_mut() {
                if let Some(b) = gate.as_binary_mut() {
                    if let Some(new) = renames.get(&b.x) {
                        b.x = new.clone();
                    }
                    if let Some(new) = renames.get(&b.y) {
                        b.y = new.clone();
                    }
                }
            }
            if let Some(out) = self.output().map(str::to_string) {
                if let Some(new) = renames.get(&out) {
                    self.set_output(new.clone());
                }
            }
            for loser in renames.keys() {
                self.erase_gate(loser);
            }
        }
    }

    /// Run all simplification passes. No-op on a finalized circuit.
    pub fn simplify(&mut self) {
        if self.is_finalized() {
            return;
        }
        let before = self.len();
        self.fold_constants();
        self.eliminate_dead_gates();
        self.canonicalize_inputs();
        self.merge_duplicates();
        let removed = before.saturating_sub(self.len());
        if removed > 0 {
            debug!("circuit {}: simplification removed {} gates", self.name(), removed);
        }
    }

    /// Check structural correctness: every binary input is `t` or a gate of
    /// the circuit, every integration gate runs over `t`, and the output is
    /// designated and present.
    pub fn validate(&self) -> Result<()> {
        if self.is_finalized() {
            return Ok(());
        }
        for (name, gate) in self.gates() {
            if !self.validation() {
                // names were not checked on insertion
                if name.is_empty() {
                    return Err(Error::EmptyName);
                }
                if name == TIME {
                    return Err(Error::ReservedTime);
                }
            }
            let Some(b) = gate.as_binary() else {
                continue;
            };
            for input in [&b.x, &b.y] {
                if input != TIME && !self.has(input) {
                    return Err(Error::MissingInput {
                        gate: name.to_string(),
                        input: input.to_string(),
                    });
                }
            }
            if gate.is_int() && b.y != TIME {
                if self.gate(&b.y).is_some_and(Gate::is_constant) {
                    return Err(Error::ConstantDifferential(name.to_string()));
                }
                return Err(Error::NotNormalized(name.to_string()));
            }
        }
        match self.output() {
            None => Err(Error::NoOutput),
            Some(out) if out != TIME && !self.has(out) => {
                Err(Error::InvalidOutput(out.to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    /// Prepare the circuit for simulation: normalize, simplify and validate
    /// it, check that every integration gate has an initial value, and cache
    /// the ordered list of integration gates as the state vector.
    ///
    /// Idempotent: a finalized circuit is returned unchanged. Any mutation
    /// clears the finalized flag again.
    pub fn finalize(&mut self) -> Result<()> {
        self.finalize_with(true)
    }

    /// [`Circuit::finalize`] with the simplification pass made optional.
    pub fn finalize_with(&mut self, simplification: bool) -> Result<()> {
        if self.is_finalized() {
            return Ok(());
        }
        self.normalize()?;
        if simplification {
            self.simplify();
        }
        self.validate()?;

        let mut int_gates = Vec::new();
        for (name, gate) in self.gates() {
            if gate.is_int() {
                if self.init_value(name).is_none() {
                    return Err(Error::MissingInitValue(name.to_string()));
                }
                int_gates.push(name.to_string());
            }
        }
        info!(
            "finalized circuit {:?}: {} gates, {} integrators",
            self.name(),
            self.len(),
            int_gates.len()
        );
        self.set_finalized(int_gates);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_circuit(name: &str) -> Circuit {
        let mut c = Circuit::new(name);
        c.add_int(Some("e"), "e", "t").unwrap();
        c.set_init_value("e", 1.0).unwrap();
        c.set_output("e");
        c
    }

    #[test]
    fn test_fold_constants() {
        let mut c = Circuit::new("test");
        c.add_const(Some("two"), 2.0).unwrap();
        c.add_const(Some("three"), 3.0).unwrap();
        c.add_prod(Some("p"), "two", "three").unwrap();
        c.add_add(Some("s"), "p", "two").unwrap();
        c.add_add(Some("out"), "s", "t").unwrap();
        c.set_output("out");

        c.fold_constants();
        assert_eq!(c.as_constant("s"), Some(8.0));
        assert_eq!(c.as_constant("p"), Some(6.0));
        // gate mixing in t is untouched
        assert!(c.as_add("out").is_some());
    }

    #[test]
    fn test_dead_gate_elimination() {
        let mut c = Circuit::new("test");
        c.add_const(Some("used"), 1.0).unwrap();
        c.add_const(Some("unused"), 2.0).unwrap();
        c.add_add(Some("out"), "used", "t").unwrap();
        c.set_output("out");

        c.eliminate_dead_gates();
        assert!(c.has("used"));
        assert!(!c.has("unused"));
    }

    #[test]
    fn test_canonicalization_orders_commutative_inputs() {
        let mut c = Circuit::new("test");
        c.add_const(Some("a"), 1.0).unwrap();
        c.add_const(Some("b"), 2.0).unwrap();
        c.add_add(Some("s"), "b", "a").unwrap();
        c.add_int(Some("i"), "b", "t").unwrap();
        c.set_output("s");

        c.canonicalize_inputs();
        let s = c.as_add("s").unwrap();
        assert_eq!((s.x.as_str(), s.y.as_str()), ("a", "b"));
        // integration gates are not commutative and keep their order
        let i = c.as_int("i").unwrap();
        assert_eq!((i.x.as_str(), i.y.as_str()), ("b", "t"));
    }

    #[test]
    fn test_merge_constants_prefers_user_names() {
        let mut c = Circuit::new("test");
        c.set_validation(false);
        c.add_const(Some("_4"), 1.0).unwrap();
        c.add_const(Some("one"), 1.0).unwrap();
        c.add_add(Some("s"), "_4", "one").unwrap();
        c.set_output("s");

        c.merge_duplicates();
        assert!(c.has("one"));
        assert!(!c.has("_4"));
        let s = c.as_add("s").unwrap();
        assert_eq!((s.x.as_str(), s.y.as_str()), ("one", "one"));
    }

    /// Two copies of a self-referential integrator are recognized as equal.
    #[test]
    fn test_merge_self_referential_integrators() {
        let mut sum = exp_circuit("a").sum(&exp_circuit("b")).unwrap();
        sum.simplify();
        let ints: Vec<_> = sum.gates().filter(|(_, g)| g.is_int()).collect();
        let adds: Vec<_> = sum
            .gates()
            .filter(|(_, g)| g.kind() == GateKind::Add)
            .collect();
        assert_eq!(ints.len(), 1, "duplicate integrators should merge");
        assert_eq!(adds.len(), 1);
        assert_eq!(ints[0].0, "e", "the user-named copy survives");
    }

    /// Integration gates with different initial values must not merge.
    #[test]
    fn test_int_merge_requires_equal_init_values() {
        let mut c = Circuit::new("test");
        c.add_int(Some("i"), "w", "t").unwrap();
        c.add_int(Some("j"), "w", "t").unwrap();
        c.add_const(Some("w"), 1.0).unwrap();
        c.set_init_value("i", 0.0).unwrap();
        c.set_init_value("j", 1.0).unwrap();
        c.add_add(Some("out"), "i", "j").unwrap();
        c.set_output("out");

        c.merge_duplicates();
        assert!(c.has("i") && c.has("j"));

        c.set_init_value("j", 0.0).unwrap();
        c.merge_duplicates();
        assert!(c.has("i") && !c.has("j"));
        assert_eq!(c.gates().filter(|(_, g)| g.is_int()).count(), 1);
    }

    #[test]
    fn test_validate_rejects_missing_input() {
        let mut c = Circuit::new("test");
        c.add_add(Some("s"), "ghost", "t").unwrap();
        c.set_output("s");
        assert!(matches!(
            c.validate(),
            Err(Error::MissingInput { .. })
        ));
    }

    #[test]
    fn test_validate_requires_output() {
        let mut c = Circuit::new("test");
        c.add_const(Some("c"), 1.0).unwrap();
        assert!(matches!(c.validate(), Err(Error::NoOutput)));
        c.set_output("ghost");
        assert!(matches!(c.validate(), Err(Error::InvalidOutput(_))));
        c.set_output("t");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_finalize_requires_init_values() {
        let mut c = Circuit::new("test");
        c.add_int(Some("g"), "g", "t").unwrap();
        c.set_output("g");
        assert!(matches!(c.finalize(), Err(Error::MissingInitValue(_))));
        c.set_init_value("g", 1.0).unwrap();
        c.finalize().unwrap();
        assert!(c.is_finalized());
        assert_eq!(c.int_gates(), ["g".to_string()]);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut c = exp_circuit("exp");
        c.finalize().unwrap();
        let gates = c.gate_names();
        c.finalize().unwrap();
        assert_eq!(c.gate_names(), gates);
        assert!(c.is_finalized());
    }

    #[test]
    fn test_mutation_clears_finalized() {
        let mut c = exp_circuit("exp");
        c.finalize().unwrap();
        c.add_const(Some("c"), 1.0).unwrap();
        assert!(!c.is_finalized());
    }

    #[test]
    fn test_finalize_reports_non_normalizable() {
        let mut c = Circuit::new("test");
        c.set_validation(false);
        c.add_const(Some("c"), 1.0).unwrap();
        c.add_int(Some("g"), "t", "c").unwrap();
        c.set_output("g");
        assert!(matches!(c.finalize(), Err(Error::NonNormalizable(_))));
    }
}
