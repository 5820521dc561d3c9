//! Circuit container: a named collection of gates with a designated output.
//!
//! Gates are owned exclusively by the circuit and refer to each other by
//! name. The container tracks initial values for integration gates, a
//! per-circuit fresh-name counter for compiler-generated `_k` names, and a
//! `finalized` latch that is cleared by any structural mutation.

use std::collections::BTreeMap;

use log::warn;

use crate::error::{Error, Result};
use crate::gate::{Binary, Gate, GateKind, TIME};

/// An analog circuit: gate table, output designation and integration-gate
/// initial values.
///
/// Iteration over gates is always in lexicographic name order, so every pass
/// over a circuit (normalization, simplification, finalization) is
/// reproducible.
#[derive(Debug, Clone)]
pub struct Circuit {
    name: String,
    gates: BTreeMap<String, Gate>,
    output: Option<String>,
    init_values: BTreeMap<String, f64>,
    validation: bool,
    block: bool,
    finalized: bool,
    int_gates: Vec<String>,
    next_fresh: u64,
}

impl Circuit {
    /// Create an empty circuit with per-insertion name validation enabled.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gates: BTreeMap::new(),
            output: None,
            init_values: BTreeMap::new(),
            validation: true,
            block: false,
            finalized: false,
            int_gates: Vec::new(),
            next_fresh: 0,
        }
    }

    /// Mark this circuit as a builtin block and give it its library name.
    ///
    /// Block circuits keep their name when copied by the construction
    /// operators; user circuits get a `_` suffix to tell copies apart.
    pub fn into_block(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.block = true;
        self
    }

    /// Enable or disable name validation on insertion.
    pub fn set_validation(&mut self, on: bool) {
        self.validation = on;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_block(&self) -> bool {
        self.block
    }

    pub fn validation(&self) -> bool {
        self.validation
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn set_finalized(&mut self, int_gates: Vec<String>) {
        self.int_gates = int_gates;
        self.finalized = true;
    }

    /// Ordered state vector of the finalized circuit: one entry per
    /// integration gate. Empty before finalization.
    pub fn int_gates(&self) -> &[String] {
        &self.int_gates
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// The output gate name, or an error if none has been designated.
    pub fn checked_output(&self) -> Result<&str> {
        self.output.as_deref().ok_or(Error::NoOutput)
    }

    pub fn set_output(&mut self, name: impl Into<String>) {
        self.output = Some(name.into());
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn has(&self, name: &str) -> bool {
        self.gates.contains_key(name)
    }

    pub fn gate(&self, name: &str) -> Option<&Gate> {
        self.gates.get(name)
    }

    pub(crate) fn gate_mut(&mut self, name: &str) -> Option<&mut Gate> {
        self.gates.get_mut(name)
    }

    /// Swap the gate stored under an existing name, keeping the name.
    pub(crate) fn replace_gate(&mut self, name: &str, gate: Gate) {
        self.finalized = false;
        self.gates.insert(name.to_string(), gate);
    }

    pub(crate) fn gates_mut(&mut self) -> impl Iterator<Item = (&String, &mut Gate)> {
        self.finalized = false;
        self.gates.iter_mut()
    }

    /// Iterate over `(name, gate)` pairs in lexicographic name order.
    pub fn gates(&self) -> impl Iterator<Item = (&str, &Gate)> {
        self.gates.iter().map(|(n, g)| (n.as_str(), g))
    }

    /// Gate names in lexicographic order.
    pub fn gate_names(&self) -> Vec<String> {
        self.gates.keys().cloned().collect()
    }

    pub fn as_constant(&self, name: &str) -> Option<f64> {
        self.gates.get(name).and_then(Gate::as_constant)
    }

    pub fn as_binary(&self, name: &str) -> Option<&Binary> {
        self.gates.get(name).and_then(Gate::as_binary)
    }

    pub(crate) fn as_binary_mut(&mut self, name: &str) -> Option<&mut Binary> {
        self.gates.get_mut(name).and_then(Gate::as_binary_mut)
    }

    pub fn as_add(&self, name: &str) -> Option<&Binary> {
        match self.gates.get(name) {
            Some(Gate::Add(b)) => Some(b),
            _ => None,
        }
    }

    pub fn as_prod(&self, name: &str) -> Option<&Binary> {
        match self.gates.get(name) {
            Some(Gate::Prod(b)) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self, name: &str) -> Option<&Binary> {
        match self.gates.get(name) {
            Some(Gate::Int(b)) => Some(b),
            _ => None,
        }
    }

    pub fn kind(&self, name: &str) -> Option<GateKind> {
        self.gates.get(name).map(Gate::kind)
    }

    /// Initial values of integration gates, keyed by gate name.
    pub fn init_values(&self) -> &BTreeMap<String, f64> {
        &self.init_values
    }

    pub fn init_value(&self, name: &str) -> Option<f64> {
        self.init_values.get(name).copied()
    }

    // ----- name management -----

    /// Validate a user-supplied gate name.
    pub fn validate_gate_name(name: &str, forbid_underscore: bool) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        if forbid_underscore && name.starts_with('_') {
            return Err(Error::ReservedUnderscore(name.to_string()));
        }
        if name == TIME {
            return Err(Error::ReservedTime);
        }
        Ok(())
    }

    /// Mint a fresh generated name `_k`.
    pub(crate) fn mint_name(&mut self) -> String {
        self.next_fresh += 1;
        format!("_{}", self.next_fresh)
    }

    /// Advance the fresh counter past a `..._k` name so future generated
    /// names cannot collide with it. Loading parsed circuits relies on this.
    fn bump_fresh(&mut self, name: &str) {
        if let Some((_, digits)) = name.rsplit_once('_') {
            if let Ok(k) = digits.parse::<u64>() {
                if k > self.next_fresh {
                    self.next_fresh = k;
                }
            }
        }
    }

    pub(crate) fn merge_fresh_counter(&mut self, other: u64) {
        if other > self.next_fresh {
            self.next_fresh = other;
        }
    }

    // ----- insertion -----

    fn insert_gate(&mut self, name: Option<&str>, gate: Gate, validate: bool) -> Result<String> {
        self.finalized = false;
        let name = match name {
            Some(n) => {
                if validate && self.validation {
                    Self::validate_gate_name(n, true)?;
                }
                self.bump_fresh(n);
                n.to_string()
            }
            None => self.mint_name(),
        };
        if validate && self.validation {
            if let Gate::Int(b) = &gate {
                if b.y != TIME && self.gates.get(&b.y).is_some_and(Gate::is_constant) {
                    return Err(Error::ConstantDifferential(name));
                }
            }
        }
        if self.gates.contains_key(&name) {
            warn!(
                "circuit {}: gate {:?} already exists, overwriting it",
                self.name, name
            );
        }
        self.gates.insert(name.clone(), gate);
        Ok(name)
    }

    /// Insert a gate, validating the name (and, for integration gates, that
    /// the differential input is not a constant). With `name == None` a fresh
    /// `_k` name is generated. Returns the name actually assigned.
    pub fn add_gate(&mut self, name: Option<&str>, gate: Gate) -> Result<String> {
        self.insert_gate(name, gate, true)
    }

    /// Insert a gate without validation. Used by the rewrite passes, the
    /// construction operators and the parser, which may legitimately insert
    /// generated `_k` names or temporarily ill-formed gates.
    pub fn add_gate_unchecked(&mut self, name: Option<&str>, gate: Gate) -> String {
        match self.insert_gate(name, gate, false) {
            Ok(n) => n,
            Err(_) => unreachable!("unchecked insertion cannot fail"),
        }
    }

    pub fn add_const(&mut self, name: Option<&str>, value: f64) -> Result<String> {
        self.add_gate(name, Gate::constant(value))
    }

    pub fn add_add(&mut self, name: Option<&str>, x: &str, y: &str) -> Result<String> {
        self.add_gate(name, Gate::add(x, y))
    }

    pub fn add_prod(&mut self, name: Option<&str>, x: &str, y: &str) -> Result<String> {
        self.add_gate(name, Gate::prod(x, y))
    }

    pub fn add_int(&mut self, name: Option<&str>, x: &str, y: &str) -> Result<String> {
        self.add_gate(name, Gate::int(x, y))
    }

    /// Fluent builder: add a binary gate described by an operator symbol.
    ///
    /// Symbols `a`, `A`, `+` add an addition gate; `p`, `P`, `x`, `X`, `*` a
    /// product gate; `i`, `I` an integration gate. An unknown symbol is
    /// skipped with a warning, a rejected name with an error log; both leave
    /// the circuit unchanged.
    pub fn with_gate(&mut self, name: &str, op: &str, x: &str, y: &str) -> &mut Self {
        let gate = match op {
            "a" | "A" | "+" => Gate::add(x, y),
            "p" | "P" | "x" | "X" | "*" => Gate::prod(x, y),
            "i" | "I" => Gate::int(x, y),
            _ => {
                warn!(
                    "circuit {}: {:?} is not a valid operation, gate {:?} skipped",
                    self.name, op, name
                );
                return self;
            }
        };
        if let Err(e) = self.add_gate(Some(name), gate) {
            log::error!("circuit {}: cannot add gate {:?}: {}", self.name, name, e);
        }
        self
    }

    /// Fluent builder: add a constant gate.
    pub fn with_const(&mut self, name: &str, value: f64) -> &mut Self {
        if let Err(e) = self.add_const(Some(name), value) {
            log::error!("circuit {}: cannot add gate {:?}: {}", self.name, name, e);
        }
        self
    }

    /// Name of a constant gate holding `value`, creating one if none exists.
    pub fn find_or_add_constant(&mut self, value: f64) -> String {
        for (n, g) in &self.gates {
            if g.as_constant() == Some(value) {
                return n.clone();
            }
        }
        self.add_gate_unchecked(None, Gate::constant(value))
    }

    // ----- mutation -----

    /// Move a gate to a new name, carrying its initial value and the output
    /// designation along. Inputs referring to the old name are *not*
    /// rewritten; use [`Circuit::rename_inputs`] for that.
    pub fn rename_gate(&mut self, old: &str, new: &str) -> Result<()> {
        let gate = self
            .gates
            .remove(old)
            .ok_or_else(|| Error::UnknownGate(old.to_string()))?;
        self.finalized = false;
        if self.gates.contains_key(new) {
            warn!(
                "circuit {}: gate {:?} already exists, overwriting it",
                self.name, new
            );
        }
        self.bump_fresh(new);
        self.gates.insert(new.to_string(), gate);
        if let Some(v) = self.init_values.remove(old) {
            self.init_values.insert(new.to_string(), v);
        }
        if self.output.as_deref() == Some(old) {
            self.output = Some(new.to_string());
        }
        Ok(())
    }

    /// Rewrite every binary-gate input equal to `old` into `new`.
    pub fn rename_inputs(&mut self, old: &str, new: &str) {
        self.finalized = false;
        for gate in self.gates.values_mut() {
            if let Some(b) = gate.as_binary_mut() {
                if b.x == old {
                    b.x = new.to_string();
                }
                if b.y == old {
                    b.y = new.to_string();
                }
            }
        }
    }

    /// Remove a gate together with its initial value. Clears the output
    /// designation if it pointed at the gate.
    pub fn erase_gate(&mut self, name: &str) -> Option<Gate> {
        let gate = self.gates.remove(name)?;
        self.finalized = false;
        self.init_values.remove(name);
        if self.output.as_deref() == Some(name) {
            self.output = None;
        }
        Some(gate)
    }

    /// Set the initial value of an integration gate.
    pub fn set_init_value(&mut self, name: &str, value: f64) -> Result<()> {
        if self.as_int(name).is_none() {
            return Err(Error::NotAnIntGate(name.to_string()));
        }
        if self.init_values.get(name) != Some(&value) {
            self.finalized = false;
        }
        self.init_values.insert(name.to_string(), value);
        Ok(())
    }

    pub(crate) fn remove_init_value(&mut self, name: &str) -> Option<f64> {
        self.init_values.remove(name)
    }

    /// Merge initial values into this circuit for the integration gates that
    /// are present; entries naming absent or non-integration gates are
    /// ignored.
    pub fn import_values(&mut self, values: &BTreeMap<String, f64>) {
        for (name, &v) in values {
            if self.as_int(name).is_some() {
                // cannot fail: just checked the gate kind
                let _ = self.set_init_value(name, v);
            }
        }
    }

    // ----- splicing -----

    /// Copy every gate of `other` into this circuit, together with the
    /// initial values of its integration gates. Names are taken as-is; call
    /// [`Circuit::ensure_unique_names`] first when collisions are possible.
    pub fn copy_into(&mut self, other: &Circuit) {
        for (name, gate) in &other.gates {
            self.add_gate_unchecked(Some(name), gate.clone());
            if gate.is_int() {
                if let Some(&v) = other.init_values.get(name) {
                    self.init_values.insert(name.clone(), v);
                }
            }
        }
        self.merge_fresh_counter(other.next_fresh);
    }

    /// Rename this circuit's gates so its name set is disjoint from
    /// `other`'s, updating inputs, initial values and the output designation.
    pub fn ensure_unique_names(&mut self, other: &Circuit) {
        // Fresh names must dodge both circuits' generated names.
        self.merge_fresh_counter(other.next_fresh);

        let mut renames: BTreeMap<String, String> = BTreeMap::new();
        let shared: Vec<String> = self
            .gates
            .keys()
            .filter(|n| other.has(n))
            .cloned()
            .collect();
        for name in shared {
            let fresh = self.mint_name();
            renames.insert(name, fresh);
        }
        if renames.is_empty() {
            return;
        }
        self.finalized = false;

        for (old, new) in &renames {
            if let Some(g) = self.gates.remove(old) {
                self.gates.insert(new.clone(), g);
            }
            if let Some(v) = self.init_values.remove(old) {
                self.init_values.insert(new.clone(), v);
            }
        }
        if let Some(out) = &self.output {
            if let Some(new) = renames.get(out) {
                self.output = Some(new.clone());
            }
        }
        for gate in self.gates.values_mut() {
            if let Some(b) = gate.as_binary_mut() {
                if let Some(new) = renames.get(&b.x) {
                    b.x = new.clone();
                }
                if let Some(new) = renames.get(&b.y) {
                    b.y = new.clone();
                }
            }
        }
    }

    /// Copy used by the construction operators: the result is never
    /// finalized, and a non-block circuit's name gets a `_` suffix so copies
    /// can be told apart from the original in diagnostics.
    pub fn operand_copy(&self) -> Circuit {
        let mut copy = self.clone();
        copy.finalized = false;
        if !self.block && !self.name.is_empty() {
            copy.name = format!("{}_", self.name);
        }
        copy
    }
}
