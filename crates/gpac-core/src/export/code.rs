//! Source-form dump: one gate declaration per line, suitable to round-trip
//! through the circuit-file parser.

use std::fmt::Write;

use crate::circuit::Circuit;
use crate::gate::TIME;

impl Circuit {
    /// Render the circuit in the specification format.
    ///
    /// The output gate is printed last, since the gate-list form designates
    /// the last declared gate as the circuit output. Integration gates carry
    /// their initial value after a `|`.
    pub fn to_code(&self) -> String {
        let mut res = String::new();
        let prefix = if self.name().is_empty() {
            ""
        } else {
            let _ = writeln!(res, "Circuit {}:", self.name());
            "\t"
        };
        let output = self.output().filter(|o| *o != TIME && self.has(o));
        for (name, gate) in self.gates() {
            if Some(name) == output {
                continue;
            }
            let _ = write!(res, "{}{}: {}", prefix, name, gate);
            if let Some(v) = self.init_value(name) {
                let _ = write!(res, " | {}", v);
            }
            res.push('\n');
        }
        if let Some(out) = output {
            if let Some(gate) = self.gate(out) {
                let _ = write!(res, "{}{}: {}", prefix, out, gate);
                if let Some(v) = self.init_value(out) {
                    let _ = write!(res, " | {}", v);
                }
                res.push('\n');
            }
        }
        res.push_str(";\n");
        res
    }
}
