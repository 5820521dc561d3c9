//! Graphviz export.

use std::fmt::Write;

use crate::circuit::Circuit;
use crate::gate::{Gate, TIME};

impl Circuit {
    /// Render the circuit as a Graphviz digraph.
    ///
    /// Gates are rectangular nodes labelled with their value (constants) or
    /// operator symbol; the output gate is drawn double-bordered in red. The
    /// differential edge of a normalized integration gate is omitted (the
    /// variable is implied), a non-`t` differential edge is dashed.
    pub fn to_dot(&self) -> String {
        let mut res = String::new();
        let _ = writeln!(res, "digraph \"{}\" {{", self.name());
        let _ = writeln!(res, "\tnode [shape = box];");
        res.push('\n');
        let _ = writeln!(res, "\tnode [label = \"t\"]; t;");
        res.push('\n');

        let mut constants = Vec::new();
        let mut additions = Vec::new();
        let mut products = Vec::new();
        let mut integrations = Vec::new();
        for (name, gate) in self.gates() {
            match gate {
                Gate::Constant(v) => constants.push((name, *v)),
                Gate::Add(_) => additions.push(name),
                Gate::Prod(_) => products.push(name),
                Gate::Int(_) => integrations.push(name),
            }
        }

        let output_attrs = " [color = red, fontcolor = red, peripheries = 2]";
        for (name, value) in &constants {
            let _ = write!(res, "\tnode [label = \"{}\"]; \"{}\"", value, name);
            if self.output() == Some(*name) {
                res.push_str(output_attrs);
            }
            res.push_str(";\n");
        }
        if !constants.is_empty() {
            res.push('\n');
        }
        for (label, names) in [("+", &additions), ("⨯", &products), ("∫", &integrations)] {
            if names.is_empty() {
                continue;
            }
            let _ = writeln!(res, "\tnode [label = \"{}\"];", label);
            for name in names {
                let _ = write!(res, "\t\"{}\"", name);
                if self.output() == Some(*name) {
                    res.push_str(output_attrs);
                }
                res.push_str(";\n");
            }
            res.push('\n');
        }

        for (name, gate) in self.gates() {
            let Some(b) = gate.as_binary() else {
                continue;
            };
            let _ = writeln!(res, "\t\"{}\" -> \"{}\";", b.x, name);
            if gate.is_int() {
                if b.y == TIME {
                    // implied integration variable
                    continue;
                }
                let _ = writeln!(res, "\t\"{}\" -> \"{}\" [style = dashed];", b.y, name);
            } else {
                let _ = writeln!(res, "\t\"{}\" -> \"{}\";", b.y, name);
            }
        }
        res.push_str("}\n");
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_marks_output_and_hides_t_edges() {
        let mut c = Circuit::new("exp");
        c.add_int(Some("e"), "e", "t").unwrap();
        c.set_init_value("e", 1.0).unwrap();
        c.set_output("e");

        let dot = c.to_dot();
        assert!(dot.starts_with("digraph \"exp\" {"));
        assert!(dot.contains("\"e\" [color = red, fontcolor = red, peripheries = 2];"));
        assert!(dot.contains("\"e\" -> \"e\";"));
        // the d(t) edge is implied, not drawn
        assert!(!dot.contains("\"t\" -> \"e\""));
    }

    #[test]
    fn test_dot_dashes_non_t_differential_edges() {
        let mut c = Circuit::new("g");
        c.add_int(Some("a"), "a", "t").unwrap();
        c.add_int(Some("b"), "a", "a").unwrap();
        c.set_output("b");

        let dot = c.to_dot();
        assert!(dot.contains("\"a\" -> \"b\" [style = dashed];"));
    }

    #[test]
    fn test_dot_labels_constants_with_value() {
        let mut c = Circuit::new("g");
        c.add_const(Some("half"), 0.5).unwrap();
        c.set_output("half");
        assert!(c.to_dot().contains("node [label = \"0.5\"]; \"half\""));
    }
}
