//! LaTeX export: render a finalized circuit as the polynomial initial-value
//! problem it defines.
//!
//! Each integration gate becomes a variable `x_i`; the sub-DAG rooted at its
//! integrand is expanded into a sum-of-monomials normal form over the
//! variables `t, x_1, …, x_n`, and the output gate is rendered the same way
//! as `y`.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::gate::{Gate, TIME};

/// A monomial: coefficient times a product of variable powers.
#[derive(Debug, Clone, PartialEq)]
struct Term {
    coeff: f64,
    vars: BTreeMap<String, u32>,
}

impl Term {
    fn constant(c: f64) -> Self {
        Term {
            coeff: c,
            vars: BTreeMap::new(),
        }
    }

    fn var(symbol: &str) -> Self {
        Term {
            coeff: 1.0,
            vars: BTreeMap::from([(symbol.to_string(), 1)]),
        }
    }

    fn degree(&self) -> u32 {
        self.vars.values().sum()
    }

    fn mul(&self, other: &Term) -> Term {
        let mut vars = self.vars.clone();
        for (v, p) in &other.vars {
            *vars.entry(v.clone()).or_insert(0) += p;
        }
        Term {
            coeff: self.coeff * other.coeff,
            vars,
        }
    }
}

/// Sum of monomials.
#[derive(Debug, Clone, Default)]
struct Poly {
    terms: Vec<Term>,
}

impl Poly {
    fn constant(c: f64) -> Self {
        Poly {
            terms: vec![Term::constant(c)],
        }
        .normalized()
    }

    fn var(symbol: &str) -> Self {
        Poly {
            terms: vec![Term::var(symbol)],
        }
    }

    fn add(&self, other: &Poly) -> Poly {
        let mut terms = self.terms.clone();
        terms.extend(other.terms.iter().cloned());
        Poly { terms }.normalized()
    }

    fn mul(&self, other: &Poly) -> Poly {
        let mut terms = Vec::new();
        for a in &self.terms {
            for b in &other.terms {
                terms.push(a.mul(b));
            }
        }
        Poly { terms }.normalized()
    }

    /// Merge like monomials, drop zero coefficients, order by decreasing
    /// degree then variable names.
    fn normalized(mut self) -> Poly {
        let mut merged: BTreeMap<Vec<(String, u32)>, f64> = BTreeMap::new();
        for term in self.terms.drain(..) {
            let key: Vec<(String, u32)> = term.vars.iter().map(|(v, p)| (v.clone(), *p)).collect();
            *merged.entry(key).or_insert(0.0) += term.coeff;
        }
        let mut terms: Vec<Term> = merged
            .into_iter()
            .filter(|(_, c)| *c != 0.0)
            .map(|(key, coeff)| Term {
                coeff,
                vars: key.into_iter().collect(),
            })
            .collect();
        terms.sort_by(|a, b| {
            b.degree()
                .cmp(&a.degree())
                .then_with(|| a.vars.cmp(&b.vars))
        });
        Poly { terms }
    }

    fn render(&self) -> String {
        if self.terms.is_empty() {
            return "0".to_string();
        }
        let mut out = String::new();
        for (i, term) in self.terms.iter().enumerate() {
            let coeff = term.coeff;
            if i == 0 {
                if coeff < 0.0 {
                    out.push('-');
                }
            } else if coeff < 0.0 {
                out.push_str(" - ");
            } else {
                out.push_str(" + ");
            }
            let mag = coeff.abs();
            if term.vars.is_empty() {
                let _ = write!(out, "{}", mag);
            } else {
                if mag != 1.0 {
                    let _ = write!(out, "{} ", mag);
                }
                let mut first = true;
                for (var, power) in &term.vars {
                    if !first {
                        out.push(' ');
                    }
                    first = false;
                    if *power == 1 {
                        out.push_str(var);
                    } else {
                        let _ = write!(out, "{}^{{{}}}", var, power);
                    }
                }
            }
        }
        out
    }
}

/// Expand the sub-DAG rooted at `name` into a polynomial over `t` and the
/// integration-gate variables.
fn expand(
    circuit: &Circuit,
    name: &str,
    symbols: &BTreeMap<String, String>,
    memo: &mut BTreeMap<String, Poly>,
    visiting: &mut Vec<String>,
) -> Result<Poly> {
    if name == TIME {
        return Ok(Poly::var("t"));
    }
    if let Some(symbol) = symbols.get(name) {
        return Ok(Poly::var(symbol));
    }
    if let Some(poly) = memo.get(name) {
        return Ok(poly.clone());
    }
    if visiting.iter().any(|n| n == name) {
        return Err(Error::Propagation(name.to_string()));
    }
    visiting.push(name.to_string());
    let poly = match circuit
        .gate(name)
        .ok_or_else(|| Error::UnknownGate(name.to_string()))?
    {
        Gate::Constant(v) => Poly::constant(*v),
        Gate::Add(b) => {
            let (x, y) = (b.x.clone(), b.y.clone());
            expand(circuit, &x, symbols, memo, visiting)?
                .add(&expand(circuit, &y, symbols, memo, visiting)?)
        }
        Gate::Prod(b) => {
            let (x, y) = (b.x.clone(), b.y.clone());
            expand(circuit, &x, symbols, memo, visiting)?
                .mul(&expand(circuit, &y, symbols, memo, visiting)?)
        }
        // an integration gate that is not in `symbols` cannot appear in a
        // finalized circuit
        Gate::Int(_) => return Err(Error::NotNormalized(name.to_string())),
    };
    visiting.pop();
    memo.insert(name.to_string(), poly.clone());
    Ok(poly)
}

impl Circuit {
    /// Render the finalized circuit as a LaTeX pIVP:
    /// `x_i' = P_i(x, t), x_i(0) = v_i` for every integration gate, and
    /// `y = Q(x, t)` for the output.
    pub fn to_latex(&self) -> Result<String> {
        if !self.is_finalized() {
            return Err(Error::NotFinalized(self.name().to_string()));
        }
        let symbols: BTreeMap<String, String> = self
            .int_gates()
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), format!("x_{{{}}}", i + 1)))
            .collect();
        let mut memo = BTreeMap::new();

        let mut res = String::new();
        res.push_str("\\left\\{\\begin{array}{l}\n");
        for (i, name) in self.int_gates().iter().enumerate() {
            let integrand = self
                .as_int(name)
                .map(|b| b.x.clone())
                .ok_or_else(|| Error::NotAnIntGate(name.clone()))?;
            let poly = expand(self, &integrand, &symbols, &mut memo, &mut Vec::new())?;
            let v0 = self
                .init_value(name)
                .ok_or_else(|| Error::MissingInitValue(name.clone()))?;
            let _ = writeln!(
                res,
                "x_{{{i}}}'(t) = {}, \\quad x_{{{i}}}(0) = {} \\\\",
                poly.render(),
                v0,
                i = i + 1
            );
        }
        let output = self.checked_output()?;
        let y_poly = if output == TIME {
            Poly::var("t")
        } else {
            expand(self, output, &symbols, &mut memo, &mut Vec::new())?
        };
        let _ = writeln!(res, "y(t) = {}", y_poly.render());
        res.push_str("\\end{array}\\right.\n");
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poly_normal_form_merges_terms() {
        let t = Poly::var("t");
        let p = t.mul(&t).add(&t.mul(&t)); // 2t²
        assert_eq!(p.render(), "2 t^{2}");
        let q = p.add(&Poly::constant(-1.0));
        assert_eq!(q.render(), "2 t^{2} - 1");
    }

    #[test]
    fn test_zero_poly_renders_as_zero() {
        let p = Poly::constant(1.0).add(&Poly::constant(-1.0));
        assert_eq!(p.render(), "0");
    }

    #[test]
    fn test_exp_pivp() {
        let mut c = Circuit::new("exp");
        c.add_int(Some("e"), "e", "t").unwrap();
        c.set_init_value("e", 1.0).unwrap();
        c.set_output("e");
        c.finalize().unwrap();

        let latex = c.to_latex().unwrap();
        assert!(latex.contains("x_{1}'(t) = x_{1}, \\quad x_{1}(0) = 1"));
        assert!(latex.contains("y(t) = x_{1}"));
    }

    #[test]
    fn test_polynomial_output_expansion() {
        // y = 1 + t * t
        let mut c = Circuit::new("poly");
        c.add_const(Some("one"), 1.0).unwrap();
        c.add_prod(Some("sq"), "t", "t").unwrap();
        c.add_add(Some("out"), "one", "sq").unwrap();
        c.set_output("out");
        c.finalize().unwrap();

        let latex = c.to_latex().unwrap();
        assert!(latex.contains("y(t) = t^{2} + 1"));
    }

    #[test]
    fn test_latex_requires_finalized() {
        let mut c = Circuit::new("poly");
        c.add_const(Some("one"), 1.0).unwrap();
        c.set_output("one");
        assert!(matches!(c.to_latex(), Err(Error::NotFinalized(_))));
    }
}
