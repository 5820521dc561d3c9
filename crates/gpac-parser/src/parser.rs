//! Parser for the circuit specification format.
//!
//! A file is a sequence of circuit definitions terminated by `;`, in one of
//! two forms:
//!
//! ```text
//! # gate list: the last gate is the output
//! Circuit osc:
//!     m: -1
//!     p: s * m
//!     z: int p d(t) | 1
//!     s: int z d(t) | 0
//! ;
//!
//! # expression over previously defined and builtin circuits
//! Circuit f = (Sin @ (t * t));
//! ;
//! ```
//!
//! Definitions see every earlier definition plus the builtin library; the
//! file evaluates to its last definition. A gate line may also name a
//! previously defined circuit, which splices a fresh copy of it in and
//! renames its output to the gate being defined.

use indexmap::IndexMap;
use std::collections::BTreeSet;

use gpac_core::{Circuit, Gate};

use crate::error::{Error, Result};
use crate::lexer::{Lexer, SpannedToken, Token};

/// Transition width used for the `max` and `select` expression forms.
const SMOOTHING_WIDTH: f64 = 0.05;

/// Parse a circuit file, returning the last circuit it defines.
pub fn parse(input: &str) -> Result<Circuit> {
    let tokens = Lexer::new(input).tokenize()?;
    Parser::new(&tokens).parse_file()
}

/// The builtin circuits visible to every definition.
fn builtin_env() -> IndexMap<String, Circuit> {
    let mut env = IndexMap::new();
    env.insert("Exp".to_string(), gpac_blocks::exp());
    env.insert("Exp2".to_string(), gpac_blocks::exp2());
    env.insert("Sin".to_string(), gpac_blocks::sin());
    env.insert("Cos".to_string(), gpac_blocks::cos());
    env.insert("Tan".to_string(), gpac_blocks::tan());
    env.insert("Arctan".to_string(), gpac_blocks::arctan());
    env.insert("Tanh".to_string(), gpac_blocks::tanh());
    env.insert("Sqrt".to_string(), gpac_blocks::sqrt());
    env.insert("Inverse".to_string(), gpac_blocks::inverse());
    env.insert("Id".to_string(), gpac_blocks::identity());
    env.insert("t".to_string(), gpac_blocks::identity());
    env.insert("L2".to_string(), gpac_blocks::l2(10.0));
    env.insert("Round".to_string(), gpac_blocks::round());
    env.insert("Mod10".to_string(), gpac_blocks::mod10());
    env.insert("Upsilon".to_string(), gpac_blocks::upsilon());
    env.insert("Abs".to_string(), gpac_blocks::abs_delta(SMOOTHING_WIDTH));
    env.insert("Sgn".to_string(), gpac_blocks::sgn(20.0));
    env.insert("Ip1".to_string(), gpac_blocks::ip1(20.0));
    env.insert("Lxh".to_string(), gpac_blocks::lxh());
    env
}

struct Parser<'a> {
    tokens: &'a [SpannedToken],
    pos: usize,
    env: IndexMap<String, Circuit>,
    builtin_names: BTreeSet<String>,
    last_defined: Option<String>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [SpannedToken]) -> Self {
        let env = builtin_env();
        let builtin_names = env.keys().cloned().collect();
        Self {
            tokens,
            pos: 0,
            env,
            builtin_names,
            last_defined: None,
        }
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn current_line(&self) -> usize {
        self.tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|t| t.line)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::ParseError {
            line: self.current_line(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<()> {
        let token = self.advance();
        if &token != expected {
            return Err(self.error(format!("expected {}, found {:?}", what, token)));
        }
        Ok(())
    }

    fn expect_ident(&mut self, what: &str) -> Result<String> {
        match self.advance() {
            Token::Ident(s) => Ok(s),
            other => Err(self.error(format!("expected {}, found {:?}", what, other))),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        match self.advance() {
            Token::Ident(s) if s == keyword => Ok(()),
            other => Err(self.error(format!("expected {:?}, found {:?}", keyword, other))),
        }
    }

    /// A numeric literal with an optional leading minus.
    fn expect_value(&mut self) -> Result<f64> {
        let negative = if self.peek() == &Token::Minus {
            self.advance();
            true
        } else {
            false
        };
        match self.advance() {
            Token::Value(v) => Ok(if negative { -v } else { v }),
            other => Err(self.error(format!("expected a numeric value, found {:?}", other))),
        }
    }

    /// A non-negative integer literal, used by the `[n]` iteration suffix.
    fn expect_integer(&mut self) -> Result<u32> {
        match self.advance() {
            Token::Value(v) if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => {
                Ok(v as u32)
            }
            other => Err(self.error(format!("expected an integer, found {:?}", other))),
        }
    }

    fn lookup(&self, name: &str) -> Result<Circuit> {
        self.env
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownCircuit(name.to_string()))
    }

    // ----- definitions -----

    fn parse_file(mut self) -> Result<Circuit> {
        while self.peek() != &Token::Eof {
            self.parse_definition()?;
        }
        let last = self.last_defined.ok_or(Error::NoCircuits)?;
        self.env
            .shift_remove(&last)
            .ok_or(Error::UnknownCircuit(last))
    }

    fn parse_definition(&mut self) -> Result<()> {
        self.expect_keyword("Circuit")?;
        let name = self.expect_ident("a circuit name")?;
        if name == "t" || name.starts_with('_') || self.builtin_names.contains(&name) {
            return Err(Error::ReservedCircuitName(name));
        }
        let mut circuit = match self.advance() {
            Token::Colon => self.parse_gate_list()?,
            Token::Equals => self.parse_expr()?,
            other => {
                return Err(self.error(format!("expected ':' or '=', found {:?}", other)));
            }
        };
        self.expect(&Token::Semicolon, "';'")?;
        circuit.set_name(name.clone());
        self.env.insert(name.clone(), circuit);
        self.last_defined = Some(name);
        Ok(())
    }

    // ----- gate-list form -----

    fn parse_gate_list(&mut self) -> Result<Circuit> {
        let mut circuit = Circuit::new("");
        let mut last_gate = None;
        while self.peek() != &Token::Semicolon {
            let gate_name = self.expect_ident("a gate name")?;
            if gate_name == "t" {
                return Err(self.error("gate name \"t\" is reserved for the time variable"));
            }
            self.expect(&Token::Colon, "':'")?;
            self.parse_gate_spec(&mut circuit, &gate_name)?;
            last_gate = Some(gate_name);
        }
        let output = last_gate.ok_or_else(|| self.error("circuit defines no gates"))?;
        circuit.set_output(output);
        Ok(circuit)
    }

    fn parse_gate_spec(&mut self, circuit: &mut Circuit, gate_name: &str) -> Result<()> {
        match self.peek().clone() {
            Token::Value(_) | Token::Minus => {
                let v = self.expect_value()?;
                circuit.add_gate_unchecked(Some(gate_name), Gate::constant(v));
            }
            Token::Ident(first) if first == "int" => {
                self.advance();
                let x = self.expect_ident("an integrand gate name")?;
                self.expect_keyword("d")?;
                self.expect(&Token::LParen, "'('")?;
                let y = self.expect_ident("a differential gate name")?;
                self.expect(&Token::RParen, "')'")?;
                self.expect(&Token::Pipe, "'|'")?;
                let v0 = self.expect_value()?;
                circuit.add_gate_unchecked(Some(gate_name), Gate::int(x, y));
                circuit.set_init_value(gate_name, v0)?;
            }
            Token::Ident(_) => {
                let first = self.expect_ident("a gate name")?;
                match self.peek() {
                    Token::Plus => {
                        self.advance();
                        let second = self.expect_ident("a gate name")?;
                        circuit.add_gate_unchecked(Some(gate_name), Gate::add(first, second));
                    }
                    Token::Star => {
                        self.advance();
                        let second = self.expect_ident("a gate name")?;
                        circuit.add_gate_unchecked(Some(gate_name), Gate::prod(first, second));
                    }
                    _ => self.splice_circuit(circuit, gate_name, &first)?,
                }
            }
            other => {
                return Err(self.error(format!("expected a gate specification, found {:?}", other)));
            }
        }
        Ok(())
    }

    /// Splice a copy of a previously defined circuit into `circuit`, renaming
    /// its output gate to `gate_name` and rewiring references to it.
    fn splice_circuit(
        &mut self,
        circuit: &mut Circuit,
        gate_name: &str,
        reference: &str,
    ) -> Result<()> {
        let mut template = self.lookup(reference)?;
        let out = template.checked_output().map_err(Error::Circuit)?;
        if out == "t" {
            return Err(self.error(format!(
                "circuit {:?} is the identity and cannot be used as a gate",
                reference
            )));
        }
        template.ensure_unique_names(circuit);
        let out = template.checked_output().map_err(Error::Circuit)?.to_string();
        circuit.copy_into(&template);
        circuit.rename_gate(&out, gate_name)?;
        circuit.rename_inputs(&out, gate_name);
        Ok(())
    }

    // ----- expression form -----

    fn parse_expr(&mut self) -> Result<Circuit> {
        match self.peek().clone() {
            Token::Value(_) | Token::Minus => Ok(gpac_blocks::constant(self.expect_value()?)),
            Token::Ident(name) if name == "max" => {
                self.advance();
                self.expect(&Token::LParen, "'('")?;
                let a = self.parse_expr()?;
                self.expect(&Token::Comma, "','")?;
                let b = self.parse_expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(gpac_blocks::max_of(&a, &b, SMOOTHING_WIDTH))
            }
            Token::Ident(name) if name == "select" => {
                self.advance();
                self.expect(&Token::LParen, "'('")?;
                let t0 = self.expect_value()?;
                self.expect(&Token::Comma, "','")?;
                let t1 = self.expect_value()?;
                self.expect(&Token::Comma, "','")?;
                let a = self.expect_value()?;
                self.expect(&Token::Comma, "','")?;
                let b = self.expect_value()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(gpac_blocks::select(t0, t1, SMOOTHING_WIDTH, a, b))
            }
            Token::Ident(name) => {
                self.advance();
                let circuit = self.lookup(&name)?;
                self.maybe_iterate(circuit)
            }
            Token::LParen => {
                self.advance();
                let circuit = self.parse_op_expr()?;
                self.expect(&Token::RParen, "')'")?;
                self.maybe_iterate(circuit)
            }
            other => Err(self.error(format!("expected an expression, found {:?}", other))),
        }
    }

    fn parse_op_expr(&mut self) -> Result<Circuit> {
        if self.peek() == &Token::Ident("int".to_string()) {
            self.advance();
            let integrand = self.parse_expr()?;
            self.expect_keyword("d")?;
            self.expect(&Token::LParen, "'('")?;
            let wrt = self.parse_expr()?;
            self.expect(&Token::RParen, "')'")?;
            self.expect(&Token::Pipe, "'|'")?;
            let v0 = self.expect_value()?;
            return Ok(integrand.integrate(&wrt, v0)?);
        }
        let left = self.parse_expr()?;
        let op = self.advance();
        let right = self.parse_expr()?;
        let combined = match op {
            Token::Plus => left.sum(&right)?,
            Token::Minus => left.difference(&right)?,
            Token::Star => left.product(&right)?,
            Token::Slash => left.quotient(&right)?,
            Token::At => left.compose(&right)?,
            other => {
                return Err(self.error(format!("expected an operator, found {:?}", other)));
            }
        };
        Ok(combined)
    }

    fn maybe_iterate(&mut self, circuit: Circuit) -> Result<Circuit> {
        if self.peek() != &Token::LBracket {
            return Ok(circuit);
        }
        self.advance();
        let n = self.expect_integer()?;
        self.expect(&Token::RBracket, "']'")?;
        Ok(circuit.iterate(n)?)
    }
}
