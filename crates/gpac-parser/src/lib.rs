//! Circuit specification parser.
//!
//! Parses the textual circuit format — gate lists and circuit expressions —
//! into [`gpac_core::Circuit`] values, with the builtin block library in
//! scope. See [`parse`].
//!
//! ```rust
//! let mut circuit = gpac_parser::parse(
//!     "Circuit double_exp = (Exp + Exp);",
//! ).unwrap();
//! circuit.finalize().unwrap();
//! ```

mod error;
mod lexer;
mod parser;

pub use error::{Error, Result};
pub use lexer::{Lexer, SpannedToken, Token};
pub use parser::parse;
