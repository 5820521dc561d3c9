//! Error types for gpac-parser.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("lex error at line {line}, column {column}: {message}")]
    LexError {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("unknown circuit: {0}")]
    UnknownCircuit(String),

    #[error("circuit name {0:?} is reserved")]
    ReservedCircuitName(String),

    #[error("file defines no circuit")]
    NoCircuits,

    #[error(transparent)]
    Circuit(#[from] gpac_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
