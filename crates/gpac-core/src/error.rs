//! Error types for gpac-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("gate name cannot be empty")]
    EmptyName,

    #[error("gate name {0:?} is reserved: names starting with an underscore are generated")]
    ReservedUnderscore(String),

    #[error("gate name \"t\" is reserved for the time variable")]
    ReservedTime,

    #[error("unknown gate: {0}")]
    UnknownGate(String),

    #[error("gate {gate} has input {input} which is neither t nor a gate of the circuit")]
    MissingInput { gate: String, input: String },

    #[error("integration gate {0} has a constant second input")]
    ConstantDifferential(String),

    #[error("integration gate {0} has a second input different from t; normalize the circuit first")]
    NotNormalized(String),

    #[error("gate {0} is not an integration gate")]
    NotAnIntGate(String),

    #[error("output gate has not been set")]
    NoOutput,

    #[error("output gate {0} is not a gate of the circuit")]
    InvalidOutput(String),

    #[error("integration gate {0} cannot be normalized")]
    NonNormalizable(String),

    #[error("integration gate {0} has no initial value")]
    MissingInitValue(String),

    #[error("failed to propagate values: gate {0} never received one (algebraic cycle?)")]
    Propagation(String),

    #[error("circuit {0:?} is not finalized; finalize it before simulating")]
    NotFinalized(String),

    #[error("circuit {0:?} evaluates to 0 at t = 0 and cannot be inverted")]
    InverseAtZero(String),
}

pub type Result<T> = std::result::Result<T, Error>;
