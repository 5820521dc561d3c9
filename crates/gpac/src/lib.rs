//! # gpac
//!
//! Symbolic construction and simulation of analog circuits: directed
//! multigraphs of constant, addition, product and integration gates that
//! define a polynomial initial-value problem.
//!
//! The toolkit covers the whole pipeline:
//! - build circuits gate by gate, from the builtin block library, or with
//!   the construction operators (sum, product, composition, integration,
//!   derivation, inversion, iteration);
//! - *finalize* them — normalize every integration gate onto `t`, simplify,
//!   validate and cache the state vector;
//! - integrate the resulting ODE system with a fixed-step Runge-Kutta
//!   scheme;
//! - export DOT graphs, LaTeX initial-value problems and a round-trippable
//!   source form.
//!
//! ## Quick start
//!
//! ```rust
//! use gpac::prelude::*;
//!
//! // sin(t²), by composing builtin blocks
//! let mut circuit = gpac::blocks::sin()
//!     .compose(&gpac::blocks::power_power2(1))
//!     .unwrap();
//! circuit.finalize().unwrap();
//!
//! let series =
//!     simulate_observed(&circuit, &SimulateParams::new(0.0, 1.0, 0.001)).unwrap();
//! let (t, v) = series.last().unwrap();
//! assert!((v - (t * t).sin()).abs() < 1e-4);
//! ```

// Re-export the member crates
pub use gpac_blocks as blocks;
pub use gpac_core as core;
pub use gpac_parser as parser;

// Convenient re-exports from gpac-core
pub use gpac_core::{
    Binary,
    Circuit,
    // Errors
    Error as CoreError,
    Gate,
    GateKind,
    Result as CoreResult,
    SimulateParams,
    TIME,
    TimeSeries,
    end_state,
    simulate,
    simulate_observed,
};

// Convenient re-exports from gpac-parser
pub use gpac_parser::{Error as ParseError, parse};

/// Re-export of nalgebra's dynamic vector type, used for simulation states.
pub use nalgebra::DVector;

/// Prelude module containing the commonly used types and functions.
///
/// ```rust
/// use gpac::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Circuit, DVector, Gate, GateKind, SimulateParams, TimeSeries, parse, simulate,
        simulate_observed,
    };
}
