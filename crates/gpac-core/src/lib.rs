//! Core circuit model for general purpose analog computers.
//!
//! A circuit is a directed multigraph of constant, addition, product and
//! integration gates over the independent variable `t`. Circuits are built
//! either gate by gate through [`Circuit`] or out of existing circuits with
//! the construction operators (sum, product, composition, integration,
//! derivation, inversion, iteration). A finished circuit is *finalized* —
//! normalized so every integration gate runs over `t`, simplified, validated
//! and equipped with its integration-gate state vector — and then defines a
//! polynomial initial-value problem that the ODE driver integrates with a
//! fixed-step Runge–Kutta scheme.
//!
//! # Example
//!
//! ```rust
//! use gpac_core::{Circuit, SimulateParams, simulate_observed};
//!
//! // e' = e, e(0) = 1
//! let mut exp = Circuit::new("exp");
//! exp.add_int(Some("e"), "e", "t").unwrap();
//! exp.set_init_value("e", 1.0).unwrap();
//! exp.set_output("e");
//! exp.finalize().unwrap();
//!
//! let series = simulate_observed(&exp, &SimulateParams::new(0.0, 1.0, 0.001)).unwrap();
//! let (_, value) = series.last().unwrap();
//! assert!((value - std::f64::consts::E).abs() < 1e-4);
//! ```

pub mod algebra;
pub mod circuit;
pub mod error;
mod export;
pub mod gate;
pub mod normalize;
pub mod ode;
pub mod simplify;

pub use circuit::Circuit;
pub use error::{Error, Result};
pub use gate::{Binary, Gate, GateKind, TIME};
pub use ode::{SimulateParams, TimeSeries, end_state, simulate, simulate_observed};
