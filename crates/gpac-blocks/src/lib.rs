//! Builtin analog circuit library.
//!
//! Every function returns a self-contained block circuit with its output and
//! initial values set, ready to be combined with the construction operators
//! or finalized and simulated on its own. Blocks keep their library name
//! when copied, so diagnostics stay readable after heavy composition.

mod basic;
mod switching;

pub use basic::{
    arctan, constant, cos, exp, exp2, identity, inverse, polynomial, power_power2, sin, sqrt,
    tan, tanh,
};
pub use switching::{abs_delta, ip1, l2, lxh, max_of, mod10, round, select, sgn, upsilon};
