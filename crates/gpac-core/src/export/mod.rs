//! Export hooks: DOT graphs, LaTeX pIVP rendering and the round-trippable
//! source form.

mod code;
mod dot;
mod latex;
