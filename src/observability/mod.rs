//! Ambient logging and metrics stack, kept separate from the engine so
//! neither depends on how the binary wires them up.

pub mod logging;
pub mod metrics;
