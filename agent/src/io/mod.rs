//! Side-effecting operations: filesystem confinement, processes, config and
//! the model backend.

pub mod config;
pub mod gemini;
pub mod model;
pub mod process;
pub mod prompt;
pub mod sandbox;
