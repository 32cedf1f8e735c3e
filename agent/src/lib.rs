//! Sandboxed tool-calling coding agent.
//!
//! A user prompt is handed to a generative model together with a small set of
//! filesystem and script tools. The model's tool calls run inside a fixed
//! sandbox directory and their results are fed back until the model answers.
//!
//! - **[`core`]**: Pure data (conversation, turns, truncation). No I/O.
//! - **[`io`]**: Side effects (config, sandbox resolution, processes, the
//!   model backend).
//! - **[`tools`]**: The tool registry and the four sandboxed tools.
//!
//! [`looping`] drives the agent state machine on top of these.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
