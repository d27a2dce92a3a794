//! Turn orchestration
//!
//! [`intent`] decides which flow handles an input, [`runner`] drives the
//! function-calling loop, and [`assistant`] ties both to the conversation log
//! and speech output.

pub mod assistant;
pub mod intent;
pub mod runner;

pub use assistant::{AbortHandle, Assistant, ERROR_PREFIX, TurnOutcome};
pub use intent::Intent;
pub use runner::{DEFAULT_MAX_TOOL_ROUNDS, TurnEvent, TurnRunner};
