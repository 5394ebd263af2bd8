//! Engine crate – quine generation shared by every front end.
//!
//! Turns arbitrary text into programs that print their own source. The
//! crate is pure: no I/O, no async runtime, no process-wide state, so any
//! number of callers can use it concurrently.
//!
//! Data flows [`escape`] → [`template`] → [`stats`], driven by
//! [`generator`]; [`verify`] interprets the emitted programs to check the
//! fixed-point property.

pub mod commands;
pub mod context;
pub mod error;
pub mod escape;
pub mod generator;
pub mod scenario;
pub mod stats;
pub mod template;
pub mod types;
pub mod verify;

// Re-exports for convenience
pub use commands::{handle_generate, CommandRegistry};
pub use context::AppContext;
pub use error::GenerationError;
pub use escape::{DecodeError, EscapeStrategy};
pub use generator::{generate, GeneratorOptions, QuineGenerator};
pub use stats::Stats;
pub use types::{
    CommandResult, ErrorCode, ErrorInfo, GenerateRequest, GenerateResponse, Layout, QuineOutput,
    QuineRequest, Status, TargetModel,
};
pub use verify::VerifyError;
