//! Core types shared across the sandbox
//!
//! - [`error`]: the crate error taxonomy
//! - [`outcome`]: execution requests, outcomes and policy refusals
//! - [`events`]: the live progress broadcast channel

pub mod error;
pub mod events;
pub mod outcome;

pub use error::{SandboxError, SandboxResult};
pub use events::{create_event_channel, EventReceiver, EventSender, ExecEvent};
pub use outcome::{
    ExecutionOutcome, ExecutionReport, ExecutionRequest, Refusal, DEFAULT_TIMEOUT_MS,
    MAX_DISPLAY_OUTPUT, MAX_OUTPUT_BYTES, MAX_TIMEOUT_MS, TRUNCATION_MARKER,
};
