pub mod core;
pub mod escalation;
pub mod hold;
pub mod parser;
pub mod rules;
pub mod supervisor;

// Optional components
pub mod cli;
pub mod logging;

// The composed pipeline
pub mod sandbox;

pub use sandbox::Sandbox;
