//! Hold/release state-modification classification
//!
//! The classifier runs alongside the rule engine and can hard-stop a
//! command the rules would allow. See [`classifier::classify`].

mod classifier;
mod profile;

pub use classifier::{classify, ExecMode, HoldModeConfig, HoldVerdict};
pub use profile::{block_list, STANDARD_BLOCK, STRICT_EXTRA_BLOCK};
