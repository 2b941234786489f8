//! CLI command implementations

pub mod completions;
pub mod init;
pub mod metrics;
pub mod opp;
pub mod task;
pub mod tech;
pub mod wf;
