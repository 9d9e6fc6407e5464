//! CLI command implementations

pub mod render;
pub mod reporting;

pub use render::{default_worker_count, execute, RunOptions};
pub use reporting::RunSummary;
