//! Pulverize End-to-End Test Infrastructure
//!
//! Runs the real pipeline against fake `blender` and `ffmpeg` executables
//! written as shell scripts, so process spawning, exit codes, stdout parsing
//! and file naming are all exercised without either tool installed.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pulverize-tests
//! ```
//!
//! The fake tools are POSIX shell scripts; the harness is only built on Unix.

#[cfg(unix)]
pub mod harness;
