//! Pulverize CLI library.
//!
//! Holds the render command that sequences inspection, chunk rendering and
//! concatenation, plus run reporting and logging setup for the `pulverize`
//! binary.

pub mod commands;
pub mod logging;
