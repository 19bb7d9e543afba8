//! Setup module for the Hex Forge application.
//!
//! Builds the solve messages for each subcommand and runs them through the
//! worker contexts.

pub mod demo;
pub mod execution;
