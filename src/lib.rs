//! Hex Forge application library
//!
//! Configuration, logging, worker contexts and the command runners for the
//! `hex-forge` binary.

pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod setup;
pub mod worker;

pub use config::{Cli, Settings};
pub use error::AppError;
