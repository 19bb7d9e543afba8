//! Logging setup for the application.

use crate::config::Settings;
use env_logger::{Builder, Env};
use log::LevelFilter;

/// Logs seeding and each contradiction at debug level; capped at info unless
/// trace is asked for.
const SOLVER_MODULE: &str = "hexwfc_core::solver";

/// Initializes the logger from the configured level.
///
/// `RUST_LOG` is read first and the configured level is applied on top, so
/// module directives in `RUST_LOG` still take effect for modules other than
/// the solver.
pub fn init_logger(settings: &Settings) {
    let global_level: LevelFilter = settings.log_level.into();
    let solver_level = match global_level {
        LevelFilter::Trace => LevelFilter::Trace,
        LevelFilter::Debug | LevelFilter::Info => LevelFilter::Info,
        other => other,
    };

    let env = Env::default().filter_or("RUST_LOG", "info");
    let mut builder = Builder::from_env(env);
    builder.filter_level(global_level);
    builder.filter_module(SOLVER_MODULE, solver_level);
    builder.init();

    log::debug!(
        "Logger initialized with global log level: {:?}, solver log level: {:?}",
        global_level,
        solver_level
    );
}
