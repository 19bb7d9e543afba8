use hexwfc_rules::RuleError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Catalog Error: {0}")]
    Rules(#[from] RuleError),

    #[error("Worker Error: {0}")]
    Worker(String),
}
