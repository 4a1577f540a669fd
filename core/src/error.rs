use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration for '{field}': {reason}")]
    Configuration { field: &'static str, reason: String },

    #[error("Degenerate distribution: total magnitude is {total}")]
    DegenerateDistribution { total: f64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
