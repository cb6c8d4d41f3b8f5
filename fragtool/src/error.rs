use thiserror::Error;

use fragcore::error::{ConfigError, FormulaError, InputError};

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] fragcore::error::Error),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<FormulaError> for ToolError {
    fn from(e: FormulaError) -> Self {
        ToolError::Core(e.into())
    }
}

impl From<ConfigError> for ToolError {
    fn from(e: ConfigError) -> Self {
        ToolError::Core(e.into())
    }
}

impl From<InputError> for ToolError {
    fn from(e: InputError) -> Self {
        ToolError::Core(e.into())
    }
}
