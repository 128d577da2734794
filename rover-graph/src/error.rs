//! Graph-side error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
