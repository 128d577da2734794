//! Agent-side error types.

use thiserror::Error;

use crate::driver::DriverError;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The language model failed five consecutive attempts; the run is
    /// over. This is the only fatal error in the engine.
    #[error("language-model oracle exhausted its retries")]
    OracleExhausted,

    #[error("the model worker stopped")]
    WorkerStopped,

    #[error("device driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
