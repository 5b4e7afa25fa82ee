use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScanError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("device communication failed: {0}")]
    DeviceCommunication(String),
    #[error("device timed out: {0}")]
    DeviceTimeout(String),
    #[error("Zero length step size caused division by zero")]
    DivisionByZero,
    #[error("invalid state: {0}")]
    State(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing delay stage")]
    MissingStage,
    #[error("missing lock-in amplifier")]
    MissingLockIn,
    #[error("missing experiment parameters")]
    MissingParameters,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// Shorthand for an `InvalidParameter` error.
pub(crate) fn invalid(msg: impl Into<String>) -> ScanError {
    ScanError::InvalidParameter(msg.into())
}
