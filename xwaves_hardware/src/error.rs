use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("link error: {0}")]
    Link(String),
    #[error("device timeout")]
    Timeout,
    #[error("requested delay {requested_ps} ps outside travel [{min_ps}, {max_ps}] ps")]
    OutOfTravel {
        requested_ps: f64,
        min_ps: f64,
        max_ps: f64,
    },
    #[error("stage not homed")]
    NotHomed,
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
