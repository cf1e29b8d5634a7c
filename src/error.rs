use thiserror::Error;

pub type MonitorResult<T> = Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("at least one span must be configured")]
    NoSpans,

    #[error("span {index}: {reason}")]
    InvalidSpan { index: usize, reason: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("sample source failed: {0}")]
    Sample(String),

    #[error("span index {0} out of range")]
    UnknownSpan(usize),
}
