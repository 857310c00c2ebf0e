use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("keep-top fraction must be within [0, 1), got {0}")]
    InvalidFraction(f64),
    #[error("unknown layout strategy `{0}` (expected `default` or `experimental`)")]
    UnknownStrategy(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
