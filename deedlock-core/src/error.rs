//! Error types for core value and identity handling

use thiserror::Error;

/// Errors raised while parsing or combining core types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Amount could not be parsed or is not representable
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Address string is malformed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Arithmetic left the representable range
    #[error("Arithmetic overflow")]
    Overflow,
}

impl CoreError {
    /// Create an invalid amount error
    pub fn invalid_amount<S: Into<String>>(msg: S) -> Self {
        Self::InvalidAmount(msg.into())
    }

    /// Create an invalid address error
    pub fn invalid_address<S: Into<String>>(msg: S) -> Self {
        Self::InvalidAddress(msg.into())
    }
}
