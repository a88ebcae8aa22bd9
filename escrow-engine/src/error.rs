//! Error types for the escrow system
//!
//! Every rejected call surfaces exactly one of these to the caller; the
//! node restores its pre-call state before returning it.

use crate::models::FinalizeCondition;
use deedlock_core::{Address, Amount, CoreError, TokenId};
use thiserror::Error;

/// Main error type for escrow operations
#[derive(Error, Debug)]
pub enum EscrowError {
    /// Caller does not hold the role the operation requires
    #[error("Unauthorized: {caller} may not {action}")]
    Unauthorized { caller: Address, action: String },

    /// Token id was never minted or never listed
    #[error("Property {0} not found")]
    NotFound(TokenId),

    /// Listing already active for this token id
    #[error("Property {0} is already listed")]
    AlreadyListed(TokenId),

    /// Listing is not active (never listed, finalized or cancelled)
    #[error("Property {0} is not listed")]
    NotListed(TokenId),

    /// A finalize gate is not satisfied
    #[error("Cannot finalize property {token_id}: {condition}")]
    PreconditionNotMet {
        token_id: TokenId,
        condition: FinalizeCondition,
    },

    /// Transfer source is not the current owner
    #[error("Owner mismatch for property {token_id}: expected {expected}, actual {actual}")]
    OwnerMismatch {
        token_id: TokenId,
        expected: Address,
        actual: Address,
    },

    /// Attached value is below what the operation requires
    #[error("Insufficient value: required {required}, provided {provided}")]
    InsufficientValue { required: Amount, provided: Amount },

    /// Account balance cannot cover a transfer
    #[error("Insufficient funds in {account}: required {required}, available {available}")]
    InsufficientFunds {
        account: Address,
        required: Amount,
        available: Amount,
    },

    /// Listing terms are inconsistent
    #[error("Invalid listing terms: {0}")]
    InvalidTerms(String),

    /// Property metadata is unusable
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Value sent to the escrow without naming a listing
    #[error("Value sent to escrow {0} must be attributed to a listing")]
    UnattributedValue(Address),

    /// Arithmetic left the representable range
    #[error("Arithmetic overflow")]
    Overflow,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Core type errors
    #[error("Core error: {0}")]
    Core(CoreError),
}

impl EscrowError {
    /// Create an unauthorized error
    pub fn unauthorized<S: Into<String>>(caller: Address, action: S) -> Self {
        Self::Unauthorized {
            caller,
            action: action.into(),
        }
    }

    /// Create a precondition error naming the unmet finalize gate
    pub fn precondition(token_id: TokenId, condition: FinalizeCondition) -> Self {
        Self::PreconditionNotMet {
            token_id,
            condition,
        }
    }

    /// Create an invalid terms error
    pub fn invalid_terms<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTerms(msg.into())
    }

    /// Create an invalid metadata error
    pub fn invalid_metadata<S: Into<String>>(msg: S) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

impl From<CoreError> for EscrowError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Overflow => Self::Overflow,
            other => Self::Core(other),
        }
    }
}

impl From<config::ConfigError> for EscrowError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
