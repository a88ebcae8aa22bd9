//! Core types shared by the Deedlock crates
//!
//! Identities, property token ids and value amounts, plus the conversion
//! between whole tokens and the smallest value unit.

pub mod error;
pub mod types;
pub mod units;

pub use error::CoreError;
pub use types::{Address, Amount, TokenId};
pub use units::{tokens, DECIMALS};

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
