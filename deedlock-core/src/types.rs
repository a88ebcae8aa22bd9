//! Identity, token id and amount types

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Unforgeable identity of an account or deployed component
///
/// Rendered as `0x` followed by 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(Uuid);

impl Address {
    /// The zero address; never owns anything
    pub const ZERO: Address = Address(Uuid::nil());

    /// Generate a fresh random account address
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive the address of a component deployed by `deployer` at `nonce`
    pub fn derive(deployer: &Address, nonce: u64) -> Self {
        Self(Uuid::new_v5(&deployer.0, &nonce.to_be_bytes()))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.0.simple())
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let raw = s.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| CoreError::invalid_address(format!("{}: {}", s, e)))
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// Sequential id of a property token, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub u64);

impl TokenId {
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(TokenId)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TokenId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Value in the smallest indivisible unit
///
/// Serialized as a decimal string so that values beyond `u64` survive
/// JSON and TOML round trips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_units(units: u128) -> Self {
        Self(units)
    }

    pub const fn units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> CoreResult<Amount> {
        self.0.checked_add(other.0).map(Amount).ok_or(CoreError::Overflow)
    }

    pub fn checked_sub(self, other: Amount) -> CoreResult<Amount> {
        self.0.checked_sub(other.0).map(Amount).ok_or(CoreError::Overflow)
    }

    /// Sum a sequence of amounts, failing on overflow
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> CoreResult<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        s.trim()
            .parse::<u128>()
            .map(Amount)
            .map_err(|e| CoreError::invalid_amount(format!("{}: {}", s, e)))
    }
}

impl TryFrom<String> for Amount {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        value.parse()
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}
