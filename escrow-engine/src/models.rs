//! Core data models for the escrow system
//!
//! Property tokens held by the registry, listings held by the coordinator,
//! the role table that authorizes parties, and the listing state machine.

use crate::{error::EscrowError, EscrowResult};
use chrono::{DateTime, Utc};
use deedlock_core::{Address, Amount, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Listing state machine enum
///
/// A token id with no listing record is implicitly unlisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingState {
    /// Property held in escrow, sale in progress
    Listed,
    /// Ownership moved to the buyer, funds released to the seller
    Finalized,
    /// Property returned to the seller, funds disbursed per inspection outcome
    Cancelled,
}

impl ListingState {
    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Cancelled)
    }

    /// Check if deposits, inspection and approvals are accepted
    pub fn accepts_updates(&self) -> bool {
        matches!(self, Self::Listed)
    }

    /// Check if the listing can be replaced by a fresh one
    pub fn can_relist(&self) -> bool {
        self.is_terminal()
    }

    pub fn can_transition_to(&self, target: ListingState) -> bool {
        matches!(
            (self, target),
            (Self::Listed, Self::Finalized) | (Self::Listed, Self::Cancelled)
        )
    }
}

impl fmt::Display for ListingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listed => write!(f, "Listed"),
            Self::Finalized => write!(f, "Finalized"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Parties involved in a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleRole {
    Buyer,
    Seller,
    Lender,
    Inspector,
}

impl SaleRole {
    /// Roles whose approval is required before finalizing
    pub const APPROVERS: [SaleRole; 3] = [SaleRole::Buyer, SaleRole::Seller, SaleRole::Lender];
}

impl fmt::Display for SaleRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buyer => write!(f, "buyer"),
            Self::Seller => write!(f, "seller"),
            Self::Lender => write!(f, "lender"),
            Self::Inspector => write!(f, "inspector"),
        }
    }
}

/// Fixed parties injected into the coordinator at deployment
///
/// The buyer is per listing and lives on [`Listing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTable {
    pub seller: Address,
    pub inspector: Address,
    pub lender: Address,
}

impl RoleTable {
    pub fn new(seller: Address, inspector: Address, lender: Address) -> Self {
        Self {
            seller,
            inspector,
            lender,
        }
    }

    /// Every party must be a distinct, non-zero identity
    pub fn validate(&self) -> EscrowResult<()> {
        let parties = [
            (SaleRole::Seller, self.seller),
            (SaleRole::Inspector, self.inspector),
            (SaleRole::Lender, self.lender),
        ];

        for (index, (role, address)) in parties.iter().enumerate() {
            if address.is_zero() {
                return Err(EscrowError::config(format!(
                    "The {} cannot be the zero address",
                    role
                )));
            }

            if let Some((other, _)) = parties[..index].iter().find(|(_, a)| a == address) {
                return Err(EscrowError::config(format!(
                    "The {} and the {} must be different parties",
                    other, role
                )));
            }
        }

        Ok(())
    }

    pub fn contains(&self, address: &Address) -> bool {
        [self.seller, self.inspector, self.lender].contains(address)
    }
}

/// A minted property record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyToken {
    pub id: TokenId,
    pub owner: Address,
    pub metadata_uri: String,
    /// Single-use transfer right, cleared by any transfer
    pub approved: Option<Address>,
    pub minted_at: DateTime<Utc>,
}

impl PropertyToken {
    pub fn new(id: TokenId, owner: Address, metadata_uri: String) -> Self {
        Self {
            id,
            owner,
            metadata_uri,
            approved: None,
            minted_at: Utc::now(),
        }
    }
}

/// A gate that must hold before a sale can finalize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum FinalizeCondition {
    /// Inspector has not recorded a passing inspection
    InspectionPassed,
    /// The named party has not approved
    Approval { role: SaleRole },
    /// Held funds do not cover the purchase price
    Funded { held: Amount, required: Amount },
}

impl fmt::Display for FinalizeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InspectionPassed => write!(f, "inspection has not passed"),
            Self::Approval { role } => write!(f, "{} has not approved", role),
            Self::Funded { held, required } => {
                write!(f, "held balance {} is below purchase price {}", held, required)
            }
        }
    }
}

/// Sale terms and progress for one property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub token_id: TokenId,
    pub buyer: Address,
    pub purchase_price: Amount,
    pub escrow_amount: Amount,
    pub state: ListingState,
    pub inspection_passed: bool,
    pub approvals: BTreeSet<Address>,
    /// Value held for this listing only
    pub held: Amount,
    /// Role table in force when the property was listed
    pub roles: RoleTable,

    // Timestamps
    pub listed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Create a new listing
    pub fn new(
        token_id: TokenId,
        buyer: Address,
        purchase_price: Amount,
        escrow_amount: Amount,
        roles: RoleTable,
    ) -> Self {
        let now = Utc::now();
        Self {
            token_id,
            buyer,
            purchase_price,
            escrow_amount,
            state: ListingState::Listed,
            inspection_passed: false,
            approvals: BTreeSet::new(),
            held: Amount::ZERO,
            roles,
            listed_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    pub fn is_listed(&self) -> bool {
        self.state.accepts_updates()
    }

    /// Address currently holding `role` for this listing
    pub fn party(&self, role: SaleRole) -> Address {
        match role {
            SaleRole::Buyer => self.buyer,
            SaleRole::Seller => self.roles.seller,
            SaleRole::Lender => self.roles.lender,
            SaleRole::Inspector => self.roles.inspector,
        }
    }

    /// First approving role held by `address`, if any
    pub fn approver_role(&self, address: &Address) -> Option<SaleRole> {
        SaleRole::APPROVERS
            .into_iter()
            .find(|role| self.party(*role) == *address)
    }

    pub fn has_approved(&self, address: &Address) -> bool {
        self.approvals.contains(address)
    }

    /// First unmet finalize gate, checked in a fixed order
    pub fn unmet_condition(&self) -> Option<FinalizeCondition> {
        if !self.inspection_passed {
            return Some(FinalizeCondition::InspectionPassed);
        }

        if let Some(role) = SaleRole::APPROVERS
            .into_iter()
            .find(|role| !self.has_approved(&self.party(*role)))
        {
            return Some(FinalizeCondition::Approval { role });
        }

        if self.held < self.purchase_price {
            return Some(FinalizeCondition::Funded {
                held: self.held,
                required: self.purchase_price,
            });
        }

        None
    }

    /// Move to a terminal state
    pub fn close(&mut self, to: ListingState) -> bool {
        if !self.state.can_transition_to(to) {
            return false;
        }
        let now = Utc::now();
        self.state = to;
        self.updated_at = now;
        self.closed_at = Some(now);
        true
    }
}

/// How a cancelled sale disbursed its funds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub token_id: TokenId,
    pub recipient: Address,
    pub amount: Amount,
    pub refunded_to_buyer: bool,
}
