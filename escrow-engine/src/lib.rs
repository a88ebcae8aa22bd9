//! Escrow backend for tokenized real-estate sales
//!
//! This crate implements a multi-party property sale using:
//! - A property registry of uniquely identified, transferable deeds
//! - A value ledger for earnest money and purchase funds
//! - An escrow coordinator that gates settlement on inspection, approvals and funding
//! - An append-only event log for auditability

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod ledger;
pub mod models;
pub mod node;
pub mod registry;

use error::EscrowError;

/// Result type alias for escrow operations
pub type EscrowResult<T> = Result<T, EscrowError>;

pub use config::{EscrowNodeConfig, EscrowPolicy, RegistryConfig};
pub use coordinator::{CallContext, EscrowCoordinator};
pub use events::{EscrowEvent, EventKind, EventLog};
pub use ledger::{ValueLedger, ValueTransfer};
pub use models::{
    CancelOutcome, FinalizeCondition, Listing, ListingState, PropertyToken, RoleTable, SaleRole,
};
pub use node::EscrowNode;
pub use registry::{OwnershipRegistry, PropertyRegistry};
