//! Audit trail of everything that changed state
//!
//! Events live inside the node's world state, so a reverted call also
//! drops the events it emitted.

use crate::models::SaleRole;
use chrono::{DateTime, Utc};
use deedlock_core::{Address, Amount, TokenId};
use serde::{Deserialize, Serialize};

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Ownership moved; `from` is `None` on mint
    Transfer {
        from: Option<Address>,
        to: Address,
        token_id: TokenId,
    },
    Approval {
        owner: Address,
        approved: Address,
        token_id: TokenId,
    },
    ApprovalForAll {
        owner: Address,
        operator: Address,
        approved: bool,
    },
    ValueTransferred {
        from: Address,
        to: Address,
        amount: Amount,
    },
    Listed {
        token_id: TokenId,
        buyer: Address,
        purchase_price: Amount,
        escrow_amount: Amount,
    },
    EarnestDeposited {
        token_id: TokenId,
        buyer: Address,
        amount: Amount,
    },
    FundsContributed {
        token_id: TokenId,
        contributor: Address,
        amount: Amount,
    },
    InspectionUpdated {
        token_id: TokenId,
        passed: bool,
    },
    SaleApproved {
        token_id: TokenId,
        approver: Address,
        role: SaleRole,
    },
    SaleFinalized {
        token_id: TokenId,
        buyer: Address,
        seller: Address,
        amount: Amount,
    },
    SaleCancelled {
        token_id: TokenId,
        recipient: Address,
        amount: Amount,
        refunded_to_buyer: bool,
    },
}

impl EventKind {
    /// Property the event concerns, if any
    pub fn token_id(&self) -> Option<TokenId> {
        match self {
            Self::Transfer { token_id, .. }
            | Self::Approval { token_id, .. }
            | Self::Listed { token_id, .. }
            | Self::EarnestDeposited { token_id, .. }
            | Self::FundsContributed { token_id, .. }
            | Self::InspectionUpdated { token_id, .. }
            | Self::SaleApproved { token_id, .. }
            | Self::SaleFinalized { token_id, .. }
            | Self::SaleCancelled { token_id, .. } => Some(*token_id),
            Self::ApprovalForAll { .. } | Self::ValueTransferred { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::Approval { .. } => "approval",
            Self::ApprovalForAll { .. } => "approval_for_all",
            Self::ValueTransferred { .. } => "value_transferred",
            Self::Listed { .. } => "listed",
            Self::EarnestDeposited { .. } => "earnest_deposited",
            Self::FundsContributed { .. } => "funds_contributed",
            Self::InspectionUpdated { .. } => "inspection_updated",
            Self::SaleApproved { .. } => "sale_approved",
            Self::SaleFinalized { .. } => "sale_finalized",
            Self::SaleCancelled { .. } => "sale_cancelled",
        }
    }
}

/// Escrow event for audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEvent {
    pub id: u64,
    /// Component that emitted the event
    pub emitter: Address,
    pub kind: EventKind,

    // Timestamp (immutable)
    pub created_at: DateTime<Utc>,
}

/// Append-only, sequentially numbered event log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<EscrowEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, emitter: Address, kind: EventKind) {
        let event = EscrowEvent {
            id: self.events.len() as u64 + 1,
            emitter,
            kind,
            created_at: Utc::now(),
        };
        self.events.push(event);
    }

    pub fn events(&self) -> &[EscrowEvent] {
        &self.events
    }

    pub fn for_token(&self, token_id: TokenId) -> Vec<EscrowEvent> {
        self.events
            .iter()
            .filter(|event| event.kind.token_id() == Some(token_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ids_are_sequential() {
        let mut log = EventLog::new();
        let emitter = Address::random();

        log.emit(
            emitter,
            EventKind::InspectionUpdated {
                token_id: TokenId(1),
                passed: true,
            },
        );
        log.emit(
            emitter,
            EventKind::ApprovalForAll {
                owner: Address::random(),
                operator: Address::random(),
                approved: true,
            },
        );

        let ids: Vec<u64> = log.events().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(log.for_token(TokenId(1)).len(), 1);
    }

    #[test]
    fn test_event_json_shape() {
        let kind = EventKind::InspectionUpdated {
            token_id: TokenId(7),
            passed: false,
        };
        let json = serde_json::to_value(&kind).unwrap();

        assert_eq!(json["type"], "inspection_updated");
        assert_eq!(json["token_id"], 7);
        assert_eq!(kind.name(), "inspection_updated");
    }
}
