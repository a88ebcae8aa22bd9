//! Property Registry - Non-fungible ownership records
//!
//! Each property is a token with an owner and an immutable metadata URI.
//! Owners can grant a single-token transfer right (`approve`) or a blanket
//! operator right (`set_approval_for_all`); either lets a third party such
//! as the escrow coordinator move the token on the owner's behalf.

use crate::{
    error::EscrowError,
    events::{EventKind, EventLog},
    models::PropertyToken,
    EscrowResult,
};
use deedlock_core::{Address, TokenId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Ownership capability the escrow coordinator depends on
pub trait OwnershipRegistry {
    /// Address the registry is deployed at
    fn address(&self) -> Address;

    /// Current owner of `token_id`
    fn owner_of(&self, token_id: TokenId) -> EscrowResult<Address>;

    /// Move `token_id` from `from` to `to` on behalf of `caller`
    fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        token_id: TokenId,
        log: &mut EventLog,
    ) -> EscrowResult<()>;
}

/// In-memory property token registry
#[derive(Debug, Clone)]
pub struct PropertyRegistry {
    address: Address,
    name: String,
    symbol: String,
    /// Only identity allowed to mint
    issuer: Address,
    tokens: BTreeMap<TokenId, PropertyToken>,
    /// (owner, operator) pairs with blanket transfer rights
    operators: BTreeSet<(Address, Address)>,
    last_id: u64,
}

impl PropertyRegistry {
    /// Create a new registry
    pub fn new(address: Address, name: String, symbol: String, issuer: Address) -> Self {
        Self {
            address,
            name,
            symbol,
            issuer,
            tokens: BTreeMap::new(),
            operators: BTreeSet::new(),
            last_id: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn issuer(&self) -> Address {
        self.issuer
    }

    /// Mint the next property token to the caller
    pub fn mint(
        &mut self,
        caller: Address,
        metadata_uri: &str,
        log: &mut EventLog,
    ) -> EscrowResult<TokenId> {
        if caller != self.issuer {
            warn!("Rejected mint from non-issuer {}", caller);
            return Err(EscrowError::unauthorized(caller, "mint property tokens"));
        }

        let metadata_uri = metadata_uri.trim();
        if metadata_uri.is_empty() {
            return Err(EscrowError::invalid_metadata("Metadata URI cannot be empty"));
        }

        let id = TokenId(self.last_id)
            .next()
            .ok_or(EscrowError::Overflow)?;

        self.tokens
            .insert(id, PropertyToken::new(id, caller, metadata_uri.to_string()));
        self.last_id = id.0;

        log.emit(
            self.address,
            EventKind::Transfer {
                from: None,
                to: caller,
                token_id: id,
            },
        );

        info!("Minted property {} to {} ({})", id, caller, metadata_uri);

        Ok(id)
    }

    /// Grant `operator` the right to transfer `token_id` once
    ///
    /// Passing [`Address::ZERO`] clears the current approval.
    pub fn approve(
        &mut self,
        caller: Address,
        operator: Address,
        token_id: TokenId,
        log: &mut EventLog,
    ) -> EscrowResult<()> {
        let owner = self.owner_of(token_id)?;

        if caller != owner && !self.is_approved_for_all(&owner, &caller) {
            warn!("Rejected approval of property {} by {}", token_id, caller);
            return Err(EscrowError::unauthorized(
                caller,
                format!("approve transfers of property {}", token_id),
            ));
        }

        let token = self
            .tokens
            .get_mut(&token_id)
            .ok_or(EscrowError::NotFound(token_id))?;
        token.approved = if operator.is_zero() {
            None
        } else {
            Some(operator)
        };

        log.emit(
            self.address,
            EventKind::Approval {
                owner,
                approved: operator,
                token_id,
            },
        );

        info!("Property {} approved for {} by {}", token_id, operator, caller);

        Ok(())
    }

    /// Grant or revoke blanket transfer rights over all of the caller's tokens
    pub fn set_approval_for_all(
        &mut self,
        caller: Address,
        operator: Address,
        approved: bool,
        log: &mut EventLog,
    ) -> EscrowResult<()> {
        if operator == caller {
            return Err(EscrowError::unauthorized(caller, "appoint itself as operator"));
        }

        if approved {
            self.operators.insert((caller, operator));
        } else {
            self.operators.remove(&(caller, operator));
        }

        log.emit(
            self.address,
            EventKind::ApprovalForAll {
                owner: caller,
                operator,
                approved,
            },
        );

        info!("Operator {} for {} set to {}", operator, caller, approved);

        Ok(())
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> bool {
        self.operators.contains(&(*owner, *operator))
    }

    /// Single-token approval currently in force
    pub fn get_approved(&self, token_id: TokenId) -> EscrowResult<Option<Address>> {
        Ok(self.token(token_id)?.approved)
    }

    pub fn token_uri(&self, token_id: TokenId) -> EscrowResult<String> {
        Ok(self.token(token_id)?.metadata_uri.clone())
    }

    pub fn token(&self, token_id: TokenId) -> EscrowResult<&PropertyToken> {
        self.tokens
            .get(&token_id)
            .ok_or(EscrowError::NotFound(token_id))
    }

    /// Number of tokens owned by `owner`
    pub fn balance_of(&self, owner: &Address) -> usize {
        self.tokens
            .values()
            .filter(|token| token.owner == *owner)
            .count()
    }

    pub fn total_supply(&self) -> u64 {
        self.last_id
    }
}

impl OwnershipRegistry for PropertyRegistry {
    fn address(&self) -> Address {
        self.address
    }

    fn owner_of(&self, token_id: TokenId) -> EscrowResult<Address> {
        let owner = self.token(token_id)?.owner;
        debug!("Property {} owned by {}", token_id, owner);
        Ok(owner)
    }

    fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        token_id: TokenId,
        log: &mut EventLog,
    ) -> EscrowResult<()> {
        let token = self.token(token_id)?;
        let owner = token.owner;

        let authorized = caller == from
            || token.approved == Some(caller)
            || self.is_approved_for_all(&owner, &caller);
        if !authorized {
            warn!("Rejected transfer of property {} by {}", token_id, caller);
            return Err(EscrowError::unauthorized(
                caller,
                format!("transfer property {}", token_id),
            ));
        }

        if from != owner {
            return Err(EscrowError::OwnerMismatch {
                token_id,
                expected: from,
                actual: owner,
            });
        }

        if to.is_zero() {
            return Err(EscrowError::unauthorized(
                caller,
                "transfer a property to the zero address",
            ));
        }

        let token = self
            .tokens
            .get_mut(&token_id)
            .ok_or(EscrowError::NotFound(token_id))?;
        token.owner = to;
        token.approved = None;

        log.emit(
            self.address,
            EventKind::Transfer {
                from: Some(from),
                to,
                token_id,
            },
        );

        info!("Transferred property {} from {} to {}", token_id, from, to);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "https://ipfs.io/ipfs/QmQVcpsjrA6cr1iJjZAodYwmPekYgbnXGo4DFubJiLc2EB/1.json";

    fn registry(issuer: Address) -> PropertyRegistry {
        PropertyRegistry::new(
            Address::random(),
            "Real Estate".to_string(),
            "REAL".to_string(),
            issuer,
        )
    }

    #[test]
    fn test_mint_assigns_sequential_ids() {
        let issuer = Address::random();
        let mut registry = registry(issuer);
        let mut log = EventLog::new();

        let first = registry.mint(issuer, URI, &mut log).unwrap();
        let second = registry.mint(issuer, URI, &mut log).unwrap();

        assert_eq!(first, TokenId(1));
        assert_eq!(second, TokenId(2));
        assert_eq!(registry.owner_of(first).unwrap(), issuer);
        assert_eq!(registry.token_uri(first).unwrap(), URI);
        assert_eq!(registry.total_supply(), 2);
        assert_eq!(registry.balance_of(&issuer), 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_mint_requires_issuer() {
        let mut registry = registry(Address::random());
        let mut log = EventLog::new();

        let result = registry.mint(Address::random(), URI, &mut log);

        assert!(matches!(result, Err(EscrowError::Unauthorized { .. })));
        assert_eq!(registry.total_supply(), 0);
        assert!(log.is_empty());
    }

    #[test]
    fn test_mint_rejects_empty_uri() {
        let issuer = Address::random();
        let mut registry = registry(issuer);

        let result = registry.mint(issuer, "  ", &mut EventLog::new());
        assert!(matches!(result, Err(EscrowError::InvalidMetadata(_))));
    }

    #[test]
    fn test_mint_stops_at_id_exhaustion() {
        let issuer = Address::random();
        let mut registry = registry(issuer);
        registry.last_id = u64::MAX;

        let result = registry.mint(issuer, URI, &mut EventLog::new());
        assert!(matches!(result, Err(EscrowError::Overflow)));
    }

    #[test]
    fn test_owner_of_unknown_token() {
        let registry = registry(Address::random());

        match registry.owner_of(TokenId(9)).unwrap_err() {
            EscrowError::NotFound(id) => assert_eq!(id, TokenId(9)),
            other => panic!("Expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_approved_transfer_clears_approval() {
        let owner = Address::random();
        let operator = Address::random();
        let recipient = Address::random();
        let mut registry = registry(owner);
        let mut log = EventLog::new();

        let id = registry.mint(owner, URI, &mut log).unwrap();
        registry.approve(owner, operator, id, &mut log).unwrap();
        assert_eq!(registry.get_approved(id).unwrap(), Some(operator));

        registry
            .transfer_from(operator, owner, recipient, id, &mut log)
            .unwrap();

        assert_eq!(registry.owner_of(id).unwrap(), recipient);
        assert_eq!(registry.get_approved(id).unwrap(), None);

        // approval was single-use
        let again = registry.transfer_from(operator, recipient, owner, id, &mut log);
        assert!(matches!(again, Err(EscrowError::Unauthorized { .. })));
    }

    #[test]
    fn test_approve_requires_owner() {
        let owner = Address::random();
        let stranger = Address::random();
        let mut registry = registry(owner);
        let mut log = EventLog::new();
        let id = registry.mint(owner, URI, &mut log).unwrap();

        let result = registry.approve(stranger, stranger, id, &mut log);
        assert!(matches!(result, Err(EscrowError::Unauthorized { .. })));
    }

    #[test]
    fn test_transfer_owner_mismatch() {
        let owner = Address::random();
        let impostor = Address::random();
        let mut registry = registry(owner);
        let mut log = EventLog::new();
        let id = registry.mint(owner, URI, &mut log).unwrap();

        match registry
            .transfer_from(impostor, impostor, Address::random(), id, &mut log)
            .unwrap_err()
        {
            EscrowError::OwnerMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, impostor);
                assert_eq!(actual, owner);
            }
            other => panic!("Expected owner mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_operator_for_all() {
        let owner = Address::random();
        let operator = Address::random();
        let mut registry = registry(owner);
        let mut log = EventLog::new();
        let id = registry.mint(owner, URI, &mut log).unwrap();

        registry
            .set_approval_for_all(owner, operator, true, &mut log)
            .unwrap();
        assert!(registry.is_approved_for_all(&owner, &operator));

        registry
            .transfer_from(operator, owner, operator, id, &mut log)
            .unwrap();
        assert_eq!(registry.owner_of(id).unwrap(), operator);

        registry
            .set_approval_for_all(owner, operator, false, &mut log)
            .unwrap();
        assert!(!registry.is_approved_for_all(&owner, &operator));
    }
}
