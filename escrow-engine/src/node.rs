//! Main Escrow Node - High-level API for the escrow system
//!
//! The node is the execution environment the registry, the ledger and the
//! coordinator run in. All calls are serialized through one write lock,
//! and each call runs against a snapshot that is restored if the call
//! fails, so a rejected call never leaves partial ownership, value or
//! event changes behind.

use crate::{
    config::EscrowNodeConfig,
    coordinator::{CallContext, EscrowCoordinator},
    error::EscrowError,
    events::{EscrowEvent, EventLog},
    ledger::{ValueLedger, ValueTransfer},
    models::{CancelOutcome, Listing, RoleTable, SaleRole},
    registry::{OwnershipRegistry, PropertyRegistry},
    EscrowResult,
};
use deedlock_core::{Address, Amount, TokenId};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Deployment nonce of the property registry
const REGISTRY_NONCE: u64 = 0;
/// Deployment nonce of the escrow coordinator
const ESCROW_NONCE: u64 = 1;

/// Everything the node's calls can change
#[derive(Debug, Clone)]
struct WorldState {
    registry: PropertyRegistry,
    ledger: ValueLedger,
    escrow: EscrowCoordinator,
    log: EventLog,
}

/// Main escrow node that coordinates all components
#[derive(Clone)]
pub struct EscrowNode {
    config: EscrowNodeConfig,
    deployer: Address,
    state: Arc<RwLock<WorldState>>,
}

impl EscrowNode {
    /// Deploy a registry minted by `deployer` and a coordinator bound to `roles`
    pub fn deploy(
        config: EscrowNodeConfig,
        deployer: Address,
        roles: RoleTable,
    ) -> EscrowResult<Self> {
        config.validate()?;
        roles.validate()?;

        let registry_address = Address::derive(&deployer, REGISTRY_NONCE);
        let escrow_address = Address::derive(&deployer, ESCROW_NONCE);
        if roles.contains(&registry_address) || roles.contains(&escrow_address) {
            return Err(EscrowError::config(
                "Sale parties cannot be deployed component addresses",
            ));
        }

        let registry = PropertyRegistry::new(
            registry_address,
            config.registry.name.clone(),
            config.registry.symbol.clone(),
            deployer,
        );
        let escrow = EscrowCoordinator::new(
            escrow_address,
            registry_address,
            roles,
            config.policy.clone(),
        );

        info!(
            "Deployed registry {} and escrow {} (seller {}, inspector {}, lender {})",
            registry_address, escrow_address, roles.seller, roles.inspector, roles.lender
        );

        Ok(Self {
            config,
            deployer,
            state: Arc::new(RwLock::new(WorldState {
                registry,
                ledger: ValueLedger::new(Address::ZERO),
                escrow,
                log: EventLog::new(),
            })),
        })
    }

    pub fn config(&self) -> &EscrowNodeConfig {
        &self.config
    }

    pub fn deployer(&self) -> Address {
        self.deployer
    }

    pub fn registry_address(&self) -> Address {
        Address::derive(&self.deployer, REGISTRY_NONCE)
    }

    pub fn escrow_address(&self) -> Address {
        Address::derive(&self.deployer, ESCROW_NONCE)
    }

    // ----- value -----

    /// Genesis allocation for an account
    pub async fn fund_account(&self, account: Address, amount: Amount) -> EscrowResult<Amount> {
        if account == self.escrow_address() {
            return Err(EscrowError::UnattributedValue(account));
        }

        self.transact("fund account", |world| world.ledger.credit(account, amount))
            .await
    }

    /// Plain value transfer between accounts
    pub async fn transfer_value(
        &self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> EscrowResult<()> {
        self.ensure_external(from)?;
        if to == self.escrow_address() {
            return Err(EscrowError::UnattributedValue(to));
        }

        self.transact("transfer value", |world| {
            world.ledger.transfer(from, to, amount, &mut world.log)
        })
        .await
    }

    pub async fn balance_of(&self, account: Address) -> Amount {
        self.read(|world| world.ledger.balance_of(&account)).await
    }

    // ----- property registry -----

    pub async fn mint(&self, caller: Address, metadata_uri: &str) -> EscrowResult<TokenId> {
        self.ensure_external(caller)?;
        self.transact("mint", |world| {
            world.registry.mint(caller, metadata_uri, &mut world.log)
        })
        .await
    }

    pub async fn approve(
        &self,
        caller: Address,
        operator: Address,
        token_id: TokenId,
    ) -> EscrowResult<()> {
        self.ensure_external(caller)?;
        self.transact("approve", |world| {
            world
                .registry
                .approve(caller, operator, token_id, &mut world.log)
        })
        .await
    }

    pub async fn set_approval_for_all(
        &self,
        caller: Address,
        operator: Address,
        approved: bool,
    ) -> EscrowResult<()> {
        self.ensure_external(caller)?;
        self.transact("set approval for all", |world| {
            world
                .registry
                .set_approval_for_all(caller, operator, approved, &mut world.log)
        })
        .await
    }

    pub async fn transfer_from(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        token_id: TokenId,
    ) -> EscrowResult<()> {
        self.ensure_external(caller)?;
        self.transact("transfer property", |world| {
            world
                .registry
                .transfer_from(caller, from, to, token_id, &mut world.log)
        })
        .await
    }

    pub async fn owner_of(&self, token_id: TokenId) -> EscrowResult<Address> {
        self.read(|world| world.registry.owner_of(token_id)).await
    }

    pub async fn get_approved(&self, token_id: TokenId) -> EscrowResult<Option<Address>> {
        self.read(|world| world.registry.get_approved(token_id)).await
    }

    pub async fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.read(|world| world.registry.is_approved_for_all(&owner, &operator))
            .await
    }

    pub async fn token_uri(&self, token_id: TokenId) -> EscrowResult<String> {
        self.read(|world| world.registry.token_uri(token_id)).await
    }

    /// Number of property tokens owned by `owner`
    pub async fn token_balance(&self, owner: Address) -> usize {
        self.read(|world| world.registry.balance_of(&owner)).await
    }

    pub async fn total_supply(&self) -> u64 {
        self.read(|world| world.registry.total_supply()).await
    }

    // ----- escrow coordinator -----

    pub async fn list(
        &self,
        caller: Address,
        token_id: TokenId,
        buyer: Address,
        purchase_price: Amount,
        escrow_amount: Amount,
    ) -> EscrowResult<()> {
        self.call_escrow(caller, Amount::ZERO, "list", |escrow, ctx| {
            escrow.list(ctx, token_id, buyer, purchase_price, escrow_amount)
        })
        .await
    }

    /// Deposit earnest money; `value` moves from the caller to the escrow
    pub async fn deposit_earnest(
        &self,
        caller: Address,
        token_id: TokenId,
        value: Amount,
    ) -> EscrowResult<Amount> {
        self.call_escrow(caller, value, "deposit earnest", |escrow, ctx| {
            escrow.deposit_earnest(ctx, token_id)
        })
        .await
    }

    /// Add purchase funds as buyer or lender
    pub async fn contribute(
        &self,
        caller: Address,
        token_id: TokenId,
        value: Amount,
    ) -> EscrowResult<Amount> {
        self.call_escrow(caller, value, "contribute", |escrow, ctx| {
            escrow.contribute(ctx, token_id)
        })
        .await
    }

    pub async fn update_inspection_status(
        &self,
        caller: Address,
        token_id: TokenId,
        passed: bool,
    ) -> EscrowResult<()> {
        self.call_escrow(caller, Amount::ZERO, "update inspection", |escrow, ctx| {
            escrow.update_inspection_status(ctx, token_id, passed)
        })
        .await
    }

    pub async fn approve_sale(&self, caller: Address, token_id: TokenId) -> EscrowResult<SaleRole> {
        self.call_escrow(caller, Amount::ZERO, "approve sale", |escrow, ctx| {
            escrow.approve_sale(ctx, token_id)
        })
        .await
    }

    /// Finalize the sale, returning the amount released to the seller
    pub async fn finalize_sale(&self, caller: Address, token_id: TokenId) -> EscrowResult<Amount> {
        self.call_escrow(caller, Amount::ZERO, "finalize sale", |escrow, ctx| {
            escrow.finalize_sale(ctx, token_id)
        })
        .await
    }

    pub async fn cancel_sale(
        &self,
        caller: Address,
        token_id: TokenId,
    ) -> EscrowResult<CancelOutcome> {
        self.call_escrow(caller, Amount::ZERO, "cancel sale", |escrow, ctx| {
            escrow.cancel_sale(ctx, token_id)
        })
        .await
    }

    /// Value held by the escrow across all listings
    pub async fn get_balance(&self) -> Amount {
        self.read(|world| world.ledger.balance_of(&world.escrow.address()))
            .await
    }

    pub async fn nft_address(&self) -> Address {
        self.read(|world| world.escrow.nft_address()).await
    }

    pub async fn seller(&self) -> Address {
        self.read(|world| world.escrow.seller()).await
    }

    pub async fn inspector(&self) -> Address {
        self.read(|world| world.escrow.inspector()).await
    }

    pub async fn lender(&self) -> Address {
        self.read(|world| world.escrow.lender()).await
    }

    pub async fn is_listed(&self, token_id: TokenId) -> bool {
        self.read(|world| world.escrow.is_listed(token_id)).await
    }

    pub async fn buyer(&self, token_id: TokenId) -> EscrowResult<Address> {
        self.read(|world| world.escrow.buyer(token_id)).await
    }

    pub async fn purchase_price(&self, token_id: TokenId) -> EscrowResult<Amount> {
        self.read(|world| world.escrow.purchase_price(token_id)).await
    }

    pub async fn escrow_amount(&self, token_id: TokenId) -> EscrowResult<Amount> {
        self.read(|world| world.escrow.escrow_amount(token_id)).await
    }

    pub async fn inspection_passed(&self, token_id: TokenId) -> EscrowResult<bool> {
        self.read(|world| world.escrow.inspection_passed(token_id))
            .await
    }

    pub async fn approval(&self, token_id: TokenId, approver: Address) -> bool {
        self.read(|world| world.escrow.approval(token_id, &approver))
            .await
    }

    pub async fn held_balance(&self, token_id: TokenId) -> EscrowResult<Amount> {
        self.read(|world| world.escrow.held_balance(token_id)).await
    }

    pub async fn listing(&self, token_id: TokenId) -> EscrowResult<Listing> {
        self.read(|world| world.escrow.listing(token_id).cloned())
            .await
    }

    pub async fn listings(&self) -> Vec<Listing> {
        self.read(|world| world.escrow.listings().cloned().collect())
            .await
    }

    /// Per-listing held funds summed; equals [`Self::get_balance`]
    pub async fn total_held(&self) -> EscrowResult<Amount> {
        self.read(|world| world.escrow.total_held()).await
    }

    // ----- audit trail -----

    pub async fn events(&self) -> Vec<EscrowEvent> {
        self.read(|world| world.log.events().to_vec()).await
    }

    pub async fn events_for(&self, token_id: TokenId) -> Vec<EscrowEvent> {
        self.read(|world| world.log.for_token(token_id)).await
    }

    // ----- execution -----

    /// Run a coordinator call with `value` attached
    async fn call_escrow<T, F>(
        &self,
        caller: Address,
        value: Amount,
        action: &str,
        op: F,
    ) -> EscrowResult<T>
    where
        F: FnOnce(
            &mut EscrowCoordinator,
            &mut CallContext<'_, PropertyRegistry, ValueLedger>,
        ) -> EscrowResult<T>,
    {
        self.ensure_external(caller)?;
        self.transact(action, |world| {
            let escrow_address = world.escrow.address();
            world
                .ledger
                .transfer(caller, escrow_address, value, &mut world.log)?;

            let mut ctx = CallContext::new(
                caller,
                value,
                &mut world.registry,
                &mut world.ledger,
                &mut world.log,
            );
            op(&mut world.escrow, &mut ctx)
        })
        .await
    }

    /// Apply `op` atomically: on error the pre-call state is restored
    ///
    /// The snapshot clones the whole world state, event log included, so
    /// every call costs time proportional to the history.
    async fn transact<T, F>(&self, action: &str, op: F) -> EscrowResult<T>
    where
        F: FnOnce(&mut WorldState) -> EscrowResult<T>,
    {
        let mut state = self.state.write().await;
        let snapshot = state.clone();

        match op(&mut state) {
            Ok(result) => Ok(result),
            Err(err) => {
                *state = snapshot;
                warn!("Reverted {}: {}", action, err);
                Err(err)
            }
        }
    }

    async fn read<T, F>(&self, op: F) -> T
    where
        F: FnOnce(&WorldState) -> T,
    {
        let state = self.state.read().await;
        op(&state)
    }

    /// Deployed components never originate calls
    fn ensure_external(&self, caller: Address) -> EscrowResult<()> {
        if caller == self.registry_address() || caller == self.escrow_address() || caller.is_zero()
        {
            return Err(EscrowError::unauthorized(
                caller,
                "originate calls as a deployed component",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deedlock_core::tokens;

    const URI: &str = "https://ipfs.io/ipfs/QmQVcpsjrA6cr1iJjZAodYwmPekYgbnXGo4DFubJiLc2EB/1.json";

    struct Parties {
        buyer: Address,
        seller: Address,
        inspector: Address,
        lender: Address,
    }

    async fn deploy() -> (EscrowNode, Parties) {
        let parties = Parties {
            buyer: Address::random(),
            seller: Address::random(),
            inspector: Address::random(),
            lender: Address::random(),
        };
        let node = EscrowNode::deploy(
            EscrowNodeConfig::default(),
            parties.seller,
            RoleTable::new(parties.seller, parties.inspector, parties.lender),
        )
        .unwrap();
        node.fund_account(parties.buyer, tokens(50)).await.unwrap();
        node.fund_account(parties.lender, tokens(50)).await.unwrap();
        (node, parties)
    }

    async fn listed() -> (EscrowNode, Parties) {
        let (node, p) = deploy().await;
        let id = node.mint(p.seller, URI).await.unwrap();
        node.approve(p.seller, node.escrow_address(), id).await.unwrap();
        node.list(p.seller, id, p.buyer, tokens(10), tokens(5))
            .await
            .unwrap();
        (node, p)
    }

    #[tokio::test]
    async fn test_deploy_wires_components() {
        let (node, p) = deploy().await;

        assert_eq!(node.nft_address().await, node.registry_address());
        assert_eq!(node.seller().await, p.seller);
        assert_eq!(node.inspector().await, p.inspector);
        assert_eq!(node.lender().await, p.lender);
        assert_ne!(node.registry_address(), node.escrow_address());
    }

    #[test]
    fn test_deploy_rejects_invalid_roles() {
        let seller = Address::random();
        let inspector = Address::random();

        let shared = EscrowNode::deploy(
            EscrowNodeConfig::default(),
            seller,
            RoleTable::new(seller, inspector, inspector),
        );
        let zero = EscrowNode::deploy(
            EscrowNodeConfig::default(),
            seller,
            RoleTable::new(seller, Address::ZERO, inspector),
        );
        let component = EscrowNode::deploy(
            EscrowNodeConfig::default(),
            seller,
            RoleTable::new(seller, inspector, Address::derive(&seller, ESCROW_NONCE)),
        );

        for result in [shared, zero, component] {
            assert!(matches!(result, Err(EscrowError::Config(_))));
        }
    }

    #[tokio::test]
    async fn test_failed_deposit_returns_attached_value() {
        let (node, p) = listed().await;
        let events_before = node.events().await.len();

        // lender is not the buyer; the attached value must come back
        let result = node.deposit_earnest(p.lender, TokenId(1), tokens(5)).await;

        assert!(matches!(result, Err(EscrowError::Unauthorized { .. })));
        assert_eq!(node.balance_of(p.lender).await, tokens(50));
        assert_eq!(node.get_balance().await, Amount::ZERO);
        assert_eq!(node.events().await.len(), events_before);
    }

    #[tokio::test]
    async fn test_deposit_beyond_balance_fails() {
        let (node, p) = listed().await;

        let result = node.deposit_earnest(p.buyer, TokenId(1), tokens(51)).await;

        assert!(matches!(result, Err(EscrowError::InsufficientFunds { .. })));
        assert_eq!(node.held_balance(TokenId(1)).await.unwrap(), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_failed_list_leaves_no_trace() {
        let (node, p) = deploy().await;
        let id = node.mint(p.seller, URI).await.unwrap();
        let events_before = node.events().await;

        let result = node.list(p.seller, id, p.buyer, tokens(10), tokens(5)).await;

        assert!(result.is_err());
        assert!(!node.is_listed(id).await);
        assert_eq!(node.owner_of(id).await.unwrap(), p.seller);
        assert_eq!(node.events().await, events_before);
    }

    #[tokio::test]
    async fn test_unattributed_value_rejected() {
        let (node, p) = listed().await;

        let result = node
            .transfer_value(p.lender, node.escrow_address(), tokens(5))
            .await;

        assert!(matches!(result, Err(EscrowError::UnattributedValue(_))));
        assert_eq!(node.get_balance().await, Amount::ZERO);
    }

    #[tokio::test]
    async fn test_components_cannot_originate_calls() {
        let (node, p) = listed().await;

        let result = node
            .transfer_from(node.escrow_address(), node.escrow_address(), p.buyer, TokenId(1))
            .await;

        assert!(matches!(result, Err(EscrowError::Unauthorized { .. })));
        assert_eq!(node.owner_of(TokenId(1)).await.unwrap(), node.escrow_address());
    }

    #[tokio::test]
    async fn test_events_for_listing() {
        let (node, p) = listed().await;
        node.deposit_earnest(p.buyer, TokenId(1), tokens(5))
            .await
            .unwrap();

        let names: Vec<&str> = node
            .events_for(TokenId(1))
            .await
            .iter()
            .map(|event| event.kind.name())
            .collect();

        assert_eq!(
            names,
            vec!["transfer", "approval", "transfer", "listed", "earnest_deposited"]
        );
    }
}
