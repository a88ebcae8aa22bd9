//! Escrow Coordinator - Drives a property sale through its gated steps
//!
//! A listing moves from `Listed` to `Finalized` or `Cancelled`. While
//! listed, the earnest deposit, the inspection result and the three
//! approvals are independent sub-states that can be recorded in any order.
//! Funds are held per listing so concurrent sales never draw on each
//! other's money.

use crate::{
    config::EscrowPolicy,
    error::EscrowError,
    events::{EventKind, EventLog},
    ledger::ValueTransfer,
    models::{CancelOutcome, Listing, ListingState, RoleTable, SaleRole},
    registry::OwnershipRegistry,
    EscrowResult,
};
use chrono::Utc;
use deedlock_core::{Address, Amount, TokenId};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Everything a state-changing call can touch
///
/// `value` has already been moved from `caller` to the coordinator's
/// account by the time the coordinator sees the call.
pub struct CallContext<'a, R, V> {
    pub caller: Address,
    pub value: Amount,
    pub registry: &'a mut R,
    pub ledger: &'a mut V,
    pub log: &'a mut EventLog,
}

impl<'a, R, V> CallContext<'a, R, V>
where
    R: OwnershipRegistry,
    V: ValueTransfer,
{
    pub fn new(
        caller: Address,
        value: Amount,
        registry: &'a mut R,
        ledger: &'a mut V,
        log: &'a mut EventLog,
    ) -> Self {
        Self {
            caller,
            value,
            registry,
            ledger,
            log,
        }
    }
}

/// Escrow coordinator for sales of registry tokens
#[derive(Debug, Clone)]
pub struct EscrowCoordinator {
    address: Address,
    nft_address: Address,
    roles: RoleTable,
    policy: EscrowPolicy,
    listings: BTreeMap<TokenId, Listing>,
}

impl EscrowCoordinator {
    /// Create a new coordinator bound to a registry and a role table
    pub fn new(
        address: Address,
        nft_address: Address,
        roles: RoleTable,
        policy: EscrowPolicy,
    ) -> Self {
        Self {
            address,
            nft_address,
            roles,
            policy,
            listings: BTreeMap::new(),
        }
    }

    /// List a property for sale to `buyer`
    ///
    /// The coordinator must end up owning the token. If the registry does
    /// not already show it as owner, the token is pulled from the seller
    /// using the approval the seller granted the coordinator.
    pub fn list<R: OwnershipRegistry, V: ValueTransfer>(
        &mut self,
        ctx: &mut CallContext<'_, R, V>,
        token_id: TokenId,
        buyer: Address,
        purchase_price: Amount,
        escrow_amount: Amount,
    ) -> EscrowResult<()> {
        if ctx.caller != self.roles.seller {
            warn!("Rejected listing of property {} by {}", token_id, ctx.caller);
            return Err(EscrowError::unauthorized(ctx.caller, "list properties"));
        }

        let relistable = self
            .listings
            .get(&token_id)
            .map_or(true, |listing| listing.state.can_relist());
        if !relistable {
            return Err(EscrowError::AlreadyListed(token_id));
        }

        self.validate_terms(buyer, purchase_price, escrow_amount)?;
        self.check_registry(ctx.registry)?;

        let owner = ctx.registry.owner_of(token_id)?;
        if owner != self.address {
            ctx.registry.transfer_from(
                self.address,
                self.roles.seller,
                self.address,
                token_id,
                ctx.log,
            )?;
        }

        let listing = Listing::new(token_id, buyer, purchase_price, escrow_amount, self.roles);
        self.listings.insert(token_id, listing);

        ctx.log.emit(
            self.address,
            EventKind::Listed {
                token_id,
                buyer,
                purchase_price,
                escrow_amount,
            },
        );

        info!(
            "Listed property {} for {} (price {}, escrow {})",
            token_id, buyer, purchase_price, escrow_amount
        );

        Ok(())
    }

    /// Record the buyer's earnest deposit (payable)
    pub fn deposit_earnest<R: OwnershipRegistry, V: ValueTransfer>(
        &mut self,
        ctx: &mut CallContext<'_, R, V>,
        token_id: TokenId,
    ) -> EscrowResult<Amount> {
        let address = self.address;
        let enforce_minimum = self.policy.enforce_earnest_minimum;
        let listing = self.active_listing_mut(token_id)?;

        if ctx.caller != listing.buyer {
            warn!("Rejected earnest deposit on {} from {}", token_id, ctx.caller);
            return Err(EscrowError::unauthorized(
                ctx.caller,
                format!("deposit earnest for property {}", token_id),
            ));
        }

        if enforce_minimum && ctx.value < listing.escrow_amount {
            return Err(EscrowError::InsufficientValue {
                required: listing.escrow_amount,
                provided: ctx.value,
            });
        }

        listing.held = listing.held.checked_add(ctx.value)?;
        listing.updated_at = Utc::now();
        let held = listing.held;

        ctx.log.emit(
            address,
            EventKind::EarnestDeposited {
                token_id,
                buyer: ctx.caller,
                amount: ctx.value,
            },
        );

        info!(
            "Earnest deposit of {} on property {} (held {})",
            ctx.value, token_id, held
        );

        Ok(held)
    }

    /// Add purchase funds from the buyer or the lender (payable)
    pub fn contribute<R: OwnershipRegistry, V: ValueTransfer>(
        &mut self,
        ctx: &mut CallContext<'_, R, V>,
        token_id: TokenId,
    ) -> EscrowResult<Amount> {
        let address = self.address;
        let listing = self.active_listing_mut(token_id)?;

        let role = listing.approver_role(&ctx.caller);
        if !matches!(role, Some(SaleRole::Buyer) | Some(SaleRole::Lender)) {
            warn!("Rejected contribution to {} from {}", token_id, ctx.caller);
            return Err(EscrowError::unauthorized(
                ctx.caller,
                format!("fund the purchase of property {}", token_id),
            ));
        }

        if ctx.value.is_zero() {
            return Err(EscrowError::InsufficientValue {
                required: Amount::from_units(1),
                provided: ctx.value,
            });
        }

        listing.held = listing.held.checked_add(ctx.value)?;
        listing.updated_at = Utc::now();
        let held = listing.held;

        ctx.log.emit(
            address,
            EventKind::FundsContributed {
                token_id,
                contributor: ctx.caller,
                amount: ctx.value,
            },
        );

        info!(
            "Contribution of {} from {} on property {} (held {})",
            ctx.value, ctx.caller, token_id, held
        );

        Ok(held)
    }

    /// Record the inspection outcome; the inspector may change it later
    pub fn update_inspection_status<R: OwnershipRegistry, V: ValueTransfer>(
        &mut self,
        ctx: &mut CallContext<'_, R, V>,
        token_id: TokenId,
        passed: bool,
    ) -> EscrowResult<()> {
        let address = self.address;
        let listing = self.active_listing_mut(token_id)?;

        if ctx.caller != listing.roles.inspector {
            warn!("Rejected inspection update on {} from {}", token_id, ctx.caller);
            return Err(EscrowError::unauthorized(
                ctx.caller,
                format!("record the inspection of property {}", token_id),
            ));
        }

        listing.inspection_passed = passed;
        listing.updated_at = Utc::now();

        ctx.log
            .emit(address, EventKind::InspectionUpdated { token_id, passed });

        info!("Inspection of property {} recorded: passed={}", token_id, passed);

        Ok(())
    }

    /// Record the caller's approval of the sale
    pub fn approve_sale<R: OwnershipRegistry, V: ValueTransfer>(
        &mut self,
        ctx: &mut CallContext<'_, R, V>,
        token_id: TokenId,
    ) -> EscrowResult<SaleRole> {
        let address = self.address;
        let listing = self.active_listing_mut(token_id)?;

        let role = listing.approver_role(&ctx.caller).ok_or_else(|| {
            warn!("Rejected approval of {} from {}", token_id, ctx.caller);
            EscrowError::unauthorized(ctx.caller, format!("approve the sale of property {}", token_id))
        })?;

        listing.approvals.insert(ctx.caller);
        listing.updated_at = Utc::now();

        ctx.log.emit(
            address,
            EventKind::SaleApproved {
                token_id,
                approver: ctx.caller,
                role,
            },
        );

        info!("Sale of property {} approved by {} ({})", token_id, ctx.caller, role);

        Ok(role)
    }

    /// Complete the sale: token to the buyer, held funds to the seller
    pub fn finalize_sale<R: OwnershipRegistry, V: ValueTransfer>(
        &mut self,
        ctx: &mut CallContext<'_, R, V>,
        token_id: TokenId,
    ) -> EscrowResult<Amount> {
        if ctx.caller != self.roles.seller {
            warn!("Rejected finalize of {} from {}", token_id, ctx.caller);
            return Err(EscrowError::unauthorized(
                ctx.caller,
                format!("finalize the sale of property {}", token_id),
            ));
        }

        self.check_registry(ctx.registry)?;

        let listing = self.active_listing(token_id)?;
        if let Some(condition) = listing.unmet_condition() {
            warn!("Finalize of property {} blocked: {}", token_id, condition);
            return Err(EscrowError::precondition(token_id, condition));
        }

        let buyer = listing.buyer;
        let seller = listing.roles.seller;
        let held = listing.held;

        // A failure past this point is rolled back by the node snapshot
        ctx.registry
            .transfer_from(self.address, self.address, buyer, token_id, ctx.log)?;
        ctx.ledger.transfer(self.address, seller, held, ctx.log)?;

        let listing = self.active_listing_mut(token_id)?;
        listing.held = Amount::ZERO;
        listing.close(ListingState::Finalized);

        ctx.log.emit(
            self.address,
            EventKind::SaleFinalized {
                token_id,
                buyer,
                seller,
                amount: held,
            },
        );

        info!(
            "Finalized sale of property {}: owner {}, {} released to {}",
            token_id, buyer, held, seller
        );

        Ok(held)
    }

    /// Abort the sale and return the property to the seller
    ///
    /// Held funds go back to the buyer when the inspection has not passed,
    /// otherwise the earnest is forfeited to the seller.
    pub fn cancel_sale<R: OwnershipRegistry, V: ValueTransfer>(
        &mut self,
        ctx: &mut CallContext<'_, R, V>,
        token_id: TokenId,
    ) -> EscrowResult<CancelOutcome> {
        self.check_registry(ctx.registry)?;

        let listing = self.active_listing(token_id)?;
        let buyer = listing.buyer;
        let seller = listing.roles.seller;

        if ctx.caller != buyer && ctx.caller != seller {
            warn!("Rejected cancel of {} from {}", token_id, ctx.caller);
            return Err(EscrowError::unauthorized(
                ctx.caller,
                format!("cancel the sale of property {}", token_id),
            ));
        }

        let refunded_to_buyer = !listing.inspection_passed;
        let recipient = if refunded_to_buyer { buyer } else { seller };
        let amount = listing.held;

        ctx.registry
            .transfer_from(self.address, self.address, seller, token_id, ctx.log)?;
        ctx.ledger.transfer(self.address, recipient, amount, ctx.log)?;

        let listing = self.active_listing_mut(token_id)?;
        listing.held = Amount::ZERO;
        listing.close(ListingState::Cancelled);

        let outcome = CancelOutcome {
            token_id,
            recipient,
            amount,
            refunded_to_buyer,
        };

        ctx.log.emit(
            self.address,
            EventKind::SaleCancelled {
                token_id,
                recipient,
                amount,
                refunded_to_buyer,
            },
        );

        info!(
            "Cancelled sale of property {} by {}: {} paid to {}",
            token_id, ctx.caller, amount, recipient
        );

        Ok(outcome)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn nft_address(&self) -> Address {
        self.nft_address
    }

    pub fn seller(&self) -> Address {
        self.roles.seller
    }

    pub fn inspector(&self) -> Address {
        self.roles.inspector
    }

    pub fn lender(&self) -> Address {
        self.roles.lender
    }

    pub fn roles(&self) -> RoleTable {
        self.roles
    }

    pub fn policy(&self) -> &EscrowPolicy {
        &self.policy
    }

    /// True only while the listing is active
    pub fn is_listed(&self, token_id: TokenId) -> bool {
        self.listings
            .get(&token_id)
            .map(Listing::is_listed)
            .unwrap_or(false)
    }

    pub fn listing(&self, token_id: TokenId) -> EscrowResult<&Listing> {
        self.listings
            .get(&token_id)
            .ok_or(EscrowError::NotFound(token_id))
    }

    pub fn listings(&self) -> impl Iterator<Item = &Listing> {
        self.listings.values()
    }

    pub fn buyer(&self, token_id: TokenId) -> EscrowResult<Address> {
        Ok(self.listing(token_id)?.buyer)
    }

    pub fn purchase_price(&self, token_id: TokenId) -> EscrowResult<Amount> {
        Ok(self.listing(token_id)?.purchase_price)
    }

    pub fn escrow_amount(&self, token_id: TokenId) -> EscrowResult<Amount> {
        Ok(self.listing(token_id)?.escrow_amount)
    }

    pub fn inspection_passed(&self, token_id: TokenId) -> EscrowResult<bool> {
        Ok(self.listing(token_id)?.inspection_passed)
    }

    /// Whether `approver` approved the current listing of `token_id`
    pub fn approval(&self, token_id: TokenId, approver: &Address) -> bool {
        self.listings
            .get(&token_id)
            .map(|listing| listing.has_approved(approver))
            .unwrap_or(false)
    }

    pub fn held_balance(&self, token_id: TokenId) -> EscrowResult<Amount> {
        Ok(self.listing(token_id)?.held)
    }

    /// Value held across every listing
    pub fn total_held(&self) -> EscrowResult<Amount> {
        Ok(Amount::checked_sum(
            self.listings.values().map(|listing| listing.held),
        )?)
    }

    fn active_listing(&self, token_id: TokenId) -> EscrowResult<&Listing> {
        let listing = self.listing(token_id)?;
        if !listing.is_listed() {
            return Err(EscrowError::NotListed(token_id));
        }
        Ok(listing)
    }

    fn active_listing_mut(&mut self, token_id: TokenId) -> EscrowResult<&mut Listing> {
        let listing = self
            .listings
            .get_mut(&token_id)
            .ok_or(EscrowError::NotFound(token_id))?;
        if !listing.is_listed() {
            return Err(EscrowError::NotListed(token_id));
        }
        Ok(listing)
    }

    fn validate_terms(
        &self,
        buyer: Address,
        purchase_price: Amount,
        escrow_amount: Amount,
    ) -> EscrowResult<()> {
        if buyer.is_zero() {
            return Err(EscrowError::invalid_terms("Buyer cannot be the zero address"));
        }

        if buyer == self.roles.seller {
            return Err(EscrowError::invalid_terms("Buyer cannot be the seller"));
        }

        if buyer == self.roles.inspector || buyer == self.roles.lender {
            return Err(EscrowError::invalid_terms(
                "Buyer cannot also be the inspector or the lender",
            ));
        }

        if buyer == self.address || buyer == self.nft_address {
            return Err(EscrowError::invalid_terms(
                "Buyer cannot be a deployed component",
            ));
        }

        if purchase_price.is_zero() {
            return Err(EscrowError::invalid_terms(
                "Purchase price must be greater than 0",
            ));
        }

        if escrow_amount > purchase_price {
            return Err(EscrowError::invalid_terms(format!(
                "Escrow amount {} exceeds purchase price {}",
                escrow_amount, purchase_price
            )));
        }

        Ok(())
    }

    fn check_registry<R: OwnershipRegistry>(&self, registry: &R) -> EscrowResult<()> {
        if registry.address() != self.nft_address {
            return Err(EscrowError::config(format!(
                "Coordinator is bound to registry {}, not {}",
                self.nft_address,
                registry.address()
            )));
        }
        Ok(())
    }
}
