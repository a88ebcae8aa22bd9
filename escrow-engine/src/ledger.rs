//! Value Ledger - Fungible balances per address
//!
//! Holds the value attached to payable calls and disburses it. Transfers
//! are all-or-nothing: a transfer the sender cannot cover changes nothing.

use crate::{
    error::EscrowError,
    events::{EventKind, EventLog},
    EscrowResult,
};
use deedlock_core::{Address, Amount};
use std::collections::HashMap;
use tracing::{debug, info};

/// Value transfer capability the escrow coordinator depends on
pub trait ValueTransfer {
    fn balance_of(&self, account: &Address) -> Amount;

    fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
        log: &mut EventLog,
    ) -> EscrowResult<()>;
}

/// In-memory balance ledger
#[derive(Debug, Clone)]
pub struct ValueLedger {
    /// Address that emits ledger events
    address: Address,
    balances: HashMap<Address, Amount>,
}

impl ValueLedger {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            balances: HashMap::new(),
        }
    }

    /// Fund an account out of thin air (genesis allocation)
    pub fn credit(&mut self, account: Address, amount: Amount) -> EscrowResult<Amount> {
        let balance = self.balance_of(&account).checked_add(amount)?;
        self.balances.insert(account, balance);
        info!("Credited {} with {} (balance {})", account, amount, balance);
        Ok(balance)
    }

    /// Sum of every balance
    pub fn total_supply(&self) -> EscrowResult<Amount> {
        Ok(Amount::checked_sum(self.balances.values().copied())?)
    }
}

impl ValueTransfer for ValueLedger {
    fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
        log: &mut EventLog,
    ) -> EscrowResult<()> {
        if amount.is_zero() {
            debug!("Skipping zero-value transfer from {} to {}", from, to);
            return Ok(());
        }

        let available = self.balance_of(&from);
        if available < amount {
            return Err(EscrowError::InsufficientFunds {
                account: from,
                required: amount,
                available,
            });
        }

        if from != to {
            let credited = self.balance_of(&to).checked_add(amount)?;
            self.balances.insert(from, available.checked_sub(amount)?);
            self.balances.insert(to, credited);
        }

        log.emit(self.address, EventKind::ValueTransferred { from, to, amount });

        info!("Transferred {} from {} to {}", amount, from, to);

        Ok(())
    }
}
