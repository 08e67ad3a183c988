//! Token Ledger
//!
//! Capped-supply balance ledger. Supply only grows through `mint`, which is
//! restricted to registered minters and can never push `total_supply` past
//! `max_supply`. Every other operation moves balances and conserves supply.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::{AccessControl, Component, ReentrancyGuard};
use crate::address::Address;
use crate::error::RewardError;
use crate::events::RewardEvent;
use crate::types::Amount;

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenLedger {
    address: Address,
    access: AccessControl,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    total_supply: Amount,
    max_supply: Amount,
    balances: HashMap<Address, Amount>,
    /// owner -> spender -> remaining allowance
    allowances: HashMap<Address, HashMap<Address, Amount>>,
    minters: BTreeSet<Address>,
    #[serde(skip)]
    guard: ReentrancyGuard,
}

impl TokenLedger {
    pub fn new(
        address: Address,
        owner: Address,
        name: &str,
        symbol: &str,
        decimals: u8,
        max_supply: Amount,
    ) -> Self {
        Self {
            address,
            access: AccessControl::new(Component::TokenLedger, owner),
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            total_supply: 0,
            max_supply,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            minters: BTreeSet::new(),
            guard: ReentrancyGuard::default(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn access_mut(&mut self) -> &mut AccessControl {
        &mut self.access
    }

    // ------------------------------------------------------------------
    // Minter management
    // ------------------------------------------------------------------

    pub fn add_minter(
        &mut self,
        caller: &Address,
        minter: &Address,
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        self.access.only_owner(caller)?;
        minter.ensure_non_zero()?;
        if self.minters.insert(minter.clone()) {
            info!("Minter added: {}", minter);
            events.push(RewardEvent::MinterAdded { minter: minter.clone() });
        }
        Ok(())
    }

    pub fn remove_minter(
        &mut self,
        caller: &Address,
        minter: &Address,
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        self.access.only_owner(caller)?;
        minter.ensure_non_zero()?;
        if self.minters.remove(minter) {
            info!("Minter removed: {}", minter);
            events.push(RewardEvent::MinterRemoved { minter: minter.clone() });
        }
        Ok(())
    }

    pub fn is_minter(&self, addr: &Address) -> bool {
        self.minters.contains(addr)
    }

    pub fn minters(&self) -> impl Iterator<Item = &Address> {
        self.minters.iter()
    }

    // ------------------------------------------------------------------
    // Supply
    // ------------------------------------------------------------------

    /// Mint new tokens to `to`. Fails without side effects if it would break the cap.
    pub fn mint(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        let _latch = self.guard.enter()?;
        self.access.when_not_paused()?;
        if !self.minters.contains(caller) {
            warn!("Mint rejected: {} is not a minter", caller);
            return Err(RewardError::NotMinter);
        }
        to.ensure_non_zero()?;
        if amount == 0 {
            return Err(RewardError::ZeroAmount);
        }

        let remaining = self.remaining_supply();
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .filter(|supply| *supply <= self.max_supply)
            .ok_or(RewardError::MaxSupplyExceeded { requested: amount, remaining })?;
        let new_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(RewardError::RewardCalculationOverflow)?;

        self.total_supply = new_supply;
        self.balances.insert(to.clone(), new_balance);

        debug!("Minted {} to {} (supply {}/{})", amount, to, self.total_supply, self.max_supply);
        events.push(RewardEvent::Transfer {
            from: Address::zero(),
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn max_supply(&self) -> Amount {
        self.max_supply
    }

    pub fn remaining_supply(&self) -> Amount {
        self.max_supply.saturating_sub(self.total_supply)
    }

    // ------------------------------------------------------------------
    // Balances
    // ------------------------------------------------------------------

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn transfer(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        self.access.when_not_paused()?;
        self.move_balance(caller, to, amount, events)
    }

    pub fn approve(
        &mut self,
        caller: &Address,
        spender: &Address,
        amount: Amount,
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        self.access.when_not_paused()?;
        spender.ensure_non_zero()?;

        let spenders = self.allowances.entry(caller.clone()).or_default();
        if amount == 0 {
            spenders.remove(spender);
        } else {
            spenders.insert(spender.clone(), amount);
        }

        events.push(RewardEvent::Approval {
            owner: caller.clone(),
            spender: spender.clone(),
            amount,
        });
        Ok(())
    }

    /// Move `amount` from `from` to `to` on behalf of `caller`, consuming allowance
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        self.access.when_not_paused()?;
        let allowed = self.allowance(from, caller);
        if allowed < amount {
            warn!("transferFrom rejected: {} allowed {} of {}, wanted {}", caller, allowed, from, amount);
            return Err(RewardError::TransferFailed);
        }

        self.move_balance(from, to, amount, events)?;

        if let Some(spenders) = self.allowances.get_mut(from) {
            let left = allowed - amount;
            if left == 0 {
                spenders.remove(caller);
            } else {
                spenders.insert(caller.clone(), left);
            }
        }
        Ok(())
    }

    /// Transfer to several recipients at once; either every leg lands or none do
    pub fn batch_transfer(
        &mut self,
        caller: &Address,
        recipients: &[Address],
        amounts: &[Amount],
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        self.access.when_not_paused()?;
        if recipients.len() != amounts.len() {
            return Err(RewardError::ArrayLengthMismatch {
                left: recipients.len(),
                right: amounts.len(),
            });
        }

        let mut total: Amount = 0;
        for (recipient, amount) in recipients.iter().zip(amounts) {
            recipient.ensure_non_zero()?;
            if *amount == 0 {
                return Err(RewardError::ZeroAmount);
            }
            total = total
                .checked_add(*amount)
                .ok_or(RewardError::RewardCalculationOverflow)?;
        }
        let available = self.balance_of(caller);
        if available < total {
            return Err(RewardError::InsufficientBalance { available, required: total });
        }

        for (recipient, amount) in recipients.iter().zip(amounts) {
            self.move_balance(caller, recipient, *amount, events)?;
        }
        Ok(())
    }

    fn move_balance(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        to.ensure_non_zero()?;
        if amount == 0 {
            return Err(RewardError::ZeroAmount);
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(RewardError::InsufficientBalance { available, required: amount });
        }

        self.balances.insert(from.clone(), available - amount);
        // Cannot overflow: the sum of all balances equals total_supply
        *self.balances.entry(to.clone()).or_insert(0) += amount;

        events.push(RewardEvent::Transfer {
            from: from.clone(),
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    /// Sum of every balance; equals `total_supply` at all times
    pub fn sum_of_balances(&self) -> u128 {
        self.balances.values().map(|b| *b as u128).sum()
    }
}
