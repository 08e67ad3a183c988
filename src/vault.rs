//! Reward Vault
//!
//! Per-user accrual ledger. Only the linked quest engine may credit it;
//! claims convert pending accrual into freshly minted tokens.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::{AccessControl, Component, ReentrancyGuard};
use crate::address::Address;
use crate::error::RewardError;
use crate::events::RewardEvent;
use crate::token::TokenLedger;
use crate::types::{Amount, Timestamp};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualRecord {
    pub pending_rewards: Amount,
    pub total_earned: Amount,
    pub total_claimed: Amount,
    pub last_claim_at: Option<Timestamp>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RewardVault {
    address: Address,
    access: AccessControl,
    /// Sole caller allowed to accrue
    quest_engine: Option<Address>,
    accruals: HashMap<Address, AccrualRecord>,
    claim_cooldown_secs: i64,
    #[serde(skip)]
    guard: ReentrancyGuard,
}

impl RewardVault {
    pub fn new(address: Address, owner: Address, claim_cooldown_secs: i64) -> Self {
        Self {
            address,
            access: AccessControl::new(Component::RewardVault, owner),
            quest_engine: None,
            accruals: HashMap::new(),
            claim_cooldown_secs,
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

    pub fn quest_engine(&self) -> Option<&Address> {
        self.quest_engine.as_ref()
    }

    pub fn set_quest_engine(
        &mut self,
        caller: &Address,
        engine: &Address,
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        self.access.only_owner(caller)?;
        engine.ensure_non_zero()?;
        self.quest_engine = Some(engine.clone());
        info!("Reward vault linked to quest engine {}", engine);
        events.push(RewardEvent::ComponentLinked {
            component: Component::RewardVault,
            linked: Component::QuestEngine,
            address: engine.clone(),
        });
        Ok(())
    }

    /// Credit `amount` to `user`'s pending rewards
    pub fn accrue(
        &mut self,
        caller: &Address,
        user: &Address,
        amount: Amount,
    ) -> Result<AccrualRecord, RewardError> {
        let _latch = self.guard.enter()?;
        if self.quest_engine.as_ref() != Some(caller) {
            warn!("Accrual rejected: {} is not the linked quest engine", caller);
            return Err(RewardError::NotQuestHub);
        }
        self.access.when_not_paused()?;
        user.ensure_non_zero()?;

        let current = self.get_accrual(user);
        let updated = AccrualRecord {
            pending_rewards: current
                .pending_rewards
                .checked_add(amount)
                .ok_or(RewardError::RewardCalculationOverflow)?,
            total_earned: current
                .total_earned
                .checked_add(amount)
                .ok_or(RewardError::RewardCalculationOverflow)?,
            ..current
        };
        self.accruals.insert(user.clone(), updated);

        debug!("Accrued {} for {} (pending {})", amount, user, updated.pending_rewards);
        Ok(updated)
    }

    /// Mint all of `user`'s pending rewards. Nothing changes if the mint fails.
    pub fn claim_rewards(
        &mut self,
        user: &Address,
        ledger: &mut TokenLedger,
        now: Timestamp,
        events: &mut Vec<RewardEvent>,
    ) -> Result<Amount, RewardError> {
        let _latch = self.guard.enter()?;
        self.access.when_not_paused()?;
        user.ensure_non_zero()?;

        let current = self.get_accrual(user);
        if current.pending_rewards == 0 {
            return Err(RewardError::NoRewardsToClaim);
        }
        if self.claim_cooldown_secs > 0 {
            if let Some(last) = current.last_claim_at {
                let retry_at = last.saturating_add(self.claim_cooldown_secs);
                if now < retry_at {
                    return Err(RewardError::ClaimCooldownActive { retry_at });
                }
            }
        }

        let amount = current.pending_rewards;
        let total_claimed = current
            .total_claimed
            .checked_add(amount)
            .ok_or(RewardError::RewardCalculationOverflow)?;

        ledger.mint(&self.address, user, amount, events)?;

        self.accruals.insert(
            user.clone(),
            AccrualRecord {
                pending_rewards: 0,
                total_claimed,
                last_claim_at: Some(now),
                ..current
            },
        );

        info!("{} claimed {} reward units", user, amount);
        events.push(RewardEvent::RewardsClaimed {
            user: user.clone(),
            amount,
        });
        Ok(amount)
    }

    pub fn get_accrual(&self, user: &Address) -> AccrualRecord {
        self.accruals.get(user).copied().unwrap_or_default()
    }

    pub fn get_pending_rewards(&self, user: &Address) -> Amount {
        self.get_accrual(user).pending_rewards
    }

    pub fn get_total_rewards_earned(&self, user: &Address) -> Amount {
        self.get_accrual(user).total_earned
    }

    pub fn get_total_rewards_claimed(&self, user: &Address) -> Amount {
        self.get_accrual(user).total_claimed
    }
}
