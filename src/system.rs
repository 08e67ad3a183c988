//! Reward System
//!
//! Owns the four components, links them at deploy and routes every external
//! call, handing each component the others it needs by reference. Each call
//! buffers its events and only returns them when the whole call succeeded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::access::{AccessControl, Component};
use crate::address::Address;
use crate::booster::{BoosterRecord, BoosterRegistry, BoosterTier};
use crate::config::EngineConfig;
use crate::error::RewardError;
use crate::events::RewardEvent;
use crate::quest::{QuestCatalog, QuestEngine, QuestReceipt, StreakPolicy};
use crate::token::TokenLedger;
use crate::types::{Amount, Timestamp};
use crate::vault::RewardVault;

/// A successful call's return value and the events it produced
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub events: Vec<RewardEvent>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RewardSystem {
    engine: QuestEngine,
    vault: RewardVault,
    booster: BoosterRegistry,
    token: TokenLedger,
}

impl RewardSystem {
    /// Build every component and perform the one-time linking
    pub fn deploy(config: &EngineConfig, catalog: Arc<QuestCatalog>) -> Result<Outcome<Self>, RewardError> {
        config.validate()?;
        let owner = &config.owner;
        let addrs = &config.deployment;

        let mut token = TokenLedger::new(
            addrs.token_ledger.clone(),
            owner.clone(),
            &config.token.name,
            &config.token.symbol,
            config.token.decimals,
            config.token.max_supply,
        );
        let booster = BoosterRegistry::new(addrs.booster_registry.clone(), owner.clone(), &config.booster);
        let mut vault = RewardVault::new(
            addrs.reward_vault.clone(),
            owner.clone(),
            config.vault.claim_cooldown_secs,
        );
        let mut engine = QuestEngine::new(
            addrs.quest_engine.clone(),
            owner.clone(),
            StreakPolicy::from_hours(config.streak.period_hours, config.streak.grace_hours),
            config.quests.min_completion_interval_secs,
            catalog,
        );

        let mut events = Vec::new();
        token.add_minter(owner, vault.address(), &mut events)?;
        vault.set_quest_engine(owner, engine.address(), &mut events)?;
        engine.set_booster(owner, booster.address(), &mut events)?;
        engine.set_vault(owner, vault.address(), &mut events)?;

        info!(
            "Reward system deployed: engine {} vault {} booster {} token {}",
            engine.address(),
            vault.address(),
            booster.address(),
            token.address()
        );

        Ok(Outcome {
            value: Self {
                engine,
                vault,
                booster,
                token,
            },
            events,
        })
    }

    /// Restore from a JSON snapshot and attach the current catalog
    pub fn restore(json: &str, catalog: Arc<QuestCatalog>) -> Result<Self, serde_json::Error> {
        let mut system: RewardSystem = serde_json::from_str(json)?;
        system.engine.replace_catalog(catalog);
        Ok(system)
    }

    pub fn snapshot(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn replace_catalog(&mut self, catalog: Arc<QuestCatalog>) {
        self.engine.replace_catalog(catalog);
    }

    fn run<T>(
        &mut self,
        op: impl FnOnce(&mut Self, &mut Vec<RewardEvent>) -> Result<T, RewardError>,
    ) -> Result<Outcome<T>, RewardError> {
        let mut events = Vec::new();
        let value = op(self, &mut events)?;
        Ok(Outcome { value, events })
    }

    // ------------------------------------------------------------------
    // Quests and rewards
    // ------------------------------------------------------------------

    pub fn complete_quest(
        &mut self,
        user: &Address,
        quest_id: &str,
        now: Timestamp,
    ) -> Result<Outcome<QuestReceipt>, RewardError> {
        self.run(|sys, events| {
            sys.engine
                .complete_quest(user, quest_id, &sys.booster, &mut sys.vault, now, events)
        })
    }

    pub fn claim_rewards(&mut self, user: &Address, now: Timestamp) -> Result<Outcome<Amount>, RewardError> {
        self.run(|sys, events| sys.vault.claim_rewards(user, &mut sys.token, now, events))
    }

    // ------------------------------------------------------------------
    // Boosters and referrals
    // ------------------------------------------------------------------

    pub fn activate_booster(
        &mut self,
        caller: &Address,
        user: &Address,
        tier: BoosterTier,
        now: Timestamp,
    ) -> Result<Outcome<BoosterRecord>, RewardError> {
        self.run(|sys, events| sys.booster.activate_booster(caller, user, tier, now, events))
    }

    pub fn set_referrer(&mut self, user: &Address, referrer: &Address) -> Result<Outcome<()>, RewardError> {
        self.run(|sys, events| sys.booster.set_referrer(user, referrer, events))
    }

    // ------------------------------------------------------------------
    // Token
    // ------------------------------------------------------------------

    pub fn transfer(&mut self, caller: &Address, to: &Address, amount: Amount) -> Result<Outcome<()>, RewardError> {
        self.run(|sys, events| sys.token.transfer(caller, to, amount, events))
    }

    pub fn approve(
        &mut self,
        caller: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<Outcome<()>, RewardError> {
        self.run(|sys, events| sys.token.approve(caller, spender, amount, events))
    }

    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<Outcome<()>, RewardError> {
        self.run(|sys, events| sys.token.transfer_from(caller, from, to, amount, events))
    }

    pub fn batch_transfer(
        &mut self,
        caller: &Address,
        recipients: &[Address],
        amounts: &[Amount],
    ) -> Result<Outcome<()>, RewardError> {
        self.run(|sys, events| sys.token.batch_transfer(caller, recipients, amounts, events))
    }

    pub fn add_minter(&mut self, caller: &Address, minter: &Address) -> Result<Outcome<()>, RewardError> {
        self.run(|sys, events| sys.token.add_minter(caller, minter, events))
    }

    pub fn remove_minter(&mut self, caller: &Address, minter: &Address) -> Result<Outcome<()>, RewardError> {
        self.run(|sys, events| sys.token.remove_minter(caller, minter, events))
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    fn access_mut(&mut self, component: Component) -> &mut AccessControl {
        match component {
            Component::QuestEngine => self.engine.access_mut(),
            Component::RewardVault => self.vault.access_mut(),
            Component::BoosterRegistry => self.booster.access_mut(),
            Component::TokenLedger => self.token.access_mut(),
        }
    }

    pub fn access(&self, component: Component) -> &AccessControl {
        match component {
            Component::QuestEngine => self.engine.access(),
            Component::RewardVault => self.vault.access(),
            Component::BoosterRegistry => self.booster.access(),
            Component::TokenLedger => self.token.access(),
        }
    }

    pub fn pause(&mut self, caller: &Address, component: Component) -> Result<Outcome<()>, RewardError> {
        self.run(|sys, events| sys.access_mut(component).pause(caller, events))
    }

    pub fn unpause(&mut self, caller: &Address, component: Component) -> Result<Outcome<()>, RewardError> {
        self.run(|sys, events| sys.access_mut(component).unpause(caller, events))
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        component: Component,
        new_owner: &Address,
    ) -> Result<Outcome<()>, RewardError> {
        self.run(|sys, events| sys.access_mut(component).transfer_ownership(caller, new_owner, events))
    }

    // ------------------------------------------------------------------
    // Component access for queries
    // ------------------------------------------------------------------

    pub fn engine(&self) -> &QuestEngine {
        &self.engine
    }

    pub fn vault(&self) -> &RewardVault {
        &self.vault
    }

    pub fn booster(&self) -> &BoosterRegistry {
        &self.booster
    }

    pub fn token(&self) -> &TokenLedger {
        &self.token
    }
}
