//! Ownership, pause flags and in-flight latches shared by every component.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::address::Address;
use crate::error::RewardError;
use crate::events::RewardEvent;

/// The four engine components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    QuestEngine,
    RewardVault,
    BoosterRegistry,
    TokenLedger,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::QuestEngine,
        Component::RewardVault,
        Component::BoosterRegistry,
        Component::TokenLedger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::QuestEngine => "quest_engine",
            Component::RewardVault => "reward_vault",
            Component::BoosterRegistry => "booster_registry",
            Component::TokenLedger => "token_ledger",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "quest_engine" | "engine" | "quests" => Some(Component::QuestEngine),
            "reward_vault" | "vault" => Some(Component::RewardVault),
            "booster_registry" | "booster" | "boosters" => Some(Component::BoosterRegistry),
            "token_ledger" | "token" | "ledger" => Some(Component::TokenLedger),
            _ => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner and pause flag for one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControl {
    component: Component,
    owner: Address,
    paused: bool,
}

impl AccessControl {
    pub fn new(component: Component, owner: Address) -> Self {
        Self {
            component,
            owner,
            paused: false,
        }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn only_owner(&self, caller: &Address) -> Result<(), RewardError> {
        if *caller == self.owner {
            Ok(())
        } else {
            Err(RewardError::NotOwner)
        }
    }

    pub fn when_not_paused(&self) -> Result<(), RewardError> {
        if self.paused {
            Err(RewardError::ContractPaused)
        } else {
            Ok(())
        }
    }

    pub fn pause(&mut self, caller: &Address, events: &mut Vec<RewardEvent>) -> Result<(), RewardError> {
        self.only_owner(caller)?;
        self.when_not_paused()?;
        self.paused = true;
        info!("{} paused by {}", self.component, caller);
        events.push(RewardEvent::Paused { component: self.component });
        Ok(())
    }

    pub fn unpause(&mut self, caller: &Address, events: &mut Vec<RewardEvent>) -> Result<(), RewardError> {
        self.only_owner(caller)?;
        if !self.paused {
            return Err(RewardError::ContractNotPaused);
        }
        self.paused = false;
        info!("{} unpaused by {}", self.component, caller);
        events.push(RewardEvent::Unpaused { component: self.component });
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: &Address,
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        self.only_owner(caller)?;
        new_owner.ensure_non_zero()?;
        let previous = std::mem::replace(&mut self.owner, new_owner.clone());
        info!("{} ownership moved from {} to {}", self.component, previous, new_owner);
        events.push(RewardEvent::OwnershipTransferred {
            component: self.component,
            previous_owner: previous,
            new_owner: new_owner.clone(),
        });
        Ok(())
    }
}

/// Single in-flight latch guarding an entry point against re-invocation
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    in_flight: Arc<AtomicBool>,
}

impl ReentrancyGuard {
    /// Set the latch; it clears when the returned `Latch` drops, on success or abort
    pub fn enter(&self) -> Result<Latch, RewardError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(RewardError::ReentrancyDetected);
        }
        Ok(Latch {
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_entered(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct Latch {
    in_flight: Arc<AtomicBool>,
}

impl Drop for Latch {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}
