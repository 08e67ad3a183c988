//! Quest Engine
//!
//! Validates quest completions, drives the streak state machine and prices
//! each completion before handing the reward to the vault.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::definition::QuestDefinition;
use super::registry::QuestCatalog;
use super::state::{QuestStatus, UserQuestState};
use super::streak::{milestone_reached, streak_multiplier, StreakPolicy, StreakRecord, StreakTransition};
use crate::access::{AccessControl, Component, ReentrancyGuard};
use crate::address::Address;
use crate::booster::BoosterRegistry;
use crate::error::RewardError;
use crate::events::RewardEvent;
use crate::types::{Amount, Timestamp, MULTIPLIER_BASE};
use crate::vault::RewardVault;

/// Result of an accepted completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestReceipt {
    pub quest_id: String,
    pub reward: Amount,
    pub streak: u32,
    pub streak_multiplier: u64,
    pub boost_multiplier: u64,
    pub pending_rewards: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestEngine {
    address: Address,
    access: AccessControl,
    booster_registry: Option<Address>,
    reward_vault: Option<Address>,
    streaks: HashMap<Address, StreakRecord>,
    quest_state: HashMap<Address, UserQuestState>,
    policy: StreakPolicy,
    min_completion_interval_secs: i64,
    #[serde(skip)]
    catalog: Arc<QuestCatalog>,
    #[serde(skip)]
    guard: ReentrancyGuard,
}

/// `base × streak / 100 × boost / 100`, failing closed on overflow
pub fn compute_reward(base: Amount, streak_multiplier: u64, boost_multiplier: u64) -> Result<Amount, RewardError> {
    base.checked_mul(streak_multiplier)
        .map(|v| v / MULTIPLIER_BASE)
        .and_then(|v| v.checked_mul(boost_multiplier))
        .map(|v| v / MULTIPLIER_BASE)
        .ok_or(RewardError::RewardCalculationOverflow)
}

impl QuestEngine {
    pub fn new(
        address: Address,
        owner: Address,
        policy: StreakPolicy,
        min_completion_interval_secs: i64,
        catalog: Arc<QuestCatalog>,
    ) -> Self {
        Self {
            address,
            access: AccessControl::new(Component::QuestEngine, owner),
            booster_registry: None,
            reward_vault: None,
            streaks: HashMap::new(),
            quest_state: HashMap::new(),
            policy,
            min_completion_interval_secs,
            catalog,
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

    pub fn catalog(&self) -> &Arc<QuestCatalog> {
        &self.catalog
    }

    /// Swap in a new catalog; completion history is kept
    pub fn replace_catalog(&mut self, catalog: Arc<QuestCatalog>) {
        info!("Quest catalog replaced ({} quests)", catalog.len());
        self.catalog = catalog;
    }

    pub fn policy(&self) -> StreakPolicy {
        self.policy
    }

    // ------------------------------------------------------------------
    // Linking
    // ------------------------------------------------------------------

    pub fn set_booster(
        &mut self,
        caller: &Address,
        booster: &Address,
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        self.access.only_owner(caller)?;
        booster.ensure_non_zero()?;
        self.booster_registry = Some(booster.clone());
        info!("Quest engine linked to booster registry {}", booster);
        events.push(RewardEvent::ComponentLinked {
            component: Component::QuestEngine,
            linked: Component::BoosterRegistry,
            address: booster.clone(),
        });
        Ok(())
    }

    pub fn set_vault(
        &mut self,
        caller: &Address,
        vault: &Address,
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        self.access.only_owner(caller)?;
        vault.ensure_non_zero()?;
        self.reward_vault = Some(vault.clone());
        info!("Quest engine linked to reward vault {}", vault);
        events.push(RewardEvent::ComponentLinked {
            component: Component::QuestEngine,
            linked: Component::RewardVault,
            address: vault.clone(),
        });
        Ok(())
    }

    pub fn booster_registry(&self) -> Option<&Address> {
        self.booster_registry.as_ref()
    }

    pub fn reward_vault(&self) -> Option<&Address> {
        self.reward_vault.as_ref()
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    pub fn complete_quest(
        &mut self,
        user: &Address,
        quest_id: &str,
        booster: &BoosterRegistry,
        vault: &mut RewardVault,
        now: Timestamp,
        events: &mut Vec<RewardEvent>,
    ) -> Result<QuestReceipt, RewardError> {
        let _latch = self.guard.enter()?;
        self.access.when_not_paused()?;
        self.ensure_linked(booster, vault)?;
        user.ensure_non_zero()?;

        let quest = self
            .catalog
            .get(quest_id)
            .cloned()
            .ok_or_else(|| RewardError::InvalidQuestType(quest_id.to_string()))?;

        self.check_eligibility(user, &quest, now)?;

        let current = self.get_streak_data(user);
        let (next, transition) = if quest.streak_eligible {
            self.policy.advance(&current, now)
        } else {
            (current, StreakTransition::Unchanged)
        };
        let effective_streak = if quest.streak_eligible {
            next.current_streak
        } else {
            self.effective_streak(&current, now)
        };

        let s_mult = streak_multiplier(effective_streak);
        let b_mult = booster.get_boost_multiplier(user, now);
        let reward = compute_reward(quest.base_reward, s_mult, b_mult)?;

        // Downstream first; nothing here is committed unless the vault accepts
        let accrual = vault.accrue(&self.address, user, reward)?;

        self.streaks.insert(user.clone(), next);
        self.quest_state
            .entry(user.clone())
            .or_default()
            .record(&quest.id, now);

        if let StreakTransition::Broken { previous } = transition {
            info!("Streak broken for {}: {} -> {}", user, previous, next.current_streak);
            events.push(RewardEvent::StreakBroken {
                user: user.clone(),
                previous_streak: previous,
                new_streak: next.current_streak,
            });
        }
        if let Some(streak) = milestone_reached(transition, next.current_streak) {
            info!("{} reached a {}-period streak", user, streak);
            events.push(RewardEvent::StreakMilestone {
                user: user.clone(),
                streak,
            });
        }

        info!(
            "{} completed {} for {} (streak {}, x{}/x{})",
            user, quest.id, reward, next.current_streak, s_mult, b_mult
        );
        events.push(RewardEvent::QuestCompleted {
            user: user.clone(),
            quest_id: quest.id.clone(),
            reward,
            streak: next.current_streak,
            timestamp: now,
        });

        Ok(QuestReceipt {
            quest_id: quest.id.clone(),
            reward,
            streak: next.current_streak,
            streak_multiplier: s_mult,
            boost_multiplier: b_mult,
            pending_rewards: accrual.pending_rewards,
        })
    }

    fn ensure_linked(&self, booster: &BoosterRegistry, vault: &RewardVault) -> Result<(), RewardError> {
        match (&self.booster_registry, &self.reward_vault) {
            (Some(b), Some(v)) if b == booster.address() && v == vault.address() => Ok(()),
            (None, _) | (_, None) => Err(RewardError::InvalidConfiguration(
                "quest engine is not linked".to_string(),
            )),
            _ => Err(RewardError::InvalidConfiguration(
                "component is not the linked instance".to_string(),
            )),
        }
    }

    fn check_eligibility(
        &self,
        user: &Address,
        quest: &QuestDefinition,
        now: Timestamp,
    ) -> Result<(), RewardError> {
        let empty = UserQuestState::default();
        let state = self.quest_state.get(user).unwrap_or(&empty);

        if self.min_completion_interval_secs > 0 {
            if let Some(last) = state.last_completion_at {
                let retry_at = last.saturating_add(self.min_completion_interval_secs);
                if now < retry_at {
                    return Err(RewardError::QuestOnCooldown { retry_at });
                }
            }
        }

        if state.status(quest, now) != QuestStatus::Available {
            debug!("{} already completed {} in this window", user, quest.id);
            return Err(RewardError::QuestAlreadyCompleted(quest.id.clone()));
        }

        if let Some(previous) = quest.requires_quest() {
            if !state.has_completed(previous) {
                return Err(RewardError::QuestRequirementsNotMet(previous.to_string()));
            }
        }

        if quest.bonus {
            let missing = self
                .catalog
                .cadence_siblings(quest)
                .into_iter()
                .find(|sibling| !state.completed_in_window(sibling, now));
            if let Some(sibling) = missing {
                warn!("Bonus quest {} locked for {}: {} not done", quest.id, user, sibling.id);
                return Err(RewardError::AllQuestsNotCompleted(quest.id.clone()));
            }
        }

        Ok(())
    }

    /// Stored streak, or 0 once the grace window has lapsed
    fn effective_streak(&self, record: &StreakRecord, now: Timestamp) -> u32 {
        match record.last_completion_time {
            Some(last) if now.saturating_sub(last) <= self.policy.grace_secs => record.current_streak,
            _ => 0,
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_streak(&self, user: &Address) -> u32 {
        self.get_streak_data(user).current_streak
    }

    /// Streak used for pricing at `now`; 0 once the grace window has lapsed
    pub fn get_effective_streak(&self, user: &Address, now: Timestamp) -> u32 {
        self.effective_streak(&self.get_streak_data(user), now)
    }

    pub fn get_streak_data(&self, user: &Address) -> StreakRecord {
        self.streaks.get(user).copied().unwrap_or_default()
    }

    pub fn get_quest_state(&self, user: &Address) -> UserQuestState {
        self.quest_state.get(user).cloned().unwrap_or_default()
    }

    /// Every catalog quest with its status for `user`
    pub fn quest_board(&self, user: &Address, now: Timestamp) -> Vec<(Arc<QuestDefinition>, QuestStatus)> {
        let empty = UserQuestState::default();
        let state = self.quest_state.get(user).unwrap_or(&empty);
        self.catalog
            .iter()
            .map(|quest| (Arc::clone(quest), state.status(quest, now)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booster::BoosterTier;
    use crate::config::BoosterConfig;
    use crate::types::SECONDS_PER_HOUR;

    const H: i64 = SECONDS_PER_HOUR;
    const T0: i64 = 1_700_000_000;
    const TOKEN: Amount = 1_000_000_000;

    fn owner() -> Address {
        Address::from_low_u64(0xaa)
    }

    fn user(n: u64) -> Address {
        Address::from_low_u64(0x1000 + n)
    }

    struct Rig {
        engine: QuestEngine,
        booster: BoosterRegistry,
        vault: RewardVault,
    }

    fn rig_with(min_interval: i64) -> Rig {
        let mut events = Vec::new();
        let mut engine = QuestEngine::new(
            Address::from_low_u64(0x01),
            owner(),
            StreakPolicy::default(),
            min_interval,
            Arc::new(QuestCatalog::builtin()),
        );
        let mut vault = RewardVault::new(Address::from_low_u64(0x02), owner(), 0);
        let booster = BoosterRegistry::new(Address::from_low_u64(0x03), owner(), &BoosterConfig::default());

        engine.set_booster(&owner(), booster.address(), &mut events).unwrap();
        engine.set_vault(&owner(), vault.address(), &mut events).unwrap();
        vault.set_quest_engine(&owner(), engine.address(), &mut events).unwrap();
        Rig { engine, booster, vault }
    }

    fn rig() -> Rig {
        rig_with(0)
    }

    impl Rig {
        fn complete(&mut self, who: &Address, quest: &str, now: Timestamp) -> Result<QuestReceipt, RewardError> {
            self.complete_logged(who, quest, now, &mut Vec::new())
        }

        fn complete_logged(
            &mut self,
            who: &Address,
            quest: &str,
            now: Timestamp,
            events: &mut Vec<RewardEvent>,
        ) -> Result<QuestReceipt, RewardError> {
            self.engine
                .complete_quest(who, quest, &self.booster, &mut self.vault, now, events)
        }
    }

    #[test]
    fn test_compute_reward() {
        assert_eq!(compute_reward(10 * TOKEN, 100, 100), Ok(10 * TOKEN));
        assert_eq!(compute_reward(10 * TOKEN, 150, 110), Ok(16_500_000_000));
        assert_eq!(compute_reward(Amount::MAX, 300, 100), Err(RewardError::RewardCalculationOverflow));
    }

    #[test]
    fn test_first_completion_accrues_base_reward() {
        let mut rig = rig();
        let mut events = Vec::new();
        let receipt = rig.complete_logged(&user(1), "daily_check_in", T0, &mut events).unwrap();

        assert_eq!(receipt.reward, 10 * TOKEN);
        assert_eq!(receipt.streak, 1);
        assert_eq!(rig.vault.get_pending_rewards(&user(1)), 10 * TOKEN);
        assert_eq!(
            events,
            vec![RewardEvent::QuestCompleted {
                user: user(1),
                quest_id: "daily_check_in".into(),
                reward: 10 * TOKEN,
                streak: 1,
                timestamp: T0,
            }]
        );
    }

    #[test]
    fn test_second_check_in_same_window_is_rejected() {
        let mut rig = rig();
        rig.complete(&user(1), "daily_check_in", T0).unwrap();

        let err = rig.complete(&user(1), "daily_check_in", T0 + 2 * H).unwrap_err();
        assert_eq!(err, RewardError::QuestAlreadyCompleted("daily_check_in".into()));
        assert_eq!(rig.engine.get_streak(&user(1)), 1);
        assert_eq!(rig.vault.get_pending_rewards(&user(1)), 10 * TOKEN);
    }

    #[test]
    fn test_streak_round_trip_emits_break() {
        let mut rig = rig();
        rig.complete(&user(1), "daily_check_in", T0).unwrap();
        rig.complete(&user(1), "daily_check_in", T0 + 36 * H).unwrap();
        assert_eq!(rig.engine.get_streak(&user(1)), 2);

        let mut events = Vec::new();
        rig.complete_logged(&user(1), "daily_check_in", T0 + 85 * H, &mut events).unwrap();
        assert_eq!(rig.engine.get_streak(&user(1)), 1);
        assert_eq!(rig.engine.get_streak_data(&user(1)).longest_streak, 2);
        assert_eq!(
            events[0],
            RewardEvent::StreakBroken { user: user(1), previous_streak: 2, new_streak: 1 }
        );
    }

    #[test]
    fn test_streak_milestone_and_multiplier() {
        let mut rig = rig();
        let mut events = Vec::new();
        for day in 0..7 {
            rig.complete_logged(&user(1), "daily_check_in", T0 + day * 24 * H, &mut events).unwrap();
        }
        assert!(events.contains(&RewardEvent::StreakMilestone { user: user(1), streak: 7 }));

        let receipt = rig.complete(&user(1), "daily_check_in", T0 + 7 * 24 * H).unwrap();
        assert_eq!(receipt.streak, 8);
        assert_eq!(receipt.streak_multiplier, 150);
        assert_eq!(receipt.reward, 15 * TOKEN);
    }

    #[test]
    fn test_booster_and_referrals_scale_reward() {
        let mut rig = rig();
        let u = user(1);
        rig.booster.set_referrer(&user(2), &u, &mut Vec::new()).unwrap();
        rig.booster.set_referrer(&user(3), &u, &mut Vec::new()).unwrap();
        rig.booster
            .activate_booster(&u, &u, BoosterTier::Gold, T0, &mut Vec::new())
            .unwrap();

        let receipt = rig.complete(&u, "daily_check_in", T0).unwrap();
        assert_eq!(receipt.boost_multiplier, 160);
        assert_eq!(receipt.reward, 16 * TOKEN);
    }

    #[test]
    fn test_unknown_quest() {
        let mut rig = rig();
        assert_eq!(
            rig.complete(&user(1), "dance", T0),
            Err(RewardError::InvalidQuestType("dance".into()))
        );
    }

    #[test]
    fn test_chain_prerequisite() {
        let mut rig = rig();
        assert_eq!(
            rig.complete(&user(1), "weekly_challenge", T0),
            Err(RewardError::QuestRequirementsNotMet("onboarding_tutorial".into()))
        );
        rig.complete(&user(1), "onboarding_tutorial", T0).unwrap();
        rig.complete(&user(1), "weekly_challenge", T0 + H).unwrap();

        // One-time quests never reopen
        assert_eq!(
            rig.complete(&user(1), "onboarding_tutorial", T0 + 1_000 * H),
            Err(RewardError::QuestAlreadyCompleted("onboarding_tutorial".into()))
        );
    }

    #[test]
    fn test_bonus_quest_needs_all_siblings() {
        let mut rig = rig();
        rig.complete(&user(1), "daily_check_in", T0).unwrap();
        assert_eq!(
            rig.complete(&user(1), "daily_sweep", T0 + H),
            Err(RewardError::AllQuestsNotCompleted("daily_sweep".into()))
        );

        rig.complete(&user(1), "social_share", T0 + H).unwrap();
        rig.complete(&user(1), "daily_sweep", T0 + 2 * H).unwrap();
        assert_eq!(rig.engine.get_streak(&user(1)), 1);
    }

    #[test]
    fn test_two_dailies_each_morning_grow_streak() {
        let mut rig = rig();
        let mut events = Vec::new();
        for day in 0..7 {
            let morning = T0 + day * 24 * H;
            rig.complete_logged(&user(1), "daily_check_in", morning, &mut events).unwrap();
            let receipt = rig
                .complete_logged(&user(1), "social_share", morning + 300, &mut events)
                .unwrap();
            assert_eq!(receipt.streak, day as u32 + 1);
        }

        assert_eq!(rig.engine.get_streak(&user(1)), 7);
        let milestones: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, RewardEvent::StreakMilestone { .. }))
            .collect();
        assert_eq!(milestones, vec![&RewardEvent::StreakMilestone { user: user(1), streak: 7 }]);
    }

    #[test]
    fn test_effective_streak_lapses_after_grace() {
        let mut rig = rig();
        rig.complete(&user(1), "daily_check_in", T0).unwrap();
        rig.complete(&user(1), "daily_check_in", T0 + 24 * H).unwrap();
        assert_eq!(rig.engine.get_effective_streak(&user(1), T0 + 72 * H), 2);
        assert_eq!(rig.engine.get_effective_streak(&user(1), T0 + 72 * H + 1), 0);
        assert_eq!(rig.engine.get_streak(&user(1)), 2);
    }

    #[test]
    fn test_min_completion_interval() {
        let mut rig = rig_with(60);
        rig.complete(&user(1), "daily_check_in", T0).unwrap();
        assert_eq!(
            rig.complete(&user(1), "social_share", T0 + 10),
            Err(RewardError::QuestOnCooldown { retry_at: T0 + 60 })
        );
        assert!(rig.complete(&user(1), "social_share", T0 + 60).is_ok());
    }

    #[test]
    fn test_non_streak_quest_keeps_streak() {
        let mut rig = rig();
        rig.complete(&user(1), "daily_check_in", T0).unwrap();
        rig.complete(&user(1), "onboarding_tutorial", T0 + 30 * H).unwrap();
        let data = rig.engine.get_streak_data(&user(1));
        assert_eq!(data.current_streak, 1);
        assert_eq!(data.last_completion_time, Some(T0));
    }

    #[test]
    fn test_unlinked_or_foreign_components_rejected() {
        let mut engine = QuestEngine::new(
            Address::from_low_u64(0x01),
            owner(),
            StreakPolicy::default(),
            0,
            Arc::new(QuestCatalog::builtin()),
        );
        let booster = BoosterRegistry::new(Address::from_low_u64(0x03), owner(), &BoosterConfig::default());
        let mut vault = RewardVault::new(Address::from_low_u64(0x02), owner(), 0);

        let err = engine
            .complete_quest(&user(1), "daily_check_in", &booster, &mut vault, T0, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, RewardError::InvalidConfiguration(_)));

        engine.set_booster(&owner(), &Address::from_low_u64(0x33), &mut Vec::new()).unwrap();
        engine.set_vault(&owner(), vault.address(), &mut Vec::new()).unwrap();
        let err = engine
            .complete_quest(&user(1), "daily_check_in", &booster, &mut vault, T0, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, RewardError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_vault_failure_leaves_engine_untouched() {
        let mut rig = rig();
        rig.vault.access_mut().pause(&owner(), &mut Vec::new()).unwrap();

        assert_eq!(rig.complete(&user(1), "daily_check_in", T0), Err(RewardError::ContractPaused));
        assert_eq!(rig.engine.get_streak_data(&user(1)), StreakRecord::default());
        assert!(!rig.engine.get_quest_state(&user(1)).has_completed("daily_check_in"));
    }

    #[test]
    fn test_paused_engine_then_resumed() {
        let mut rig = rig();
        rig.engine.access_mut().pause(&owner(), &mut Vec::new()).unwrap();
        assert_eq!(rig.complete(&user(1), "daily_check_in", T0), Err(RewardError::ContractPaused));

        rig.engine.access_mut().unpause(&owner(), &mut Vec::new()).unwrap();
        assert_eq!(rig.complete(&user(1), "daily_check_in", T0).unwrap().reward, 10 * TOKEN);
    }
}
