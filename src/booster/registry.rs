//! Booster Registry
//!
//! Per-user booster records and the referral graph. Referrers are write-once
//! and the graph is kept acyclic, so upstream walks always terminate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::tier::BoosterTier;
use crate::access::{AccessControl, Component};
use crate::address::Address;
use crate::config::BoosterConfig;
use crate::error::RewardError;
use crate::events::RewardEvent;
use crate::types::{Timestamp, SECONDS_PER_DAY};

/// A user's booster; zero state is tier `None` with no expiry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoosterRecord {
    pub tier: BoosterTier,
    pub expiry: Timestamp,
    pub activated_at: Timestamp,
}

impl BoosterRecord {
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.tier != BoosterTier::None && now < self.expiry
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub referrer: Option<Address>,
    pub referral_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BoosterRegistry {
    address: Address,
    access: AccessControl,
    boosters: HashMap<Address, BoosterRecord>,
    referrals: HashMap<Address, ReferralRecord>,
    duration_secs: i64,
    referral_bonus_step: u64,
    referral_bonus_cap: u64,
}

impl BoosterRegistry {
    pub fn new(address: Address, owner: Address, config: &BoosterConfig) -> Self {
        Self {
            address,
            access: AccessControl::new(Component::BoosterRegistry, owner),
            boosters: HashMap::new(),
            referrals: HashMap::new(),
            duration_secs: config.duration_days as i64 * SECONDS_PER_DAY,
            referral_bonus_step: config.referral_bonus_step,
            referral_bonus_cap: config.referral_bonus_cap,
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
    // Boosters
    // ------------------------------------------------------------------

    /// Activate or upgrade `user`'s booster. Callable by the user or the owner.
    pub fn activate_booster(
        &mut self,
        caller: &Address,
        user: &Address,
        tier: BoosterTier,
        now: Timestamp,
        events: &mut Vec<RewardEvent>,
    ) -> Result<BoosterRecord, RewardError> {
        if caller != user && caller != self.access.owner() {
            warn!("Booster activation for {} rejected: caller {}", user, caller);
            return Err(RewardError::Unauthorized);
        }
        self.access.when_not_paused()?;
        user.ensure_non_zero()?;
        if tier == BoosterTier::None {
            return Err(RewardError::InvalidBoosterTier(tier.to_string()));
        }

        let current = self.get_user_booster(user);
        if current.is_active(now) {
            if tier == current.tier {
                return Err(RewardError::BoosterAlreadyActive);
            }
            if tier < current.tier {
                return Err(RewardError::CannotDowngradeBooster);
            }
        }

        let expiry = now
            .checked_add(self.duration_secs)
            .ok_or(RewardError::RewardCalculationOverflow)?;
        let record = BoosterRecord {
            tier,
            expiry,
            activated_at: now,
        };
        self.boosters.insert(user.clone(), record);

        info!("Booster {} activated for {} until {}", tier, user, expiry);
        events.push(RewardEvent::BoosterActivated {
            user: user.clone(),
            tier,
            expiry,
        });
        Ok(record)
    }

    pub fn get_booster_multiplier(&self, tier: BoosterTier) -> u64 {
        tier.multiplier_bps()
    }

    pub fn is_booster_active(&self, user: &Address, now: Timestamp) -> bool {
        self.get_user_booster(user).is_active(now)
    }

    /// Stored record, whether or not it has expired
    pub fn get_user_booster(&self, user: &Address) -> BoosterRecord {
        self.boosters.get(user).copied().unwrap_or_default()
    }

    pub fn get_booster_expiry(&self, user: &Address) -> Timestamp {
        self.get_user_booster(user).expiry
    }

    // ------------------------------------------------------------------
    // Referrals
    // ------------------------------------------------------------------

    pub fn set_referrer(
        &mut self,
        user: &Address,
        referrer: &Address,
        events: &mut Vec<RewardEvent>,
    ) -> Result<(), RewardError> {
        self.access.when_not_paused()?;
        user.ensure_non_zero()?;
        if user == referrer {
            return Err(RewardError::CannotReferSelf);
        }
        referrer.ensure_non_zero()?;
        if self.get_referrer(user).is_some() {
            return Err(RewardError::ReferrerAlreadySet);
        }
        if self.upstream_contains(referrer, user) {
            warn!("Referral {} -> {} would close a cycle", user, referrer);
            return Err(RewardError::ReferralCycleDetected);
        }

        let count = self
            .get_referral_count(referrer)
            .checked_add(1)
            .ok_or(RewardError::RewardCalculationOverflow)?;
        self.referrals.entry(referrer.clone()).or_default().referral_count = count;
        self.referrals.entry(user.clone()).or_default().referrer = Some(referrer.clone());

        info!("Referral set: {} referred by {}", user, referrer);
        events.push(RewardEvent::ReferralSet {
            user: user.clone(),
            referrer: referrer.clone(),
        });
        Ok(())
    }

    /// Walk the referrer chain starting at `start`, looking for `target`
    fn upstream_contains(&self, start: &Address, target: &Address) -> bool {
        let mut cursor = Some(start);
        let mut hops = 0usize;
        while let Some(addr) = cursor {
            if addr == target {
                return true;
            }
            hops += 1;
            if hops > self.referrals.len() {
                break;
            }
            cursor = self.referrals.get(addr).and_then(|r| r.referrer.as_ref());
        }
        false
    }

    pub fn get_referrer(&self, user: &Address) -> Option<&Address> {
        self.referrals.get(user).and_then(|r| r.referrer.as_ref())
    }

    pub fn get_referral_count(&self, user: &Address) -> u32 {
        self.referrals.get(user).map(|r| r.referral_count).unwrap_or(0)
    }

    pub fn get_referral_record(&self, user: &Address) -> ReferralRecord {
        self.referrals.get(user).cloned().unwrap_or_default()
    }

    pub fn get_referral_bonus(&self, user: &Address) -> u64 {
        let count = self.get_referral_count(user) as u64;
        count
            .saturating_mul(self.referral_bonus_step)
            .min(self.referral_bonus_cap)
    }

    /// Active tier multiplier (100 when inactive) plus the user's own referral bonus
    pub fn get_boost_multiplier(&self, user: &Address, now: Timestamp) -> u64 {
        let booster = self.get_user_booster(user);
        let tier = if booster.is_active(now) {
            booster.tier
        } else {
            BoosterTier::None
        };
        let multiplier = tier.multiplier_bps() + self.get_referral_bonus(user);
        debug!("Boost multiplier for {}: {} (tier {})", user, multiplier, tier);
        multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = SECONDS_PER_DAY;
    const T0: i64 = 1_700_000_000;

    fn owner() -> Address {
        Address::from_low_u64(0xaa)
    }

    fn user(n: u64) -> Address {
        Address::from_low_u64(0x1000 + n)
    }

    fn registry() -> BoosterRegistry {
        BoosterRegistry::new(Address::from_low_u64(0x03), owner(), &BoosterConfig::default())
    }

    #[test]
    fn test_activation_by_self_or_owner() {
        let mut reg = registry();
        let mut events = Vec::new();

        let err = reg
            .activate_booster(&user(2), &user(1), BoosterTier::Gold, T0, &mut events)
            .unwrap_err();
        assert_eq!(err, RewardError::Unauthorized);

        let record = reg
            .activate_booster(&user(1), &user(1), BoosterTier::Gold, T0, &mut events)
            .unwrap();
        assert_eq!(record.expiry, T0 + 30 * DAY);
        assert!(reg.is_booster_active(&user(1), T0 + 1));

        reg.activate_booster(&owner(), &user(2), BoosterTier::Bronze, T0, &mut events)
            .unwrap();
        assert_eq!(reg.get_user_booster(&user(2)).tier, BoosterTier::Bronze);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_none_tier_is_invalid() {
        let mut reg = registry();
        let err = reg
            .activate_booster(&user(1), &user(1), BoosterTier::None, T0, &mut Vec::new())
            .unwrap_err();
        assert_eq!(err, RewardError::InvalidBoosterTier("none".into()));
    }

    #[test]
    fn test_reactivation_rules_while_active() {
        let mut reg = registry();
        let mut events = Vec::new();
        let u = user(1);
        reg.activate_booster(&u, &u, BoosterTier::Silver, T0, &mut events).unwrap();

        assert_eq!(
            reg.activate_booster(&u, &u, BoosterTier::Silver, T0 + DAY, &mut events),
            Err(RewardError::BoosterAlreadyActive)
        );
        assert_eq!(
            reg.activate_booster(&u, &u, BoosterTier::Bronze, T0 + DAY, &mut events),
            Err(RewardError::CannotDowngradeBooster)
        );

        let upgraded = reg
            .activate_booster(&u, &u, BoosterTier::Platinum, T0 + DAY, &mut events)
            .unwrap();
        assert_eq!(upgraded.expiry, T0 + 31 * DAY);
        assert_eq!(upgraded.activated_at, T0 + DAY);
    }

    #[test]
    fn test_expired_booster_accepts_any_tier() {
        let mut reg = registry();
        let u = user(1);
        reg.activate_booster(&u, &u, BoosterTier::Diamond, T0, &mut Vec::new()).unwrap();

        let later = T0 + 30 * DAY;
        assert!(!reg.is_booster_active(&u, later));
        assert_eq!(reg.get_boost_multiplier(&u, later), 100);

        reg.activate_booster(&u, &u, BoosterTier::Bronze, later, &mut Vec::new()).unwrap();
        assert_eq!(reg.get_boost_multiplier(&u, later), 110);
    }

    #[test]
    fn test_referral_bonus_steps_and_caps() {
        let mut reg = registry();
        let referrer = user(0);
        let mut bonuses = vec![reg.get_referral_bonus(&referrer)];
        for n in 1..=7 {
            reg.set_referrer(&user(n), &referrer, &mut Vec::new()).unwrap();
            bonuses.push(reg.get_referral_bonus(&referrer));
        }
        assert_eq!(bonuses, vec![0, 5, 10, 15, 20, 25, 25, 25]);
        assert_eq!(reg.get_referral_count(&referrer), 7);
        // Referred users get nothing until someone names them
        assert_eq!(reg.get_referral_bonus(&user(1)), 0);
    }

    #[test]
    fn test_referral_validation() {
        let mut reg = registry();
        let mut events = Vec::new();

        assert_eq!(reg.set_referrer(&user(1), &user(1), &mut events), Err(RewardError::CannotReferSelf));
        assert_eq!(
            reg.set_referrer(&user(1), &Address::zero(), &mut events),
            Err(RewardError::ZeroAddress)
        );

        reg.set_referrer(&user(1), &user(2), &mut events).unwrap();
        assert_eq!(
            reg.set_referrer(&user(1), &user(3), &mut events),
            Err(RewardError::ReferrerAlreadySet)
        );
        assert_eq!(reg.get_referrer(&user(1)), Some(&user(2)));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_referral_cycles_are_rejected() {
        let mut reg = registry();
        let mut events = Vec::new();
        // 1 <- 2 <- 3 means 3 referred by 2, 2 referred by 1
        reg.set_referrer(&user(2), &user(1), &mut events).unwrap();
        reg.set_referrer(&user(3), &user(2), &mut events).unwrap();

        assert_eq!(
            reg.set_referrer(&user(1), &user(3), &mut events),
            Err(RewardError::ReferralCycleDetected)
        );
        assert_eq!(reg.get_referrer(&user(1)), None);
        assert_eq!(reg.get_referral_count(&user(3)), 0);
    }

    #[test]
    fn test_boost_multiplier_composition() {
        let mut reg = registry();
        let u = user(1);
        reg.set_referrer(&user(2), &u, &mut Vec::new()).unwrap();
        reg.set_referrer(&user(3), &u, &mut Vec::new()).unwrap();
        assert_eq!(reg.get_boost_multiplier(&u, T0), 110);

        reg.activate_booster(&u, &u, BoosterTier::Gold, T0, &mut Vec::new()).unwrap();
        assert_eq!(reg.get_boost_multiplier(&u, T0), 160);
    }

    #[test]
    fn test_paused_registry() {
        let mut reg = registry();
        let mut events = Vec::new();
        reg.access_mut().pause(&owner(), &mut events).unwrap();

        assert_eq!(
            reg.activate_booster(&user(1), &user(1), BoosterTier::Gold, T0, &mut events),
            Err(RewardError::ContractPaused)
        );
        assert_eq!(reg.set_referrer(&user(1), &user(2), &mut events), Err(RewardError::ContractPaused));
        assert_eq!(reg.get_boost_multiplier(&user(1), T0), 100);
    }
}
