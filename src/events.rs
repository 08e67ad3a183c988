//! Engine Events
//!
//! Emitted by components on successful state changes. Every call buffers its
//! events locally; the buffer is only published when the call succeeds.

use serde::{Deserialize, Serialize};

use crate::access::Component;
use crate::address::Address;
use crate::booster::BoosterTier;
use crate::types::{Amount, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RewardEvent {
    /// A quest completion was accepted and its reward accrued
    QuestCompleted {
        user: Address,
        quest_id: String,
        reward: Amount,
        streak: u32,
        timestamp: Timestamp,
    },

    /// The grace window lapsed and the streak restarted
    StreakBroken {
        user: Address,
        previous_streak: u32,
        new_streak: u32,
    },

    /// The streak landed exactly on a milestone (7, 30, 100)
    StreakMilestone { user: Address, streak: u32 },

    BoosterActivated {
        user: Address,
        tier: BoosterTier,
        expiry: Timestamp,
    },

    ReferralSet { user: Address, referrer: Address },

    RewardsClaimed { user: Address, amount: Amount },

    /// Token movement; `from` is the null address for mints
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },

    Approval {
        owner: Address,
        spender: Address,
        amount: Amount,
    },

    MinterAdded { minter: Address },

    MinterRemoved { minter: Address },

    Paused { component: Component },

    Unpaused { component: Component },

    /// An authorized-caller link was stored at deploy time
    ComponentLinked {
        component: Component,
        linked: Component,
        address: Address,
    },

    OwnershipTransferred {
        component: Component,
        previous_owner: Address,
        new_owner: Address,
    },
}

impl RewardEvent {
    /// Get event type as string (for logging and the event log)
    pub fn event_type(&self) -> &'static str {
        match self {
            RewardEvent::QuestCompleted { .. } => "quest_completed",
            RewardEvent::StreakBroken { .. } => "streak_broken",
            RewardEvent::StreakMilestone { .. } => "streak_milestone",
            RewardEvent::BoosterActivated { .. } => "booster_activated",
            RewardEvent::ReferralSet { .. } => "referral_set",
            RewardEvent::RewardsClaimed { .. } => "rewards_claimed",
            RewardEvent::Transfer { .. } => "transfer",
            RewardEvent::Approval { .. } => "approval",
            RewardEvent::MinterAdded { .. } => "minter_added",
            RewardEvent::MinterRemoved { .. } => "minter_removed",
            RewardEvent::Paused { .. } => "paused",
            RewardEvent::Unpaused { .. } => "unpaused",
            RewardEvent::ComponentLinked { .. } => "component_linked",
            RewardEvent::OwnershipTransferred { .. } => "ownership_transferred",
        }
    }

    /// The account this event is primarily about, if any
    pub fn account(&self) -> Option<&Address> {
        match self {
            RewardEvent::QuestCompleted { user, .. }
            | RewardEvent::StreakBroken { user, .. }
            | RewardEvent::StreakMilestone { user, .. }
            | RewardEvent::BoosterActivated { user, .. }
            | RewardEvent::ReferralSet { user, .. }
            | RewardEvent::RewardsClaimed { user, .. } => Some(user),
            RewardEvent::Transfer { to, .. } => Some(to),
            RewardEvent::Approval { owner, .. } => Some(owner),
            RewardEvent::MinterAdded { minter } | RewardEvent::MinterRemoved { minter } => {
                Some(minter)
            }
            RewardEvent::Paused { .. }
            | RewardEvent::Unpaused { .. }
            | RewardEvent::ComponentLinked { .. }
            | RewardEvent::OwnershipTransferred { .. } => None,
        }
    }

    /// Whether a subscriber following `account` should see this event
    pub fn involves(&self, account: &Address) -> bool {
        match self {
            RewardEvent::Transfer { from, to, .. } => from == account || to == account,
            RewardEvent::Approval { owner, spender, .. } => owner == account || spender == account,
            RewardEvent::ReferralSet { user, referrer } => user == account || referrer == account,
            _ => self.account() == Some(account),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_involves_both_transfer_sides() {
        let a = Address::from_low_u64(1);
        let b = Address::from_low_u64(2);
        let c = Address::from_low_u64(3);
        let event = RewardEvent::Transfer { from: a.clone(), to: b.clone(), amount: 5 };

        assert!(event.involves(&a));
        assert!(event.involves(&b));
        assert!(!event.involves(&c));
        assert_eq!(event.account(), Some(&b));
    }

    #[test]
    fn test_json_shape_is_tagged() {
        let event = RewardEvent::StreakMilestone { user: Address::from_low_u64(9), streak: 7 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "streakMilestone");
        assert_eq!(json["streak"], 7);
        assert_eq!(event.event_type(), "streak_milestone");
    }

    #[test]
    fn test_system_events_have_no_account() {
        let event = RewardEvent::Paused { component: Component::RewardVault };
        assert!(event.account().is_none());
        assert!(!event.involves(&Address::from_low_u64(1)));
    }
}
