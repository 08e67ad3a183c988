//! Quest Definition Structures
//!
//! These structures are deserialized from TOML quest files.

use serde::{Deserialize, Serialize};

use crate::types::{Amount, Timestamp, SECONDS_PER_HOUR};

/// A quest definition file
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestFile {
    pub quest: RawQuest,
}

/// Raw quest data as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_reward: Amount,
    /// Hours before the quest can be completed again; 0 means one-time
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u32,
    /// Whether completing this quest advances the streak
    #[serde(default = "default_true")]
    pub streak_eligible: bool,
    /// Bonus quests unlock once every sibling of the same cadence is done
    #[serde(default)]
    pub bonus: bool,
    #[serde(default)]
    pub chain: Option<RawQuestChain>,
}

/// Quest chain configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuestChain {
    /// Previous quest that must be completed
    pub previous: Option<String>,
}

fn default_cooldown_hours() -> u32 {
    24
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Resolved Quest Structures (after parsing)
// ============================================================================

/// Quest chain configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuestChain {
    /// Previous quest that must be completed
    pub previous: Option<String>,
}

/// A fully resolved quest definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub base_reward: Amount,
    pub cooldown_hours: u32,
    pub streak_eligible: bool,
    pub bonus: bool,
    pub chain: QuestChain,
}

impl QuestDefinition {
    /// Create a quest from raw TOML data
    pub fn from_raw(raw: &RawQuest) -> Result<Self, String> {
        let id = raw.id.trim();
        if id.is_empty() {
            return Err("Quest id must not be empty".to_string());
        }
        if raw.base_reward == 0 {
            return Err(format!("Quest '{}' has a zero base reward", id));
        }
        if raw.chain.as_ref().and_then(|c| c.previous.as_deref()) == Some(id) {
            return Err(format!("Quest '{}' lists itself as its previous quest", id));
        }

        Ok(Self {
            id: id.to_string(),
            name: raw.name.clone(),
            description: raw.description.clone(),
            base_reward: raw.base_reward,
            cooldown_hours: raw.cooldown_hours,
            streak_eligible: raw.streak_eligible,
            bonus: raw.bonus,
            chain: QuestChain {
                previous: raw.chain.as_ref().and_then(|c| c.previous.clone()),
            },
        })
    }

    /// Shorthand for the built-in catalog
    pub fn simple(id: &str, name: &str, base_reward: Amount, cooldown_hours: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            base_reward,
            cooldown_hours,
            streak_eligible: true,
            bonus: false,
            chain: QuestChain::default(),
        }
    }

    pub fn is_one_time(&self) -> bool {
        self.cooldown_hours == 0
    }

    /// Length of the eligibility window in seconds
    pub fn cooldown_secs(&self) -> Timestamp {
        self.cooldown_hours as Timestamp * SECONDS_PER_HOUR
    }

    /// Check if a prerequisite quest is required
    pub fn requires_quest(&self) -> Option<&str> {
        self.chain.previous.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_toml() {
        let raw: RawQuestFile = toml::from_str(
            r#"
[quest]
id = "daily_check_in"
name = "Daily Check-in"
base_reward = 10000000000
"#,
        )
        .unwrap();
        let quest = QuestDefinition::from_raw(&raw.quest).unwrap();

        assert_eq!(quest.cooldown_hours, 24);
        assert!(quest.streak_eligible);
        assert!(!quest.bonus);
        assert_eq!(quest.cooldown_secs(), 86_400);
        assert_eq!(quest.requires_quest(), None);
    }

    #[test]
    fn test_rejects_zero_reward_and_self_chain() {
        let mut raw = RawQuest {
            id: "loop".into(),
            name: "Loop".into(),
            description: String::new(),
            base_reward: 0,
            cooldown_hours: 24,
            streak_eligible: true,
            bonus: false,
            chain: None,
        };
        assert!(QuestDefinition::from_raw(&raw).is_err());

        raw.base_reward = 5;
        raw.chain = Some(RawQuestChain { previous: Some("loop".into()) });
        assert!(QuestDefinition::from_raw(&raw).is_err());
    }
}
