//! Quest State Tracking
//!
//! Per-user completion history, used for eligibility windows, chains and
//! bonus quests.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::definition::QuestDefinition;
use crate::types::Timestamp;

/// Completion record for one quest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestCompletion {
    pub last_completed_at: Timestamp,
    pub times_completed: u32,
}

/// Where a quest stands for a user at a given moment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    /// Can be completed now
    Available,
    /// Completed inside the current window; reopens at `available_at`
    Completed { available_at: Timestamp },
    /// One-time quest already done
    Finished,
}

impl QuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::Available => "available",
            QuestStatus::Completed { .. } => "completed",
            QuestStatus::Finished => "finished",
        }
    }
}

/// A user's quest history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserQuestState {
    completions: HashMap<String, QuestCompletion>,
    /// Most recent completion of any quest
    pub last_completion_at: Option<Timestamp>,
}

impl UserQuestState {
    pub fn completion(&self, quest_id: &str) -> Option<&QuestCompletion> {
        self.completions.get(quest_id)
    }

    pub fn has_completed(&self, quest_id: &str) -> bool {
        self.completions.contains_key(quest_id)
    }

    pub fn status(&self, quest: &QuestDefinition, now: Timestamp) -> QuestStatus {
        let Some(done) = self.completions.get(&quest.id) else {
            return QuestStatus::Available;
        };
        if quest.is_one_time() {
            return QuestStatus::Finished;
        }
        let available_at = done.last_completed_at.saturating_add(quest.cooldown_secs());
        if now < available_at {
            QuestStatus::Completed { available_at }
        } else {
            QuestStatus::Available
        }
    }

    pub fn completed_in_window(&self, quest: &QuestDefinition, now: Timestamp) -> bool {
        matches!(self.status(quest, now), QuestStatus::Completed { .. })
    }

    pub fn record(&mut self, quest_id: &str, now: Timestamp) {
        let entry = self.completions.entry(quest_id.to_string()).or_default();
        entry.last_completed_at = now;
        entry.times_completed = entry.times_completed.saturating_add(1);
        self.last_completion_at = Some(now);
    }

    pub fn completions(&self) -> impl Iterator<Item = (&String, &QuestCompletion)> {
        self.completions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let daily = QuestDefinition::simple("daily_check_in", "Daily", 10, 24);
        let mut state = UserQuestState::default();
        assert_eq!(state.status(&daily, 0), QuestStatus::Available);

        state.record("daily_check_in", 1_000);
        assert_eq!(state.status(&daily, 1_000 + 3_600), QuestStatus::Completed { available_at: 1_000 + 86_400 });
        assert_eq!(state.status(&daily, 1_000 + 86_400), QuestStatus::Available);
        assert_eq!(state.completion("daily_check_in").unwrap().times_completed, 1);
    }

    #[test]
    fn test_one_time_quest_finishes() {
        let tutorial = QuestDefinition::simple("onboarding_tutorial", "Tutorial", 50, 0);
        let mut state = UserQuestState::default();
        state.record("onboarding_tutorial", 5);
        assert_eq!(state.status(&tutorial, i64::MAX), QuestStatus::Finished);
        assert_eq!(state.last_completion_at, Some(5));
    }
}
