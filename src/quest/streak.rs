//! Streak State Machine
//!
//! Rolling windows anchored at the last streak-eligible completion:
//! within one period the streak holds, between period and grace it grows
//! by one, past grace it restarts at 1.

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, SECONDS_PER_HOUR};

/// Streak lengths that emit a milestone event when reached
pub const STREAK_MILESTONES: [u32; 3] = [7, 30, 100];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_completion_time: Option<Timestamp>,
}

/// What a completion did to the streak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakTransition {
    Started,
    Extended,
    Unchanged,
    Broken { previous: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakPolicy {
    pub period_secs: i64,
    pub grace_secs: i64,
}

impl Default for StreakPolicy {
    fn default() -> Self {
        Self::from_hours(24, 48)
    }
}

impl StreakPolicy {
    pub fn from_hours(period_hours: u32, grace_hours: u32) -> Self {
        Self {
            period_secs: period_hours as i64 * SECONDS_PER_HOUR,
            grace_secs: grace_hours as i64 * SECONDS_PER_HOUR,
        }
    }

    /// Compute the record after a completion at `now` without mutating `record`
    pub fn advance(&self, record: &StreakRecord, now: Timestamp) -> (StreakRecord, StreakTransition) {
        let (current, transition) = match record.last_completion_time {
            None => (1, StreakTransition::Started),
            Some(_) if record.current_streak == 0 => (1, StreakTransition::Started),
            Some(last) => {
                let elapsed = now.saturating_sub(last);
                if elapsed < self.period_secs {
                    (record.current_streak, StreakTransition::Unchanged)
                } else if elapsed <= self.grace_secs {
                    (record.current_streak.saturating_add(1), StreakTransition::Extended)
                } else {
                    (1, StreakTransition::Broken { previous: record.current_streak })
                }
            }
        };

        // The anchor stays on the completion that opened the current period
        let anchor = match transition {
            StreakTransition::Unchanged => record.last_completion_time,
            _ => Some(now),
        };
        let next = StreakRecord {
            current_streak: current,
            longest_streak: record.longest_streak.max(current),
            last_completion_time: anchor,
        };
        (next, transition)
    }
}

/// Streak multiplier in basis points of 100, capped at 300
pub fn streak_multiplier(streak: u32) -> u64 {
    match streak {
        0..=2 => 100,
        3..=6 => 125,
        7..=13 => 150,
        14..=29 => 200,
        30..=99 => 250,
        _ => 300,
    }
}

/// Milestone reached by this transition, if the new streak lands exactly on one
pub fn milestone_reached(transition: StreakTransition, streak: u32) -> Option<u32> {
    match transition {
        StreakTransition::Extended | StreakTransition::Started => {
            STREAK_MILESTONES.contains(&streak).then_some(streak)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: i64 = SECONDS_PER_HOUR;
    const T: i64 = 1_700_000_000;

    #[test]
    fn test_round_trip_with_break() {
        let policy = StreakPolicy::default();
        let (r1, t1) = policy.advance(&StreakRecord::default(), T);
        assert_eq!((r1.current_streak, t1), (1, StreakTransition::Started));

        let (r2, t2) = policy.advance(&r1, T + 36 * H);
        assert_eq!((r2.current_streak, t2), (2, StreakTransition::Extended));
        assert_eq!(r2.longest_streak, 2);

        let (r3, t3) = policy.advance(&r2, T + 36 * H + 49 * H);
        assert_eq!(r3.current_streak, 1);
        assert_eq!(t3, StreakTransition::Broken { previous: 2 });
        assert_eq!(r3.longest_streak, 2);
    }

    #[test]
    fn test_same_period_is_unchanged() {
        let policy = StreakPolicy::default();
        let (r1, _) = policy.advance(&StreakRecord::default(), T);
        let (r2, t2) = policy.advance(&r1, T + 23 * H);
        assert_eq!(t2, StreakTransition::Unchanged);
        assert_eq!(r2.current_streak, 1);
        assert_eq!(r2.last_completion_time, Some(T));
    }

    #[test]
    fn test_several_completions_per_period_still_extend_daily() {
        let policy = StreakPolicy::default();
        let mut record = StreakRecord::default();
        for day in 0..5 {
            let morning = T + day * 24 * H;
            record = policy.advance(&record, morning).0;
            record = policy.advance(&record, morning + 300).0;
            assert_eq!(record.current_streak, day as u32 + 1);
            assert_eq!(record.last_completion_time, Some(morning));
        }
    }

    #[test]
    fn test_window_boundaries_are_inclusive() {
        let policy = StreakPolicy::default();
        let (r1, _) = policy.advance(&StreakRecord::default(), T);
        assert_eq!(policy.advance(&r1, T + 24 * H).1, StreakTransition::Extended);
        assert_eq!(policy.advance(&r1, T + 48 * H).1, StreakTransition::Extended);
        assert!(matches!(policy.advance(&r1, T + 48 * H + 1).1, StreakTransition::Broken { .. }));
    }

    #[test]
    fn test_multiplier_steps() {
        let table: Vec<u64> = [1, 2, 3, 6, 7, 13, 14, 29, 30, 99, 100, 5000]
            .iter()
            .map(|s| streak_multiplier(*s))
            .collect();
        assert_eq!(table, vec![100, 100, 125, 125, 150, 150, 200, 200, 250, 250, 300, 300]);
    }

    #[test]
    fn test_milestones_only_on_exact_landing() {
        assert_eq!(milestone_reached(StreakTransition::Extended, 7), Some(7));
        assert_eq!(milestone_reached(StreakTransition::Extended, 8), None);
        assert_eq!(milestone_reached(StreakTransition::Unchanged, 30), None);
        assert_eq!(milestone_reached(StreakTransition::Extended, 100), Some(100));
    }
}
