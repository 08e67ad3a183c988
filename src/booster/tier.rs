//! Booster tiers and their multipliers

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RewardError;

/// Booster tier, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoosterTier {
    #[default]
    None,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl BoosterTier {
    pub const ALL: [BoosterTier; 6] = [
        BoosterTier::None,
        BoosterTier::Bronze,
        BoosterTier::Silver,
        BoosterTier::Gold,
        BoosterTier::Platinum,
        BoosterTier::Diamond,
    ];

    /// Multiplier in basis points of 100
    pub fn multiplier_bps(&self) -> u64 {
        match self {
            BoosterTier::None => 100,
            BoosterTier::Bronze => 110,
            BoosterTier::Silver => 125,
            BoosterTier::Gold => 150,
            BoosterTier::Platinum => 200,
            BoosterTier::Diamond => 300,
        }
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BoosterTier::None => "none",
            BoosterTier::Bronze => "bronze",
            BoosterTier::Silver => "silver",
            BoosterTier::Gold => "gold",
            BoosterTier::Platinum => "platinum",
            BoosterTier::Diamond => "diamond",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(BoosterTier::None),
            "bronze" => Some(BoosterTier::Bronze),
            "silver" => Some(BoosterTier::Silver),
            "gold" => Some(BoosterTier::Gold),
            "platinum" => Some(BoosterTier::Platinum),
            "diamond" => Some(BoosterTier::Diamond),
            _ => None,
        }
    }
}

impl TryFrom<u32> for BoosterTier {
    type Error = RewardError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        BoosterTier::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| RewardError::InvalidBoosterTier(value.to_string()))
    }
}

impl fmt::Display for BoosterTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
