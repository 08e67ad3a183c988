//! Server Configuration
//!
//! Loaded from a TOML file. Every section and field has a default, so a
//! missing file or a partial file still yields a runnable configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::address::Address;
use crate::error::RewardError;
use crate::types::Amount;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "QUEST_REWARDS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub database_url: String,
    pub autosave_secs: u64,
    /// Watch the quest directory and hot-swap the catalog (debug builds only)
    pub hot_reload: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:2580".to_string(),
            data_dir: PathBuf::from("data"),
            database_url: "sqlite:quest_rewards.db?mode=rwc".to_string(),
            autosave_secs: 30,
            hot_reload: true,
        }
    }
}

impl ServerConfig {
    pub fn quest_dir(&self) -> PathBuf {
        self.data_dir.join("quests")
    }
}

/// Per-account limit on mutating requests
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Owner of every component at deploy time
    pub owner: Address,
    pub token: TokenConfig,
    pub streak: StreakConfig,
    pub booster: BoosterConfig,
    pub vault: VaultConfig,
    pub quests: QuestRulesConfig,
    pub deployment: DeploymentConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            owner: Address::from_low_u64(0xa0),
            token: TokenConfig::default(),
            streak: StreakConfig::default(),
            booster: BoosterConfig::default(),
            vault: VaultConfig::default(),
            quests: QuestRulesConfig::default(),
            deployment: DeploymentConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Cap in base units
    pub max_supply: Amount,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: "Quest Token".to_string(),
            symbol: "QST".to_string(),
            decimals: 9,
            // 1 billion whole tokens
            max_supply: 1_000_000_000 * 1_000_000_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreakConfig {
    pub period_hours: u32,
    pub grace_hours: u32,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            period_hours: 24,
            grace_hours: 48,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoosterConfig {
    pub duration_days: u32,
    pub referral_bonus_step: u64,
    pub referral_bonus_cap: u64,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            duration_days: 30,
            referral_bonus_step: 5,
            referral_bonus_cap: 25,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Minimum seconds between claims; 0 disables
    pub claim_cooldown_secs: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QuestRulesConfig {
    /// Minimum seconds between any two completions by one user; 0 disables
    pub min_completion_interval_secs: i64,
}

/// Addresses the components are deployed at
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub quest_engine: Address,
    pub reward_vault: Address,
    pub booster_registry: Address,
    pub token_ledger: Address,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            quest_engine: Address::from_low_u64(0x01),
            reward_vault: Address::from_low_u64(0x02),
            booster_registry: Address::from_low_u64(0x03),
            token_ledger: Address::from_low_u64(0x04),
        }
    }
}

impl Config {
    /// Path from `QUEST_REWARDS_CONFIG`, or `config.toml`
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load and validate; a missing file falls back to defaults
    pub fn load(path: &Path) -> Result<Self, String> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| format!("Failed to parse {:?}: {}", path, e))?;
            info!("Loaded configuration from {:?}", path);
            config
        } else {
            warn!("Config file {:?} not found, using defaults", path);
            Config::default()
        };

        config.engine.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), RewardError> {
        if self.owner.is_zero() {
            return Err(RewardError::InvalidConfiguration("owner must not be the null address".into()));
        }
        if self.token.max_supply == 0 {
            return Err(RewardError::ValueOutOfRange("token.max_supply must be positive".into()));
        }
        if self.streak.period_hours == 0 {
            return Err(RewardError::ValueOutOfRange("streak.period_hours must be positive".into()));
        }
        if self.streak.grace_hours < self.streak.period_hours {
            return Err(RewardError::ValueOutOfRange(
                "streak.grace_hours must not be shorter than period_hours".into(),
            ));
        }
        if self.booster.duration_days == 0 {
            return Err(RewardError::ValueOutOfRange("booster.duration_days must be positive".into()));
        }
        if self.booster.referral_bonus_cap < self.booster.referral_bonus_step {
            return Err(RewardError::ValueOutOfRange(
                "booster.referral_bonus_cap must be at least referral_bonus_step".into(),
            ));
        }
        if self.vault.claim_cooldown_secs < 0 || self.quests.min_completion_interval_secs < 0 {
            return Err(RewardError::ValueOutOfRange("intervals must not be negative".into()));
        }
        self.deployment.validate()
    }
}

impl DeploymentConfig {
    pub fn addresses(&self) -> [&Address; 4] {
        [
            &self.quest_engine,
            &self.reward_vault,
            &self.booster_registry,
            &self.token_ledger,
        ]
    }

    fn validate(&self) -> Result<(), RewardError> {
        let mut seen = HashSet::new();
        for addr in self.addresses() {
            addr.ensure_non_zero()?;
            if !seen.insert(addr) {
                return Err(RewardError::InvalidConfiguration(format!(
                    "component address {} is used twice",
                    addr
                )));
            }
        }
        Ok(())
    }
}
