//! Quest System Module
//!
//! TOML-defined quests with rolling eligibility windows, chains, bonus
//! quests and streak tracking. The engine prices each completion and hands
//! the reward to the vault.

pub mod definition;
pub mod engine;
pub mod registry;
pub mod state;
pub mod streak;

pub use definition::{QuestChain, QuestDefinition};
pub use engine::{compute_reward, QuestEngine, QuestReceipt};
pub use registry::{CatalogReload, QuestCatalog};
pub use state::{QuestCompletion, QuestStatus, UserQuestState};
pub use streak::{streak_multiplier, StreakPolicy, StreakRecord, StreakTransition};
