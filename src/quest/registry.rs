//! Quest Catalog
//!
//! Loads and validates quest definitions from TOML files. The catalog is
//! immutable once built; hot-reload builds a fresh one and swaps it in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::definition::{QuestChain, QuestDefinition, RawQuestFile};
use crate::types::Amount;

/// One whole token at the default 9 decimals
const TOKEN: Amount = 1_000_000_000;

/// All quest definitions, keyed by id
#[derive(Debug, Clone, Default)]
pub struct QuestCatalog {
    quests: BTreeMap<String, Arc<QuestDefinition>>,
}

impl QuestCatalog {
    /// Build a catalog from resolved definitions; duplicate ids are an error
    pub fn from_quests(quests: Vec<QuestDefinition>) -> Result<Self, String> {
        let mut map = BTreeMap::new();
        for quest in quests {
            let id = quest.id.clone();
            if map.insert(id.clone(), Arc::new(quest)).is_some() {
                return Err(format!("Duplicate quest id '{}'", id));
            }
        }
        let catalog = Self { quests: map };
        catalog.validate_quest_chains();
        Ok(catalog)
    }

    /// Catalog used when no quest directory is present
    pub fn builtin() -> Self {
        let mut daily_sweep = QuestDefinition::simple("daily_sweep", "Daily Sweep", 25 * TOKEN, 24);
        daily_sweep.description = "Finish every daily quest".to_string();
        daily_sweep.bonus = true;

        let mut tutorial =
            QuestDefinition::simple("onboarding_tutorial", "Onboarding Tutorial", 50 * TOKEN, 0);
        tutorial.description = "Complete the onboarding walkthrough".to_string();
        tutorial.streak_eligible = false;

        let mut weekly = QuestDefinition::simple("weekly_challenge", "Weekly Challenge", 100 * TOKEN, 168);
        weekly.description = "Complete the weekly challenge".to_string();
        weekly.streak_eligible = false;
        weekly.chain = QuestChain {
            previous: Some("onboarding_tutorial".to_string()),
        };

        let mut check_in = QuestDefinition::simple("daily_check_in", "Daily Check-in", 10 * TOKEN, 24);
        check_in.description = "Check in once a day".to_string();

        let mut share = QuestDefinition::simple("social_share", "Social Share", 15 * TOKEN, 24);
        share.description = "Share the product once a day".to_string();

        let quests = [check_in, share, daily_sweep, weekly, tutorial]
            .into_iter()
            .map(|q| (q.id.clone(), Arc::new(q)))
            .collect();
        Self { quests }
    }

    /// Load every `*.toml` under `dir`. A missing directory, or one with no
    /// valid quests, yields the built-in catalog.
    pub fn load_from_directory(dir: &Path) -> Result<Self, String> {
        info!("Loading quests from {:?}", dir);

        if !dir.exists() {
            warn!("Quest directory does not exist: {:?}, using built-in catalog", dir);
            return Ok(Self::builtin());
        }

        let mut paths = Vec::new();
        collect_toml_files(dir, &mut paths)?;
        paths.sort();

        let mut quests = Vec::new();
        for path in paths {
            match load_quest_file(&path) {
                Ok(quest) => {
                    info!("Loaded quest: {} ({})", quest.name, quest.id);
                    quests.push(quest);
                }
                Err(e) => warn!("Failed to load quest {:?}: {}", path, e),
            }
        }

        if quests.is_empty() {
            warn!("No valid quests in {:?}, using built-in catalog", dir);
            return Ok(Self::builtin());
        }

        let catalog = Self::from_quests(quests)?;
        info!("Loaded {} quest definitions", catalog.len());
        Ok(catalog)
    }

    /// Warn about chain references that point outside the catalog
    fn validate_quest_chains(&self) {
        for quest in self.quests.values() {
            if let Some(prev_id) = quest.requires_quest() {
                if !self.quests.contains_key(prev_id) {
                    warn!(
                        "Quest '{}' references non-existent previous quest '{}'",
                        quest.id, prev_id
                    );
                }
            }
        }
    }

    pub fn get(&self, quest_id: &str) -> Option<&Arc<QuestDefinition>> {
        self.quests.get(quest_id)
    }

    pub fn contains(&self, quest_id: &str) -> bool {
        self.quests.contains_key(quest_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.quests.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<QuestDefinition>> {
        self.quests.values()
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }

    /// Repeatable non-bonus quests sharing the bonus quest's cadence
    pub fn cadence_siblings(&self, bonus: &QuestDefinition) -> Vec<&Arc<QuestDefinition>> {
        self.quests
            .values()
            .filter(|q| {
                !q.bonus && !q.is_one_time() && q.cooldown_hours == bonus.cooldown_hours && q.id != bonus.id
            })
            .collect()
    }

    /// Watch `dir` and send a freshly loaded catalog on every `.toml` change
    pub fn start_file_watcher(
        dir: PathBuf,
    ) -> Result<tokio::sync::mpsc::Receiver<CatalogReload>, String> {
        use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
        use std::time::Duration;

        if !dir.exists() {
            return Err(format!("Quest directory does not exist: {:?}", dir));
        }

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )
        .map_err(|e| format!("Failed to create file watcher: {}", e))?;

        watcher
            .watch(&dir, RecursiveMode::Recursive)
            .map_err(|e| format!("Failed to watch quest directory: {}", e))?;

        info!("Quest hot-reload watcher started for {:?}", dir);

        std::thread::spawn(move || {
            // Owned here so the watch lives as long as the thread
            let _watcher = watcher;

            while let Ok(event) = notify_rx.recv() {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)) {
                    continue;
                }
                let touched_toml = event
                    .paths
                    .iter()
                    .any(|p| p.extension().map_or(false, |ext| ext == "toml"));
                if !touched_toml {
                    continue;
                }

                info!("Detected change in {:?}, reloading quest catalog", event.paths);
                let message = match QuestCatalog::load_from_directory(&dir) {
                    Ok(catalog) => CatalogReload::Reloaded(Arc::new(catalog)),
                    Err(e) => {
                        tracing::error!("Hot-reload failed: {}", e);
                        CatalogReload::Error(e)
                    }
                };
                if tx.blocking_send(message).is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

/// Events from the hot-reload watcher
#[derive(Debug, Clone)]
pub enum CatalogReload {
    /// A new catalog was built successfully
    Reloaded(Arc<QuestCatalog>),
    /// An error occurred during reload
    Error(String),
}

fn collect_toml_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), String> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| format!("Failed to read directory {:?}: {}", dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| format!("Failed to read entry: {}", e))?;
        let path = entry.path();

        if path.is_dir() {
            collect_toml_files(&path, paths)?;
        } else if path.extension().map_or(false, |ext| ext == "toml") {
            paths.push(path);
        }
    }

    Ok(())
}

fn load_quest_file(path: &Path) -> Result<QuestDefinition, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;

    let raw: RawQuestFile = toml::from_str(&content)
        .map_err(|e| format!("Failed to parse {:?}: {}", path, e))?;

    QuestDefinition::from_raw(&raw.quest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_quest_toml() -> &'static str {
        r#"
[quest]
id = "streak_tutorial"
name = "Streak Tutorial"
description = "Learn how streaks work"
base_reward = 500
cooldown_hours = 0
streak_eligible = false

[quest.chain]
previous = "daily_check_in"
"#
    }

    #[test]
    fn test_load_quest() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("onboarding");
        std::fs::create_dir_all(&nested).unwrap();

        std::fs::write(nested.join("tutorial.toml"), create_test_quest_toml()).unwrap();
        std::fs::write(
            temp_dir.path().join("check_in.toml"),
            "[quest]\nid = \"daily_check_in\"\nname = \"Check in\"\nbase_reward = 100\n",
        )
        .unwrap();
        std::fs::write(temp_dir.path().join("broken.toml"), "[quest]\nid = ").unwrap();

        let catalog = QuestCatalog::load_from_directory(temp_dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);

        let quest = catalog.get("streak_tutorial").unwrap();
        assert_eq!(quest.name, "Streak Tutorial");
        assert!(quest.is_one_time());
        assert_eq!(quest.requires_quest(), Some("daily_check_in"));
    }

    #[test]
    fn test_missing_directory_uses_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = QuestCatalog::load_from_directory(&temp_dir.path().join("nope")).unwrap();
        assert_eq!(
            catalog.ids(),
            vec![
                "daily_check_in",
                "daily_sweep",
                "onboarding_tutorial",
                "social_share",
                "weekly_challenge"
            ]
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let a = QuestDefinition::simple("daily_check_in", "A", 1, 24);
        let b = QuestDefinition::simple("daily_check_in", "B", 2, 24);
        assert!(QuestCatalog::from_quests(vec![a, b]).is_err());
    }

    #[test]
    fn test_shipped_quest_files_match_builtin() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/quests");
        let shipped = QuestCatalog::load_from_directory(&dir).unwrap();
        let builtin = QuestCatalog::builtin();
        assert_eq!(shipped.ids(), builtin.ids());
        for quest in builtin.iter() {
            let loaded = shipped.get(&quest.id).unwrap();
            assert_eq!(loaded.base_reward, quest.base_reward);
            assert_eq!(loaded.cooldown_hours, quest.cooldown_hours);
            assert_eq!(loaded.streak_eligible, quest.streak_eligible);
            assert_eq!(loaded.bonus, quest.bonus);
            assert_eq!(loaded.chain, quest.chain);
        }
    }

    #[test]
    fn test_cadence_siblings() {
        let catalog = QuestCatalog::builtin();
        let sweep = catalog.get("daily_sweep").unwrap();
        let mut siblings: Vec<&str> = catalog
            .cadence_siblings(sweep)
            .into_iter()
            .map(|q| q.id.as_str())
            .collect();
        siblings.sort();
        assert_eq!(siblings, vec!["daily_check_in", "social_share"]);
    }
}
