use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

mod access;
mod address;
mod api;
mod booster;
mod config;
mod db;
mod error;
mod events;
mod protocol;
mod quest;
mod rate_limit;
mod system;
mod token;
mod types;
mod vault;

use api::{AppState, SystemClock};
use config::Config;
use db::Database;
use quest::QuestCatalog;
use rate_limit::RateLimiter;
use system::RewardSystem;

// ============================================================================
// Startup
// ============================================================================

/// Restore the persisted engine, or deploy a fresh one and log its link events
async fn load_or_deploy(
    config: &Config,
    db: &Database,
    catalog: Arc<QuestCatalog>,
) -> Result<RewardSystem, String> {
    let snapshot = db
        .load_snapshot()
        .await
        .map_err(|e| format!("Failed to read snapshot: {}", e))?;

    if let Some(json) = snapshot {
        let system = RewardSystem::restore(&json, catalog)
            .map_err(|e| format!("Stored snapshot is unreadable: {}", e))?;
        info!(
            "Restored reward system (total supply {})",
            system.token().total_supply()
        );
        return Ok(system);
    }

    let deployed = RewardSystem::deploy(&config.engine, catalog)
        .map_err(|e| format!("Deployment failed: {}", e))?;
    db.append_events(&deployed.events)
        .await
        .map_err(|e| format!("Failed to log deployment events: {}", e))?;

    let system = deployed.value;
    let json = system
        .snapshot()
        .map_err(|e| format!("Failed to serialize snapshot: {}", e))?;
    db.save_snapshot(&json)
        .await
        .map_err(|e| format!("Failed to save snapshot: {}", e))?;

    info!(
        "Deployed reward system: engine {}, vault {}, booster {}, token {}",
        system.engine().address(),
        system.vault().address(),
        system.booster().address(),
        system.token().address()
    );
    Ok(system)
}

async fn run() -> Result<(), String> {
    let config_path = Config::default_path();
    let config = Config::load(&config_path)?;
    info!("Configuration loaded from {:?}", config_path);

    let quest_dir = config.server.quest_dir();
    let catalog = Arc::new(QuestCatalog::load_from_directory(&quest_dir)?);
    info!("Quest catalog ready with {} quest(s)", catalog.len());

    let db = Database::new(&config.server.database_url)
        .await
        .map_err(|e| format!("Failed to open database: {}", e))?;
    let system = load_or_deploy(&config, &db, catalog).await?;

    let state = AppState::new(
        system,
        Arc::new(db),
        RateLimiter::from_config(&config.rate_limit),
        Arc::new(SystemClock),
    );

    // Hot-reload quest files during development
    #[cfg(debug_assertions)]
    if config.server.hot_reload {
        match QuestCatalog::start_file_watcher(quest_dir.clone()) {
            Ok(mut reloads) => {
                let reload_state = state.clone();
                tokio::spawn(async move {
                    while let Some(reload) = reloads.recv().await {
                        match reload {
                            quest::CatalogReload::Reloaded(catalog) => {
                                info!("Quest catalog hot-reloaded ({} quests)", catalog.len());
                                reload_state.replace_catalog(catalog).await;
                            }
                            quest::CatalogReload::Error(e) => {
                                warn!("Quest reload failed, keeping previous catalog: {}", e);
                            }
                        }
                    }
                });
            }
            Err(e) => warn!("Quest hot-reload disabled: {}", e),
        }
    }

    // Spawn auto-save loop
    let save_state = state.clone();
    let autosave = Duration::from_secs(config.server.autosave_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(autosave);
        loop {
            interval.tick().await;
            match save_state.save_snapshot().await {
                Ok(true) => info!("Auto-saved reward system snapshot"),
                Ok(false) => {}
                Err(e) => warn!("Auto-save failed: {}", e),
            }
            save_state.rate_limiter.purge_expired();
        }
    });

    let app = api::router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", config.server.bind_addr, e))?;
    info!("Quest rewards server listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    // Final flush
    match state.save_snapshot().await {
        Ok(true) => info!("Snapshot saved on shutdown"),
        Ok(false) => {}
        Err(e) => error!("{}", e),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(
                    "quest_rewards_server=info"
                        .parse()
                        .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
                ),
        )
        .init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}
