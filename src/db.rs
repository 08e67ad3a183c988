//! SQLite persistence: the engine snapshot and the append-only event log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::events::RewardEvent;

/// A persisted event
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub id: String,
    pub event_type: String,
    pub account: Option<String>,
    pub event: RewardEvent,
    pub recorded_at: DateTime<Utc>,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        // Run migrations
        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        // Single-row table holding the serialized reward system
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS engine_snapshot (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                state_json TEXT NOT NULL,
                saved_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS event_log (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                event_type TEXT NOT NULL,
                account TEXT,
                payload TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_event_log_account ON event_log(account)")
            .execute(pool)
            .await?;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    /// Replace the stored snapshot
    pub async fn save_snapshot(&self, state_json: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO engine_snapshot (id, state_json, saved_at) VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET state_json = excluded.state_json, saved_at = excluded.saved_at"#,
        )
        .bind(state_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn load_snapshot(&self) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query("SELECT state_json FROM engine_snapshot WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("state_json")))
    }

    /// Append events in one transaction
    pub async fn append_events(&self, events: &[RewardEvent]) -> Result<(), sqlx::Error> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();
        for event in events {
            let payload = serde_json::to_string(event)
                .map_err(|e| sqlx::Error::Protocol(format!("Failed to encode event: {}", e)))?;

            sqlx::query(
                "INSERT INTO event_log (id, event_type, account, payload, recorded_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(event.event_type())
            .bind(event.account().map(|a| a.to_string()))
            .bind(payload)
            .bind(now.clone())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Most recent events, newest first, optionally for one account
    pub async fn recent_events(
        &self,
        account: Option<&str>,
        limit: i64,
    ) -> Result<Vec<EventRecord>, sqlx::Error> {
        let rows = match account {
            Some(account) => {
                sqlx::query(
                    "SELECT id, event_type, account, payload, recorded_at FROM event_log WHERE account = ? ORDER BY seq DESC LIMIT ?",
                )
                .bind(account)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, event_type, account, payload, recorded_at FROM event_log ORDER BY seq DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        for r in rows {
            let payload: String = r.get("payload");
            let recorded_at: String = r.get("recorded_at");
            let event = match serde_json::from_str::<RewardEvent>(&payload) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("Skipping unreadable event log row: {}", e);
                    continue;
                }
            };
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());

            records.push(EventRecord {
                id: r.get("id"),
                event_type: r.get("event_type"),
                account: r.get("account"),
                event,
                recorded_at,
            });
        }

        Ok(records)
    }

    pub async fn event_count(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM event_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> Database {
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
        Database::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_upsert() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;

        assert_eq!(db.load_snapshot().await.unwrap(), None);
        db.save_snapshot("{\"v\":1}").await.unwrap();
        db.save_snapshot("{\"v\":2}").await.unwrap();
        assert_eq!(db.load_snapshot().await.unwrap().as_deref(), Some("{\"v\":2}"));
    }

    #[tokio::test]
    async fn test_event_log_filters_by_account() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;
        let alice = Address::from_low_u64(0xa11ce);
        let bob = Address::from_low_u64(0xb0b);

        db.append_events(&[
            RewardEvent::RewardsClaimed { user: alice.clone(), amount: 5 },
            RewardEvent::RewardsClaimed { user: bob.clone(), amount: 7 },
            RewardEvent::StreakMilestone { user: alice.clone(), streak: 7 },
        ])
        .await
        .unwrap();

        assert_eq!(db.event_count().await.unwrap(), 3);

        let recent = db.recent_events(Some(alice.as_str()), 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].event_type, "streak_milestone");
        assert_eq!(recent[1].event, RewardEvent::RewardsClaimed { user: alice, amount: 5 });

        let all = db.recent_events(None, 2).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        {
            let db = open(&dir).await;
            db.save_snapshot("{}").await.unwrap();
        }
        let db = open(&dir).await;
        assert_eq!(db.load_snapshot().await.unwrap().as_deref(), Some("{}"));
    }
}
