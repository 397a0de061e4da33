// SQLite implementation of ChirpStore.
//
// Only the moderation-relevant columns are modeled here; the web layer owns
// whatever else it hangs off the chirps table. Timestamps are stored as
// RFC 3339 text via sqlx's chrono support.

use crate::core::chirps::{Chirp, ChirpStore, ChirpStoreError};
use crate::core::moderation::ModerationState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

pub struct SqliteChirpStore {
    pool: Pool<Sqlite>,
}

impl SqliteChirpStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new().connect(&conn_str).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chirps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                message TEXT NOT NULL,
                moderation_status TEXT NOT NULL DEFAULT 'pending',
                moderation_reason TEXT,
                moderated_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_chirp(row: &SqliteRow) -> Result<Chirp, ChirpStoreError> {
        let status: String = row.get("moderation_status");
        let reason: Option<String> = row.get("moderation_reason");
        let moderated_at: Option<DateTime<Utc>> = row.get("moderated_at");

        // Reconstructing the enum enforces the column invariant: resolved
        // rows must carry both reason and timestamp, pending rows neither.
        let state = match (status.as_str(), reason, moderated_at) {
            ("pending", None, None) => ModerationState::Pending,
            ("approved", Some(reason), Some(moderated_at)) => ModerationState::Approved {
                reason,
                moderated_at,
            },
            ("rejected", Some(reason), Some(moderated_at)) => ModerationState::Rejected {
                reason,
                moderated_at,
            },
            (status, reason, moderated_at) => {
                return Err(ChirpStoreError::Storage(format!(
                    "inconsistent moderation columns: status={status:?} reason={reason:?} \
                     moderated_at={moderated_at:?}"
                )))
            }
        };

        Ok(Chirp {
            id: row.get("id"),
            user_id: row.get("user_id"),
            message: row.get("message"),
            state,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl ChirpStore for SqliteChirpStore {
    async fn create(&self, user_id: i64, message: &str) -> Result<Chirp, ChirpStoreError> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO chirps (user_id, message, moderation_status, created_at, updated_at)
            VALUES (?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(message)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| ChirpStoreError::Storage(e.to_string()))?;

        Ok(Chirp {
            id: result.last_insert_rowid(),
            user_id,
            message: message.to_string(),
            state: ModerationState::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, chirp_id: i64) -> Result<Option<Chirp>, ChirpStoreError> {
        let row = sqlx::query("SELECT * FROM chirps WHERE id = ?")
            .bind(chirp_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ChirpStoreError::Storage(e.to_string()))?;

        row.as_ref().map(Self::row_to_chirp).transpose()
    }

    async fn update_message(&self, chirp_id: i64, message: &str) -> Result<(), ChirpStoreError> {
        sqlx::query("UPDATE chirps SET message = ?, updated_at = ? WHERE id = ?")
            .bind(message)
            .bind(Utc::now())
            .bind(chirp_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ChirpStoreError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn set_moderation_state(
        &self,
        chirp_id: i64,
        state: &ModerationState,
    ) -> Result<(), ChirpStoreError> {
        sqlx::query(
            r#"
            UPDATE chirps
            SET moderation_status = ?, moderation_reason = ?, moderated_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(state.status())
        .bind(state.reason())
        .bind(state.moderated_at())
        .bind(Utc::now())
        .bind(chirp_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ChirpStoreError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn list_approved(&self, limit: i64) -> Result<Vec<Chirp>, ChirpStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM chirps
            WHERE moderation_status = 'approved'
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChirpStoreError::Storage(e.to_string()))?;

        rows.iter().map(Self::row_to_chirp).collect()
    }

    async fn list_pending(&self) -> Result<Vec<Chirp>, ChirpStoreError> {
        let rows = sqlx::query(
            "SELECT * FROM chirps WHERE moderation_status = 'pending' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChirpStoreError::Storage(e.to_string()))?;

        rows.iter().map(Self::row_to_chirp).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, SqliteChirpStore) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("chirps.db");
        let store = SqliteChirpStore::new(db_path.to_str().unwrap())
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let (_dir, store) = temp_store().await;

        let chirp = store.create(1, "hello world").await.unwrap();

        assert!(chirp.state.is_pending());
        assert!(!chirp.is_visible());

        let loaded = store.get(chirp.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, chirp.id);
        assert_eq!(loaded.user_id, 1);
        assert_eq!(loaded.message, "hello world");
        assert!(loaded.state.is_pending());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (_dir, store) = temp_store().await;

        assert_eq!(store.get(12345).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_moderation_state_round_trips() {
        let (_dir, store) = temp_store().await;
        let chirp = store.create(1, "hello").await.unwrap();
        let moderated_at = Utc::now();

        store
            .set_moderation_state(
                chirp.id,
                &ModerationState::Rejected {
                    reason: "nope".into(),
                    moderated_at,
                },
            )
            .await
            .unwrap();

        let loaded = store.get(chirp.id).await.unwrap().unwrap();
        assert_eq!(loaded.state.status(), "rejected");
        assert_eq!(loaded.state.reason(), Some("nope"));
        // Second precision is all the column format guarantees
        assert_eq!(
            loaded.state.moderated_at().map(|at| at.timestamp()),
            Some(moderated_at.timestamp())
        );
    }

    #[tokio::test]
    async fn test_reset_to_pending_clears_columns() {
        let (_dir, store) = temp_store().await;
        let chirp = store.create(1, "hello").await.unwrap();

        store
            .set_moderation_state(
                chirp.id,
                &ModerationState::Approved {
                    reason: "fine".into(),
                    moderated_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        store
            .set_moderation_state(chirp.id, &ModerationState::Pending)
            .await
            .unwrap();

        let loaded = store.get(chirp.id).await.unwrap().unwrap();
        assert!(loaded.state.is_pending());
        assert_eq!(loaded.state.reason(), None);
        assert_eq!(loaded.state.moderated_at(), None);
    }

    #[tokio::test]
    async fn test_update_message_keeps_moderation_columns() {
        let (_dir, store) = temp_store().await;
        let chirp = store.create(1, "before").await.unwrap();

        store.update_message(chirp.id, "after").await.unwrap();

        let loaded = store.get(chirp.id).await.unwrap().unwrap();
        assert_eq!(loaded.message, "after");
        assert!(loaded.state.is_pending());
    }

    #[tokio::test]
    async fn test_list_approved_newest_first() {
        let (_dir, store) = temp_store().await;
        let first = store.create(1, "first").await.unwrap();
        let second = store.create(1, "second").await.unwrap();
        let _hidden = store.create(1, "still pending").await.unwrap();

        for (chirp, at) in [
            (&first, Utc::now() - chrono::Duration::seconds(10)),
            (&second, Utc::now()),
        ] {
            store
                .set_moderation_state(
                    chirp.id,
                    &ModerationState::Approved {
                        reason: "fine".into(),
                        moderated_at: at,
                    },
                )
                .await
                .unwrap();
        }

        let approved = store.list_approved(50).await.unwrap();
        assert_eq!(approved.len(), 2);
        assert!(approved.iter().all(|c| c.is_visible()));

        let limited = store.list_approved(1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_list_pending_oldest_first() {
        let (_dir, store) = temp_store().await;
        let first = store.create(1, "first").await.unwrap();
        let second = store.create(2, "second").await.unwrap();

        store
            .set_moderation_state(
                first.id,
                &ModerationState::Approved {
                    reason: "fine".into(),
                    moderated_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);
    }
}
