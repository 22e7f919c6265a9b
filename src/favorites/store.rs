//! Persistent favorites set backed by SQLite.
//!
//! Writes are best-effort by design: the favorites feature must keep
//! working offline, so any storage failure is logged and surfaced to
//! callers only as "the observable set did not change". Reads degrade to
//! the empty set. Committed state is never discarded by this policy.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::watch;

/// One favorited product. Keyed by `product_id`; re-favoriting an already
/// favorited id replaces the whole record, including `added_at_millis`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteRecord {
    pub product_id: String,
    pub name: String,
    pub thumbnail_url: String,
    pub added_at_millis: i64,
}

impl FavoriteRecord {
    /// Build a record stamped with the current wall-clock time.
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        thumbnail_url: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            thumbnail_url: thumbnail_url.into(),
            added_at_millis: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Row type for favorites queries.
type FavoriteRow = (String, String, String, i64);

/// Keyed set of favorited products with a push-based view of the full set.
///
/// Every successful write re-queries the table and re-emits the complete
/// current set (most recently added first) on the watch channel returned
/// by [`observe_all`](Self::observe_all).
#[derive(Clone)]
pub struct FavoritesStore {
    pool: SqlitePool,
    watch_tx: watch::Sender<Vec<FavoriteRecord>>,
}

impl FavoritesStore {
    /// Open (creating if needed) the favorites database and run migrations.
    pub async fn open(path: &str) -> Result<Self> {
        let url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS favorites (
                product_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                thumbnail_url TEXT NOT NULL,
                added_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&pool)
        .await?;

        let initial = fetch_all(&pool).await.unwrap_or_default();
        let (watch_tx, _) = watch::channel(initial);

        Ok(Self { pool, watch_tx })
    }

    /// Live view of the full favorites set, newest first.
    pub fn observe_all(&self) -> watch::Receiver<Vec<FavoriteRecord>> {
        self.watch_tx.subscribe()
    }

    /// Point-in-time read of the full set, newest first. Empty on failure.
    pub async fn all(&self) -> Vec<FavoriteRecord> {
        match fetch_all(&self.pool).await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read favorites, returning empty set");
                Vec::new()
            }
        }
    }

    /// Point-in-time membership test. False on failure.
    pub async fn is_favorite(&self, product_id: &str) -> bool {
        let result: Result<(bool,), sqlx::Error> =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM favorites WHERE product_id = ?)")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await;

        match result {
            Ok((exists,)) => exists,
            Err(err) => {
                tracing::warn!(product_id, error = %err, "Favorite lookup failed");
                false
            }
        }
    }

    /// Upsert by product id. Replaces any existing record with the same id,
    /// including its `added_at` timestamp.
    pub async fn add(&self, record: FavoriteRecord) {
        let result = sqlx::query(
            r#"
            INSERT INTO favorites (product_id, name, thumbnail_url, added_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(product_id) DO UPDATE SET
                name = excluded.name,
                thumbnail_url = excluded.thumbnail_url,
                added_at = excluded.added_at
        "#,
        )
        .bind(&record.product_id)
        .bind(&record.name)
        .bind(&record.thumbnail_url)
        .bind(record.added_at_millis)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => self.republish().await,
            Err(err) => {
                tracing::warn!(product_id = %record.product_id, error = %err, "Failed to add favorite");
            }
        }
    }

    /// Remove by product id. No-op when absent.
    pub async fn remove(&self, product_id: &str) {
        let result = sqlx::query("DELETE FROM favorites WHERE product_id = ?")
            .bind(product_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => self.republish().await,
            Err(err) => {
                tracing::warn!(product_id, error = %err, "Failed to remove favorite");
            }
        }
    }

    /// Remove by the id carried in `record`.
    pub async fn remove_record(&self, record: &FavoriteRecord) {
        self.remove(&record.product_id).await;
    }

    /// Empty the set.
    pub async fn clear(&self) {
        let result = sqlx::query("DELETE FROM favorites").execute(&self.pool).await;
        match result {
            Ok(_) => self.republish().await,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to clear favorites");
            }
        }
    }

    /// Close the underlying pool. Subsequent writes become no-ops.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Re-query the table and push the current set to observers. A failed
    /// re-query leaves the last emitted set in place.
    async fn republish(&self) {
        match fetch_all(&self.pool).await {
            Ok(records) => {
                self.watch_tx.send_replace(records);
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to reload favorites after write");
            }
        }
    }
}

async fn fetch_all(pool: &SqlitePool) -> Result<Vec<FavoriteRecord>, sqlx::Error> {
    let rows: Vec<FavoriteRow> = sqlx::query_as(
        r#"
        SELECT product_id, name, thumbnail_url, added_at
        FROM favorites
        ORDER BY added_at DESC
    "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(product_id, name, thumbnail_url, added_at_millis)| FavoriteRecord {
                product_id,
                name,
                thumbnail_url,
                added_at_millis,
            },
        )
        .collect())
}
