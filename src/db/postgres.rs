use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, QueryBuilder};

use crate::{
    db::{dedupe_keep_last, InteractionStore, PoolStore},
    error::{AppError, AppResult},
    models::{InteractionRecord, Judgment, PoolItem, PoolItemRow, RecentJudgment, UpsertSummary},
};

/// Rows per INSERT statement; keeps bind parameters well under the Postgres limit
const UPSERT_CHUNK_SIZE: usize = 1000;

/// Advisory lock key serializing concurrent evictions
const EVICTION_LOCK_KEY: i64 = 0x5357_4950_4556;

const ITEM_COLUMNS: &str = "track_id, name, artist_name, collection_name, preview_url, \
     artwork_url, detail_url, genre, release_date, source_metadata, fetched_at";

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Pool and interaction storage backed by PostgreSQL
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PoolStore for PostgresStore {
    async fn upsert_many(&self, items: &[PoolItem]) -> AppResult<UpsertSummary> {
        if items.is_empty() {
            return Ok(UpsertSummary::default());
        }

        // ON CONFLICT cannot touch the same row twice in one statement
        let items = dedupe_keep_last(items);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::store("starting pool upsert", e))?;

        let mut summary = UpsertSummary::default();

        for chunk in items.chunks(UPSERT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO pool_items ({}) ", ITEM_COLUMNS));

            builder.push_values(chunk.iter().copied(), |mut row, item| {
                row.push_bind(item.track_id)
                    .push_bind(&item.name)
                    .push_bind(&item.artist_name)
                    .push_bind(&item.collection_name)
                    .push_bind(&item.preview_url)
                    .push_bind(&item.artwork_url)
                    .push_bind(&item.detail_url)
                    .push_bind(&item.genre)
                    .push_bind(item.release_date)
                    .push_bind(item.source_metadata.as_ref().map(Json))
                    .push("now()");
            });

            builder.push(
                r#"
                ON CONFLICT (track_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    artist_name = EXCLUDED.artist_name,
                    collection_name = EXCLUDED.collection_name,
                    preview_url = EXCLUDED.preview_url,
                    artwork_url = EXCLUDED.artwork_url,
                    detail_url = EXCLUDED.detail_url,
                    genre = EXCLUDED.genre,
                    release_date = EXCLUDED.release_date,
                    source_metadata = EXCLUDED.source_metadata,
                    fetched_at = EXCLUDED.fetched_at
                RETURNING (xmax = 0) AS inserted
                "#,
            );

            let inserted_flags: Vec<bool> = builder
                .build_query_scalar()
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| AppError::store("upserting pool items", e))?;

            for inserted in inserted_flags {
                if inserted {
                    summary.inserted += 1;
                } else {
                    summary.updated += 1;
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::store("committing pool upsert", e))?;

        tracing::debug!(
            written = summary.total(),
            inserted = summary.inserted,
            updated = summary.updated,
            "Pool upsert committed"
        );

        Ok(summary)
    }

    async fn evict_to_max(&self, max_size: u64) -> AppResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::store("starting pool eviction", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(EVICTION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::store("locking pool for eviction", e))?;

        let result = sqlx::query(
            r#"
            DELETE FROM pool_items
            WHERE track_id IN (
                SELECT track_id FROM pool_items
                ORDER BY fetched_at ASC, track_id ASC
                LIMIT GREATEST((SELECT COUNT(*) FROM pool_items) - $1, 0)
            )
            "#,
        )
        .bind(max_size as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::store("evicting oldest pool items", e))?;

        tx.commit()
            .await
            .map_err(|e| AppError::store("committing pool eviction", e))?;

        Ok(result.rows_affected())
    }

    async fn size(&self) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pool_items")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::store("counting pool items", e))?;

        Ok(count.max(0) as u64)
    }

    async fn sample_excluding(&self, count: usize, exclude: &[i64]) -> AppResult<Vec<PoolItem>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, PoolItemRow>(&format!(
            r#"
            SELECT {}
            FROM pool_items
            WHERE NOT (track_id = ANY($1))
            ORDER BY random()
            LIMIT $2
            "#,
            ITEM_COLUMNS
        ))
        .bind(exclude)
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::store("sampling pool items", e))?;

        Ok(rows.into_iter().map(PoolItem::from).collect())
    }
}

#[async_trait::async_trait]
impl InteractionStore for PostgresStore {
    async fn record_judgment(
        &self,
        actor_id: &str,
        item_id: i64,
        kind: Judgment,
    ) -> AppResult<InteractionRecord> {
        // One row per pair, so concurrent like/dislike writes serialize on the key
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO interactions (actor_id, item_id, kind, created_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (actor_id, item_id) DO UPDATE
            SET kind = EXCLUDED.kind, created_at = EXCLUDED.created_at
            RETURNING created_at
            "#,
        )
        .bind(actor_id)
        .bind(item_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::store("writing judgment", e))?;

        Ok(InteractionRecord {
            actor_id: actor_id.to_string(),
            item_id,
            kind,
            created_at,
        })
    }

    async fn recent_judgments(
        &self,
        actor_id: &str,
        kind: Judgment,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RecentJudgment>> {
        let rows: Vec<(i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT item_id, created_at
            FROM interactions
            WHERE actor_id = $1 AND kind = $2 AND created_at >= $3
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(actor_id)
        .bind(kind.as_str())
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::store("reading recent judgments", e))?;

        Ok(rows
            .into_iter()
            .map(|(item_id, judged_at)| RecentJudgment { item_id, judged_at })
            .collect())
    }
}
