//! PostgreSQL-backed stream cache

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use super::traits::{CacheTransaction, StreamCache};
use super::{to_epoch_millis, CachedRow, SELECT_COLUMNS};
use crate::errors::StorageResult;
use crate::models::{CachedEntry, StreamDescriptor, StreamType};

const UPSERT_SQL: &str = r#"
    INSERT INTO cached_stream_info
        (video_link, status, title, thumbnail, start_time, members_only, type, last_check_time)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (video_link) DO UPDATE SET
        status = EXCLUDED.status,
        title = EXCLUDED.title,
        thumbnail = EXCLUDED.thumbnail,
        start_time = EXCLUDED.start_time,
        members_only = EXCLUDED.members_only,
        type = EXCLUDED.type,
        last_check_time = EXCLUDED.last_check_time
"#;

const SET_CONFIG_SQL: &str = r#"
    INSERT INTO config (name, val) VALUES ($1, $2)
    ON CONFLICT (name) DO UPDATE SET val = EXCLUDED.val
"#;

const CLAIM_SQL: &str = r#"
    INSERT INTO config (name, val) VALUES ($1, $2)
    ON CONFLICT (name) DO UPDATE SET val = EXCLUDED.val
    WHERE CAST(config.val AS BIGINT) <= $3
    RETURNING val
"#;

#[derive(Clone)]
pub struct PgStreamCache {
    pool: PgPool,
}

impl PgStreamCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn upsert_all(
    conn: &mut PgConnection,
    descriptors: &[StreamDescriptor],
    now: DateTime<Utc>,
) -> StorageResult<()> {
    let checked_at = to_epoch_millis(now);
    for descriptor in descriptors {
        sqlx::query(UPSERT_SQL)
            .bind(&descriptor.video_link)
            .bind(descriptor.status.as_i32())
            .bind(&descriptor.title)
            .bind(&descriptor.thumbnail)
            .bind(descriptor.stream_start_time.map(to_epoch_millis))
            .bind(descriptor.is_members_only)
            .bind(descriptor.stream_type.as_i32())
            .bind(checked_at)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn read_config(conn: &mut PgConnection, name: &str) -> StorageResult<Option<String>> {
    let value = sqlx::query_scalar::<_, String>("SELECT val FROM config WHERE name = $1")
        .bind(name)
        .fetch_optional(conn)
        .await?;
    Ok(value)
}

async fn write_config(conn: &mut PgConnection, name: &str, value: &str) -> StorageResult<()> {
    sqlx::query(SET_CONFIG_SQL)
        .bind(name)
        .bind(value)
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl StreamCache for PgStreamCache {
    async fn get_nearest(&self, now: DateTime<Utc>) -> StorageResult<Option<CachedEntry>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM cached_stream_info \
             WHERE type <> $1 \
             ORDER BY ABS($2::BIGINT - COALESCE(start_time, last_check_time)), video_link \
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, CachedRow>(&sql)
            .bind(StreamType::Dead.as_i32())
            .bind(to_epoch_millis(now))
            .fetch_optional(&self.pool)
            .await?;
        row.map(CachedEntry::try_from).transpose()
    }

    async fn upsert(&self, descriptors: &[StreamDescriptor], now: DateTime<Utc>) -> StorageResult<()> {
        if descriptors.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        upsert_all(&mut tx, descriptors, now).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_config(&self, name: &str) -> StorageResult<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        read_config(&mut conn, name).await
    }

    async fn set_config(&self, name: &str, value: &str) -> StorageResult<()> {
        let mut conn = self.pool.acquire().await?;
        write_config(&mut conn, name, value).await
    }

    async fn begin(&self) -> StorageResult<Box<dyn CacheTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCacheTransaction { tx }))
    }

    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgCacheTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CacheTransaction for PgCacheTransaction {
    async fn upsert(&mut self, descriptors: &[StreamDescriptor], now: DateTime<Utc>) -> StorageResult<()> {
        upsert_all(&mut self.tx, descriptors, now).await
    }

    async fn get_config(&mut self, name: &str) -> StorageResult<Option<String>> {
        read_config(&mut self.tx, name).await
    }

    async fn set_config(&mut self, name: &str, value: &str) -> StorageResult<()> {
        write_config(&mut self.tx, name, value).await
    }

    async fn claim_throttle(
        &mut self,
        name: &str,
        now: DateTime<Utc>,
        interval: Duration,
    ) -> StorageResult<bool> {
        let claimed = sqlx::query_scalar::<_, String>(CLAIM_SQL)
            .bind(name)
            .bind(to_epoch_millis(now).to_string())
            .bind(to_epoch_millis(now - interval))
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(claimed.is_some())
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
