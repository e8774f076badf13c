//! SQLite-backed stream cache

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use super::traits::{CacheTransaction, StreamCache};
use super::{to_epoch_millis, CachedRow, SELECT_COLUMNS};
use crate::errors::StorageResult;
use crate::models::{CachedEntry, StreamDescriptor, StreamType};

const UPSERT_SQL: &str = r#"
    INSERT INTO cached_stream_info
        (video_link, status, title, thumbnail, start_time, members_only, type, last_check_time)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (video_link) DO UPDATE SET
        status = excluded.status,
        title = excluded.title,
        thumbnail = excluded.thumbnail,
        start_time = excluded.start_time,
        members_only = excluded.members_only,
        type = excluded.type,
        last_check_time = excluded.last_check_time
"#;

const SET_CONFIG_SQL: &str = r#"
    INSERT INTO config (name, val) VALUES (?, ?)
    ON CONFLICT (name) DO UPDATE SET val = excluded.val
"#;

const CLAIM_SQL: &str = r#"
    INSERT INTO config (name, val) VALUES (?, ?)
    ON CONFLICT (name) DO UPDATE SET val = excluded.val
    WHERE CAST(config.val AS BIGINT) <= ?
    RETURNING val
"#;

#[derive(Clone)]
pub struct SqliteStreamCache {
    pool: SqlitePool,
}

impl SqliteStreamCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn upsert_all(
    conn: &mut SqliteConnection,
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

async fn read_config(conn: &mut SqliteConnection, name: &str) -> StorageResult<Option<String>> {
    let value = sqlx::query_scalar::<_, String>("SELECT val FROM config WHERE name = ?")
        .bind(name)
        .fetch_optional(conn)
        .await?;
    Ok(value)
}

async fn write_config(conn: &mut SqliteConnection, name: &str, value: &str) -> StorageResult<()> {
    sqlx::query(SET_CONFIG_SQL)
        .bind(name)
        .bind(value)
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl StreamCache for SqliteStreamCache {
    async fn get_nearest(&self, now: DateTime<Utc>) -> StorageResult<Option<CachedEntry>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM cached_stream_info \
             WHERE type != ? \
             ORDER BY ABS(? - COALESCE(start_time, last_check_time)), video_link \
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
        Ok(Box::new(SqliteCacheTransaction { tx }))
    }

    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct SqliteCacheTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl CacheTransaction for SqliteCacheTransaction {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::Database;
    use crate::models::StreamStatus;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Arc<dyn StreamCache>) {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("cache.db").display()),
            max_connections: Some(2),
            connect_attempts: 1,
            connect_timeout_secs: 5,
        };
        let database = Database::connect(&config).await.unwrap();
        database.migrate().await.unwrap();
        (dir, database.stream_cache())
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn descriptor(id: &str, start: Option<DateTime<Utc>>) -> StreamDescriptor {
        StreamDescriptor {
            video_link: crate::models::watch_url(id),
            title: format!("stream {id}"),
            thumbnail: Some(crate::models::thumbnail_url(id)),
            status: StreamStatus::StartingSoon,
            stream_start_time: start,
            is_members_only: false,
            stream_type: StreamType::LiveStream,
        }
    }

    #[tokio::test]
    async fn test_empty_cache_has_no_nearest() {
        let (_dir, cache) = setup().await;
        assert!(cache.get_nearest(at(0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_nearest_picks_closest_start() {
        let (_dir, cache) = setup().await;
        cache
            .upsert(
                &[
                    descriptor("aaaaaaaaaaa", Some(at(7200))),
                    descriptor("bbbbbbbbbbb", Some(at(-600))),
                    descriptor("ccccccccccc", Some(at(3600))),
                ],
                at(-3600),
            )
            .await
            .unwrap();

        let nearest = cache.get_nearest(at(0)).await.unwrap().unwrap();
        assert!(nearest.descriptor.video_link.ends_with("bbbbbbbbbbb"));
        assert_eq!(nearest.last_check_time, at(-3600));
    }

    #[tokio::test]
    async fn test_entry_without_start_uses_last_check_time() {
        let (_dir, cache) = setup().await;
        cache
            .upsert(&[descriptor("aaaaaaaaaaa", Some(at(600)))], at(-7200))
            .await
            .unwrap();
        cache
            .upsert(&[descriptor("bbbbbbbbbbb", None)], at(-60))
            .await
            .unwrap();

        let nearest = cache.get_nearest(at(0)).await.unwrap().unwrap();
        assert!(nearest.descriptor.video_link.ends_with("bbbbbbbbbbb"));
        assert!(nearest.descriptor.stream_start_time.is_none());
    }

    #[tokio::test]
    async fn test_ties_break_on_video_link() {
        let (_dir, cache) = setup().await;
        cache
            .upsert(
                &[
                    descriptor("zzzzzzzzzzz", Some(at(300))),
                    descriptor("aaaaaaaaaaa", Some(at(-300))),
                ],
                at(0),
            )
            .await
            .unwrap();

        let nearest = cache.get_nearest(at(0)).await.unwrap().unwrap();
        assert!(nearest.descriptor.video_link.ends_with("aaaaaaaaaaa"));
    }

    #[tokio::test]
    async fn test_dead_entries_are_never_returned() {
        let (_dir, cache) = setup().await;
        let mut dead = descriptor("aaaaaaaaaaa", Some(at(0)));
        dead.stream_type = StreamType::Dead;
        dead.status = StreamStatus::Offline;
        cache.upsert(&[dead], at(0)).await.unwrap();
        assert!(cache.get_nearest(at(0)).await.unwrap().is_none());

        cache
            .upsert(&[descriptor("bbbbbbbbbbb", Some(at(86_400)))], at(0))
            .await
            .unwrap();
        let nearest = cache.get_nearest(at(0)).await.unwrap().unwrap();
        assert!(nearest.descriptor.video_link.ends_with("bbbbbbbbbbb"));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_existing_row() {
        let (_dir, cache) = setup().await;
        let mut first = descriptor("aaaaaaaaaaa", Some(at(600)));
        cache.upsert(&[first.clone()], at(0)).await.unwrap();

        first.status = StreamStatus::Live;
        first.title = "renamed".to_string();
        first.is_members_only = true;
        cache.upsert(&[first.clone()], at(30)).await.unwrap();
        cache.upsert(&[first.clone()], at(30)).await.unwrap();

        let nearest = cache.get_nearest(at(30)).await.unwrap().unwrap();
        assert_eq!(nearest.descriptor, first);
        assert_eq!(nearest.last_check_time, at(30));
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let (_dir, cache) = setup().await;
        assert!(cache.get_config("last_tweet_id").await.unwrap().is_none());
        cache.set_config("last_tweet_id", "100").await.unwrap();
        cache.set_config("last_tweet_id", "200").await.unwrap();
        assert_eq!(
            cache.get_config("last_tweet_id").await.unwrap().as_deref(),
            Some("200")
        );
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let (_dir, cache) = setup().await;
        let mut tx = cache.begin().await.unwrap();
        tx.upsert(&[descriptor("aaaaaaaaaaa", Some(at(0)))], at(0))
            .await
            .unwrap();
        tx.set_config("last_tweet_id", "42").await.unwrap();
        assert_eq!(tx.get_config("last_tweet_id").await.unwrap().as_deref(), Some("42"));
        tx.rollback().await.unwrap();

        assert!(cache.get_nearest(at(0)).await.unwrap().is_none());
        assert!(cache.get_config("last_tweet_id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_throttle_once_per_interval() {
        let (_dir, cache) = setup().await;
        let interval = Duration::seconds(90);

        let mut tx = cache.begin().await.unwrap();
        assert!(tx.claim_throttle("last_twitter_check", at(0), interval).await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = cache.begin().await.unwrap();
        assert!(!tx.claim_throttle("last_twitter_check", at(89), interval).await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = cache.begin().await.unwrap();
        assert!(tx.claim_throttle("last_twitter_check", at(90), interval).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(
            cache.get_config("last_twitter_check").await.unwrap(),
            Some(at(90).timestamp_millis().to_string())
        );
    }

    #[tokio::test]
    async fn test_rolled_back_claim_is_released() {
        let (_dir, cache) = setup().await;
        let interval = Duration::seconds(90);

        let mut tx = cache.begin().await.unwrap();
        assert!(tx.claim_throttle("last_twitter_check", at(0), interval).await.unwrap());
        tx.rollback().await.unwrap();

        let mut tx = cache.begin().await.unwrap();
        assert!(tx.claim_throttle("last_twitter_check", at(1), interval).await.unwrap());
        tx.commit().await.unwrap();
    }
}
