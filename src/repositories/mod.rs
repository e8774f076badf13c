//! Cache coordinator
//!
//! Persists stream descriptors and a handful of bookkeeping values (the
//! social timeline cursor and its rate-limit stamp) behind the
//! [`StreamCache`] trait. SQLite and PostgreSQL implementations share the
//! row mapping in this module.

pub mod postgres;
pub mod sqlite;
pub mod traits;
pub mod transaction;

pub use postgres::PgStreamCache;
pub use sqlite::SqliteStreamCache;
pub use traits::{CacheTransaction, StreamCache};
pub use transaction::run_transaction;

use chrono::{DateTime, TimeZone, Utc};

use crate::errors::{StorageError, StorageResult};
use crate::models::{CachedEntry, StreamDescriptor, StreamStatus, StreamType};

/// Config key holding the newest social post id already processed
pub const LAST_POST_ID_KEY: &str = "last_tweet_id";

/// Config key holding the epoch milliseconds of the last social timeline fetch
pub const LAST_SOCIAL_CHECK_KEY: &str = "last_twitter_check";

pub(crate) const SELECT_COLUMNS: &str =
    "video_link, status, title, thumbnail, start_time, members_only, type, last_check_time";

/// Raw `cached_stream_info` row
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CachedRow {
    video_link: String,
    status: i32,
    title: String,
    thumbnail: Option<String>,
    start_time: Option<i64>,
    members_only: bool,
    #[sqlx(rename = "type")]
    stream_type: i32,
    last_check_time: i64,
}

impl TryFrom<CachedRow> for CachedEntry {
    type Error = StorageError;

    fn try_from(row: CachedRow) -> StorageResult<Self> {
        let status = StreamStatus::from_i32(row.status)
            .ok_or_else(|| StorageError::corrupt("status", row.status))?;
        let stream_type = StreamType::from_i32(row.stream_type)
            .ok_or_else(|| StorageError::corrupt("type", row.stream_type))?;
        let stream_start_time = row
            .start_time
            .map(|ms| from_epoch_millis("start_time", ms))
            .transpose()?;
        let last_check_time = from_epoch_millis("last_check_time", row.last_check_time)?;

        Ok(CachedEntry {
            descriptor: StreamDescriptor {
                video_link: row.video_link,
                title: row.title,
                thumbnail: row.thumbnail,
                status,
                stream_start_time,
                is_members_only: row.members_only,
                stream_type,
            },
            last_check_time,
        })
    }
}

fn from_epoch_millis(field: &str, ms: i64) -> StorageResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StorageError::corrupt(field, ms))
}

pub(crate) fn to_epoch_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> CachedRow {
        CachedRow {
            video_link: "https://www.youtube.com/watch?v=abcdefghijk".to_string(),
            status: 3,
            title: "Karaoke".to_string(),
            thumbnail: None,
            start_time: Some(1_700_000_000_000),
            members_only: true,
            stream_type: 2,
            last_check_time: 1_699_999_000_000,
        }
    }

    #[test]
    fn test_row_conversion() {
        let entry = CachedEntry::try_from(row()).unwrap();
        assert_eq!(entry.descriptor.status, StreamStatus::StartingSoon);
        assert_eq!(entry.descriptor.stream_type, StreamType::Premiere);
        assert!(entry.descriptor.is_members_only);
        assert_eq!(
            entry.descriptor.stream_start_time.map(|t| t.timestamp_millis()),
            Some(1_700_000_000_000)
        );
        assert_eq!(entry.last_check_time.timestamp_millis(), 1_699_999_000_000);
    }

    #[test]
    fn test_row_with_unknown_status_is_corrupt() {
        let mut bad = row();
        bad.status = 9;
        assert!(matches!(
            CachedEntry::try_from(bad),
            Err(StorageError::Corrupt { .. })
        ));
    }
}
