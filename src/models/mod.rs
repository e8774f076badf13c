//! Domain models shared by every poller, the cache and the orchestrator

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// API epoch reported to clients so they can detect incompatible upgrades
pub const API_EPOCH: u32 = 2;

const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Derived broadcast status of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    Offline,
    Indeterminate,
    StartingSoon,
    Live,
}

impl StreamStatus {
    /// Stable integer encoding used by the cache tables
    pub fn as_i32(self) -> i32 {
        match self {
            StreamStatus::Offline => 1,
            StreamStatus::Indeterminate => 2,
            StreamStatus::StartingSoon => 3,
            StreamStatus::Live => 4,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(StreamStatus::Offline),
            2 => Some(StreamStatus::Indeterminate),
            3 => Some(StreamStatus::StartingSoon),
            4 => Some(StreamStatus::Live),
            _ => None,
        }
    }
}

/// Kind of content a descriptor points at
///
/// `Dead` marks a candidate that turned out to be ordinary, already-aired
/// content. Dead entries stay cached so they are not re-resolved, but are never
/// selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamType {
    LiveStream,
    Premiere,
    Dead,
}

impl StreamType {
    pub fn as_i32(self) -> i32 {
        match self {
            StreamType::LiveStream => 1,
            StreamType::Premiere => 2,
            StreamType::Dead => 3,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(StreamType::LiveStream),
            2 => Some(StreamType::Premiere),
            3 => Some(StreamType::Dead),
            _ => None,
        }
    }
}

/// One candidate stream, live or scheduled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescriptor {
    /// Canonical watch URL, natural key of the cache
    pub video_link: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub status: StreamStatus,
    pub stream_start_time: Option<DateTime<Utc>>,
    pub is_members_only: bool,
    pub stream_type: StreamType,
}

impl StreamDescriptor {
    /// Descriptor with only link and title known, as produced when the
    /// embedded player payload is unavailable
    pub fn basic(video_link: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            video_link: video_link.into(),
            title: title.into(),
            thumbnail: None,
            status: StreamStatus::Indeterminate,
            stream_start_time: None,
            is_members_only: false,
            stream_type: StreamType::LiveStream,
        }
    }

    /// The 11-character video id embedded in the watch link, if any
    pub fn video_id(&self) -> Option<&str> {
        video_id_from_watch_link(&self.video_link)
    }

    pub fn is_dead(&self) -> bool {
        self.stream_type == StreamType::Dead
    }
}

/// A descriptor as stored by the cache, with the instant it was last confirmed
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    pub descriptor: StreamDescriptor,
    pub last_check_time: DateTime<Utc>,
}

impl CachedEntry {
    /// Time elapsed since the entry was last confirmed upstream
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_check_time
    }
}

/// Most recent completed stream, used for a "time since last stream" display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastStreamSummary {
    pub video_link: String,
    pub title: String,
    pub end_actual: DateTime<Utc>,
}

/// Result of one resolve request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStatus {
    pub live_stream: Option<StreamDescriptor>,
    pub past_stream: Option<PastStreamSummary>,
}

impl ResolvedStatus {
    /// True when no source produced anything usable
    pub fn is_empty(&self) -> bool {
        self.live_stream.is_none() && self.past_stream.is_none()
    }
}

/// Canonical watch URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL_PREFIX}{video_id}")
}

/// Default medium-resolution thumbnail for a video id
pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{video_id}/mqdefault.jpg")
}

fn watch_link_regex() -> &'static Regex {
    static WATCH_LINK: OnceLock<Regex> = OnceLock::new();
    WATCH_LINK.get_or_init(|| {
        Regex::new(r"[?&]v=([A-Za-z0-9_-]{11})").expect("watch link regex is valid")
    })
}

/// Extract the video id from a `watch?v=` link
pub fn video_id_from_watch_link(link: &str) -> Option<&str> {
    watch_link_regex()
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_storage_encoding() {
        for status in [
            StreamStatus::Offline,
            StreamStatus::Indeterminate,
            StreamStatus::StartingSoon,
            StreamStatus::Live,
        ] {
            assert_eq!(StreamStatus::from_i32(status.as_i32()), Some(status));
        }
        assert_eq!(StreamStatus::from_i32(0), None);
        assert_eq!(StreamType::from_i32(9), None);
    }

    #[test]
    fn test_video_id_from_watch_link() {
        assert_eq!(
            video_id_from_watch_link("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            video_id_from_watch_link("https://www.youtube.com/watch?feature=share&v=abcdefghijk"),
            Some("abcdefghijk")
        );
        assert_eq!(video_id_from_watch_link("https://www.youtube.com/channel/UC123"), None);
    }

    #[test]
    fn test_descriptor_serializes_camel_case() {
        let descriptor = StreamDescriptor::basic(watch_url("dQw4w9WgXcQ"), "title");
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["videoLink"], "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(json["status"], "INDETERMINATE");
        assert_eq!(json["streamType"], "LIVE_STREAM");
        assert_eq!(json["isMembersOnly"], false);
    }
}
