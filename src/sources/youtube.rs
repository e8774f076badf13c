//! Batch video metadata lookups against the YouTube Data API

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{read_json, VideoMetadataSource};
use crate::classifier::{classify, Liveness};
use crate::errors::{SourceError, SourceResult};
use crate::models::{watch_url, StreamDescriptor, StreamStatus, StreamType};
use crate::utils::parse_duration_secs;

const SOURCE_NAME: &str = "video metadata api";

/// Most ids the `videos` endpoint accepts in a single call
pub const MAX_IDS_PER_LOOKUP: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    pub snippet: VideoSnippet,
    pub content_details: Option<ContentDetails>,
    pub live_streaming_details: Option<LiveStreamingDetails>,
    pub status: Option<VideoStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub channel_id: String,
    pub title: String,
    #[serde(default)]
    pub thumbnails: HashMap<String, Thumbnail>,
    pub live_broadcast_content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentDetails {
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStreamingDetails {
    pub scheduled_start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    pub privacy_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pick the smallest thumbnail that is still large enough to display
/// (wider than 300 and taller than 150).
pub fn choose_thumbnail<'a>(candidates: impl IntoIterator<Item = &'a Thumbnail>) -> Option<String> {
    candidates
        .into_iter()
        .filter(|t| t.width.unwrap_or(0) > 300 && t.height.unwrap_or(0) > 150)
        .min_by_key(|t| t.width.unwrap_or(0))
        .map(|t| t.url.clone())
}

/// Turn metadata items into descriptors for `channel_id`.
///
/// Items without a scheduled start, or published by another channel, are
/// dropped entirely. Items that already aired as ordinary videos are kept as
/// [`StreamType::Dead`] so they are cached and not looked up again.
///
/// Members-only detection relies on the `unlisted` privacy flag, which is a
/// heuristic rather than something the API documents.
pub fn descriptors_from_items(
    items: &[VideoItem],
    channel_id: &str,
    now: DateTime<Utc>,
    lead_time: Duration,
) -> Vec<StreamDescriptor> {
    items
        .iter()
        .filter_map(|item| descriptor_from_item(item, channel_id, now, lead_time))
        .collect()
}

fn descriptor_from_item(
    item: &VideoItem,
    channel_id: &str,
    now: DateTime<Utc>,
    lead_time: Duration,
) -> Option<StreamDescriptor> {
    debug!("Considering video {} ({})", item.id, item.snippet.title);

    let start = item
        .live_streaming_details
        .as_ref()
        .and_then(|details| details.scheduled_start_time);
    let Some(start) = start else {
        debug!("Skipping {}: no scheduled start", item.id);
        return None;
    };
    if item.snippet.channel_id != channel_id {
        debug!("Skipping {}: belongs to channel {}", item.id, item.snippet.channel_id);
        return None;
    }

    let duration_secs = item
        .content_details
        .as_ref()
        .and_then(|details| details.duration.as_deref())
        .and_then(parse_duration_secs)
        .unwrap_or(0);
    let mut stream_type = if duration_secs > 0 {
        StreamType::Premiere
    } else {
        StreamType::LiveStream
    };

    let is_members_only = item
        .status
        .as_ref()
        .and_then(|status| status.privacy_status.as_deref())
        == Some("unlisted");

    let status = match item.snippet.live_broadcast_content.as_deref() {
        Some("live") => StreamStatus::Live,
        Some("upcoming") => classify(Liveness::Upcoming, Some(start), now, lead_time),
        _ => {
            stream_type = StreamType::Dead;
            StreamStatus::Offline
        }
    };

    Some(StreamDescriptor {
        video_link: watch_url(&item.id),
        title: item.snippet.title.clone(),
        thumbnail: choose_thumbnail(item.snippet.thumbnails.values()),
        status,
        stream_start_time: Some(start),
        is_members_only,
        stream_type,
    })
}

/// HTTP client for the video metadata API
pub struct YoutubeDataApi {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl YoutubeDataApi {
    pub fn new(client: Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl VideoMetadataSource for YoutubeDataApi {
    async fn fetch_videos(&self, video_ids: &[String]) -> SourceResult<Vec<VideoItem>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::missing_credentials(SOURCE_NAME))?;
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/youtube/v3/videos", self.base_url.trim_end_matches('/'));
        let request = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .query(&[
                ("part", "snippet,contentDetails,liveStreamingDetails,status"),
                ("id", video_ids.join(",").as_str()),
                ("key", api_key),
            ]);

        debug!("[{}] request enter ({} ids)", SOURCE_NAME, video_ids.len());
        let response = request
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(SOURCE_NAME, e))?;
        debug!("[{}] request exit", SOURCE_NAME);

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or_else(|_| format!("HTTP status: {}", status.as_u16()));
            warn!("[{}] request failed: {}", SOURCE_NAME, detail);
            return Err(SourceError::upstream(SOURCE_NAME, status.as_u16(), detail));
        }

        let list: VideoListResponse = read_json(response, SOURCE_NAME).await?;
        Ok(list.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CHANNEL: &str = "UCtarget0000000000000000";

    fn item(json: serde_json::Value) -> VideoItem {
        serde_json::from_value(json).unwrap()
    }

    fn upcoming_item(id: &str, channel: &str, start: &str, broadcast: &str) -> VideoItem {
        item(serde_json::json!({
            "id": id,
            "snippet": {
                "channelId": channel,
                "title": format!("title {id}"),
                "liveBroadcastContent": broadcast,
                "thumbnails": {
                    "default": { "url": "https://img/default.jpg", "width": 120, "height": 90 },
                    "medium": { "url": "https://img/medium.jpg", "width": 320, "height": 180 },
                    "high": { "url": "https://img/high.jpg", "width": 480, "height": 360 }
                }
            },
            "contentDetails": { "duration": "P0D" },
            "liveStreamingDetails": { "scheduledStartTime": start },
            "status": { "privacyStatus": "public" }
        }))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_upcoming_stream_within_lead_time() {
        let items = vec![upcoming_item("aaaaaaaaaaa", CHANNEL, "2024-05-01T12:20:00Z", "upcoming")];
        let descriptors = descriptors_from_items(&items, CHANNEL, now(), Duration::seconds(1800));

        assert_eq!(descriptors.len(), 1);
        let d = &descriptors[0];
        assert_eq!(d.video_link, "https://www.youtube.com/watch?v=aaaaaaaaaaa");
        assert_eq!(d.status, StreamStatus::StartingSoon);
        assert_eq!(d.stream_type, StreamType::LiveStream);
        assert_eq!(d.thumbnail.as_deref(), Some("https://img/medium.jpg"));
        assert!(!d.is_members_only);
    }

    #[test]
    fn test_overdue_upcoming_stream_stays_starting_soon() {
        let items = vec![upcoming_item("lllllllllll", CHANNEL, "2024-05-01T11:20:00Z", "upcoming")];
        let descriptors = descriptors_from_items(&items, CHANNEL, now(), Duration::seconds(1800));

        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].status, StreamStatus::StartingSoon);
    }

    #[test]
    fn test_other_channel_and_unscheduled_items_are_dropped() {
        let mut unscheduled = upcoming_item("bbbbbbbbbbb", CHANNEL, "2024-05-01T12:20:00Z", "upcoming");
        unscheduled.live_streaming_details = None;
        let items = vec![
            upcoming_item("aaaaaaaaaaa", "UCsomeoneelse", "2024-05-01T12:20:00Z", "live"),
            unscheduled,
        ];
        assert!(descriptors_from_items(&items, CHANNEL, now(), Duration::seconds(1800)).is_empty());
    }

    #[test]
    fn test_aired_content_is_dead_and_premieres_are_detected() {
        let mut premiere = upcoming_item("ppppppppppp", CHANNEL, "2024-05-02T12:00:00Z", "upcoming");
        premiere.content_details = Some(ContentDetails {
            duration: Some("PT3M20S".to_string()),
        });
        let mut members = upcoming_item("mmmmmmmmmmm", CHANNEL, "2024-05-01T11:00:00Z", "live");
        members.status = Some(VideoStatus {
            privacy_status: Some("unlisted".to_string()),
        });
        let items = vec![
            upcoming_item("ddddddddddd", CHANNEL, "2024-04-01T12:00:00Z", "none"),
            premiere,
            members,
        ];

        let descriptors = descriptors_from_items(&items, CHANNEL, now(), Duration::seconds(1800));
        assert_eq!(descriptors.len(), 3);

        assert_eq!(descriptors[0].stream_type, StreamType::Dead);
        assert_eq!(descriptors[0].status, StreamStatus::Offline);

        assert_eq!(descriptors[1].stream_type, StreamType::Premiere);
        assert_eq!(descriptors[1].status, StreamStatus::Offline);

        assert_eq!(descriptors[2].status, StreamStatus::Live);
        assert!(descriptors[2].is_members_only);
    }

    #[test]
    fn test_choose_thumbnail_requires_minimum_size() {
        let small = Thumbnail {
            url: "small".to_string(),
            width: Some(300),
            height: Some(200),
        };
        let wide = Thumbnail {
            url: "wide".to_string(),
            width: Some(640),
            height: Some(150),
        };
        assert_eq!(choose_thumbnail([&small, &wide]), None);

        let good = Thumbnail {
            url: "good".to_string(),
            width: Some(336),
            height: Some(188),
        };
        assert_eq!(choose_thumbnail([&small, &good]).as_deref(), Some("good"));
    }
}
