//! Streamer aggregation API (Holodex): scheduled/live streams and video history

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{read_json, send_expecting_ok, AggregatorSource};
use crate::classifier::{classify, pick_preferred, Liveness};
use crate::errors::{SourceError, SourceResult};
use crate::models::{thumbnail_url, watch_url, PastStreamSummary, StreamDescriptor, StreamType};

const SOURCE_NAME: &str = "aggregator api";

/// One video or stream as reported by the aggregation API
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorVideo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// `new`, `upcoming`, `live`, `past` or `missing`
    pub status: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub topic_id: Option<String>,
    pub start_scheduled: Option<DateTime<Utc>>,
    /// Length in seconds
    pub duration: Option<u64>,
    pub end_actual: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct PaginatedVideos {
    #[serde(default)]
    items: Vec<AggregatorVideo>,
}

/// Choose the stream to report from the live/scheduled list.
///
/// The first item whose status is `live` wins; otherwise the item whose
/// scheduled start is nearest to `now`. `None` means the service knows of no
/// stream on the channel.
pub fn select_discovery(
    items: &[AggregatorVideo],
    now: DateTime<Utc>,
    lead_time: Duration,
) -> Option<StreamDescriptor> {
    let chosen = pick_preferred(items, now, |v| v.status == "live", |v| v.start_scheduled)?;

    let liveness = if chosen.status == "live" {
        Liveness::Live
    } else {
        Liveness::Upcoming
    };

    Some(StreamDescriptor {
        video_link: watch_url(&chosen.id),
        title: chosen.title.clone(),
        thumbnail: Some(thumbnail_url(&chosen.id)),
        status: classify(liveness, chosen.start_scheduled, now, lead_time),
        stream_start_time: chosen.start_scheduled,
        is_members_only: false,
        stream_type: StreamType::LiveStream,
    })
}

/// Most recent completed stream long enough to count.
///
/// The upstream list is ordered newest first, so the first qualifying item
/// is the answer. Shorts and clips never qualify.
pub fn select_past_stream(items: &[AggregatorVideo], min_duration_secs: u64) -> Option<PastStreamSummary> {
    items
        .iter()
        .find(|v| {
            v.status == "past"
                && v.kind.as_deref() == Some("stream")
                && v.topic_id.as_deref() != Some("shorts")
                && v.duration.unwrap_or(0) >= min_duration_secs
                && v.end_actual.is_some()
        })
        .and_then(|v| {
            Some(PastStreamSummary {
                video_link: watch_url(&v.id),
                title: v.title.clone(),
                end_actual: v.end_actual?,
            })
        })
}

/// HTTP client for the aggregation API
pub struct HolodexClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HolodexClient {
    pub fn new(client: Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn get(&self, path: &str) -> SourceResult<reqwest::RequestBuilder> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::missing_credentials(SOURCE_NAME))?;
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        Ok(self.client.get(url).header("X-APIKEY", api_key))
    }
}

#[async_trait]
impl AggregatorSource for HolodexClient {
    async fn fetch_live_streams(&self, channel_id: &str, limit: u32) -> SourceResult<Vec<AggregatorVideo>> {
        let request = self.get("/api/v2/live")?.query(&[
            ("type", "stream"),
            ("sort", "start_scheduled"),
            ("limit", limit.to_string().as_str()),
            ("order", "desc"),
            ("channel_id", channel_id),
        ]);
        let response = send_expecting_ok(request, SOURCE_NAME).await?;
        read_json(response, SOURCE_NAME).await
    }

    async fn fetch_channel_videos(&self, channel_id: &str) -> SourceResult<Vec<AggregatorVideo>> {
        let request = self
            .get(&format!("/api/v2/channels/{channel_id}/videos"))?
            .query(&[
                ("lang", "en"),
                ("type", "stream,placeholder"),
                ("include", "live_info"),
                ("limit", "24"),
                ("offset", "0"),
                ("paginated", "true"),
            ]);
        let response = send_expecting_ok(request, SOURCE_NAME).await?;
        let page: PaginatedVideos = read_json(response, SOURCE_NAME).await?;
        Ok(page.items)
    }
}
