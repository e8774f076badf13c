//! Upstream source traits
//!
//! Each upstream the resolver talks to sits behind one of these traits so
//! the orchestrator can be driven by fakes in tests. Implementations report
//! transport and payload problems as [`SourceError`]; "nothing there" is a
//! successful, empty result.
//!
//! [`SourceError`]: crate::errors::SourceError

use async_trait::async_trait;

use super::holodex::AggregatorVideo;
use super::twitter::TimelinePage;
use super::youtube::VideoItem;
use crate::errors::SourceResult;
use crate::models::StreamDescriptor;

/// Outcome of polling the channel's live page
#[derive(Debug, Clone, PartialEq)]
pub enum LivePageOutcome {
    /// The page does not point at any watchable video
    NoStream,
    /// The page points at a video, classified as far as the page allows
    Stream(StreamDescriptor),
}

impl LivePageOutcome {
    pub fn into_descriptor(self) -> Option<StreamDescriptor> {
        match self {
            LivePageOutcome::NoStream => None,
            LivePageOutcome::Stream(descriptor) => Some(descriptor),
        }
    }
}

/// The channel's canonical "live" page
#[async_trait]
pub trait LivePageSource: Send + Sync {
    async fn poll_live_page(&self, channel_id: &str) -> SourceResult<LivePageOutcome>;
}

/// Streamer-information aggregation API
#[async_trait]
pub trait AggregatorSource: Send + Sync {
    /// Live and scheduled streams, newest scheduled first
    async fn fetch_live_streams(&self, channel_id: &str, limit: u32) -> SourceResult<Vec<AggregatorVideo>>;

    /// Video history, most recent first
    async fn fetch_channel_videos(&self, channel_id: &str) -> SourceResult<Vec<AggregatorVideo>>;
}

/// Social media timeline of the streamer
#[async_trait]
pub trait SocialTimelineSource: Send + Sync {
    /// Posts newer than `since_id`, or the latest page when no cursor exists
    async fn fetch_posts_since(&self, user_id: &str, since_id: Option<&str>) -> SourceResult<TimelinePage>;
}

/// Batch video metadata API
#[async_trait]
pub trait VideoMetadataSource: Send + Sync {
    async fn fetch_videos(&self, video_ids: &[String]) -> SourceResult<Vec<VideoItem>>;
}
