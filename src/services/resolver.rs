//! Resolution orchestrator
//!
//! Sequences cache, live page, announcement finder and past-stream lookups
//! into one answer per request. Every upstream or storage failure is logged
//! and treated as "nothing found" so a partial answer is always returned.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::classifier::{choose_best, reclassify};
use crate::config::{Config, ResolverConfig};
use crate::errors::SourceResult;
use crate::models::{CachedEntry, PastStreamSummary, ResolvedStatus, StreamDescriptor, StreamType};
use crate::repositories::StreamCache;
use crate::services::announcement_finder::AnnouncementFinder;
use crate::services::mock;
use crate::sources::holodex::{select_discovery, select_past_stream};
use crate::sources::{LivePageOutcome, SourceSet};

/// Outcome of the uncached legacy poll
#[derive(Debug)]
pub struct DirectPoll {
    pub live: SourceResult<LivePageOutcome>,
    pub past: SourceResult<Option<PastStreamSummary>>,
}

pub struct Resolver {
    cache: Arc<dyn StreamCache>,
    sources: SourceSet,
    finder: AnnouncementFinder,
    channel_id: String,
    settings: ResolverConfig,
    mock_enabled: bool,
}

impl Resolver {
    pub fn new(cache: Arc<dyn StreamCache>, sources: SourceSet, config: &Config) -> Self {
        let finder = AnnouncementFinder::new(cache.clone(), &sources, config);
        Self {
            cache,
            sources,
            finder,
            channel_id: config.channel.channel_id.clone(),
            settings: config.resolver.clone(),
            mock_enabled: config.mock.enabled,
        }
    }

    pub fn cache(&self) -> &Arc<dyn StreamCache> {
        &self.cache
    }

    /// Fixture lookup, honoured only when mock mode is enabled
    pub fn mock_fixture(&self, code: Option<&str>) -> Option<ResolvedStatus> {
        if !self.mock_enabled {
            return None;
        }
        code.and_then(|code| mock::fixture(code, Utc::now()))
    }

    /// Resolve the current and most recent past stream
    pub async fn resolve(&self, mock_code: Option<&str>) -> ResolvedStatus {
        if let Some(fixture) = self.mock_fixture(mock_code) {
            debug!("Serving mock fixture {:?}", mock_code);
            return fixture;
        }
        self.resolve_at(Utc::now()).await
    }

    /// Resolve against an explicit instant
    pub async fn resolve_at(&self, now: DateTime<Utc>) -> ResolvedStatus {
        let (live_stream, past_stream) = tokio::join!(self.resolve_live(now), self.past_stream_or_none());
        ResolvedStatus {
            live_stream,
            past_stream,
        }
    }

    async fn resolve_live(&self, now: DateTime<Utc>) -> Option<StreamDescriptor> {
        if let Some(descriptor) = self.from_cache(now).await {
            return Some(descriptor);
        }
        self.from_upstream(now).await
    }

    async fn from_cache(&self, now: DateTime<Utc>) -> Option<StreamDescriptor> {
        let entry = match self.cache.get_nearest(now).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("[resolve] cache empty");
                return None;
            }
            Err(e) => {
                error!("[resolve] cache read failed: {}", e);
                return None;
            }
        };

        let mut descriptor = self.revalidate(entry, now).await?;
        reclassify(&mut descriptor, now, self.settings.lead_time());
        Some(descriptor)
    }

    /// Decide whether a cached entry can be served, refreshing it if needed
    async fn revalidate(&self, entry: CachedEntry, now: DateTime<Utc>) -> Option<StreamDescriptor> {
        let age = entry.age(now);
        let descriptor = entry.descriptor;
        debug!(
            "[revalidate] {} last checked {}s ago",
            descriptor.video_link,
            age.num_seconds()
        );

        if descriptor.stream_type == StreamType::LiveStream
            && !descriptor.is_members_only
            && age < self.settings.cache_fresh()
        {
            return Some(descriptor);
        }

        let video_id = descriptor.video_id()?.to_string();
        let refreshed = match self.finder.lookup_videos(&[video_id], now).await {
            Ok(items) => items
                .into_iter()
                .find(|item| item.video_link == descriptor.video_link),
            Err(e) => {
                warn!("[revalidate] metadata lookup failed: {}", e);
                return None;
            }
        };

        let Some(refreshed) = refreshed else {
            debug!("[revalidate] no metadata for {}, discarding", descriptor.video_link);
            return None;
        };

        if let Err(e) = self.cache.upsert(std::slice::from_ref(&refreshed), now).await {
            error!("[revalidate] cache write failed: {}", e);
        }

        if refreshed.is_dead() {
            debug!("[revalidate] {} has already aired", refreshed.video_link);
            return None;
        }
        Some(refreshed)
    }

    async fn from_upstream(&self, now: DateTime<Utc>) -> Option<StreamDescriptor> {
        match self.sources.live_page.poll_live_page(&self.channel_id).await {
            Ok(LivePageOutcome::Stream(descriptor)) => {
                if let Err(e) = self.cache.upsert(std::slice::from_ref(&descriptor), now).await {
                    error!("[resolve] cache write failed: {}", e);
                }
                return Some(descriptor);
            }
            Ok(LivePageOutcome::NoStream) => {
                debug!("[resolve] live page has no stream");
            }
            Err(e) => {
                warn!("livestream poll returned error: {}", e);
            }
        }

        let outcome = self.finder.find(now).await?;
        let best = choose_best(&outcome.candidates, now);
        if let Some(best) = &best {
            info!("Using announced stream {}", best.video_link);
        }
        best
    }

    /// Most recent qualifying completed stream
    pub async fn past_stream(&self) -> SourceResult<Option<PastStreamSummary>> {
        let videos = self
            .sources
            .aggregator
            .fetch_channel_videos(&self.channel_id)
            .await?;
        Ok(select_past_stream(
            &videos,
            self.settings.past_stream_min_duration_secs,
        ))
    }

    async fn past_stream_or_none(&self) -> Option<PastStreamSummary> {
        match self.past_stream().await {
            Ok(past) => past,
            Err(e) => {
                warn!("paststream poll returned error: {}", e);
                None
            }
        }
    }

    /// Best live or upcoming stream known to the aggregation service
    pub async fn discover(&self, now: DateTime<Utc>) -> SourceResult<Option<StreamDescriptor>> {
        let videos = self
            .sources
            .aggregator
            .fetch_live_streams(&self.channel_id, self.settings.discovery_limit)
            .await?;
        Ok(select_discovery(&videos, now, self.settings.lead_time()))
    }

    /// Live page and past stream, polled concurrently without the cache
    pub async fn poll_direct(&self) -> DirectPoll {
        let (live, past) = tokio::join!(
            self.sources.live_page.poll_live_page(&self.channel_id),
            self.past_stream()
        );
        DirectPoll { live, past }
    }
}
