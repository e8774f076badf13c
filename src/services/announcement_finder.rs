//! Supplementary announcement finder
//!
//! When neither the cache nor the live page knows of a stream, the channel's
//! social timeline is mined for links to upcoming broadcasts. The candidate
//! ids are resolved through the video metadata API and every surviving
//! descriptor (dead ones included) is cached so it is not looked up again.
//!
//! Timeline fetches are rate limited through a timestamp in the config
//! table. The claim, the fetch and the writes of cache rows and cursor all
//! happen in one transaction: a failed fetch rolls the claim back, and a
//! concurrent caller waits on the claimed row instead of fetching twice.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::{AppResult, SourceError, SourceResult};
use crate::models::StreamDescriptor;
use crate::repositories::{
    run_transaction, CacheTransaction, StreamCache, LAST_POST_ID_KEY, LAST_SOCIAL_CHECK_KEY,
};
use crate::sources::youtube::descriptors_from_items;
use crate::sources::{SocialTimelineSource, SourceSet, VideoMetadataSource};

/// Result of one unthrottled timeline pass
#[derive(Debug, Clone, PartialEq)]
pub struct FinderOutcome {
    /// Classified candidates, dead ones included
    pub candidates: Vec<StreamDescriptor>,
    /// Cursor stored for the next pass
    pub cursor: Option<String>,
}

#[derive(Clone)]
pub struct AnnouncementFinder {
    cache: Arc<dyn StreamCache>,
    social: Arc<dyn SocialTimelineSource>,
    video_metadata: Arc<dyn VideoMetadataSource>,
    channel_id: String,
    social_user_id: Option<String>,
    lead_time: Duration,
    throttle: Duration,
}

impl AnnouncementFinder {
    pub fn new(cache: Arc<dyn StreamCache>, sources: &SourceSet, config: &Config) -> Self {
        Self {
            cache,
            social: sources.social.clone(),
            video_metadata: sources.video_metadata.clone(),
            channel_id: config.channel.channel_id.clone(),
            social_user_id: config.channel.social_user_id.clone(),
            lead_time: config.resolver.lead_time(),
            throttle: config.resolver.social_throttle(),
        }
    }

    /// Run one pass if the throttle allows it.
    ///
    /// `None` when throttled or when any step failed; failures are logged and
    /// leave the cache, cursor and throttle stamp untouched.
    pub async fn find(&self, now: DateTime<Utc>) -> Option<FinderOutcome> {
        let finder = self.clone();
        run_transaction(self.cache.as_ref(), "find_extra_streams", move |tx| {
            Box::pin(async move { finder.find_in_transaction(tx, now).await })
        })
        .await
        .flatten()
    }

    async fn find_in_transaction(
        &self,
        tx: &mut dyn CacheTransaction,
        now: DateTime<Utc>,
    ) -> AppResult<Option<FinderOutcome>> {
        let user_id = self
            .social_user_id
            .as_deref()
            .ok_or_else(|| SourceError::missing_credentials("social timeline"))?;

        if !tx.claim_throttle(LAST_SOCIAL_CHECK_KEY, now, self.throttle).await? {
            debug!("[find_extra_streams] throttled");
            return Ok(None);
        }

        let cursor = tx.get_config(LAST_POST_ID_KEY).await?;
        let page = self.social.fetch_posts_since(user_id, cursor.as_deref()).await?;
        let video_ids = page.video_ids();
        debug!(
            "[find_extra_streams] {} candidate link(s) since {:?}",
            video_ids.len(),
            cursor
        );

        let candidates = if video_ids.is_empty() {
            Vec::new()
        } else {
            self.lookup_videos(&video_ids, now).await?
        };

        tx.upsert(&candidates, now).await?;

        let next_cursor = page.next_cursor(cursor.as_deref());
        if let Some(next) = next_cursor.as_deref() {
            if cursor.as_deref() != Some(next) {
                tx.set_config(LAST_POST_ID_KEY, next).await?;
            }
        }

        info!(
            "Announcement finder resolved {} candidate stream(s)",
            candidates.len()
        );
        Ok(Some(FinderOutcome {
            candidates,
            cursor: next_cursor,
        }))
    }

    /// Resolve video ids into classified descriptors for the watched channel
    pub async fn lookup_videos(
        &self,
        video_ids: &[String],
        now: DateTime<Utc>,
    ) -> SourceResult<Vec<StreamDescriptor>> {
        let items = self.video_metadata.fetch_videos(video_ids).await?;
        Ok(descriptors_from_items(&items, &self.channel_id, now, self.lead_time))
    }
}
