//! Social timeline lookups (Twitter API v2) used to find announced streams

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::youtube::MAX_IDS_PER_LOOKUP;
use super::{read_json, send_expecting_ok, SocialTimelineSource};
use crate::errors::{SourceError, SourceResult};

const SOURCE_NAME: &str = "social timeline";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelinePage {
    /// Absent when there are no posts newer than the cursor
    pub data: Option<Vec<Post>>,
    pub meta: Option<TimelineMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: String,
    pub entities: Option<PostEntities>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostEntities {
    #[serde(default)]
    pub urls: Vec<PostUrl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostUrl {
    pub expanded_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineMeta {
    pub newest_id: Option<String>,
}

fn video_link_regex() -> &'static Regex {
    static VIDEO_LINK: OnceLock<Regex> = OnceLock::new();
    VIDEO_LINK.get_or_init(|| {
        Regex::new(r"youtu\.be/([A-Za-z0-9_-]{11})|www\.youtube\.com/watch\?v=([A-Za-z0-9_-]{11})")
            .expect("video link regex is valid")
    })
}

/// Video id from a short link or canonical watch link
pub fn video_id_from_url(url: &str) -> Option<&str> {
    let caps = video_link_regex().captures(url)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

impl TimelinePage {
    /// Distinct video ids linked from the posts, in post order.
    ///
    /// Posts arrive newest first, so when more ids are linked than one
    /// metadata lookup accepts, the oldest ones are left out.
    pub fn video_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.data
            .iter()
            .flatten()
            .filter_map(|post| post.entities.as_ref())
            .flat_map(|entities| entities.urls.iter())
            .filter_map(|url| url.expanded_url.as_deref())
            .filter_map(video_id_from_url)
            .filter(|id| seen.insert(*id))
            .take(MAX_IDS_PER_LOOKUP)
            .map(str::to_string)
            .collect()
    }

    /// Cursor to resume from next time, keeping `previous` when the page is empty
    pub fn next_cursor(&self, previous: Option<&str>) -> Option<String> {
        if self.data.is_none() {
            return previous.map(str::to_string);
        }
        self.meta
            .as_ref()
            .and_then(|meta| meta.newest_id.clone())
            .or_else(|| previous.map(str::to_string))
    }
}

/// HTTP client for the social timeline
pub struct TwitterTimeline {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl TwitterTimeline {
    pub fn new(client: Client, base_url: String, bearer_token: Option<String>) -> Self {
        Self {
            client,
            base_url,
            bearer_token,
        }
    }
}

#[async_trait]
impl SocialTimelineSource for TwitterTimeline {
    async fn fetch_posts_since(&self, user_id: &str, since_id: Option<&str>) -> SourceResult<TimelinePage> {
        let token = self
            .bearer_token
            .as_deref()
            .ok_or_else(|| SourceError::missing_credentials(SOURCE_NAME))?;

        let url = format!("{}/2/users/{}/tweets", self.base_url.trim_end_matches('/'), user_id);
        let mut request = self.client.get(url).bearer_auth(token).query(&[
            ("exclude", "retweets"),
            ("tweet.fields", "id,text,author_id,entities"),
            ("max_results", "100"),
        ]);
        if let Some(since_id) = since_id {
            request = request.query(&[("since_id", since_id)]);
        }

        let response = send_expecting_ok(request, SOURCE_NAME).await?;
        read_json(response, SOURCE_NAME).await
    }
}
