//! Primary live poller: scrapes the channel's `/live` page
//!
//! The page redirects (via its canonical link) to the video currently live or
//! waiting on the channel. The player state embedded in the page says whether
//! that video is live, a waiting room, and when it is scheduled to start.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

use super::youtube::{choose_thumbnail, Thumbnail};
use super::{send_expecting_ok, LivePageOutcome, LivePageSource};
use crate::classifier::{classify, Liveness};
use crate::errors::{SourceError, SourceResult};
use crate::models::{StreamDescriptor, StreamType};
use crate::utils::extract_assigned_json;

const SOURCE_NAME: &str = "live page";

/// Assignment that carries the player state in the page
pub const PLAYER_RESPONSE_PREFIX: &str = "var ytInitialPlayerResponse = ";

const SCHEDULED_START_POINTER: &str = "/playabilityStatus/liveStreamability/liveStreamabilityRenderer/offlineSlate/liveStreamOfflineSlateRenderer/scheduledStartTime";

struct PageSelectors {
    canonical: Selector,
    title: Selector,
    script: Selector,
}

fn selectors() -> &'static PageSelectors {
    static SELECTORS: OnceLock<PageSelectors> = OnceLock::new();
    SELECTORS.get_or_init(|| PageSelectors {
        canonical: Selector::parse("link[rel='canonical']").expect("valid selector"),
        title: Selector::parse("meta[name='title']").expect("valid selector"),
        script: Selector::parse("script").expect("valid selector"),
    })
}

fn first_attr(html: &Html, selector: &Selector, attr: &str) -> Option<String> {
    html.select(selector)
        .find_map(|element| element.value().attr(attr))
        .map(str::to_string)
}

/// Find the player response among the page's inline scripts
fn player_response(html: &Html, selector: &Selector) -> Option<Value> {
    html.select(selector).find_map(|script| {
        let text: String = script.text().collect();
        extract_assigned_json(&text, PLAYER_RESPONSE_PREFIX)
    })
}

/// Extract the stream descriptor from a live page document.
///
/// Fails only when the canonical link is missing, since that means the page
/// itself is not what we expect. A canonical link that is not a watch link
/// means nothing is live or scheduled. A missing or unparseable player blob
/// degrades to an `Indeterminate` descriptor with only link and title.
pub fn extract_live_page(
    document: &str,
    now: DateTime<Utc>,
    lead_time: Duration,
) -> SourceResult<LivePageOutcome> {
    let html = Html::parse_document(document);
    let sel = selectors();

    let video_link = first_attr(&html, &sel.canonical, "href")
        .ok_or_else(|| SourceError::parse(SOURCE_NAME, "malformed document: canonical link missing"))?;
    if !video_link.contains("watch?v=") {
        debug!("Canonical link {} is not a video", video_link);
        return Ok(LivePageOutcome::NoStream);
    }

    let page_title = first_attr(&html, &sel.title, "content");

    let Some(player) = player_response(&html, &sel.script) else {
        debug!("Player response not found, returning basic descriptor");
        return Ok(LivePageOutcome::Stream(StreamDescriptor::basic(
            video_link,
            page_title.unwrap_or_default(),
        )));
    };

    let title = page_title
        .or_else(|| {
            player
                .pointer("/videoDetails/title")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default();

    let details = player.get("videoDetails");
    let flag = |name: &str| {
        details
            .and_then(|d| d.get(name))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };
    let liveness = match (flag("isLiveContent"), flag("isUpcoming")) {
        (true, false) => Liveness::Live,
        (true, true) => Liveness::Upcoming,
        _ => Liveness::Unknown,
    };

    let scheduled_start = player
        .pointer(SCHEDULED_START_POINTER)
        .and_then(epoch_seconds)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    let thumbnails: Vec<Thumbnail> = player
        .pointer("/videoDetails/thumbnail/thumbnails")
        .cloned()
        .and_then(|list| serde_json::from_value(list).ok())
        .unwrap_or_default();

    Ok(LivePageOutcome::Stream(StreamDescriptor {
        video_link,
        title,
        thumbnail: choose_thumbnail(&thumbnails),
        status: classify(liveness, scheduled_start, now, lead_time),
        stream_start_time: scheduled_start,
        is_members_only: false,
        stream_type: StreamType::LiveStream,
    }))
}

/// The page encodes the epoch as a string, but accept a number too
fn epoch_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// HTTP implementation of the live page poller
pub struct YoutubeLivePage {
    client: Client,
    base_url: String,
    lead_time: Duration,
}

impl YoutubeLivePage {
    pub fn new(client: Client, base_url: String, lead_time: Duration) -> Self {
        Self {
            client,
            base_url,
            lead_time,
        }
    }
}

#[async_trait]
impl LivePageSource for YoutubeLivePage {
    async fn poll_live_page(&self, channel_id: &str) -> SourceResult<LivePageOutcome> {
        let url = format!("{}/channel/{}/live", self.base_url.trim_end_matches('/'), channel_id);
        let response = send_expecting_ok(self.client.get(url), SOURCE_NAME).await?;
        let document = response
            .text()
            .await
            .map_err(|e| SourceError::from_reqwest(SOURCE_NAME, e))?;

        extract_live_page(&document, Utc::now(), self.lead_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StreamStatus;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn lead() -> Duration {
        Duration::seconds(3600)
    }

    fn page(player: &str) -> String {
        format!(
            r#"<html><head>
<link rel="canonical" href="https://www.youtube.com/watch?v=abcdefghijk">
<meta name="title" content="Karaoke &amp; chill">
</head><body>
<script nonce="x">{player}</script>
</body></html>"#
        )
    }

    #[test]
    fn test_missing_canonical_is_parse_error() {
        let err = extract_live_page("<html></html>", now(), lead()).unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }

    #[test]
    fn test_channel_canonical_means_no_stream() {
        let html = r#"<link rel="canonical" href="https://www.youtube.com/channel/UCabc">"#;
        assert_eq!(
            extract_live_page(html, now(), lead()).unwrap(),
            LivePageOutcome::NoStream
        );
    }

    #[test]
    fn test_missing_player_blob_degrades_to_indeterminate() {
        let outcome = extract_live_page(&page("var other = 1;"), now(), lead()).unwrap();
        let LivePageOutcome::Stream(d) = outcome else {
            panic!("expected a stream");
        };
        assert_eq!(d.status, StreamStatus::Indeterminate);
        assert_eq!(d.title, "Karaoke & chill");
        assert_eq!(d.video_link, "https://www.youtube.com/watch?v=abcdefghijk");
        assert!(d.stream_start_time.is_none());
    }

    #[test]
    fn test_live_player_blob() {
        let player = r#"var ytInitialPlayerResponse = {"videoDetails":{"isLiveContent":true,"thumbnail":{"thumbnails":[{"url":"s","width":120,"height":90},{"url":"m","width":336,"height":188}]}}};var x;"#;
        let LivePageOutcome::Stream(d) = extract_live_page(&page(player), now(), lead()).unwrap() else {
            panic!("expected a stream");
        };
        assert_eq!(d.status, StreamStatus::Live);
        assert_eq!(d.thumbnail.as_deref(), Some("m"));
    }

    #[test]
    fn test_waiting_room_uses_scheduled_start() {
        let soon = now().timestamp() + 1200;
        let player = format!(
            r#"var ytInitialPlayerResponse = {{"videoDetails":{{"isLiveContent":true,"isUpcoming":true}},"playabilityStatus":{{"liveStreamability":{{"liveStreamabilityRenderer":{{"offlineSlate":{{"liveStreamOfflineSlateRenderer":{{"scheduledStartTime":"{soon}"}}}}}}}}}}}};"#
        );
        let LivePageOutcome::Stream(d) = extract_live_page(&page(&player), now(), lead()).unwrap() else {
            panic!("expected a stream");
        };
        assert_eq!(d.status, StreamStatus::StartingSoon);
        assert_eq!(d.stream_start_time.unwrap().timestamp(), soon);

        let later = now().timestamp() + 4 * 3600;
        let player = player.replace(&soon.to_string(), &later.to_string());
        let LivePageOutcome::Stream(d) = extract_live_page(&page(&player), now(), lead()).unwrap() else {
            panic!("expected a stream");
        };
        assert_eq!(d.status, StreamStatus::Offline);
    }

    #[test]
    fn test_title_attribute_is_entity_decoded() {
        let html = r#"<html><head>
<link rel="canonical" href="https://www.youtube.com/watch?v=abcdefghijk&amp;feature=share">
<meta name="title" content="Fauna's Minecraft &#x1F33F; stream &quot;finale&quot;">
</head><body></body></html>"#;
        let LivePageOutcome::Stream(d) = extract_live_page(html, now(), lead()).unwrap() else {
            panic!("expected a stream");
        };
        assert_eq!(d.title, "Fauna's Minecraft \u{1F33F} stream \"finale\"");
        assert_eq!(
            d.video_link,
            "https://www.youtube.com/watch?v=abcdefghijk&feature=share"
        );
    }

    #[test]
    fn test_player_blob_found_in_later_script() {
        let html = format!(
            r#"<html><head>
<link rel="canonical" href="https://www.youtube.com/watch?v=abcdefghijk">
<script>var ytcfg = {{"a":1}};</script>
</head><body>
<script>{}</script>
</body></html>"#,
            r#"var ytInitialPlayerResponse = {"videoDetails":{"isLiveContent":true,"title":"From player"}};"#
        );
        let LivePageOutcome::Stream(d) = extract_live_page(&html, now(), lead()).unwrap() else {
            panic!("expected a stream");
        };
        assert_eq!(d.status, StreamStatus::Live);
        assert_eq!(d.title, "From player");
    }
}
