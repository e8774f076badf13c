//! Fixture responses for manual UI testing
//!
//! Only consulted when `mock.enabled` is set. A recognised code short-cuts
//! resolution entirely: no cache reads, no upstream calls.

use chrono::{DateTime, Duration, Utc};

use crate::models::{
    thumbnail_url, watch_url, PastStreamSummary, ResolvedStatus, StreamDescriptor, StreamStatus,
    StreamType,
};

const FIXTURE_VIDEO_ID: &str = "dQw4w9WgXcQ";
const FIXTURE_PAST_VIDEO_ID: &str = "jNQXAC9IVRw";

fn descriptor(status: StreamStatus, start: Option<DateTime<Utc>>) -> StreamDescriptor {
    StreamDescriptor {
        video_link: watch_url(FIXTURE_VIDEO_ID),
        title: "Fixture stream".to_string(),
        thumbnail: Some(thumbnail_url(FIXTURE_VIDEO_ID)),
        status,
        stream_start_time: start,
        is_members_only: false,
        stream_type: StreamType::LiveStream,
    }
}

fn past_stream(now: DateTime<Utc>) -> PastStreamSummary {
    PastStreamSummary {
        video_link: watch_url(FIXTURE_PAST_VIDEO_ID),
        title: "Fixture past stream".to_string(),
        end_actual: now - Duration::hours(26),
    }
}

/// Synthetic result for a fixture code, or `None` when the code is unknown
pub fn fixture(code: &str, now: DateTime<Utc>) -> Option<ResolvedStatus> {
    let live_stream = match code {
        "live" => Some(descriptor(StreamStatus::Live, Some(now - Duration::minutes(12)))),
        "soon" => Some(descriptor(
            StreamStatus::StartingSoon,
            Some(now + Duration::minutes(10)),
        )),
        "offline" | "farout" => Some(descriptor(
            StreamStatus::Offline,
            Some(now + Duration::hours(5)),
        )),
        "indeterminate" => Some(descriptor(StreamStatus::Indeterminate, None)),
        "members" => {
            let mut d = descriptor(StreamStatus::StartingSoon, Some(now + Duration::minutes(20)));
            d.is_members_only = true;
            Some(d)
        }
        "premiere" => {
            let mut d = descriptor(StreamStatus::StartingSoon, Some(now + Duration::minutes(5)));
            d.stream_type = StreamType::Premiere;
            Some(d)
        }
        "none" | "nostream" => None,
        "error" => return Some(ResolvedStatus::default()),
        _ => return None,
    };

    Some(ResolvedStatus {
        live_stream,
        past_stream: Some(past_stream(now)),
    })
}
