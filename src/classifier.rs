//! Stream state classification and candidate selection
//!
//! Upstreams never report our four-state status directly. Every poller feeds
//! whatever liveness hint it has, plus the scheduled start, through
//! [`classify`] so that all sources agree on what "starting soon" means.

use chrono::{DateTime, Duration, Utc};

use crate::models::{StreamDescriptor, StreamStatus};

/// Lead time used when revalidating cached entries and resolving candidates
/// from the video metadata API
pub const PRIMARY_LEAD_TIME_SECS: i64 = 1800;

/// Lead time used for the live page scrape
pub const PAGE_LEAD_TIME_SECS: i64 = 3600;

/// Raw liveness hint reported by an upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The upstream confirms the stream is broadcasting
    Live,
    /// The upstream reports a waiting room or scheduled stream
    Upcoming,
    /// Nothing conclusive was reported
    Unknown,
}

/// Map a liveness hint and an optional scheduled start onto a status.
///
/// A confirmed live stream is always `Live`. Without a scheduled start the
/// state cannot be ruled in or out, so it is `Indeterminate`. A start more
/// than `lead_time` away is `Offline`; anything closer, including a start
/// that has already passed, is `StartingSoon` while the upstream still
/// reports the stream as pending.
///
/// Only `start - now` matters, never the absolute value of `now`.
pub fn classify(
    liveness: Liveness,
    scheduled_start: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lead_time: Duration,
) -> StreamStatus {
    if liveness == Liveness::Live {
        return StreamStatus::Live;
    }

    let Some(start) = scheduled_start else {
        return StreamStatus::Indeterminate;
    };

    if start - now > lead_time {
        StreamStatus::Offline
    } else {
        StreamStatus::StartingSoon
    }
}

/// Re-derive the status of an already-known descriptor against `now`.
///
/// Live descriptors and descriptors without a start time are left alone. A
/// scheduled one moves between `StartingSoon` and `Offline` as time passes,
/// without consulting any upstream. Cached data carries no fresh upstream
/// confirmation, so a start overdue by more than `lead_time` is `Offline`.
pub fn reclassify(descriptor: &mut StreamDescriptor, now: DateTime<Utc>, lead_time: Duration) {
    if descriptor.status == StreamStatus::Live {
        return;
    }
    if let Some(start) = descriptor.stream_start_time {
        descriptor.status = if now - start > lead_time {
            StreamStatus::Offline
        } else {
            classify(Liveness::Upcoming, Some(start), now, lead_time)
        };
    }
}

/// Pick the preferred item: the first live one, otherwise the one whose
/// start is nearest to `now` in absolute terms. Ties go to the item seen
/// first. Items without a start time only win when nothing else qualifies.
pub fn pick_preferred<'a, T, L, S>(
    items: impl IntoIterator<Item = &'a T>,
    now: DateTime<Utc>,
    is_live: L,
    start_of: S,
) -> Option<&'a T>
where
    T: 'a,
    L: Fn(&T) -> bool,
    S: Fn(&T) -> Option<DateTime<Utc>>,
{
    let mut best: Option<(&'a T, Option<Duration>)> = None;

    for item in items {
        if is_live(item) {
            return Some(item);
        }

        let distance = start_of(item).map(|start| (start - now).abs());
        let better = match (&best, distance) {
            (None, _) => true,
            (Some((_, None)), Some(_)) => true,
            (Some((_, Some(current))), Some(candidate)) => candidate < *current,
            _ => false,
        };
        if better {
            best = Some((item, distance));
        }
    }

    best.map(|(item, _)| item)
}

/// Choose the best non-dead descriptor among fallback candidates
pub fn choose_best(candidates: &[StreamDescriptor], now: DateTime<Utc>) -> Option<StreamDescriptor> {
    pick_preferred(
        candidates.iter().filter(|d| !d.is_dead()),
        now,
        |d| d.status == StreamStatus::Live,
        |d| d.stream_start_time,
    )
    .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{watch_url, StreamType};
    use chrono::TimeZone;

    fn lead() -> Duration {
        Duration::seconds(PRIMARY_LEAD_TIME_SECS)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn descriptor(id: &str, status: StreamStatus, start: Option<i64>) -> StreamDescriptor {
        StreamDescriptor {
            video_link: watch_url(id),
            title: id.to_string(),
            thumbnail: None,
            status,
            stream_start_time: start.map(at),
            is_members_only: false,
            stream_type: StreamType::LiveStream,
        }
    }

    #[test]
    fn test_confirmed_live_always_wins() {
        let now = at(1_700_000_000);
        assert_eq!(classify(Liveness::Live, None, now, lead()), StreamStatus::Live);
        assert_eq!(
            classify(Liveness::Live, Some(now + Duration::days(3)), now, lead()),
            StreamStatus::Live
        );
    }

    #[test]
    fn test_missing_schedule_is_indeterminate() {
        let now = at(1_700_000_000);
        assert_eq!(
            classify(Liveness::Upcoming, None, now, lead()),
            StreamStatus::Indeterminate
        );
        assert_eq!(
            classify(Liveness::Unknown, None, now, lead()),
            StreamStatus::Indeterminate
        );
    }

    #[test]
    fn test_lead_time_boundary() {
        let now = at(1_700_000_000);
        assert_eq!(
            classify(Liveness::Upcoming, Some(now + Duration::seconds(1800)), now, lead()),
            StreamStatus::StartingSoon
        );
        assert_eq!(
            classify(Liveness::Upcoming, Some(now + Duration::seconds(1801)), now, lead()),
            StreamStatus::Offline
        );
        assert_eq!(
            classify(Liveness::Unknown, Some(now + Duration::seconds(60)), now, lead()),
            StreamStatus::StartingSoon
        );
    }

    #[test]
    fn test_overdue_upstream_schedule_stays_starting_soon() {
        let now = at(1_700_000_000);
        assert_eq!(
            classify(Liveness::Upcoming, Some(now - Duration::seconds(600)), now, lead()),
            StreamStatus::StartingSoon
        );
        assert_eq!(
            classify(Liveness::Upcoming, Some(now - Duration::hours(5)), now, lead()),
            StreamStatus::StartingSoon
        );
    }

    #[test]
    fn test_cached_overdue_schedule_decays_to_offline() {
        let now = at(1_700_000_000);
        let mut late = descriptor("ddddddddddd", StreamStatus::StartingSoon, Some(1_700_000_000 - 600));
        reclassify(&mut late, now, lead());
        assert_eq!(late.status, StreamStatus::StartingSoon);

        let mut stale = descriptor("eeeeeeeeeee", StreamStatus::StartingSoon, Some(1_700_000_000 - 1801));
        reclassify(&mut stale, now, lead());
        assert_eq!(stale.status, StreamStatus::Offline);

        let mut ahead = descriptor("fffffffffff", StreamStatus::Offline, Some(1_700_000_000 + 900));
        reclassify(&mut ahead, now, lead());
        assert_eq!(ahead.status, StreamStatus::StartingSoon);
    }

    #[test]
    fn test_classification_is_translation_invariant() {
        for base in [0_i64, 1_000_000, 1_700_000_000, 4_000_000_000] {
            let now = at(base);
            for offset in [-4000_i64, -1800, -10, 0, 10, 1800, 1801, 7200] {
                let expected = classify(Liveness::Upcoming, Some(at(offset)), at(0), lead());
                let actual = classify(
                    Liveness::Upcoming,
                    Some(now + Duration::seconds(offset)),
                    now,
                    lead(),
                );
                assert_eq!(actual, expected, "base={base} offset={offset}");
            }
        }
    }

    #[test]
    fn test_reclassify_leaves_live_alone() {
        let now = at(1_700_000_000);
        let mut live = descriptor("aaaaaaaaaaa", StreamStatus::Live, Some(1_600_000_000));
        reclassify(&mut live, now, lead());
        assert_eq!(live.status, StreamStatus::Live);

        let mut soon = descriptor("bbbbbbbbbbb", StreamStatus::StartingSoon, Some(1_700_000_000 - 3600));
        reclassify(&mut soon, now, lead());
        assert_eq!(soon.status, StreamStatus::Offline);

        let mut unknown = descriptor("ccccccccccc", StreamStatus::Indeterminate, None);
        reclassify(&mut unknown, now, lead());
        assert_eq!(unknown.status, StreamStatus::Indeterminate);
    }

    #[test]
    fn test_choose_best_prefers_live_then_nearest() {
        let now = at(1_700_000_000);
        let candidates = vec![
            descriptor("far00000000", StreamStatus::Offline, Some(1_700_000_000 + 86_400)),
            descriptor("near0000000", StreamStatus::StartingSoon, Some(1_700_000_000 + 600)),
            descriptor("past0000000", StreamStatus::Offline, Some(1_700_000_000 - 7200)),
        ];
        assert_eq!(choose_best(&candidates, now).unwrap().title, "near0000000");

        let mut with_live = candidates.clone();
        with_live.push(descriptor("live0000000", StreamStatus::Live, None));
        assert_eq!(choose_best(&with_live, now).unwrap().title, "live0000000");
    }

    #[test]
    fn test_choose_best_skips_dead_and_breaks_ties_by_order() {
        let now = at(1_700_000_000);
        let mut dead = descriptor("dead0000000", StreamStatus::Live, None);
        dead.stream_type = StreamType::Dead;
        let candidates = vec![
            dead,
            descriptor("first000000", StreamStatus::Offline, Some(1_700_000_000 + 100)),
            descriptor("second00000", StreamStatus::Offline, Some(1_700_000_000 - 100)),
        ];
        assert_eq!(choose_best(&candidates, now).unwrap().title, "first000000");
        assert!(choose_best(&[], now).is_none());
    }
}
