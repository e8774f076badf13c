//! ISO-8601 duration parsing (`P1DT2H3M4S`)

use regex::Regex;
use std::sync::OnceLock;

fn duration_regex() -> &'static Regex {
    static DURATION: OnceLock<Regex> = OnceLock::new();
    DURATION.get_or_init(|| {
        Regex::new(
            r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$",
        )
        .expect("duration regex is valid")
    })
}

/// Seconds per capture group, using 365-day years and 30-day months
const GROUP_SECONDS: [u64; 7] = [31_536_000, 2_592_000, 604_800, 86_400, 3_600, 60, 1];

/// Parse an ISO-8601 duration into whole seconds.
///
/// Returns `None` for strings that are not durations at all. Fractional
/// seconds are not produced by the video metadata API and are rejected.
pub fn parse_duration_secs(value: &str) -> Option<u64> {
    let caps = duration_regex().captures(value.trim())?;

    let mut total: u64 = 0;
    for (index, seconds) in GROUP_SECONDS.iter().enumerate() {
        if let Some(group) = caps.get(index + 1) {
            let amount: u64 = group.as_str().parse().ok()?;
            total = total.checked_add(amount.checked_mul(*seconds)?)?;
        }
    }

    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_secs() {
        assert_eq!(parse_duration_secs("P0D"), Some(0));
        assert_eq!(parse_duration_secs("PT0S"), Some(0));
        assert_eq!(parse_duration_secs("PT15M33S"), Some(933));
        assert_eq!(parse_duration_secs("PT1H"), Some(3600));
        assert_eq!(parse_duration_secs("P1DT2H3M4S"), Some(93_784));
        assert_eq!(parse_duration_secs("P1W"), Some(604_800));

        assert_eq!(parse_duration_secs(""), None);
        assert_eq!(parse_duration_secs("15 minutes"), None);
        assert_eq!(parse_duration_secs("PT1.5S"), None);
    }
}
