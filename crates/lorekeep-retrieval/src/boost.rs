use chrono::{DateTime, Utc};
use lorekeep_core::Fragment;

/// Maximum extra weight from tag overlap.
pub const TAG_BOOST_FACTOR: f64 = 0.3;
/// Maximum extra weight from a recent access.
pub const RECENCY_MAX_BOOST: f64 = 0.2;
/// Maximum extra weight from repeated access.
pub const ACCESS_MAX_BOOST: f64 = 0.1;

const HOUR_SECS: f64 = 3600.0;
const DAY_SECS: f64 = 24.0 * HOUR_SECS;
const WEEK_SECS: f64 = 7.0 * DAY_SECS;

/// `1 + TAG_BOOST_FACTOR * |fragment.tags ∩ boost_tags| / |boost_tags|`,
/// or exactly 1.0 without overlap.
pub fn tag_boost(fragment: &Fragment, boost_tags: &[String]) -> f64 {
    if boost_tags.is_empty() || fragment.tags.is_empty() {
        return 1.0;
    }
    let matching = boost_tags.iter().filter(|t| fragment.has_tag(t)).count();
    if matching == 0 {
        return 1.0;
    }
    1.0 + TAG_BOOST_FACTOR * (matching as f64 / boost_tags.len() as f64)
}

/// Recency multiplier at the current time.
pub fn recency_boost(fragment: &Fragment) -> f64 {
    recency_boost_at(fragment, Utc::now())
}

/// Recency multiplier in `[1.0, 1.0 + RECENCY_MAX_BOOST]` as of `now`.
///
/// Piecewise linear and non-increasing in elapsed time:
///
/// ```text
/// age < 1h      full boost
/// 1h .. 1d      full -> half
/// 1d .. 7d      half -> none
/// age >= 7d     none
/// ```
///
/// A `last_accessed` in the future counts as just accessed.
pub fn recency_boost_at(fragment: &Fragment, now: DateTime<Utc>) -> f64 {
    let Some(last) = fragment.last_accessed else {
        return 1.0;
    };
    let age = (now - last).num_milliseconds().max(0) as f64 / 1000.0;

    let fraction = if age < HOUR_SECS {
        1.0
    } else if age < DAY_SECS {
        1.0 - 0.5 * (age - HOUR_SECS) / (DAY_SECS - HOUR_SECS)
    } else if age < WEEK_SECS {
        0.5 * (1.0 - (age - DAY_SECS) / (WEEK_SECS - DAY_SECS))
    } else {
        0.0
    };
    1.0 + RECENCY_MAX_BOOST * fraction
}

/// Access-frequency multiplier, saturating at `1.0 + ACCESS_MAX_BOOST`.
///
/// Grows with `log10(count + 1) / 2`: roughly half the ceiling at ten
/// accesses and the full ceiling from ninety-nine on.
pub fn access_boost(fragment: &Fragment) -> f64 {
    if fragment.accessed_count == 0 {
        return 1.0;
    }
    let normalized = ((fragment.accessed_count as f64) + 1.0).log10() / 2.0;
    1.0 + (normalized * ACCESS_MAX_BOOST).min(ACCESS_MAX_BOOST)
}
