//! Human-readable timestamp formatting.
//!
//! Relative times are computed against an explicit "now" so reports are
//! reproducible in tests.

use crate::config::TimestampStyle;
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_humanize::HumanTime;


/// Rendered in place of a creation time the image config does not record.
pub const UNKNOWN: &str = "unknown";

/// Formats a timestamp relative to `now`.
///
/// # Examples
///
/// ```
/// use libretag::format::format_timestamp_at;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// assert_eq!(format_timestamp_at(&(now - Duration::hours(2)), &now), "2 hours ago");
/// ```
pub fn format_timestamp_at(timestamp: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    HumanTime::from(*timestamp - *now).to_string()
}

/// Formats a timestamp as RFC 3339 in UTC, to the second.
pub fn format_absolute(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Formats an optional creation time in the requested style.
///
/// A missing timestamp renders as [`UNKNOWN`] in every style.
pub fn format_created(
    created: Option<&DateTime<Utc>>,
    style: TimestampStyle,
    now: &DateTime<Utc>,
) -> String {
    let Some(timestamp) = created else {
        return UNKNOWN.to_string();
    };

    match style {
        TimestampStyle::Relative => format_timestamp_at(timestamp, now),
        TimestampStyle::Absolute => format_absolute(timestamp),
        TimestampStyle::Both => format!(
            "{} ({})",
            format_timestamp_at(timestamp, now),
            format_absolute(timestamp)
        ),
    }
}
