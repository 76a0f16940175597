//! Build version policy
//!
//! When no version is supplied, the build is stamped with local wall-clock
//! time at minute resolution: `YYYY.MM.DD-HHMM`. Tokens sort lexicographically
//! in chronological order. Two publishes inside the same minute get the same
//! token.

use std::fmt;

use chrono::{DateTime, Local, TimeZone};

/// strftime pattern for default versions
pub const VERSION_FORMAT: &str = "%Y.%m.%d-%H%M";

/// Format a timestamp as a version token
pub fn version_at<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    at.format(VERSION_FORMAT).to_string()
}

/// Version token for the current local time
pub fn default_version() -> String {
    version_at(&Local::now())
}

/// Use the supplied version if it is non-blank, otherwise the default
pub fn resolve_version(supplied: Option<&str>) -> String {
    match supplied.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default_version(),
    }
}
