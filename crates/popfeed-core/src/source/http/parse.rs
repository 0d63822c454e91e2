//! Parse rate-limit response headers into RateLimitInfo.

use chrono::{DateTime, Utc};

use crate::source::{OperationClass, RateLimitInfo};

/// Parse collected header lines. Returns None unless both the remaining count
/// and the reset time are present and well-formed.
pub(crate) fn parse_rate_limit(lines: &[String], class: OperationClass) -> Option<RateLimitInfo> {
    let mut remaining = None;
    let mut reset_at = None;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("x-rate-limit-remaining") {
                remaining = value.parse::<u32>().ok();
            }
            if name.eq_ignore_ascii_case("x-rate-limit-reset") {
                reset_at = value
                    .parse::<i64>()
                    .ok()
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
            }
        }
    }

    Some(RateLimitInfo {
        class,
        remaining: remaining?,
        reset_at: reset_at?,
    })
}
