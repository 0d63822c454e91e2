//! Classify HTTP responses and curl errors into source error kinds.

use chrono::{Duration, Utc};
use serde::Deserialize;

use super::{OperationClass, RateLimitInfo, SourceError};

/// API error codes meaning the item is gone (deleted, or the page does not exist).
pub const NOT_FOUND_ERROR_CODES: &[u32] = &[144, 34];

/// Fallback wait when a 429 arrives without a usable reset header.
const DEFAULT_RATE_LIMIT_WINDOW_MINS: i64 = 15;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    code: u32,
    #[serde(default)]
    message: String,
}

fn error_entries(body: &[u8]) -> Vec<ErrorEntry> {
    serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.errors)
        .unwrap_or_default()
}

/// Classify a non-2xx response.
pub fn classify_response(
    code: u32,
    body: &[u8],
    class: OperationClass,
    rate_limit: Option<&RateLimitInfo>,
) -> SourceError {
    let errors = error_entries(body);
    if errors
        .iter()
        .any(|e| NOT_FOUND_ERROR_CODES.contains(&e.code))
    {
        return SourceError::NotFound;
    }
    match code {
        404 if class == OperationClass::Lookup => SourceError::NotFound,
        429 => SourceError::RateLimited {
            class,
            reset_at: rate_limit
                .map(|r| r.reset_at)
                .unwrap_or_else(|| Utc::now() + Duration::minutes(DEFAULT_RATE_LIMIT_WINDOW_MINS)),
        },
        _ => {
            let detail = errors
                .first()
                .map(|e| format!(": {} ({})", e.message, e.code))
                .unwrap_or_default();
            SourceError::Transient(format!("HTTP {}{}", code, detail))
        }
    }
}

/// Classify a curl error. Every transport failure is retried on a later tick.
pub fn classify_curl_error(e: &curl::Error) -> SourceError {
    let kind = if e.is_operation_timedout() {
        "timeout"
    } else if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        "connection"
    } else {
        "transfer"
    };
    SourceError::Transient(format!("{}: {}", kind, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_144_is_not_found_regardless_of_status() {
        let body = br#"{"errors":[{"code":144,"message":"No status found with that ID."}]}"#;
        assert_eq!(
            classify_response(404, body, OperationClass::Lookup, None),
            SourceError::NotFound
        );
        assert_eq!(
            classify_response(403, body, OperationClass::Lookup, None),
            SourceError::NotFound
        );
    }

    #[test]
    fn bare_404_on_lookup_is_not_found_but_not_on_search() {
        assert_eq!(
            classify_response(404, b"", OperationClass::Lookup, None),
            SourceError::NotFound
        );
        assert!(matches!(
            classify_response(404, b"", OperationClass::Search, None),
            SourceError::Transient(_)
        ));
    }

    #[test]
    fn http_429_uses_reported_reset() {
        let reset_at = Utc::now() + Duration::minutes(3);
        let info = RateLimitInfo {
            class: OperationClass::Search,
            remaining: 0,
            reset_at,
        };
        assert_eq!(
            classify_response(429, b"", OperationClass::Search, Some(&info)),
            SourceError::RateLimited {
                class: OperationClass::Search,
                reset_at
            }
        );
    }

    #[test]
    fn http_429_without_header_waits_default_window() {
        match classify_response(429, b"", OperationClass::Lookup, None) {
            SourceError::RateLimited { class, reset_at } => {
                assert_eq!(class, OperationClass::Lookup);
                assert!(reset_at > Utc::now() + Duration::minutes(14));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn http_5xx_and_auth_errors_are_transient() {
        assert_eq!(
            classify_response(503, b"", OperationClass::Search, None),
            SourceError::Transient("HTTP 503".to_string())
        );
        let body = br#"{"errors":[{"code":89,"message":"Invalid or expired token."}]}"#;
        assert_eq!(
            classify_response(401, body, OperationClass::Search, None),
            SourceError::Transient("HTTP 401: Invalid or expired token. (89)".to_string())
        );
    }
}
