//! Network error type for retry classification.

use std::fmt;

use crate::circuit_breaker::CircuitOpen;

/// Error returned by a single page or image request.
/// Kept concrete so the retry loop can classify it before it becomes a status message.
#[derive(Debug)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// Response had a non-2xx status.
    Http(u32),
    /// Writing the body to disk failed.
    Storage(std::io::Error),
    /// The host's breaker refused the call without touching the network.
    CircuitOpen(CircuitOpen),
    /// Transfer stopped because the job was cancelled.
    Cancelled,
}

impl FetchError {
    /// Short user-facing description with the host appended, e.g.
    /// `HTTP 404 (Not Found) (example.com)` or `Request timed out (example.com)`.
    pub fn describe(&self, url: &str) -> String {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        if let FetchError::CircuitOpen(_) = self {
            return format!("circuit open for {}", host.as_deref().unwrap_or(url));
        }
        let base = match self {
            FetchError::Curl(e) if e.is_operation_timedout() => "Request timed out".to_string(),
            FetchError::Curl(e)
                if e.is_couldnt_connect()
                    || e.is_couldnt_resolve_host()
                    || e.is_recv_error()
                    || e.is_send_error()
                    || e.is_got_nothing() =>
            {
                "Connection failed".to_string()
            }
            FetchError::Curl(e) if e.is_too_many_redirects() => "Too many redirects".to_string(),
            other => other.to_string(),
        };
        match host {
            Some(host) => format!("{base} ({host})"),
            None => base,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Curl(e) => write!(f, "{}", e),
            FetchError::Http(code) => write!(f, "HTTP {} ({})", code, reason_phrase(*code)),
            FetchError::Storage(e) => write!(f, "storage: {}", e),
            FetchError::CircuitOpen(e) => write!(f, "{}", e),
            FetchError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Curl(e) => Some(e),
            FetchError::Storage(e) => Some(e),
            FetchError::CircuitOpen(e) => Some(e),
            FetchError::Http(_) | FetchError::Cancelled => None,
        }
    }
}

impl From<curl::Error> for FetchError {
    fn from(e: curl::Error) -> Self {
        FetchError::Curl(e)
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::Storage(e)
    }
}

impl From<CircuitOpen> for FetchError {
    fn from(e: CircuitOpen) -> Self {
        FetchError::CircuitOpen(e)
    }
}

/// Reason phrase for common statuses; "Unknown" otherwise.
pub fn reason_phrase(code: u32) -> &'static str {
    match code {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        410 => "Gone",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}
