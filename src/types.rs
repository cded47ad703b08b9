//! Data types for captured HTTP request and response information.
//!
//! Snapshots are built fresh for every request, formatted, and then discarded. A
//! [`LogRecord`] is the unit the persister appends to the log file.

use axum::http::{header::HOST, request::Parts};
use chrono::{DateTime, Local};
use std::fmt;

use crate::body_wrapper::BufferedBody;

/// Scheme assumed when the request URI does not carry one (origin-form targets).
const DEFAULT_SCHEME: &str = "http";

/// What the middleware saw of an inbound request.
///
/// # Examples
///
/// ```rust
/// use bodylog::types::RequestSnapshot;
/// use bodylog::body_wrapper::BufferedBody;
/// use axum::http::Request;
///
/// let request = Request::builder()
///     .uri("/foo?x=1")
///     .header("host", "example.com")
///     .body(())
///     .unwrap();
/// let (parts, _) = request.into_parts();
///
/// let snapshot = RequestSnapshot::new(&parts, &BufferedBody::empty());
/// assert_eq!(snapshot.host, "example.com");
/// assert_eq!(snapshot.query, "?x=1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    /// URI scheme, `http` unless the request target names another
    pub scheme: String,
    /// Authority from the request target, else the `Host` header, else empty
    pub host: String,
    /// Request path
    pub path: String,
    /// Query string including its leading `?`, or empty when there is none
    pub query: String,
    /// Body decoded as UTF-8 (lossy)
    pub body: String,
}

impl RequestSnapshot {
    pub fn new(parts: &Parts, body: &BufferedBody) -> Self {
        let uri = &parts.uri;

        let host = match uri.authority() {
            Some(authority) => authority.to_string(),
            None => parts
                .headers
                .get(HOST)
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .unwrap_or_default(),
        };

        Self {
            scheme: uri.scheme_str().unwrap_or(DEFAULT_SCHEME).to_owned(),
            host,
            path: uri.path().to_owned(),
            query: uri.query().map(|q| format!("?{q}")).unwrap_or_default(),
            body: body.text().into_owned(),
        }
    }
}

/// What the middleware saw of an outbound response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    /// Body decoded as UTF-8 (lossy)
    pub body: String,
}

impl ResponseSnapshot {
    pub fn new(body: &BufferedBody) -> Self {
        Self {
            body: body.text().into_owned(),
        }
    }
}

/// One request/response pair as it appears in the log file.
///
/// The [`Display`](fmt::Display) rendering is the on-disk block:
///
/// ```text
/// Timestamp:2026-10-19 14:03:12.417 +02:00
/// Request:
/// http example.com/foo ?x=1
/// Response:
/// Response ok
/// ==========
/// ```
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub request: String,
    pub response: String,
}

impl LogRecord {
    pub const DELIMITER: &'static str = "==========";

    /// Stamp a record with the current local time.
    pub fn now(request: String, response: String) -> Self {
        Self {
            timestamp: Local::now(),
            request,
            response,
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Timestamp:{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f %:z")
        )?;
        writeln!(f, "Request:")?;
        writeln!(f, "{}", self.request)?;
        writeln!(f, "Response:")?;
        writeln!(f, "{}", self.response)?;
        writeln!(f, "{}", Self::DELIMITER)
    }
}
