//! # Bodylog
//!
//! An Axum middleware that captures every request and response body flowing through a
//! service, writes both to the `tracing` log as human-readable lines, and optionally appends
//! them to a log file that can be viewed over HTTP.
//!
//! ## Features
//!
//! - **Transparent capture**: Bodies are buffered and handed on byte-for-byte, so handlers and
//!   clients see exactly what they would without the middleware
//! - **Plain-text log lines**: One `info` event per request and per response
//! - **Append-only log file**: Optional, with a single writer so records never interleave
//! - **Log viewing route**: With a log file configured, `GET /log` returns its contents
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use bodylog::{BodyLogConfig, BodyLogLayer};
//!
//! async fn hello() -> &'static str {
//!     "Hello, World!"
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     tracing_subscriber::fmt().init();
//!
//!     let config = BodyLogConfig::default().with_log_file("traffic.log");
//!
//!     let app = Router::new()
//!         .route("/hello", get(hello))
//!         .layer(BodyLogLayer::new(config));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! `curl localhost:3000/hello` then logs
//!
//! ```text
//! http localhost:3000/hello  
//! Response Hello, World!
//! ```
//!
//! and `curl localhost:3000/log` returns the persisted records.
//!
//! ## Security
//!
//! The log route is not authenticated and exposes full request and response bodies,
//! credentials included. Only enable a log file where that is acceptable, or put an
//! authentication layer in front of this one.

use axum::{
    extract::Request,
    http::{header::CONTENT_LENGTH, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::{
    path::PathBuf,
    pin::Pin,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{debug, error, info, instrument, Instrument, Span};

pub mod types;
use types::{RequestSnapshot, ResponseSnapshot};

pub mod body_wrapper;
use body_wrapper::BufferedBody;

pub mod format;
use format::{format_request, format_response};

pub mod persist;
pub use persist::LogWriter;

pub mod log_server;
use log_server::serve_log_file;

/// Path of the log viewing route unless configured otherwise.
pub const DEFAULT_LOG_ROUTE: &str = "/log";

/// Environment variable naming the log file for [`BodyLogConfig::from_env`].
pub const LOG_FILE_ENV: &str = "BODYLOG_FILE";

/// Environment variable overriding the log route for [`BodyLogConfig::from_env`].
pub const LOG_ROUTE_ENV: &str = "BODYLOG_ROUTE";

/// Configuration for the body logging middleware.
///
/// Fixed when the layer is built and shared read-only by every request afterwards.
///
/// # Examples
///
/// ```rust
/// use bodylog::BodyLogConfig;
///
/// // Log lines only, nothing persisted
/// let config = BodyLogConfig::default();
/// assert!(config.log_file.is_none());
///
/// // Persist to a file and serve it back on /log
/// let config = BodyLogConfig::default().with_log_file("traffic.log");
/// assert_eq!(config.log_route, "/log");
/// ```
#[derive(Clone, Debug)]
pub struct BodyLogConfig {
    /// File that request/response records are appended to. `None` disables persistence and
    /// the log route.
    pub log_file: Option<PathBuf>,
    /// Request path that serves the log file instead of reaching the inner service
    pub log_route: String,
}

impl Default for BodyLogConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_route: DEFAULT_LOG_ROUTE.to_string(),
        }
    }
}

impl BodyLogConfig {
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_log_route(mut self, route: impl Into<String>) -> Self {
        self.log_route = route.into();
        self
    }

    /// Build a configuration from `BODYLOG_FILE` and `BODYLOG_ROUTE`.
    ///
    /// An unset or empty `BODYLOG_FILE` leaves persistence disabled.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(path) = std::env::var_os(LOG_FILE_ENV).filter(|p| !p.is_empty()) {
            config.log_file = Some(PathBuf::from(path));
        }
        if let Ok(route) = std::env::var(LOG_ROUTE_ENV) {
            if !route.is_empty() {
                config.log_route = route;
            }
        }
        config
    }
}

/// Tower layer for the body logging middleware.
///
/// When a log file is configured this spawns the background task that appends records, so
/// it must be created inside a tokio runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use bodylog::{BodyLogConfig, BodyLogLayer};
/// use axum::{routing::get, Router};
/// use tower::ServiceBuilder;
///
/// # async fn hello() -> &'static str { "Hello" }
/// # #[tokio::main]
/// # async fn main() {
/// let layer = BodyLogLayer::new(BodyLogConfig::default().with_log_file("traffic.log"));
///
/// let app: Router = Router::new()
///     .route("/hello", get(hello))
///     .layer(ServiceBuilder::new().layer(layer));
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct BodyLogLayer {
    config: BodyLogConfig,
    writer: Option<LogWriter>,
}

impl BodyLogLayer {
    pub fn new(config: BodyLogConfig) -> Self {
        let writer = config.log_file.clone().map(LogWriter::spawn);
        Self { config, writer }
    }

    pub fn config(&self) -> &BodyLogConfig {
        &self.config
    }

    /// The log file writer, present when a log file is configured.
    pub fn writer(&self) -> Option<&LogWriter> {
        self.writer.as_ref()
    }
}

impl<S> Layer<S> for BodyLogLayer {
    type Service = BodyLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BodyLogService {
            inner,
            config: self.config.clone(),
            writer: self.writer.clone(),
        }
    }
}

/// Tower service implementation for the body logging middleware.
///
/// Users typically don't interact with this type directly - it's created by [`BodyLogLayer`].
#[derive(Clone, Debug)]
pub struct BodyLogService<S> {
    inner: S,
    config: BodyLogConfig,
    writer: Option<LogWriter>,
}

impl<S> Service<Request> for BodyLogService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    #[instrument(skip_all)]
    fn call(&mut self, request: Request) -> Self::Future {
        // The request body is read before the inner service is called, so take the instance
        // that was driven to readiness and leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let log_route = self.config.log_route.clone();
        let writer = self.writer.clone();

        let future = async move {
            let (parts, body) = request.into_parts();

            let (captured, body) = match declared_content_length(&parts.headers) {
                0 => (BufferedBody::empty(), body),
                length => {
                    debug!(content_length = length, "Buffering request body");
                    match BufferedBody::capture(body).await {
                        Ok(captured) => {
                            let replay = captured.to_body();
                            (captured, replay)
                        }
                        Err(e) => {
                            error!(error = %e, "Error capturing request body");
                            return Ok(StatusCode::BAD_REQUEST.into_response());
                        }
                    }
                }
            };

            let request_text = format_request(&RequestSnapshot::new(&parts, &captured));
            info!("{request_text}");

            if let Some(writer) = &writer {
                if parts.uri.path() == log_route {
                    debug!(path = %writer.path().display(), "Serving log file");
                    return Ok(serve_log_file(writer.path()).await.into_response());
                }
            }

            debug!("Awaiting inner service response");
            let response = inner.call(Request::from_parts(parts, body)).await?;
            debug!("Inner service response received");

            let (parts, body) = response.into_parts();
            let captured = match BufferedBody::capture(body).await {
                Ok(captured) => captured,
                Err(e) => {
                    // Hand the failure on to the client the way the inner service produced it
                    error!(error = %e, "Error capturing response body");
                    return Ok(Response::from_parts(parts, e.into_body()));
                }
            };

            let response_text = format_response(&ResponseSnapshot::new(&captured));
            info!("{response_text}");

            let response = Response::from_parts(parts, captured.into_body());

            if let Some(writer) = &writer {
                writer.append(request_text, response_text).await;
            }

            Ok::<_, S::Error>(response)
        };

        Box::pin(future.instrument(Span::current()))
    }
}

/// Declared `Content-Length`, treating an absent or malformed header as zero.
fn declared_content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}
