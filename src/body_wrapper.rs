//! Body buffering utilities.
//!
//! HTTP bodies are single-read streams. This module drains a body into memory so the
//! middleware can inspect it while still handing an identical body on to its destination.

use axum::body::{Body, HttpBody};
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use std::borrow::Cow;
use tracing::error;

/// Error type for body capture operations
#[derive(Debug, thiserror::Error)]
pub enum BodyCaptureError {
    /// The stream failed after yielding `partial`
    #[error("Body stream error: {message}")]
    StreamError { message: String, partial: Bytes },
}

impl BodyCaptureError {
    /// Bytes the stream yielded before it failed.
    pub fn partial(&self) -> &Bytes {
        match self {
            Self::StreamError { partial, .. } => partial,
        }
    }

    /// A body that replays the bytes read before the failure and then fails the same way,
    /// so the receiver sees what it would have seen from the original stream.
    pub fn into_body(self) -> Body {
        let Self::StreamError { message, partial } = self;

        let mut frames = Vec::with_capacity(2);
        if !partial.is_empty() {
            frames.push(Ok(partial));
        }
        frames.push(Err(Self::StreamError {
            message,
            partial: Bytes::new(),
        }));

        Body::from_stream(futures::stream::iter(frames))
    }
}

/// An HTTP body that has been fully read into memory.
///
/// A `BufferedBody` stands in for the original stream: it records every byte that passed
/// through it, exposes them via [`BufferedBody::captured`], and can mint any number of fresh
/// [`Body`] values that each replay the content from offset 0.
///
/// # Examples
///
/// ```rust
/// use bodylog::body_wrapper::BufferedBody;
/// use axum::body::Body;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let buffered = BufferedBody::capture(Body::from("Hello, World!")).await?;
///
/// assert_eq!(buffered.text(), "Hello, World!");
///
/// // Hand a replay of the same bytes to whoever needs the body next
/// let replay: Body = buffered.to_body();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct BufferedBody {
    bytes: Bytes,
}

impl BufferedBody {
    /// A buffer holding no bytes, used when there is nothing to read.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Drain `body` to the end and keep every data frame, in order.
    ///
    /// Trailers are discarded. Fails if the underlying stream yields an error; the bytes read
    /// up to that point travel with the error.
    pub async fn capture<B>(body: B) -> Result<Self, BodyCaptureError>
    where
        B: HttpBody<Data = Bytes> + Send,
        B::Error: std::fmt::Display,
    {
        let mut body = std::pin::pin!(body);
        let mut buffer = BytesMut::new();

        while let Some(frame) = body.as_mut().frame().await {
            match frame {
                Ok(frame) => {
                    if let Some(data) = frame.data_ref() {
                        buffer.extend_from_slice(data);
                    }
                }
                Err(e) => {
                    error!(error = %e, "Stream error during body capture");
                    return Err(BodyCaptureError::StreamError {
                        message: e.to_string(),
                        partial: buffer.freeze(),
                    });
                }
            }
        }

        Ok(Self {
            bytes: buffer.freeze(),
        })
    }

    /// The raw captured bytes.
    pub fn captured(&self) -> &Bytes {
        &self.bytes
    }

    /// Captured bytes decoded as UTF-8, with invalid sequences replaced by `U+FFFD`.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A fresh body replaying the captured bytes from the start.
    pub fn to_body(&self) -> Body {
        Body::from(self.bytes.clone())
    }

    pub fn into_body(self) -> Body {
        Body::from(self.bytes)
    }
}

impl From<Bytes> for BufferedBody {
    fn from(bytes: Bytes) -> Self {
        Self { bytes }
    }
}
