//! Serves the persisted log file back over HTTP.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

/// Errors raised while serving the log file.
#[derive(Debug, thiserror::Error)]
pub enum LogServeError {
    #[error("Log file not found: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("Failed to read log file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LogServeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LogServeError {
    fn into_response(self) -> Response {
        match &self {
            Self::NotFound { .. } => {
                warn!(error = %self, "Log file requested before any record was written")
            }
            Self::Io { .. } => error!(error = %self, "Error serving log file"),
        }
        // The file path stays server-side
        self.status().into_response()
    }
}

/// Read the whole log file and return it as a `200 text/plain` response.
///
/// The bytes are returned exactly as stored, without any re-encoding.
pub async fn serve_log_file(path: &Path) -> Result<Response, LogServeError> {
    let contents = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => LogServeError::NotFound {
            path: path.to_path_buf(),
        },
        _ => LogServeError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        contents,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_serves_raw_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        let contents = b"Timestamp:now\nRequest:\n\xffraw\n==========\n".to_vec();
        std::fs::write(&path, &contents).unwrap();

        let response = serve_log_file(&path).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), contents.as_slice());
    }

    #[tokio::test]
    async fn test_missing_file_maps_to_not_found() {
        let dir = tempfile::tempdir().unwrap();

        let err = serve_log_file(&dir.path().join("absent.log"))
            .await
            .unwrap_err();

        assert!(matches!(err, LogServeError::NotFound { .. }));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unreadable_path_maps_to_server_error() {
        let dir = tempfile::tempdir().unwrap();

        // A directory exists but cannot be read as a file
        let err = serve_log_file(dir.path()).await.unwrap_err();

        assert!(matches!(err, LogServeError::Io { .. }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
