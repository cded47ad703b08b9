//! Append-only persistence of request/response records.
//!
//! All appends for one log file go through a single background task fed by a channel, so
//! records land in the order they were submitted and never interleave, no matter how many
//! requests are in flight. Each append is acknowledged once its record is on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::types::LogRecord;

/// Tasks sent to the background writer.
#[derive(Debug)]
enum WriterTask {
    /// Acknowledged once the record has been written or dropped
    Append {
        record: LogRecord,
        done: oneshot::Sender<()>,
    },
    /// Acknowledged once every earlier task has been handled
    Flush(oneshot::Sender<()>),
}

/// Handle to the single writer that owns a log file.
///
/// Cloning the handle is cheap; all clones feed the same writer. The writer task stops once
/// every handle has been dropped and the queue has drained.
///
/// # Examples
///
/// ```rust,no_run
/// use bodylog::persist::LogWriter;
///
/// # #[tokio::main]
/// # async fn main() {
/// let writer = LogWriter::spawn("traffic.log");
/// writer
///     .append("http host/ping  ".to_string(), "Response pong".to_string())
///     .await;
///
/// // The record is on disk now
/// let contents = std::fs::read_to_string("traffic.log").unwrap();
/// assert!(contents.contains("Response pong"));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LogWriter {
    path: Arc<PathBuf>,
    tx: mpsc::UnboundedSender<WriterTask>,
}

impl LogWriter {
    /// Spawn the writer task for `path`. Must be called from within a tokio runtime.
    ///
    /// The file is not touched until the first record arrives.
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = Arc::new(path.into());
        let (tx, mut rx) = mpsc::unbounded_channel::<WriterTask>();
        let task_path = path.clone();

        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                match task {
                    WriterTask::Append { record, done } => {
                        if let Err(e) = append_record(&task_path, &record).await {
                            error!(
                                path = %task_path.display(),
                                error = %e,
                                "Failed to append log record, record dropped"
                            );
                        }
                        let _ = done.send(());
                    }
                    WriterTask::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!(path = %task_path.display(), "Log writer stopped");
        });

        Self { path, tx }
    }

    /// The file this writer appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record holding the given formatted lines, stamped with the current time.
    ///
    /// Resolves once the record is on disk. Records from concurrent callers are written in
    /// the order their calls reached the writer. Write failures surface only as error-level
    /// log events.
    pub async fn append(&self, request_text: String, response_text: String) {
        let record = LogRecord::now(request_text, response_text);
        let (done_tx, done_rx) = oneshot::channel();
        let task = WriterTask::Append {
            record,
            done: done_tx,
        };
        if self.tx.send(task).is_err() {
            error!(path = %self.path.display(), "Log writer is gone, record dropped");
            return;
        }
        let _ = done_rx.await;
    }

    /// Wait until every record queued before this call has been written (or dropped).
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriterTask::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// Open, write one whole block, close.
async fn append_record(path: &Path, record: &LogRecord) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(record.to_string().as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::LogWriter;

    #[tokio::test]
    async fn test_appends_in_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        let writer = LogWriter::spawn(&path);

        for i in 0..20 {
            writer
                .append(format!("request {i}"), format!("Response {i}"))
                .await;
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let blocks: Vec<&str> = contents.split_terminator("==========\n").collect();
        assert_eq!(blocks.len(), 20);

        for (i, block) in blocks.iter().enumerate() {
            let lines: Vec<&str> = block.lines().collect();
            assert!(lines[0].starts_with("Timestamp:"));
            assert_eq!(
                &lines[1..],
                &[
                    "Request:",
                    format!("request {i}").as_str(),
                    "Response:",
                    format!("Response {i}").as_str()
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_record_is_on_disk_when_append_returns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        let writer = LogWriter::spawn(&path);

        writer.append("first".into(), "Response 1".into()).await;
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .ends_with("first\nResponse:\nResponse 1\n==========\n"));

        writer.append("second".into(), "Response 2".into()).await;
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .ends_with("second\nResponse:\nResponse 2\n==========\n"));
    }

    #[tokio::test]
    async fn test_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        std::fs::write(&path, "earlier contents\n").unwrap();

        let writer = LogWriter::spawn(&path);
        writer.append("req".into(), "Response res".into()).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("earlier contents\nTimestamp:"));
        assert!(contents.ends_with("Request:\nreq\nResponse:\nResponse res\n==========\n"));
    }

    #[tokio::test]
    async fn test_concurrent_handles_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.log");
        let writer = LogWriter::spawn(&path);

        let mut tasks = Vec::new();
        for i in 0..10 {
            let writer = writer.clone();
            tasks.push(tokio::spawn(async move {
                writer
                    .append(format!("request {i}"), "x".repeat(4096))
                    .await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        for block in contents.split_terminator("==========\n") {
            let lines: Vec<&str> = block.lines().collect();
            assert_eq!(lines.len(), 5);
            assert!(lines[2].starts_with("request "));
            assert_eq!(lines[4].len(), 4096);
        }
        assert_eq!(contents.matches("==========\n").count(), 10);
    }

    #[tokio::test]
    async fn test_unwritable_path_drops_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("traffic.log");
        let writer = LogWriter::spawn(&path);

        // The failure is logged, acknowledged, and the writer keeps running
        writer.append("req".into(), "Response res".into()).await;
        assert!(!path.exists());

        writer.append("again".into(), "Response res".into()).await;
        writer.flush().await;
        assert!(!path.exists());
    }
}
