use flume::{bounded, Receiver, Sender};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};

use super::types::ActivityLog;

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Queue capacity (max logs in memory before dropping)
    pub queue_capacity: usize,

    /// Logs written per flush
    pub batch_size: usize,

    /// Max wait time before flushing batch (milliseconds)
    pub batch_timeout_ms: u64,

    /// Directory of the rolling activity file
    pub directory: PathBuf,

    /// File name prefix, e.g. `activity` -> `activity.2026-10-16.jsonl`
    pub file_prefix: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            batch_size: 100,
            batch_timeout_ms: 1000,
            directory: PathBuf::from("logs"),
            file_prefix: "activity".to_string(),
        }
    }
}

/// Async activity logger with queue mechanism.
///
/// Cloning is cheap; every clone feeds the same queue.
#[derive(Clone, Default)]
pub struct ActivityLogger {
    sender: Option<Sender<ActivityLog>>,
}

impl ActivityLogger {
    /// Start a background worker writing JSON lines to a daily rolling file.
    /// Must be called inside a tokio runtime.
    pub fn new(config: LoggerConfig) -> Result<Self, InitError> {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(&config.file_prefix)
            .filename_suffix("jsonl")
            .build(&config.directory)?;

        Ok(Self::with_writer(config, appender))
    }

    /// Start a background worker writing JSON lines to `writer`.
    /// Must be called inside a tokio runtime.
    pub fn with_writer<W>(config: LoggerConfig, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let (sender, receiver) = bounded(config.queue_capacity);

        info!(
            "Initializing ActivityLogger: queue={}, batch={}, timeout={}ms",
            config.queue_capacity, config.batch_size, config.batch_timeout_ms
        );

        tokio::spawn(async move {
            Self::worker_loop(receiver, writer, config).await;
        });

        Self {
            sender: Some(sender),
        }
    }

    /// Logger that discards everything
    pub fn noop() -> Self {
        Self { sender: None }
    }

    /// Logger feeding a plain channel, for inspection by the caller
    pub fn channel(capacity: usize) -> (Self, Receiver<ActivityLog>) {
        let (sender, receiver) = bounded(capacity);
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Log activity (non-blocking, fire-and-forget)
    pub fn log(&self, activity: ActivityLog) {
        let Some(sender) = &self.sender else {
            return;
        };

        if let Err(e) = sender.try_send(activity) {
            warn!("Failed to enqueue activity log: {}", e);
        }
    }

    /// Worker loop - writes logs in batches until every sender is dropped
    async fn worker_loop<W: Write>(receiver: Receiver<ActivityLog>, mut writer: W, config: LoggerConfig) {
        info!("Activity logger worker started");

        let mut batch: Vec<ActivityLog> = Vec::with_capacity(config.batch_size);
        let batch_timeout = Duration::from_millis(config.batch_timeout_ms);

        loop {
            let deadline = tokio::time::Instant::now() + batch_timeout;

            while batch.len() < config.batch_size {
                match tokio::time::timeout_at(deadline, receiver.recv_async()).await {
                    Ok(Ok(log)) => batch.push(log),
                    Ok(Err(_)) => {
                        // Channel closed, flush and exit
                        if !batch.is_empty() {
                            Self::flush_batch(&mut writer, &batch);
                        }
                        info!("Activity logger worker shutting down (channel closed)");
                        return;
                    }
                    Err(_) => break,
                }
            }

            if !batch.is_empty() {
                Self::flush_batch(&mut writer, &batch);
                batch.clear();
            }
        }
    }

    fn flush_batch<W: Write>(writer: &mut W, batch: &[ActivityLog]) {
        debug!("Flushing {} activity logs", batch.len());

        if let Err(e) = Self::write_batch(writer, batch) {
            error!("Failed to write activity batch: {}", e);
        }
    }

    fn write_batch<W: Write>(writer: &mut W, logs: &[ActivityLog]) -> std::io::Result<()> {
        for log in logs {
            serde_json::to_writer(&mut *writer, log)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }

    /// Get queue statistics (for monitoring)
    pub fn queue_len(&self) -> usize {
        self.sender.as_ref().map_or(0, |s| s.len())
    }

    pub fn is_queue_full(&self) -> bool {
        self.sender.as_ref().is_some_and(|s| s.is_full())
    }
}
