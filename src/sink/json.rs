use super::TelemetrySink;
use crate::aggregator::Snapshot;
use crate::error::SinkError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    sent_at: DateTime<Utc>,
    payload: &'a Snapshot,
}

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Writes each snapshot as one JSON message per line, tagged with a topic
pub struct JsonLinesSink {
    topic: String,
    writer: Mutex<Option<Writer>>,
}

impl JsonLinesSink {
    pub fn new<S: Into<String>>(topic: S, writer: Writer) -> Self {
        Self {
            topic: topic.into(),
            writer: Mutex::new(Some(writer)),
        }
    }

    pub fn stdout<S: Into<String>>(topic: S) -> Self {
        Self::new(topic, Box::new(io::stdout()))
    }

    /// Append to a file, creating it if needed
    pub async fn append_to<S: Into<String>, P: AsRef<Path>>(
        topic: S,
        path: P,
    ) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .await?;
        info!("Publishing snapshots to {}", path.as_ref().display());
        Ok(Self::new(topic, Box::new(file)))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Render the message for one snapshot, without the trailing newline
    pub fn encode(&self, snapshot: &Snapshot) -> Result<String, SinkError> {
        let envelope = Envelope {
            topic: &self.topic,
            sent_at: Utc::now(),
            payload: snapshot,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

#[async_trait]
impl TelemetrySink for JsonLinesSink {
    async fn publish(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let mut line = self.encode(snapshot)?;
        line.push('\n');

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SinkError::Closed)?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;

        debug!("Published {} bytes to topic {}", line.len(), self.topic());
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.flush().await?;
            writer.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::MotionSummary;

    fn snapshot() -> Snapshot {
        [(
            "0".to_string(),
            MotionSummary {
                ms: 120,
                dx: 1,
                dy: -2,
            },
        )]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_publish_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");

        let sink = JsonLinesSink::append_to("micelog/motion", &path)
            .await
            .unwrap();
        assert_eq!(sink.topic(), "micelog/motion");
        sink.publish(&snapshot()).await.unwrap();
        sink.publish(&snapshot()).await.unwrap();
        sink.close().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let message: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(message["topic"], "micelog/motion");
        assert_eq!(
            message["payload"],
            serde_json::json!({"0": {"ms": 120, "dx": 1, "dy": -2}})
        );
        assert!(message["sent_at"].is_string());
    }

    #[tokio::test]
    async fn test_publish_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::append_to("t", dir.path().join("out.jsonl"))
            .await
            .unwrap();
        sink.close().await.unwrap();

        assert!(matches!(
            sink.publish(&snapshot()).await,
            Err(SinkError::Closed)
        ));
    }
}
