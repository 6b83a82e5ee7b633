use super::TelemetrySink;
use crate::aggregator::Snapshot;
use crate::error::SinkError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// In-process fan-out of snapshots to any number of subscribers
pub struct BroadcastSink {
    sender: broadcast::Sender<Arc<Snapshot>>,
}

impl BroadcastSink {
    /// Create a sink with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl TelemetrySink for BroadcastSink {
    async fn publish(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
        // No subscribers is not an error: the snapshot is simply dropped.
        match self.sender.send(Arc::new(snapshot.clone())) {
            Ok(receivers) => trace!("Snapshot delivered to {} subscribers", receivers),
            Err(_) => trace!("No snapshot subscribers"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::MotionSummary;

    #[tokio::test]
    async fn test_subscribers_receive_snapshots() {
        let sink = BroadcastSink::new(8);
        let mut receiver = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 1);

        let snapshot: Snapshot = [(
            "mouse0".to_string(),
            MotionSummary {
                ms: 3,
                dx: 4,
                dy: 5,
            },
        )]
        .into_iter()
        .collect();
        sink.publish(&snapshot).await.unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(*received, snapshot);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let sink = BroadcastSink::new(1);
        assert!(sink.publish(&Snapshot::default()).await.is_ok());
    }
}
