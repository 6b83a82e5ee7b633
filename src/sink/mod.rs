mod archive;
mod broadcast;
mod json;

use crate::aggregator::Snapshot;
use crate::error::SinkError;
use async_trait::async_trait;

pub use archive::{ArchiveOutcome, Archiver, CsvArchiver};
pub use broadcast::BroadcastSink;
pub use json::JsonLinesSink;

/// Outbound boundary for aggregated snapshots.
///
/// Connection handling and retry policy belong to the implementation; the
/// aggregator only reports failures and moves on to the next tick.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Deliver one non-empty snapshot
    async fn publish(&self, snapshot: &Snapshot) -> Result<(), SinkError>;

    /// Flush and release the transport
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
