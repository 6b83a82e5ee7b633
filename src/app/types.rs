use crate::aggregator::AggregatorStats;
use crate::sink::ArchiveOutcome;

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest,
}

/// How a device reader ended during shutdown
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderShutdown {
    /// Observed the stop flag
    Stopped { readings: u64 },
    /// Had already failed on a read before shutdown
    Failed { readings: u64, error: String },
    /// Still blocked when the join timeout expired; left running detached
    Abandoned,
    /// The reader task panicked
    Panicked(String),
}

/// Result of flushing one device's log at shutdown
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveStatus {
    Disabled,
    Done(ArchiveOutcome),
    Failed(String),
}

/// Everything observed while shutting down
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub readers: Vec<(String, ReaderShutdown)>,
    pub archives: Vec<(String, ArchiveStatus)>,
    pub aggregator: Option<AggregatorStats>,
    pub sink_close_error: Option<String>,
}

impl ShutdownReport {
    pub fn reader(&self, device_id: &str) -> Option<&ReaderShutdown> {
        self.readers
            .iter()
            .find(|(id, _)| id == device_id)
            .map(|(_, status)| status)
    }

    pub fn archive(&self, device_id: &str) -> Option<&ArchiveStatus> {
        self.archives
            .iter()
            .find(|(id, _)| id == device_id)
            .map(|(_, status)| status)
    }

    /// Non-zero when data could not be flushed or the sink failed to close
    pub fn exit_code(&self) -> i32 {
        let archive_failed = self
            .archives
            .iter()
            .any(|(_, status)| matches!(status, ArchiveStatus::Failed(_)));

        if archive_failed || self.sink_close_error.is_some() {
            1
        } else {
            0
        }
    }
}
