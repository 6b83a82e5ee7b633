pub mod aggregator;
pub mod app;
pub mod config;
pub mod device;
pub mod error;
pub mod packet;
pub mod reading_log;
pub mod sink;

pub use aggregator::{Aggregator, AggregatorStats, AggregatorTask, MotionSummary, Snapshot};
pub use app::{
    ArchiveStatus, ComponentState, MicelogOrchestrator, MicelogOrchestratorBuilder,
    ReaderShutdown, ShutdownHandle, ShutdownReason, ShutdownReport,
};
pub use config::MicelogConfig;
pub use device::{
    ChannelSource, DeviceFile, DeviceReader, DeviceRegistry, DeviceStream, MotionSource,
    ReadSource, ReaderExit, ReaderOutcome,
};
pub use error::{ArchiveError, DeviceError, MicelogError, Result, SinkError};
pub use packet::{decode_packet, to_signed, MotionDelta, PACKET_LEN};
pub use reading_log::{Reading, ReadingLog};
pub use sink::{ArchiveOutcome, Archiver, BroadcastSink, CsvArchiver, JsonLinesSink, TelemetrySink};
