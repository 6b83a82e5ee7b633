use super::state::{reader_component, AGGREGATOR};
use super::types::{ArchiveStatus, ReaderShutdown};
use super::{ComponentState, MicelogOrchestrator, ShutdownReport};
use crate::device::ReaderExit;
use crate::error::{MicelogError, Result};
use crate::sink::ArchiveOutcome;
use tokio::time::timeout;
use tracing::{error, info, warn};

impl MicelogOrchestrator {
    /// Stop readers, flush every log to the archive, stop the aggregator, close the sink.
    ///
    /// Readers are joined with a bounded wait before archiving. A reader still
    /// blocked after that is left detached and reported as abandoned, so
    /// shutdown never waits on device activity.
    pub async fn shutdown(&mut self) -> Result<ShutdownReport> {
        if self.shut_down {
            return Err(MicelogError::system("Shutdown already performed"));
        }
        self.shut_down = true;

        info!("Beginning graceful shutdown");
        let mut report = ShutdownReport::default();

        // Readers first so the archive sees their final entries
        self.reader_stop.cancel();
        self.sources.get_mut().clear();

        let join_timeout = self.config.shutdown.reader_join_timeout();
        for (device_id, handle) in std::mem::take(&mut self.reader_tasks) {
            let component = reader_component(&device_id);
            self.set_component_state(&component, ComponentState::Stopping)
                .await;

            let (status, state) = match timeout(join_timeout, handle).await {
                Ok(Ok(outcome)) => match outcome.exit {
                    ReaderExit::Stopped => (
                        ReaderShutdown::Stopped {
                            readings: outcome.readings,
                        },
                        ComponentState::Stopped,
                    ),
                    ReaderExit::Failed(e) => (
                        ReaderShutdown::Failed {
                            readings: outcome.readings,
                            error: e.to_string(),
                        },
                        ComponentState::Failed,
                    ),
                },
                Ok(Err(e)) => {
                    error!("Reader task for device {} panicked: {}", device_id, e);
                    (ReaderShutdown::Panicked(e.to_string()), ComponentState::Failed)
                }
                Err(_) => {
                    warn!(
                        "Reader for device {} still blocked after {:?}, abandoning it",
                        device_id, join_timeout
                    );
                    (ReaderShutdown::Abandoned, ComponentState::Failed)
                }
            };

            self.set_component_state(&component, state).await;
            report.readers.push((device_id, status));
        }

        for stream in self.devices.iter() {
            let status = match &self.archiver {
                None => ArchiveStatus::Disabled,
                Some(archiver) => {
                    let readings = stream.log().snapshot_all();
                    match archiver.archive(stream.id(), &readings).await {
                        Ok(ArchiveOutcome::NoData) => {
                            info!("No data to save for device {}", stream.id());
                            ArchiveStatus::Done(ArchiveOutcome::NoData)
                        }
                        Ok(ArchiveOutcome::Archived(count)) => {
                            info!("Archived {} readings for device {}", count, stream.id());
                            ArchiveStatus::Done(ArchiveOutcome::Archived(count))
                        }
                        Err(e) => {
                            error!("Failed to archive device {}: {}", stream.id(), e);
                            ArchiveStatus::Failed(e.to_string())
                        }
                    }
                }
            };
            report.archives.push((stream.id().to_string(), status));
        }

        self.aggregator_stop.cancel();
        if let Some(handle) = self.aggregator_task.take() {
            self.set_component_state(AGGREGATOR, ComponentState::Stopping)
                .await;

            let aggregator_timeout = self.config.shutdown.aggregator_timeout();
            match timeout(aggregator_timeout, handle).await {
                Ok(Ok(stats)) => {
                    report.aggregator = Some(stats);
                    self.set_component_state(AGGREGATOR, ComponentState::Stopped)
                        .await;
                }
                Ok(Err(e)) => {
                    error!("Aggregator task failed: {}", e);
                    self.set_component_state(AGGREGATOR, ComponentState::Failed)
                        .await;
                }
                Err(_) => {
                    error!("Aggregator stop timeout");
                    self.set_component_state(AGGREGATOR, ComponentState::Failed)
                        .await;
                }
            }
        }

        if let Some(sink) = self.telemetry_sink.take() {
            if let Err(e) = sink.close().await {
                error!("Failed to close telemetry sink: {}", e);
                report.sink_close_error = Some(e.to_string());
            }
        }

        info!(
            "Graceful shutdown completed with exit code: {}",
            report.exit_code()
        );
        Ok(report)
    }
}
