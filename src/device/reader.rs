use super::source::MotionSource;
use super::stream::DeviceStream;
use crate::error::DeviceError;
use crate::packet::decode_packet;
use crate::reading_log::{Reading, ReadingLog};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// How a reader loop ended
#[derive(Debug)]
pub enum ReaderExit {
    /// The stop flag was observed
    Stopped,
    /// The device failed; the reader does not reconnect
    Failed(DeviceError),
}

/// Summary returned by a finished reader task
#[derive(Debug)]
pub struct ReaderOutcome {
    pub device_id: String,
    pub readings: u64,
    pub exit: ReaderExit,
}

/// Blocking reader bound to one device stream
pub struct DeviceReader {
    device_id: String,
    log: Arc<ReadingLog>,
    stop: CancellationToken,
    poll_interval: Duration,
    print_readings: bool,
}

impl DeviceReader {
    pub fn new(stream: &DeviceStream, stop: CancellationToken, poll_interval: Duration) -> Self {
        Self {
            device_id: stream.id().to_string(),
            log: stream.log(),
            stop,
            poll_interval,
            print_readings: false,
        }
    }

    /// Log every decoded reading at info level instead of trace
    pub fn with_print_readings(mut self, enabled: bool) -> Self {
        self.print_readings = enabled;
        self
    }

    /// Start the read loop on the blocking pool
    pub fn start(self, source: Box<dyn MotionSource>) -> JoinHandle<ReaderOutcome> {
        info!("Starting reader for device {}", self.device_id);
        task::spawn_blocking(move || self.run(source))
    }

    fn run(self, mut source: Box<dyn MotionSource>) -> ReaderOutcome {
        let started = Instant::now();
        let mut readings = 0u64;

        let exit = loop {
            match source.next_packet(self.poll_interval) {
                Ok(Some(packet)) => {
                    let t_ms = started.elapsed().as_millis() as u64;

                    // A packet completed after stop was requested is dropped.
                    if self.stop.is_cancelled() {
                        debug!(
                            "Device {} stopping, discarding packet read after stop",
                            self.device_id
                        );
                        break ReaderExit::Stopped;
                    }

                    let delta = decode_packet(packet);
                    self.log.append(Reading::new(t_ms, delta.dx, delta.dy));
                    readings += 1;

                    if self.print_readings {
                        info!(device = %self.device_id, dx = delta.dx, dy = delta.dy, "motion");
                    } else {
                        trace!(device = %self.device_id, t_ms, dx = delta.dx, dy = delta.dy, "motion");
                    }
                }
                Ok(None) => {
                    if self.stop.is_cancelled() {
                        break ReaderExit::Stopped;
                    }
                }
                Err(e) => {
                    warn!("Reader for device {} failed: {}", self.device_id, e);
                    break ReaderExit::Failed(DeviceError::Read {
                        device: self.device_id.clone(),
                        source: e,
                    });
                }
            }
        };

        info!(
            "Reader for device {} stopped after {} readings",
            self.device_id, readings
        );

        ReaderOutcome {
            device_id: self.device_id,
            readings,
            exit,
        }
    }
}
