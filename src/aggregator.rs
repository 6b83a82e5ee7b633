use crate::device::DeviceRegistry;
use crate::reading_log::Reading;
use crate::sink::TelemetrySink;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Motion summed over one device's readings in a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionSummary {
    /// `t_ms` of the last reading drained this tick
    pub ms: u64,
    pub dx: i64,
    pub dy: i64,
}

impl MotionSummary {
    /// Fold a non-empty run of readings. Returns `None` for an empty slice.
    pub fn from_readings(readings: &[Reading]) -> Option<Self> {
        let last = readings.last()?;
        let (dx, dy) = readings.iter().fold((0i64, 0i64), |(dx, dy), r| {
            (dx + r.dx as i64, dy + r.dy as i64)
        });
        Some(Self {
            ms: last.t_ms,
            dx,
            dy,
        })
    }
}

/// Per-tick mapping of device id to summed motion.
/// Serializes as a plain object keyed by device id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, MotionSummary>);

impl Snapshot {
    pub fn get(&self, device_id: &str) -> Option<&MotionSummary> {
        self.0.get(device_id)
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.0.contains_key(device_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MotionSummary)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, MotionSummary)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, MotionSummary)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Drains every device log and folds the new readings into a snapshot
pub struct Aggregator {
    devices: Arc<DeviceRegistry>,
    state: Snapshot,
}

impl Aggregator {
    pub fn new(devices: Arc<DeviceRegistry>) -> Self {
        Self {
            devices,
            state: Snapshot::default(),
        }
    }

    /// Run one aggregation pass.
    ///
    /// Devices without new readings are removed from the carried state so
    /// stale motion is never resent. Returns `None` when no device moved.
    pub fn tick(&mut self) -> Option<Snapshot> {
        for stream in self.devices.iter() {
            let drained = stream.log().drain_since();
            match MotionSummary::from_readings(&drained) {
                Some(summary) => {
                    debug!(
                        "Device {}: {} new readings, dx={} dy={}",
                        stream.id(),
                        drained.len(),
                        summary.dx,
                        summary.dy
                    );
                    self.state.0.insert(stream.id().to_string(), summary);
                }
                None => {
                    self.state.0.remove(stream.id());
                }
            }
        }

        if self.state.is_empty() {
            None
        } else {
            Some(self.state.clone())
        }
    }
}

/// Counters returned when the aggregation task ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub ticks: u64,
    pub published: u64,
    pub empty_ticks: u64,
    pub publish_failures: u64,
}

/// Periodic driver for an [`Aggregator`]
pub struct AggregatorTask;

impl AggregatorTask {
    /// Spawn the tick loop. The first tick fires one `period` after spawning.
    pub fn spawn(
        mut aggregator: Aggregator,
        sink: Arc<dyn TelemetrySink>,
        period: Duration,
        stop: CancellationToken,
    ) -> JoinHandle<AggregatorStats> {
        tokio::spawn(async move {
            info!("Aggregator started with interval {:?}", period);

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut stats = AggregatorStats::default();

            loop {
                tokio::select! {
                    _ = stop.cancelled() => {
                        info!("Aggregator stopping");
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                stats.ticks += 1;
                let Some(snapshot) = aggregator.tick() else {
                    stats.empty_ticks += 1;
                    continue;
                };

                match sink.publish(&snapshot).await {
                    Ok(()) => {
                        stats.published += 1;
                        debug!("Published snapshot for {} devices", snapshot.len());
                    }
                    Err(e) => {
                        stats.publish_failures += 1;
                        warn!("Failed to publish snapshot: {}", e);
                    }
                }
            }

            info!(
                "Aggregator stopped after {} ticks ({} published, {} failed)",
                stats.ticks, stats.published, stats.publish_failures
            );
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceStream;
    use crate::error::SinkError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn registry(ids: &[&str]) -> Arc<DeviceRegistry> {
        Arc::new(
            DeviceRegistry::new(ids.iter().map(|id| DeviceStream::new(*id, None)).collect())
                .unwrap(),
        )
    }

    fn append(devices: &DeviceRegistry, id: &str, t_ms: u64, dx: i32, dy: i32) {
        devices
            .get(id)
            .unwrap()
            .log()
            .append(Reading::new(t_ms, dx, dy));
    }

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<Snapshot>>,
        fail: bool,
    }

    #[async_trait]
    impl TelemetrySink for RecordingSink {
        async fn publish(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
            self.published.lock().push(snapshot.clone());
            if self.fail {
                Err(SinkError::Closed)
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_tick_sums_drained_readings() {
        let devices = registry(&["0"]);
        append(&devices, "0", 10, 3, -2);
        append(&devices, "0", 20, 1, 1);

        let mut aggregator = Aggregator::new(Arc::clone(&devices));
        let snapshot = aggregator.tick().unwrap();

        assert_eq!(
            snapshot.get("0"),
            Some(&MotionSummary {
                ms: 20,
                dx: 4,
                dy: -1
            })
        );
    }

    #[test]
    fn test_tick_removes_stale_devices() {
        let devices = registry(&["0", "1"]);
        let mut aggregator = Aggregator::new(Arc::clone(&devices));

        append(&devices, "0", 5, 1, 1);
        append(&devices, "1", 7, 2, 2);
        let first = aggregator.tick().unwrap();
        assert!(first.contains("0") && first.contains("1"));

        append(&devices, "1", 9, -1, 0);
        let second = aggregator.tick().unwrap();
        assert!(!second.contains("0"));
        assert_eq!(
            second.get("1"),
            Some(&MotionSummary {
                ms: 9,
                dx: -1,
                dy: 0
            })
        );

        assert!(aggregator.tick().is_none());
    }

    #[test]
    fn test_tick_with_no_motion_is_empty() {
        let devices = registry(&["0", "1"]);
        let mut aggregator = Aggregator::new(devices);
        assert!(aggregator.tick().is_none());
    }

    #[test]
    fn test_sums_do_not_overflow_byte_range() {
        let devices = registry(&["0"]);
        for t in 0..1000 {
            append(&devices, "0", t, 127, -128);
        }
        let snapshot = Aggregator::new(Arc::clone(&devices)).tick().unwrap();
        let summary = snapshot.get("0").unwrap();
        assert_eq!(summary.dx, 127_000);
        assert_eq!(summary.dy, -128_000);
        assert_eq!(summary.ms, 999);
    }

    #[test]
    fn test_snapshot_serializes_keyed_by_device() {
        let snapshot: Snapshot = [(
            "0".to_string(),
            MotionSummary {
                ms: 42,
                dx: 1,
                dy: -2,
            },
        )]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json, serde_json::json!({"0": {"ms": 42, "dx": 1, "dy": -2}}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_skips_empty_ticks() {
        let devices = registry(&["0"]);
        let sink = Arc::new(RecordingSink::default());
        let stop = CancellationToken::new();

        let handle = AggregatorTask::spawn(
            Aggregator::new(Arc::clone(&devices)),
            sink.clone(),
            Duration::from_millis(500),
            stop.clone(),
        );

        tokio::time::sleep(Duration::from_millis(1250)).await;
        assert!(sink.published.lock().is_empty());

        append(&devices, "0", 1, 2, 3);
        tokio::time::sleep(Duration::from_millis(500)).await;
        stop.cancel();

        let stats = handle.await.unwrap();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.empty_ticks, 2);
        assert_eq!(stats.ticks, 3);
        assert_eq!(sink.published.lock()[0].get("0").unwrap().dx, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_survives_sink_failures() {
        let devices = registry(&["0"]);
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let stop = CancellationToken::new();

        let handle = AggregatorTask::spawn(
            Aggregator::new(Arc::clone(&devices)),
            sink.clone(),
            Duration::from_millis(100),
            stop.clone(),
        );

        // Appends land between ticks at 100, 200 and 300 ms
        tokio::time::sleep(Duration::from_millis(50)).await;
        for t in 0..3 {
            append(&devices, "0", t, 1, 1);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        stop.cancel();

        let stats = handle.await.unwrap();
        assert_eq!(stats.publish_failures, 3);
        assert_eq!(sink.published.lock().len(), 3);
    }
}
