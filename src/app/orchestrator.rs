use super::types::{ComponentState, ShutdownReason};
use crate::aggregator::AggregatorStats;
use crate::config::MicelogConfig;
use crate::device::{
    derive_device_ids, DeviceFile, DeviceRegistry, DeviceStream, MotionSource, ReaderOutcome,
};
use crate::error::{MicelogError, Result};
use crate::sink::{Archiver, CsvArchiver, JsonLinesSink, TelemetrySink};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Engine context: the fixed device set, the sinks, and every running task
pub struct MicelogOrchestrator {
    pub(super) config: MicelogConfig,
    pub(super) devices: Arc<DeviceRegistry>,

    // Sources not yet handed to a reader
    pub(super) sources: parking_lot::Mutex<HashMap<String, Box<dyn MotionSource>>>,
    pub(super) telemetry_sink: Option<Arc<dyn TelemetrySink>>,
    pub(super) archiver: Option<Arc<dyn Archiver>>,

    // Tasks
    pub(super) reader_tasks: Vec<(String, JoinHandle<ReaderOutcome>)>,
    pub(super) aggregator_task: Option<JoinHandle<AggregatorStats>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) reader_stop: CancellationToken,
    pub(super) aggregator_stop: CancellationToken,
    pub(super) shut_down: bool,
}

impl MicelogOrchestrator {
    /// Open every configured device and build the sinks the configuration enables.
    ///
    /// A device that cannot be opened is reported and skipped; having none left is fatal.
    pub async fn new(config: MicelogConfig) -> Result<Self> {
        config.validate()?;

        let paths = config.devices.resolve_paths().map_err(|e| {
            MicelogError::component("config", format!("Failed to read device list: {}", e))
        })?;
        let ids = derive_device_ids(&paths, config.devices.id_from_path);

        let mut builder = MicelogOrchestratorBuilder::new().config(config.clone());

        for (id, path) in ids.into_iter().zip(paths) {
            match DeviceFile::open(&path) {
                Ok(device) => {
                    info!("Device {} -> {}", id, device.path().display());
                    builder = builder.device_at(id, path, Box::new(device));
                }
                Err(e) => error!("Skipping device {}: {}", id, e),
            }
        }

        if config.telemetry.enabled {
            let sink = if config.telemetry.output == "-" {
                JsonLinesSink::stdout(config.telemetry.topic.clone())
            } else {
                JsonLinesSink::append_to(config.telemetry.topic.clone(), &config.telemetry.output)
                    .await?
            };
            builder = builder.telemetry_sink(Arc::new(sink));
        }

        if config.archive.enabled {
            builder = builder.archiver(Arc::new(CsvArchiver::new(&config.archive.directory)));
        }

        builder.build()
    }

    pub fn builder() -> MicelogOrchestratorBuilder {
        MicelogOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &MicelogConfig {
        &self.config
    }

    pub fn devices(&self) -> Arc<DeviceRegistry> {
        Arc::clone(&self.devices)
    }
}

/// Builder for MicelogOrchestrator
pub struct MicelogOrchestratorBuilder {
    config: MicelogConfig,
    devices: Vec<(DeviceStream, Box<dyn MotionSource>)>,
    telemetry_sink: Option<Arc<dyn TelemetrySink>>,
    archiver: Option<Arc<dyn Archiver>>,
}

impl MicelogOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: MicelogConfig::default(),
            devices: Vec::new(),
            telemetry_sink: None,
            archiver: None,
        }
    }

    pub fn config(mut self, config: MicelogConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a device with no backing path
    pub fn device<S: Into<String>>(mut self, id: S, source: Box<dyn MotionSource>) -> Self {
        self.devices.push((DeviceStream::new(id, None), source));
        self
    }

    pub fn device_at<S: Into<String>>(
        mut self,
        id: S,
        path: PathBuf,
        source: Box<dyn MotionSource>,
    ) -> Self {
        self.devices.push((DeviceStream::new(id, Some(path)), source));
        self
    }

    pub fn telemetry_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry_sink = Some(sink);
        self
    }

    pub fn archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = Some(archiver);
        self
    }

    pub fn build(self) -> Result<MicelogOrchestrator> {
        self.config.validate()?;

        if self.devices.is_empty() {
            return Err(MicelogError::NoDevices);
        }

        let mut streams = Vec::with_capacity(self.devices.len());
        let mut sources = HashMap::with_capacity(self.devices.len());
        for (stream, source) in self.devices {
            sources.insert(stream.id().to_string(), source);
            streams.push(stream);
        }
        let devices = Arc::new(DeviceRegistry::new(streams)?);

        if self.telemetry_sink.is_none() {
            warn!("No telemetry sink configured, aggregation disabled");
        }

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(MicelogOrchestrator {
            config: self.config,
            devices,
            sources: parking_lot::Mutex::new(sources),
            telemetry_sink: self.telemetry_sink,
            archiver: self.archiver,
            reader_tasks: Vec::new(),
            aggregator_task: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_sender))),
            shutdown_receiver: Some(shutdown_receiver),
            reader_stop: CancellationToken::new(),
            aggregator_stop: CancellationToken::new(),
            shut_down: false,
        })
    }
}

impl Default for MicelogOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
