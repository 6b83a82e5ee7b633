use super::state::{reader_component, AGGREGATOR};
use super::{ComponentState, MicelogOrchestrator};
use crate::aggregator::{Aggregator, AggregatorTask};
use crate::device::DeviceReader;
use crate::error::{MicelogError, Result};
use std::sync::Arc;
use tracing::{debug, error, info};

impl MicelogOrchestrator {
    /// Register every component as stopped
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing micelog components");

        let mut states = self.component_states.lock().await;
        for stream in self.devices.iter() {
            states.insert(reader_component(stream.id()), ComponentState::Stopped);
        }
        if self.telemetry_sink.is_some() {
            states.insert(AGGREGATOR.to_string(), ComponentState::Stopped);
        }
        drop(states);

        info!("{} devices registered", self.devices.len());
        Ok(())
    }

    /// Start one reader per device, then the aggregator
    pub async fn start(&mut self) -> Result<()> {
        if self.shut_down {
            return Err(MicelogError::system("Cannot start after shutdown"));
        }
        if !self.reader_tasks.is_empty() || self.aggregator_task.is_some() {
            return Err(MicelogError::system("Already started"));
        }

        info!("Starting micelog");

        if let Some(archiver) = &self.archiver {
            archiver.prepare().await.map_err(|e| {
                error!("Failed to prepare archive: {}", e);
                e
            })?;
        }

        let poll_interval = self.config.devices.poll_interval();
        let print_readings = self.config.devices.print_readings;

        let devices = Arc::clone(&self.devices);
        for stream in devices.iter() {
            let Some(source) = self.sources.get_mut().remove(stream.id()) else {
                continue;
            };

            match stream.path() {
                Some(path) => debug!("Reader for device {} bound to {}", stream.id(), path.display()),
                None => debug!("Reader for device {} bound to an injected source", stream.id()),
            }

            let component = reader_component(stream.id());
            self.set_component_state(&component, ComponentState::Starting)
                .await;

            let handle = DeviceReader::new(stream, self.reader_stop.clone(), poll_interval)
                .with_print_readings(print_readings)
                .start(source);
            self.reader_tasks.push((stream.id().to_string(), handle));

            self.set_component_state(&component, ComponentState::Running)
                .await;
        }

        if let Some(sink) = &self.telemetry_sink {
            self.set_component_state(AGGREGATOR, ComponentState::Starting)
                .await;

            let handle = AggregatorTask::spawn(
                Aggregator::new(Arc::clone(&self.devices)),
                Arc::clone(sink),
                self.config.telemetry.interval(),
                self.aggregator_stop.clone(),
            );
            self.aggregator_task = Some(handle);

            self.set_component_state(AGGREGATOR, ComponentState::Running)
                .await;
        }

        info!(
            "Multi-reader started ({} devices, reading output {})",
            self.reader_tasks.len(),
            if print_readings { "on" } else { "off" }
        );
        Ok(())
    }
}
