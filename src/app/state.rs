use super::{ComponentState, MicelogOrchestrator};
use std::collections::HashMap;
use tracing::debug;

pub(super) const AGGREGATOR: &str = "aggregator";

/// Component name used for the reader of one device
pub(super) fn reader_component(device_id: &str) -> String {
    format!("reader:{}", device_id)
}

impl MicelogOrchestrator {
    /// Update component state
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        debug!("Component '{}' state changed to: {:?}", component, state);
        states.insert(component.to_string(), state);
    }

    /// Get component state
    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        let states = self.component_states.lock().await;
        states.get(component).cloned()
    }

    /// State of the reader bound to `device_id`
    pub async fn get_reader_state(&self, device_id: &str) -> Option<ComponentState> {
        self.get_component_state(&reader_component(device_id)).await
    }

    /// Get all component states
    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        let states = self.component_states.lock().await;
        states.clone()
    }
}
