use super::{ComponentState, PipelineOrchestrator, PipelineState};
use crate::error::PipelineError;
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::{debug, info};

impl PipelineOrchestrator {
    /// Current pipeline state
    pub fn state(&self) -> PipelineState {
        *self.state_tx.borrow()
    }

    /// Receiver observing every pipeline state change
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    pub(super) fn transition(&self, next: PipelineState) -> Result<(), PipelineError> {
        let current = self.state();
        if !current.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        self.state_tx.send_replace(next);
        info!("Pipeline state: {} -> {}", current, next);
        Ok(())
    }

    /// Update component state
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        states.insert(component.to_string(), state.clone());
        debug!("Component '{}' state changed to: {:?}", component, state);
    }

    /// Get component state
    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        let states = self.component_states.lock().await;
        states.get(component).cloned()
    }

    /// Get all component states
    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        let states = self.component_states.lock().await;
        states.clone()
    }
}
