use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::OutriderError;
use crate::models::AgentStage;
use super::handler::AgentHandler;

#[derive(Clone)]
pub struct AgentRegistration {
    pub agent_id: String,
    pub handler: Arc<dyn AgentHandler>,
}

/// Ordered set of registered handlers per stage.
///
/// Registration completes before the first stage invocation; there is no hot
/// reload. Execution results come back in registration order.
#[derive(Default)]
pub struct AgentRegistry {
    stages: HashMap<AgentStage, Vec<AgentRegistration>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        stage: AgentStage,
        agent_id: &str,
        handler: Arc<dyn AgentHandler>,
    ) -> Result<(), OutriderError> {
        let entries = self.stages.entry(stage).or_default();
        if entries.iter().any(|r| r.agent_id == agent_id) {
            return Err(OutriderError::Config(format!(
                "Agent '{}' registered twice for stage '{}'",
                agent_id, stage
            )));
        }
        entries.push(AgentRegistration {
            agent_id: agent_id.to_string(),
            handler,
        });
        Ok(())
    }

    pub fn handlers_for(&self, stage: AgentStage) -> &[AgentRegistration] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn handler_count(&self, stage: AgentStage) -> usize {
        self.handlers_for(stage).len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.values().all(Vec::is_empty)
    }
}
