use std::path::Path;
use dashmap::DashMap;
use serde::Serialize;
use chrono::Utc;
use tracing::{info, warn};

use crate::agents::breaker::CircuitState;
use crate::errors::OutriderError;
use crate::models::{AgentExecutionStatus, AgentStage};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TransitionKey {
    agent_id: String,
    from: CircuitState,
    to: CircuitState,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OutcomeKey {
    agent_id: String,
    stage: AgentStage,
    status: AgentExecutionStatus,
}

/// Process-wide counters for breaker transitions and terminal invocation
/// statuses, keyed by agent. Shared across concurrent pipeline runs.
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    transitions: DashMap<TransitionKey, u64>,
    outcomes: DashMap<OutcomeKey, u64>,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transition(&self, agent_id: &str, from: CircuitState, to: CircuitState) {
        info!(agent = %agent_id, from = %from, to = %to, "Circuit breaker state changed");
        let key = TransitionKey {
            agent_id: agent_id.to_string(),
            from,
            to,
        };
        *self.transitions.entry(key).or_insert(0) += 1;
    }

    pub fn record_outcome(&self, agent_id: &str, stage: AgentStage, status: AgentExecutionStatus) {
        let key = OutcomeKey {
            agent_id: agent_id.to_string(),
            stage,
            status,
        };
        *self.outcomes.entry(key).or_insert(0) += 1;
    }

    pub fn transition_count(&self, agent_id: &str, from: CircuitState, to: CircuitState) -> u64 {
        let key = TransitionKey {
            agent_id: agent_id.to_string(),
            from,
            to,
        };
        self.transitions.get(&key).map(|c| *c).unwrap_or(0)
    }

    pub fn outcome_count(
        &self,
        agent_id: &str,
        stage: AgentStage,
        status: AgentExecutionStatus,
    ) -> u64 {
        let key = OutcomeKey {
            agent_id: agent_id.to_string(),
            stage,
            status,
        };
        self.outcomes.get(&key).map(|c| *c).unwrap_or(0)
    }

    /// Point-in-time copy of all counters, sorted for stable output.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut transitions: Vec<TransitionCount> = self
            .transitions
            .iter()
            .map(|entry| TransitionCount {
                agent_id: entry.key().agent_id.clone(),
                from: entry.key().from,
                to: entry.key().to,
                count: *entry.value(),
            })
            .collect();
        transitions.sort_by(|a, b| {
            (&a.agent_id, a.from.as_str(), a.to.as_str())
                .cmp(&(&b.agent_id, b.from.as_str(), b.to.as_str()))
        });

        let mut outcomes: Vec<OutcomeCount> = self
            .outcomes
            .iter()
            .map(|entry| OutcomeCount {
                agent_id: entry.key().agent_id.clone(),
                stage: entry.key().stage,
                status: entry.key().status,
                count: *entry.value(),
            })
            .collect();
        outcomes.sort_by(|a, b| {
            (&a.agent_id, a.stage.as_str(), a.status.as_str())
                .cmp(&(&b.agent_id, b.stage.as_str(), b.status.as_str()))
        });

        MetricsSnapshot {
            generated_at: Utc::now().to_rfc3339(),
            breaker_transitions: transitions,
            outcomes,
        }
    }

    /// Write the snapshot as pretty JSON, via a tmp file so readers never see
    /// a partial write.
    pub async fn write_snapshot(&self, path: &Path) -> Result<(), OutriderError> {
        let snapshot = self.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            warn!(error = %e, path = %path.display(), "Failed to move metrics snapshot into place");
            return Err(e.into());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub generated_at: String,
    pub breaker_transitions: Vec<TransitionCount>,
    pub outcomes: Vec<OutcomeCount>,
}

#[derive(Debug, Serialize)]
pub struct TransitionCount {
    pub agent_id: String,
    pub from: CircuitState,
    pub to: CircuitState,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct OutcomeCount {
    pub agent_id: String,
    pub stage: AgentStage,
    pub status: AgentExecutionStatus,
    pub count: u64,
}
