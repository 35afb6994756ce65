use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use super::context::AgentStage;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AgentExecutionStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    SkippedCircuitOpen,
    TimedOut,
}

impl AgentExecutionStatus {
    /// Pending and Running only exist while an invocation is in flight;
    /// callers of the executor only ever observe the terminal four.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::SkippedCircuitOpen => "skipped-circuit-open",
            Self::TimedOut => "timed-out",
        }
    }
}

impl std::fmt::Display for AgentExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured output of one successful agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentArtifact {
    pub agent_id: String,
    pub stage: AgentStage,
    pub payload: serde_json::Value,
    pub produced_at: DateTime<Utc>,
}

impl AgentArtifact {
    pub fn new(agent_id: &str, stage: AgentStage, payload: serde_json::Value) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            stage,
            payload,
            produced_at: Utc::now(),
        }
    }
}

/// Outcome of one (agent, stage, run) invocation.
///
/// Constructed through the status-specific constructors so the artifact/error
/// fields always agree with the status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_id: String,
    pub stage: AgentStage,
    pub status: AgentExecutionStatus,
    pub artifact: Option<AgentArtifact>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl AgentResult {
    pub fn succeeded(
        agent_id: &str,
        stage: AgentStage,
        artifact: AgentArtifact,
        duration_ms: u64,
    ) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            stage,
            status: AgentExecutionStatus::Succeeded,
            artifact: Some(artifact),
            error: None,
            duration_ms,
        }
    }

    pub fn failed(agent_id: &str, stage: AgentStage, error: String, duration_ms: u64) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            stage,
            status: AgentExecutionStatus::Failed,
            artifact: None,
            error: Some(error),
            duration_ms,
        }
    }

    pub fn timed_out(agent_id: &str, stage: AgentStage, timeout_ms: u64) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            stage,
            status: AgentExecutionStatus::TimedOut,
            artifact: None,
            error: Some(format!("handler exceeded {}ms deadline", timeout_ms)),
            duration_ms: timeout_ms,
        }
    }

    pub fn skipped_circuit_open(agent_id: &str, stage: AgentStage) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            stage,
            status: AgentExecutionStatus::SkippedCircuitOpen,
            artifact: None,
            error: None,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AgentExecutionStatus::Succeeded
    }
}
