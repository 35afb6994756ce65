use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{AgentResult, AgentStage};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub collection: Option<String>,
    pub top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collection: None,
            top_k: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: AgentStage,
    pub results: Vec<AgentResult>,
}

/// Outcome of one pipeline run: the answer plus everything the agents did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub query: String,
    pub answer: String,
    pub stages: Vec<StageReport>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn results_for(&self, stage: AgentStage) -> &[AgentResult] {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.results.as_slice())
            .unwrap_or(&[])
    }

    pub fn artifact_count(&self) -> usize {
        self.stages
            .iter()
            .flat_map(|s| s.results.iter())
            .filter(|r| r.artifact.is_some())
            .count()
    }

    pub fn failed_agent_count(&self) -> usize {
        self.stages
            .iter()
            .flat_map(|s| s.results.iter())
            .filter(|r| !r.is_success())
            .count()
    }
}
