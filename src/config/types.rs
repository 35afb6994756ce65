use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::agents::{BreakerConfig, ExecutorConfig};
use crate::models::AgentStage;
use crate::pipeline::PipelineConfig;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OutriderConfig {
    pub executor: Option<ExecutorSettings>,
    pub breaker: Option<BreakerSettings>,
    pub retrieval: Option<RetrievalSettings>,
    pub agents: Option<Vec<AgentEntry>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ExecutorSettings {
    pub handler_timeout_ms: Option<u64>,
    pub max_in_flight: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BreakerSettings {
    pub failure_threshold: Option<u32>,
    pub recovery_timeout_ms: Option<u64>,
    pub half_open_trial_limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RetrievalSettings {
    pub top_k: Option<usize>,
    pub collection: Option<String>,
}

/// One agent registration: a builtin handler name bound to a stage.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentEntry {
    pub name: String,
    pub stage: AgentStage,
}

impl OutriderConfig {
    /// Executor settings with defaults applied for every omitted knob.
    pub fn executor_config(&self) -> ExecutorConfig {
        let defaults = ExecutorConfig::default();
        let breaker_defaults = BreakerConfig::default();

        let executor = self.executor.clone().unwrap_or_default();
        let breaker = self.breaker.clone().unwrap_or_default();

        ExecutorConfig {
            handler_timeout: executor
                .handler_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.handler_timeout),
            max_in_flight: executor.max_in_flight.unwrap_or(defaults.max_in_flight),
            breaker: BreakerConfig {
                failure_threshold: breaker
                    .failure_threshold
                    .unwrap_or(breaker_defaults.failure_threshold),
                recovery_timeout: breaker
                    .recovery_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(breaker_defaults.recovery_timeout),
                half_open_trial_limit: breaker
                    .half_open_trial_limit
                    .unwrap_or(breaker_defaults.half_open_trial_limit),
            },
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        let retrieval = self.retrieval.clone().unwrap_or_default();
        PipelineConfig {
            collection: retrieval.collection,
            top_k: retrieval.top_k.unwrap_or(defaults.top_k),
        }
    }
}
