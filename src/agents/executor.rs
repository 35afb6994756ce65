use std::sync::Arc;
use std::time::Duration;
use futures::future::{self, Either};
use tokio::sync::Semaphore;
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::OutriderError;
use crate::metrics::ExecutionMetrics;
use crate::models::{AgentContext, AgentExecutionStatus, AgentResult, AgentStage};
use super::breaker::{BreakerConfig, BreakerRegistry, CircuitBreaker, CircuitState};
use super::handler::AgentHandler;
use super::registry::AgentRegistry;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub handler_timeout: Duration,
    pub max_in_flight: usize,
    pub breaker: BreakerConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(2),
            max_in_flight: 8,
            breaker: BreakerConfig::default(),
        }
    }
}

/// Runs every handler registered for a stage under isolation and returns one
/// terminal result per handler, in registration order.
///
/// Handler faults never propagate: a raised error, a panic, a blown deadline,
/// or a cancelled run all become a terminal `AgentResult` status, and each
/// feeds the agent's circuit breaker. The in-flight pool is shared across
/// concurrent pipeline runs.
pub struct AgentExecutorService {
    registry: Arc<AgentRegistry>,
    breakers: BreakerRegistry,
    semaphore: Arc<Semaphore>,
    config: ExecutorConfig,
    metrics: Arc<ExecutionMetrics>,
}

enum Slot {
    Ready(AgentResult),
    Running(String, tokio::task::JoinHandle<AgentResult>),
}

impl AgentExecutorService {
    pub fn new(
        registry: Arc<AgentRegistry>,
        config: ExecutorConfig,
        metrics: Arc<ExecutionMetrics>,
    ) -> Self {
        let breakers = BreakerRegistry::new(config.breaker.clone(), metrics.clone());
        let semaphore = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Self {
            registry,
            breakers,
            semaphore,
            config,
            metrics,
        }
    }

    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        self.metrics.clone()
    }

    /// State of an agent's breaker, if one has been created.
    pub fn breaker_state(&self, agent_id: &str) -> Option<CircuitState> {
        self.breakers.state_of(agent_id)
    }

    pub fn validate_config(config: &ExecutorConfig) -> Result<(), OutriderError> {
        if config.handler_timeout.is_zero() {
            return Err(OutriderError::Config(
                "handler timeout must be greater than zero".into(),
            ));
        }
        if config.max_in_flight == 0 {
            return Err(OutriderError::Config(
                "max in-flight handler count must be greater than zero".into(),
            ));
        }
        if config.breaker.failure_threshold == 0 {
            return Err(OutriderError::Config(
                "breaker failure threshold must be greater than zero".into(),
            ));
        }
        if config.breaker.half_open_trial_limit == 0 {
            return Err(OutriderError::Config(
                "breaker trial limit must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Invoke all handlers registered for `stage` against `context`.
    ///
    /// Eligible handlers fan out concurrently, bounded by the shared pool;
    /// the call waits for every handler to reach a terminal state, so stage
    /// latency is bounded by the longest single timeout, never the sum.
    pub async fn run_stage(
        &self,
        stage: AgentStage,
        context: Arc<AgentContext>,
        cancel: &CancellationToken,
    ) -> Vec<AgentResult> {
        let registrations = self.registry.handlers_for(stage);
        if registrations.is_empty() {
            return Vec::new();
        }

        let mut slots = Vec::with_capacity(registrations.len());
        for registration in registrations {
            let breaker = self.breakers.breaker_for(&registration.agent_id);
            if !breaker.allow_call() {
                debug!(agent = %registration.agent_id, stage = %stage, "Circuit open, skipping handler");
                let result = AgentResult::skipped_circuit_open(&registration.agent_id, stage);
                self.metrics
                    .record_outcome(&registration.agent_id, stage, result.status);
                slots.push(Slot::Ready(result));
                continue;
            }

            let handle = tokio::spawn(invoke_handler(
                registration.agent_id.clone(),
                registration.handler.clone(),
                stage,
                context.clone(),
                breaker,
                self.semaphore.clone(),
                self.config.handler_timeout,
                cancel.clone(),
                self.metrics.clone(),
            ));
            slots.push(Slot::Running(registration.agent_id.clone(), handle));
        }

        let joins = slots.into_iter().map(|slot| match slot {
            Slot::Ready(result) => Either::Left(future::ready(result)),
            Slot::Running(agent_id, handle) => {
                let metrics = self.metrics.clone();
                Either::Right(async move {
                    match handle.await {
                        Ok(result) => result,
                        // The supervising task itself died; handler panics
                        // are already isolated one level down.
                        Err(e) => {
                            warn!(agent = %agent_id, stage = %stage, error = %e, "Agent supervision task failed");
                            let result = AgentResult::failed(
                                &agent_id,
                                stage,
                                format!("supervision task failed: {}", e),
                                0,
                            );
                            metrics.record_outcome(&agent_id, stage, result.status);
                            result
                        }
                    }
                })
            }
        });
        future::join_all(joins).await
    }
}

#[allow(clippy::too_many_arguments)]
async fn invoke_handler(
    agent_id: String,
    handler: Arc<dyn AgentHandler>,
    stage: AgentStage,
    context: Arc<AgentContext>,
    breaker: Arc<CircuitBreaker>,
    semaphore: Arc<Semaphore>,
    handler_timeout: Duration,
    cancel: CancellationToken,
    metrics: Arc<ExecutionMetrics>,
) -> AgentResult {
    // The deadline starts when the stage submits the handler and covers
    // queue wait plus execution, so a crowded pool cannot stretch stage
    // latency past one timeout. A run cancelled or timed out while queued
    // never invokes its handler, but still counts against the agent: it
    // produced nothing usable in time.
    let start = Instant::now();
    let deadline = start + handler_timeout;
    debug!(
        agent = %agent_id,
        stage = %stage,
        status = %AgentExecutionStatus::Pending,
        "Handler queued for a worker slot"
    );
    let _permit = tokio::select! {
        permit = semaphore.clone().acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => {
                breaker.record_failure();
                let result = AgentResult::failed(
                    &agent_id,
                    stage,
                    "executor worker pool closed".to_string(),
                    0,
                );
                metrics.record_outcome(&agent_id, stage, result.status);
                return result;
            }
        },
        _ = cancel.cancelled() => {
            breaker.record_failure();
            let result = AgentResult::failed(
                &agent_id,
                stage,
                "pipeline run cancelled".to_string(),
                0,
            );
            metrics.record_outcome(&agent_id, stage, result.status);
            return result;
        }
        _ = sleep_until(deadline) => {
            breaker.record_failure();
            warn!(
                agent = %agent_id,
                stage = %stage,
                timeout_ms = handler_timeout.as_millis() as u64,
                "Handler deadline expired while queued"
            );
            let result =
                AgentResult::timed_out(&agent_id, stage, handler_timeout.as_millis() as u64);
            metrics.record_outcome(&agent_id, stage, result.status);
            return result;
        }
    };

    debug!(
        agent = %agent_id,
        stage = %stage,
        run_id = %context.run_id,
        status = %AgentExecutionStatus::Running,
        "Invoking agent handler"
    );

    // The handler runs in its own task so a panic is contained and an
    // over-deadline execution can be aborted in the background.
    let mut inner = tokio::spawn(async move { handler.execute(&context).await });

    let result = tokio::select! {
        _ = cancel.cancelled() => {
            inner.abort();
            breaker.record_failure();
            warn!(agent = %agent_id, stage = %stage, "Handler cancelled with pipeline run");
            AgentResult::failed(
                &agent_id,
                stage,
                "pipeline run cancelled".to_string(),
                start.elapsed().as_millis() as u64,
            )
        }
        joined = timeout_at(deadline, &mut inner) => match joined {
            Err(_) => {
                inner.abort();
                breaker.record_failure();
                warn!(
                    agent = %agent_id,
                    stage = %stage,
                    timeout_ms = handler_timeout.as_millis() as u64,
                    "Handler exceeded deadline"
                );
                AgentResult::timed_out(&agent_id, stage, handler_timeout.as_millis() as u64)
            }
            Ok(Err(join_err)) => {
                breaker.record_failure();
                warn!(agent = %agent_id, stage = %stage, error = %join_err, "Handler panicked");
                AgentResult::failed(
                    &agent_id,
                    stage,
                    format!("handler panicked: {}", join_err),
                    start.elapsed().as_millis() as u64,
                )
            }
            Ok(Ok(Err(e))) => {
                breaker.record_failure();
                warn!(agent = %agent_id, stage = %stage, error = %e, "Handler failed");
                AgentResult::failed(&agent_id, stage, e.to_string(), start.elapsed().as_millis() as u64)
            }
            Ok(Ok(Ok(artifact))) => {
                breaker.record_success();
                let duration_ms = start.elapsed().as_millis() as u64;
                debug!(agent = %agent_id, stage = %stage, duration_ms, "Handler succeeded");
                AgentResult::succeeded(&agent_id, stage, artifact, duration_ms)
            }
        }
    };

    metrics.record_outcome(&agent_id, stage, result.status);
    result
}
