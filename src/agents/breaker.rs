use std::sync::{Arc, Mutex};
use std::time::Duration;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::metrics::ExecutionMetrics;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub half_open_trial_limit: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            half_open_trial_limit: 1,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trials_in_flight: u32,
}

/// Per-agent failure/recovery state machine.
///
/// One instance per agent id, shared by every pipeline run that invokes the
/// agent. All mutation goes through the internal mutex so `allow_call` and
/// the record operations stay atomic under concurrent runs; the lock is
/// per-breaker, so bookkeeping for one agent never blocks checks for another.
pub struct CircuitBreaker {
    agent_id: String,
    config: BreakerConfig,
    state: Mutex<BreakerState>,
    metrics: Arc<ExecutionMetrics>,
}

impl CircuitBreaker {
    pub fn new(agent_id: &str, config: BreakerConfig, metrics: Arc<ExecutionMetrics>) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trials_in_flight: 0,
            }),
            metrics,
        }
    }

    /// Whether a real invocation may proceed right now.
    ///
    /// Open: returns true only once the recovery timeout has elapsed, which
    /// moves the breaker to half-open and claims the first trial slot.
    /// Half-open: true while fewer than `half_open_trial_limit` trials are
    /// outstanding.
    pub fn allow_call(&self) -> bool {
        let mut guard = self.lock();
        match guard.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let waited = guard
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if waited >= self.config.recovery_timeout {
                    guard.state = CircuitState::HalfOpen;
                    guard.trials_in_flight = 1;
                    drop(guard);
                    self.metrics.record_transition(
                        &self.agent_id,
                        CircuitState::Open,
                        CircuitState::HalfOpen,
                    );
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if guard.trials_in_flight < self.config.half_open_trial_limit {
                    guard.trials_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut guard = self.lock();
        match guard.state {
            CircuitState::Closed => {
                guard.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                guard.state = CircuitState::Closed;
                guard.consecutive_failures = 0;
                guard.trials_in_flight = 0;
                guard.opened_at = None;
                drop(guard);
                self.metrics.record_transition(
                    &self.agent_id,
                    CircuitState::HalfOpen,
                    CircuitState::Closed,
                );
            }
            // A success landing while open means the call was admitted before
            // the breaker tripped; the recovery window stands.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut guard = self.lock();
        match guard.state {
            CircuitState::Closed => {
                guard.consecutive_failures += 1;
                if guard.consecutive_failures >= self.config.failure_threshold {
                    guard.state = CircuitState::Open;
                    guard.opened_at = Some(Instant::now());
                    drop(guard);
                    self.metrics.record_transition(
                        &self.agent_id,
                        CircuitState::Closed,
                        CircuitState::Open,
                    );
                }
            }
            CircuitState::HalfOpen => {
                guard.state = CircuitState::Open;
                guard.opened_at = Some(Instant::now());
                guard.trials_in_flight = 0;
                drop(guard);
                self.metrics.record_transition(
                    &self.agent_id,
                    CircuitState::HalfOpen,
                    CircuitState::Open,
                );
            }
            // Late failure from a call admitted before the trip restarts the
            // recovery window.
            CircuitState::Open => {
                guard.opened_at = Some(Instant::now());
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        // Poisoning means a panic while holding this short, allocation-free
        // critical section: a defect, not a recoverable condition.
        self.state.lock().expect("circuit breaker lock poisoned")
    }
}

/// Owns one breaker per agent id, created lazily on first use.
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    metrics: Arc<ExecutionMetrics>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig, metrics: Arc<ExecutionMetrics>) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
            metrics,
        }
    }

    pub fn breaker_for(&self, agent_id: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(agent_id.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    agent_id,
                    self.config.clone(),
                    self.metrics.clone(),
                ))
            })
            .clone()
    }

    /// State of an existing breaker, without creating one.
    pub fn state_of(&self, agent_id: &str) -> Option<CircuitState> {
        self.breakers.get(agent_id).map(|b| b.state())
    }
}
