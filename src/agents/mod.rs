pub mod breaker;
pub mod builtin;
pub mod executor;
pub mod handler;
pub mod registry;

pub use breaker::{BreakerConfig, BreakerRegistry, CircuitBreaker, CircuitState};
pub use executor::{AgentExecutorService, ExecutorConfig};
pub use handler::AgentHandler;
pub use registry::{AgentRegistration, AgentRegistry};
