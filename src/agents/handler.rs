use async_trait::async_trait;
use crate::errors::OutriderError;
use crate::models::{AgentArtifact, AgentContext};

/// Capability every registered agent implements.
///
/// Handlers must finish within the caller-imposed deadline, must not mutate
/// the context, and signal failure only through the error channel. Retries
/// and circuit logic are the executor's job, never the handler's.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    async fn execute(&self, context: &AgentContext) -> Result<AgentArtifact, OutriderError>;
}
