use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use outrider::agents::{
    builtin, AgentExecutorService, AgentHandler, AgentRegistry, BreakerConfig, ExecutorConfig,
};
use outrider::errors::OutriderError;
use outrider::metrics::ExecutionMetrics;
use outrider::models::{AgentArtifact, AgentContext, AgentExecutionStatus, AgentStage};
use outrider::pipeline::{
    AnswerPipeline, ExtractiveGenerator, InMemoryRetriever, PipelineConfig,
};

struct BrokenAgent;

#[async_trait]
impl AgentHandler for BrokenAgent {
    async fn execute(&self, _context: &AgentContext) -> Result<AgentArtifact, OutriderError> {
        Err(OutriderError::Handler("always broken".into()))
    }
}

fn corpus() -> InMemoryRetriever {
    let mut retriever = InMemoryRetriever::new();
    retriever.add(
        "ownership",
        "Ownership means every value has a single owner responsible for cleanup.",
        Some("book"),
        None,
    );
    retriever.add(
        "borrowing",
        "Borrowing references a value without taking ownership of it.",
        Some("book"),
        None,
    );
    retriever.add(
        "async",
        "Async tasks are scheduled cooperatively by the runtime.",
        Some("book"),
        None,
    );
    retriever
}

fn default_registry() -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    for (name, stage) in builtin::builtin_roster() {
        registry
            .register(*stage, name, builtin::handler_by_name(name).unwrap())
            .unwrap();
    }
    registry
}

fn pipeline(registry: AgentRegistry) -> AnswerPipeline {
    let executor = Arc::new(AgentExecutorService::new(
        Arc::new(registry),
        ExecutorConfig {
            handler_timeout: Duration::from_secs(1),
            max_in_flight: 4,
            breaker: BreakerConfig::default(),
        },
        Arc::new(ExecutionMetrics::new()),
    ));
    AnswerPipeline::new(
        PipelineConfig::default(),
        Arc::new(corpus()),
        Arc::new(ExtractiveGenerator::default()),
        executor,
    )
}

#[tokio::test]
async fn test_end_to_end_run_with_builtin_agents() {
    let report = pipeline(default_registry())
        .answer("how does ownership work")
        .await
        .unwrap();

    assert!(report.answer.to_lowercase().contains("ownership"));
    assert_eq!(report.stages.len(), 4);
    assert_eq!(report.artifact_count(), 3);
    assert_eq!(report.failed_agent_count(), 0);

    let validator_results = report.results_for(AgentStage::PostGeneration);
    assert_eq!(validator_results.len(), 1);
    assert_eq!(validator_results[0].status, AgentExecutionStatus::Succeeded);
    let payload = &validator_results[0].artifact.as_ref().unwrap().payload;
    assert_eq!(payload["valid"], true);
}

#[tokio::test]
async fn test_agent_failure_never_fails_the_run() {
    let mut registry = default_registry();
    registry
        .register(AgentStage::PostRetrieval, "broken", Arc::new(BrokenAgent))
        .unwrap();

    let report = pipeline(registry)
        .answer("how does ownership work")
        .await
        .unwrap();

    assert!(!report.answer.is_empty());
    assert_eq!(report.failed_agent_count(), 1);

    let results = report.results_for(AgentStage::PostRetrieval);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].agent_id, builtin::PASSAGE_SCORER);
    assert_eq!(results[0].status, AgentExecutionStatus::Succeeded);
    assert_eq!(results[1].agent_id, "broken");
    assert_eq!(results[1].status, AgentExecutionStatus::Failed);
}

#[tokio::test]
async fn test_no_agents_still_answers() {
    let report = pipeline(AgentRegistry::new())
        .answer("how does borrowing work")
        .await
        .unwrap();

    assert!(!report.answer.is_empty());
    assert!(report.stages.iter().all(|s| s.results.is_empty()));
}

#[tokio::test]
async fn test_unmatched_query_gets_fallback_answer() {
    let report = pipeline(default_registry())
        .answer("completely unrelated topic zzz")
        .await
        .unwrap();

    assert!(report.answer.contains("No supporting passages"));
    // The validator flags the ungrounded answer rather than failing.
    let results = report.results_for(AgentStage::PostGeneration);
    let payload = &results[0].artifact.as_ref().unwrap().payload;
    assert_eq!(payload["valid"], false);
}

struct CancellingAgent {
    token: CancellationToken,
}

#[async_trait]
impl AgentHandler for CancellingAgent {
    async fn execute(&self, context: &AgentContext) -> Result<AgentArtifact, OutriderError> {
        self.token.cancel();
        Ok(AgentArtifact::new(
            "canceller",
            context.stage,
            serde_json::Value::Null,
        ))
    }
}

#[tokio::test]
async fn test_cancelled_token_aborts_the_run() {
    let token = CancellationToken::new();
    token.cancel();
    let err = pipeline(default_registry())
        .with_cancel_token(token)
        .answer("how does ownership work")
        .await
        .unwrap_err();
    assert!(matches!(err, OutriderError::Cancelled(_)));
}

#[tokio::test]
async fn test_cancellation_mid_run_stops_before_generation() {
    let token = CancellationToken::new();
    let mut registry = AgentRegistry::new();
    registry
        .register(
            AgentStage::PreGeneration,
            "canceller",
            Arc::new(CancellingAgent {
                token: token.clone(),
            }),
        )
        .unwrap();

    let err = pipeline(registry)
        .with_cancel_token(token)
        .answer("how does ownership work")
        .await
        .unwrap_err();
    assert!(matches!(err, OutriderError::Cancelled(_)));
}

#[tokio::test]
async fn test_run_report_serializes() {
    let report = pipeline(default_registry())
        .answer("how does ownership work")
        .await
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["query"], "how does ownership work");
    assert!(json["stages"].as_array().unwrap().len() == 4);
    assert_eq!(
        json["stages"][1]["results"][0]["status"],
        "succeeded"
    );
}
