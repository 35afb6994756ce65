use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;
use chrono::Utc;

use crate::agents::AgentExecutorService;
use crate::errors::OutriderError;
use crate::models::{AgentContext, AgentStage};
use super::generation::AnswerGenerator;
use super::retrieval::Retriever;
use super::state::{PipelineConfig, RunReport, StageReport};

/// Retrieval-then-generation pipeline with agent checkpoints at every stage.
///
/// Agent outcomes are collected into the run report but never decide the
/// run's fate: the pipeline fails only on its own retrieval/generation
/// errors or on cancellation.
pub struct AnswerPipeline {
    config: PipelineConfig,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn AnswerGenerator>,
    executor: Arc<AgentExecutorService>,
    cancel_token: CancellationToken,
}

impl AnswerPipeline {
    pub fn new(
        config: PipelineConfig,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn AnswerGenerator>,
        executor: Arc<AgentExecutorService>,
    ) -> Self {
        Self {
            config,
            retriever,
            generator,
            executor,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Replace the pipeline's cancel token with an external one so the caller
    /// can stop an in-flight run.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub async fn answer(&self, query: &str) -> Result<RunReport, OutriderError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(run_id = %run_id, query = %query, "Pipeline run started");

        let mut stages: Vec<StageReport> = Vec::with_capacity(4);

        self.check_cancelled()?;
        let context = self.base_context(AgentStage::PreRetrieval, run_id, query);
        self.run_agents(AgentStage::PreRetrieval, context, &mut stages)
            .await;

        self.check_cancelled()?;
        let passages = self
            .retriever
            .retrieve(query, self.config.collection.as_deref(), self.config.top_k)
            .await?;
        info!(run_id = %run_id, passages = passages.len(), "Retrieval complete");

        let context = self
            .base_context(AgentStage::PostRetrieval, run_id, query)
            .with_passages(passages.clone());
        self.run_agents(AgentStage::PostRetrieval, context, &mut stages)
            .await;

        self.check_cancelled()?;
        let context = self
            .base_context(AgentStage::PreGeneration, run_id, query)
            .with_passages(passages.clone());
        self.run_agents(AgentStage::PreGeneration, context, &mut stages)
            .await;

        self.check_cancelled()?;
        let answer = self.generator.generate(query, &passages).await?;
        info!(run_id = %run_id, answer_len = answer.len(), "Generation complete");

        let context = self
            .base_context(AgentStage::PostGeneration, run_id, query)
            .with_passages(passages)
            .with_partial_answer(&answer);
        self.run_agents(AgentStage::PostGeneration, context, &mut stages)
            .await;

        let report = RunReport {
            run_id,
            query: query.to_string(),
            answer,
            stages,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            run_id = %run_id,
            duration_ms = report.duration_ms,
            artifacts = report.artifact_count(),
            failed_agents = report.failed_agent_count(),
            "Pipeline run completed"
        );
        Ok(report)
    }

    fn base_context(&self, stage: AgentStage, run_id: Uuid, query: &str) -> AgentContext {
        let context = AgentContext::new(stage, run_id, query);
        match &self.config.collection {
            Some(collection) => context.with_collection(collection),
            None => context,
        }
    }

    async fn run_agents(
        &self,
        stage: AgentStage,
        context: AgentContext,
        stages: &mut Vec<StageReport>,
    ) {
        let results = self
            .executor
            .run_stage(stage, Arc::new(context), &self.cancel_token)
            .await;
        for result in results.iter().filter(|r| !r.is_success()) {
            warn!(
                agent = %result.agent_id,
                stage = %stage,
                status = %result.status,
                "Agent did not produce an artifact"
            );
        }
        stages.push(StageReport { stage, results });
    }

    fn check_cancelled(&self) -> Result<(), OutriderError> {
        if self.cancel_token.is_cancelled() {
            info!("Pipeline run cancelled");
            Err(OutriderError::Cancelled("pipeline run cancelled".into()))
        } else {
            Ok(())
        }
    }
}
