use std::collections::BTreeSet;
use std::sync::Arc;
use async_trait::async_trait;

use crate::errors::OutriderError;
use crate::models::{AgentArtifact, AgentContext, AgentStage};
use super::handler::AgentHandler;

pub const QUERY_SUMMARIZER: &str = "query-summarizer";
pub const PASSAGE_SCORER: &str = "passage-scorer";
pub const ANSWER_VALIDATOR: &str = "answer-validator";

/// Builtin handler names and the stage each belongs to, in pipeline order.
pub fn builtin_roster() -> &'static [(&'static str, AgentStage)] {
    &[
        (QUERY_SUMMARIZER, AgentStage::PreRetrieval),
        (PASSAGE_SCORER, AgentStage::PostRetrieval),
        (ANSWER_VALIDATOR, AgentStage::PostGeneration),
    ]
}

/// Look up a builtin handler by config name.
pub fn handler_by_name(name: &str) -> Option<Arc<dyn AgentHandler>> {
    match name {
        QUERY_SUMMARIZER => Some(Arc::new(QuerySummarizer)),
        PASSAGE_SCORER => Some(Arc::new(PassageScorer::default())),
        ANSWER_VALIDATOR => Some(Arc::new(AnswerValidator)),
        _ => None,
    }
}

/// Extracts the distinct content keywords of the query before retrieval runs.
pub struct QuerySummarizer;

#[async_trait]
impl AgentHandler for QuerySummarizer {
    async fn execute(&self, context: &AgentContext) -> Result<AgentArtifact, OutriderError> {
        let keywords: BTreeSet<String> = context
            .query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .map(|w| w.to_lowercase())
            .collect();

        Ok(AgentArtifact::new(
            QUERY_SUMMARIZER,
            context.stage,
            serde_json::json!({
                "keywords": keywords,
                "query_length": context.query.len(),
            }),
        ))
    }
}

/// Scores the retrieved evidence and flags low-confidence retrievals.
pub struct PassageScorer {
    pub min_score: f32,
}

impl Default for PassageScorer {
    fn default() -> Self {
        Self { min_score: 0.25 }
    }
}

#[async_trait]
impl AgentHandler for PassageScorer {
    async fn execute(&self, context: &AgentContext) -> Result<AgentArtifact, OutriderError> {
        let count = context.passages.len();
        let max_score = context
            .passages
            .iter()
            .map(|p| p.score)
            .fold(0.0_f32, f32::max);
        let mean_score = if count == 0 {
            0.0
        } else {
            context.passages.iter().map(|p| p.score).sum::<f32>() / count as f32
        };

        Ok(AgentArtifact::new(
            PASSAGE_SCORER,
            context.stage,
            serde_json::json!({
                "passage_count": count,
                "max_score": max_score,
                "mean_score": mean_score,
                "low_evidence": count == 0 || max_score < self.min_score,
            }),
        ))
    }
}

/// Checks the generated answer against the evidence it was built from.
pub struct AnswerValidator;

#[async_trait]
impl AgentHandler for AnswerValidator {
    async fn execute(&self, context: &AgentContext) -> Result<AgentArtifact, OutriderError> {
        let mut problems: Vec<&str> = Vec::new();

        let answer = context.partial_answer.as_deref().unwrap_or("");
        if answer.trim().is_empty() {
            problems.push("answer is empty");
        }
        if context.passages.is_empty() {
            problems.push("answer has no supporting passages");
        } else {
            let answer_lower = answer.to_lowercase();
            let grounded = context.passages.iter().any(|p| {
                p.text
                    .to_lowercase()
                    .split_whitespace()
                    .filter(|w| w.len() > 4)
                    .any(|w| answer_lower.contains(w))
            });
            if !grounded {
                problems.push("answer shares no content terms with retrieved passages");
            }
        }

        Ok(AgentArtifact::new(
            ANSWER_VALIDATOR,
            context.stage,
            serde_json::json!({
                "valid": problems.is_empty(),
                "problems": problems,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use crate::models::RetrievedPassage;

    fn passage(id: &str, text: &str, score: f32) -> RetrievedPassage {
        RetrievedPassage {
            id: id.to_string(),
            text: text.to_string(),
            score,
            source: None,
        }
    }

    #[tokio::test]
    async fn test_summarizer_extracts_keywords() {
        let ctx = AgentContext::new(
            AgentStage::PreRetrieval,
            Uuid::new_v4(),
            "How does the borrow checker work?",
        );
        let artifact = QuerySummarizer.execute(&ctx).await.unwrap();
        let keywords = artifact.payload["keywords"].as_array().unwrap();
        let words: Vec<&str> = keywords.iter().filter_map(|v| v.as_str()).collect();
        assert!(words.contains(&"borrow"));
        assert!(words.contains(&"checker"));
        assert!(!words.contains(&"the"));
    }

    #[tokio::test]
    async fn test_scorer_flags_empty_retrieval() {
        let ctx = AgentContext::new(AgentStage::PostRetrieval, Uuid::new_v4(), "anything");
        let artifact = PassageScorer::default().execute(&ctx).await.unwrap();
        assert_eq!(artifact.payload["passage_count"], 0);
        assert_eq!(artifact.payload["low_evidence"], true);
    }

    #[tokio::test]
    async fn test_scorer_aggregates_scores() {
        let ctx = AgentContext::new(AgentStage::PostRetrieval, Uuid::new_v4(), "anything")
            .with_passages(vec![passage("a", "x", 0.8), passage("b", "y", 0.4)]);
        let artifact = PassageScorer::default().execute(&ctx).await.unwrap();
        assert_eq!(artifact.payload["passage_count"], 2);
        assert!((artifact.payload["max_score"].as_f64().unwrap() - 0.8).abs() < 1e-6);
        assert_eq!(artifact.payload["low_evidence"], false);
    }

    #[tokio::test]
    async fn test_validator_accepts_grounded_answer() {
        let ctx = AgentContext::new(AgentStage::PostGeneration, Uuid::new_v4(), "q")
            .with_passages(vec![passage("a", "ownership rules prevent data races", 0.9)])
            .with_partial_answer("Ownership rules prevent data races at compile time.");
        let artifact = AnswerValidator.execute(&ctx).await.unwrap();
        assert_eq!(artifact.payload["valid"], true);
    }

    #[tokio::test]
    async fn test_validator_rejects_empty_answer() {
        let ctx = AgentContext::new(AgentStage::PostGeneration, Uuid::new_v4(), "q")
            .with_partial_answer("   ");
        let artifact = AnswerValidator.execute(&ctx).await.unwrap();
        assert_eq!(artifact.payload["valid"], false);
    }

    #[test]
    fn test_roster_names_resolve() {
        for (name, _) in builtin_roster() {
            assert!(handler_by_name(name).is_some());
        }
        assert!(handler_by_name("nope").is_none());
    }
}
