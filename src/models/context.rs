use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Named checkpoint in the answer pipeline where agents may run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AgentStage {
    PreRetrieval,
    PostRetrieval,
    PreGeneration,
    PostGeneration,
}

impl AgentStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreRetrieval => "pre-retrieval",
            Self::PostRetrieval => "post-retrieval",
            Self::PreGeneration => "pre-generation",
            Self::PostGeneration => "post-generation",
        }
    }

    /// All stages in pipeline order.
    pub fn ordered() -> &'static [AgentStage] {
        &[
            Self::PreRetrieval,
            Self::PostRetrieval,
            Self::PreGeneration,
            Self::PostGeneration,
        ]
    }
}

impl std::fmt::Display for AgentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub source: Option<String>,
}

/// Read-only snapshot of pipeline state handed to agents at one stage.
///
/// A fresh context is built for every stage invocation; handlers receive it
/// behind a shared reference and must never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub stage: AgentStage,
    pub run_id: Uuid,
    pub query: String,
    pub passages: Vec<RetrievedPassage>,
    pub partial_answer: Option<String>,
    pub collection: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AgentContext {
    pub fn new(stage: AgentStage, run_id: Uuid, query: &str) -> Self {
        Self {
            stage,
            run_id,
            query: query.to_string(),
            passages: Vec::new(),
            partial_answer: None,
            collection: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_passages(mut self, passages: Vec<RetrievedPassage>) -> Self {
        self.passages = passages;
        self
    }

    pub fn with_partial_answer(mut self, answer: &str) -> Self {
        self.partial_answer = Some(answer.to_string());
        self
    }

    pub fn with_collection(mut self, collection: &str) -> Self {
        self.collection = Some(collection.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_is_kebab_case() {
        assert_eq!(AgentStage::PreRetrieval.to_string(), "pre-retrieval");
        assert_eq!(AgentStage::PostGeneration.to_string(), "post-generation");
    }

    #[test]
    fn test_ordered_covers_all_stages() {
        let stages = AgentStage::ordered();
        assert_eq!(stages.len(), 4);
        assert_eq!(stages[0], AgentStage::PreRetrieval);
        assert_eq!(stages[3], AgentStage::PostGeneration);
    }

    #[test]
    fn test_context_builder() {
        let run_id = Uuid::new_v4();
        let ctx = AgentContext::new(AgentStage::PostRetrieval, run_id, "what is rust")
            .with_collection("docs")
            .with_partial_answer("a language");
        assert_eq!(ctx.run_id, run_id);
        assert_eq!(ctx.collection.as_deref(), Some("docs"));
        assert_eq!(ctx.partial_answer.as_deref(), Some("a language"));
        assert!(ctx.passages.is_empty());
    }
}
