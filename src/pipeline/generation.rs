use async_trait::async_trait;

use crate::errors::OutriderError;
use crate::models::RetrievedPassage;

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        query: &str,
        passages: &[RetrievedPassage],
    ) -> Result<String, OutriderError>;
}

/// Builds the answer from the highest-scoring passages verbatim.
/// Deterministic stand-in for a model-backed generator.
pub struct ExtractiveGenerator {
    pub max_passages: usize,
}

impl Default for ExtractiveGenerator {
    fn default() -> Self {
        Self { max_passages: 2 }
    }
}

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    async fn generate(
        &self,
        _query: &str,
        passages: &[RetrievedPassage],
    ) -> Result<String, OutriderError> {
        if passages.is_empty() {
            return Ok("No supporting passages were found for this query.".to_string());
        }
        let answer = passages
            .iter()
            .take(self.max_passages)
            .map(|p| p.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, text: &str, score: f32) -> RetrievedPassage {
        RetrievedPassage {
            id: id.to_string(),
            text: text.to_string(),
            score,
            source: None,
        }
    }

    #[tokio::test]
    async fn test_joins_top_passages() {
        let generator = ExtractiveGenerator::default();
        let passages = vec![
            passage("a", "First fact.", 0.9),
            passage("b", "Second fact.", 0.5),
            passage("c", "Third fact.", 0.1),
        ];
        let answer = generator.generate("q", &passages).await.unwrap();
        assert_eq!(answer, "First fact. Second fact.");
    }

    #[tokio::test]
    async fn test_empty_retrieval_yields_fallback() {
        let generator = ExtractiveGenerator::default();
        let answer = generator.generate("q", &[]).await.unwrap();
        assert!(answer.contains("No supporting passages"));
    }
}
