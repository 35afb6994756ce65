use async_trait::async_trait;

use crate::errors::OutriderError;
use crate::models::RetrievedPassage;

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        collection: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, OutriderError>;
}

#[derive(Debug, Clone)]
struct StoredPassage {
    id: String,
    text: String,
    source: Option<String>,
    collection: Option<String>,
}

/// Term-overlap retriever over an in-memory corpus. Deterministic, no I/O.
#[derive(Default)]
pub struct InMemoryRetriever {
    passages: Vec<StoredPassage>,
}

impl InMemoryRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: &str, text: &str, source: Option<&str>, collection: Option<&str>) {
        self.passages.push(StoredPassage {
            id: id.to_string(),
            text: text.to_string(),
            source: source.map(str::to_string),
            collection: collection.map(str::to_string),
        });
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    fn score(query_terms: &[String], text: &str) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let text_lower = text.to_lowercase();
        let hits = query_terms
            .iter()
            .filter(|term| text_lower.contains(term.as_str()))
            .count();
        hits as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn retrieve(
        &self,
        query: &str,
        collection: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, OutriderError> {
        let query_terms: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
            .map(|w| w.to_lowercase())
            .collect();

        let mut scored: Vec<RetrievedPassage> = self
            .passages
            .iter()
            .filter(|p| match collection {
                Some(c) => p.collection.as_deref() == Some(c),
                None => true,
            })
            .map(|p| RetrievedPassage {
                id: p.id.clone(),
                text: p.text.clone(),
                score: Self::score(&query_terms, &p.text),
                source: p.source.clone(),
            })
            .filter(|p| p.score > 0.0)
            .collect();

        // Ties broken by id so ordering stays stable.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}
