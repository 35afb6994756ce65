use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::Deserialize;
use tracing::info;

use crate::agents::{builtin, AgentExecutorService, AgentRegistry};
use crate::config::{parse_config, OutriderConfig};
use crate::errors::OutriderError;
use crate::metrics::ExecutionMetrics;
use crate::pipeline::{AnswerPipeline, ExtractiveGenerator, InMemoryRetriever};
use super::commands::AskArgs;

#[derive(Debug, Deserialize)]
struct CorpusEntry {
    id: String,
    text: String,
    source: Option<String>,
    collection: Option<String>,
}

pub async fn handle_ask(args: AskArgs) -> Result<(), OutriderError> {
    let config = match &args.config {
        Some(path) => parse_config(Path::new(path)).await?,
        None => OutriderConfig::default(),
    };

    let registry = Arc::new(build_registry(&config)?);
    let retriever = Arc::new(load_corpus(args.corpus.as_deref()).await?);
    info!(passages = retriever.len(), "Corpus loaded");

    let metrics = Arc::new(ExecutionMetrics::new());
    let executor = Arc::new(AgentExecutorService::new(
        registry,
        config.executor_config(),
        metrics.clone(),
    ));
    let pipeline = AnswerPipeline::new(
        config.pipeline_config(),
        retriever,
        Arc::new(ExtractiveGenerator::default()),
        executor,
    );

    let report = pipeline.answer(&args.query).await?;

    println!("{}", report.answer);
    println!();
    for stage in &report.stages {
        for result in &stage.results {
            println!(
                "  [{}] {} - {} ({}ms)",
                stage.stage, result.agent_id, result.status, result.duration_ms
            );
        }
    }

    if let Some(path) = &args.metrics_out {
        metrics.write_snapshot(&PathBuf::from(path)).await?;
        info!(path = %path, "Metrics snapshot written");
    }

    Ok(())
}

/// Build the registry from the config roster, or every builtin at its home
/// stage when the config lists none.
fn build_registry(config: &OutriderConfig) -> Result<AgentRegistry, OutriderError> {
    let mut registry = AgentRegistry::new();
    match &config.agents {
        Some(entries) => {
            for entry in entries {
                let handler = builtin::handler_by_name(&entry.name).ok_or_else(|| {
                    OutriderError::Config(format!("Unknown agent '{}'", entry.name))
                })?;
                registry.register(entry.stage, &entry.name, handler)?;
            }
        }
        None => {
            for (name, stage) in builtin::builtin_roster() {
                let handler = builtin::handler_by_name(name)
                    .ok_or_else(|| OutriderError::Internal(format!("missing builtin '{}'", name)))?;
                registry.register(*stage, name, handler)?;
            }
        }
    }
    Ok(registry)
}

async fn load_corpus(path: Option<&str>) -> Result<InMemoryRetriever, OutriderError> {
    let mut retriever = InMemoryRetriever::new();
    match path {
        Some(path) => {
            let content = tokio::fs::read_to_string(path).await?;
            let entries: Vec<CorpusEntry> = serde_yaml::from_str(&content)?;
            if entries.is_empty() {
                return Err(OutriderError::Retrieval(format!("Corpus '{}' is empty", path)));
            }
            for entry in entries {
                retriever.add(
                    &entry.id,
                    &entry.text,
                    entry.source.as_deref(),
                    entry.collection.as_deref(),
                );
            }
        }
        None => {
            for (id, text) in DEMO_CORPUS {
                retriever.add(id, text, Some("demo"), None);
            }
        }
    }
    Ok(retriever)
}

const DEMO_CORPUS: &[(&str, &str)] = &[
    (
        "ownership",
        "Ownership in Rust means every value has a single owner, and the value is dropped when the owner goes out of scope.",
    ),
    (
        "borrowing",
        "Borrowing lets code reference a value without taking ownership, checked at compile time by the borrow checker.",
    ),
    (
        "lifetimes",
        "Lifetimes describe how long references are valid so the compiler can reject dangling references.",
    ),
    (
        "concurrency",
        "Rust prevents data races at compile time because shared mutable state requires explicit synchronization types.",
    ),
    (
        "cargo",
        "Cargo builds packages, resolves dependencies, and runs tests for Rust projects.",
    ),
];
