use std::collections::HashSet;
use std::path::Path;

use crate::agents::{builtin, AgentExecutorService};
use crate::errors::OutriderError;
use super::types::OutriderConfig;

pub async fn parse_config(path: &Path) -> Result<OutriderConfig, OutriderError> {
    if !path.exists() {
        return Err(OutriderError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(OutriderError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: OutriderConfig = serde_yaml::from_str(&content)?;

    validate_conflicts(&config)?;

    Ok(config)
}

/// Detect semantic problems serde's typed parse cannot catch.
fn validate_conflicts(config: &OutriderConfig) -> Result<(), OutriderError> {
    AgentExecutorService::validate_config(&config.executor_config())?;

    if let Some(agents) = &config.agents {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for entry in agents {
            if builtin::handler_by_name(&entry.name).is_none() {
                return Err(OutriderError::Config(format!(
                    "Unknown agent '{}'; known agents: {}",
                    entry.name,
                    builtin::builtin_roster()
                        .iter()
                        .map(|(name, _)| *name)
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }
            let key = (entry.name.clone(), entry.stage.to_string());
            if !seen.insert(key) {
                return Err(OutriderError::Config(format!(
                    "Agent '{}' listed twice for stage '{}'",
                    entry.name, entry.stage
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    async fn parse(yaml: &str) -> Result<OutriderConfig, OutriderError> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        parse_config(file.path()).await
    }

    #[tokio::test]
    async fn test_parses_full_config() {
        let config = parse(
            r#"
executor:
  handler_timeout_ms: 500
  max_in_flight: 4
breaker:
  failure_threshold: 2
  recovery_timeout_ms: 5000
  half_open_trial_limit: 1
retrieval:
  top_k: 5
  collection: docs
agents:
  - name: passage-scorer
    stage: post-retrieval
  - name: answer-validator
    stage: post-generation
"#,
        )
        .await
        .unwrap();

        let executor = config.executor_config();
        assert_eq!(executor.handler_timeout.as_millis(), 500);
        assert_eq!(executor.max_in_flight, 4);
        assert_eq!(executor.breaker.failure_threshold, 2);
        assert_eq!(config.pipeline_config().top_k, 5);
        assert_eq!(config.agents.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_config_gets_defaults() {
        let config = parse("{}").await.unwrap();
        let executor = config.executor_config();
        assert!(executor.handler_timeout.as_millis() > 0);
        assert!(executor.max_in_flight > 0);
        assert!(executor.breaker.failure_threshold > 0);
    }

    #[tokio::test]
    async fn test_unknown_agent_rejected() {
        let err = parse(
            r#"
agents:
  - name: no-such-agent
    stage: post-retrieval
"#,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OutriderError::Config(_)));
        assert!(err.to_string().contains("no-such-agent"));
    }

    #[tokio::test]
    async fn test_duplicate_agent_stage_rejected() {
        let err = parse(
            r#"
agents:
  - name: passage-scorer
    stage: post-retrieval
  - name: passage-scorer
    stage: post-retrieval
"#,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OutriderError::Config(_)));
    }

    #[tokio::test]
    async fn test_zero_threshold_rejected() {
        let err = parse(
            r#"
breaker:
  failure_threshold: 0
"#,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OutriderError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let err = parse_config(Path::new("/nonexistent/outrider.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, OutriderError::Config(_)));
    }
}
