use std::path::PathBuf;

use crate::config::parse_config;
use crate::errors::OutriderError;
use super::commands::ValidateArgs;

pub async fn handle_validate(args: ValidateArgs) -> Result<(), OutriderError> {
    let path = PathBuf::from(&args.config);
    let config = parse_config(&path).await?;
    let agent_count = config.agents.as_ref().map(Vec::len).unwrap_or(0);
    println!("Configuration is valid: {} ({} agents)", args.config, agent_count);
    Ok(())
}
