use super::PipelineConfig;
use crate::error::{ErrorCode, FlowError, Result};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Load a TOML configuration file
pub async fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        return Err(FlowError::config_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!("Configuration file not found: {}", path.display()),
            None,
        ));
    }

    let content = fs::read_to_string(path).await.map_err(|e| {
        FlowError::config(format!("cannot read {}", path.display())).with_source(e)
    })?;
    let config: PipelineConfig =
        toml::from_str(&content).map_err(|e| FlowError::from(e).with_context(path.display()))?;

    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Load the given file, or start from defaults when none is given
pub async fn load_config_or_default(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => load_config(path).await,
        None => Ok(PipelineConfig::default()),
    }
}

/// Default configuration rendered as TOML, used by `init-config`
pub fn render_default_config() -> Result<String> {
    toml::to_string_pretty(&PipelineConfig::default()).map_err(|e| {
        FlowError::config("cannot render default configuration").with_source(e)
    })
}
