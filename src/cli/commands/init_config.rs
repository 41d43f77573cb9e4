use crate::config::loader::render_default_config;
use crate::error::{ErrorCode, FlowError};
use anyhow::Result;
use std::path::Path;

pub async fn run_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(FlowError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            format!("{} already exists (use --force to overwrite)", path.display()),
            None,
        )
        .into());
    }

    let rendered = render_default_config()?;
    tokio::fs::write(path, rendered).await.map_err(|e| {
        FlowError::output_with_code(
            ErrorCode::OUTPUT_WRITE_FAILED,
            "cannot write configuration file",
            Some(path.to_path_buf()),
        )
        .with_source(e)
    })?;

    println!("✓ Wrote default configuration to {}", path.display());
    Ok(())
}
