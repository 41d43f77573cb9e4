//! Command routing and execution

use crate::app::AppConfig;
use crate::cli::args::Commands;
use crate::cli::commands::*;
use anyhow::Result;

/// Execute a CLI command based on the parsed arguments
pub async fn execute_command(command: Commands, app: &AppConfig) -> Result<()> {
    match command {
        Commands::Run(args) => run_pipeline(args, app).await,
        Commands::Normalize { values, key_width } => run_normalize(&values, key_width),
        Commands::InitConfig { path, force } => run_init_config(&path, force).await,
    }
}
