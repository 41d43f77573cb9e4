use clap::Parser;
use lodes_flow::app::{handle_fatal_error, init_logging, AppConfig};
use lodes_flow::cli::{execute_command, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let app = AppConfig::new(cli.verbose).with_quiet(cli.quiet);

    init_logging(&app);

    if let Err(e) = execute_command(cli.command, &app).await {
        handle_fatal_error(e, app.verbose);
    }
}
