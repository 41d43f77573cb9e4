//! Error handling utilities

use crate::error::{describe_error_code, FlowError};
use tracing::error;

/// Handle fatal errors and exit with appropriate status code
///
/// `FlowError`s print their user message, plus the full cause chain when
/// `verbose >= 1`. Anything else exits with status 1.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);

    let exit_code = if let Some(flow_err) = error.downcast_ref::<FlowError>() {
        eprintln!("{}", flow_err.user_message());

        if verbose >= 1 {
            eprintln!(
                "\n[E{:04}] {}\nContext Chain:\n{}",
                flow_err.code(),
                describe_error_code(flow_err.code()),
                flow_err.developer_message()
            );
        }

        flow_err.exit_code()
    } else {
        eprintln!("Error: {error}");

        if verbose >= 1 {
            eprintln!("\nError chain:");
            for (i, cause) in error.chain().enumerate() {
                eprintln!("  {}: {}", i, cause);
            }
        }

        1
    };

    std::process::exit(exit_code)
}
