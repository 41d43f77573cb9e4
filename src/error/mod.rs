use std::fmt::Display;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Fatal errors that abort a lodes-flow run
///
/// Per-row problems are not represented here; they are counted as discards
/// (see [`crate::flow::RowError`]) and never halt the pipeline.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        field: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Flow source error: {message}")]
    Source {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        row: Option<u64>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Study area error: {message}")]
    Membership {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Output error: {message}")]
    Output {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Contract violation: {message}")]
    Contract {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl FlowError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message, None)
    }

    /// Create a configuration error with specific code and field
    pub fn config_with_code(code: u16, message: impl Into<String>, field: Option<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            field,
            source: None,
        }
    }

    /// Create a flow source error with specific code
    pub fn source_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Source {
            code,
            message: message.into(),
            path,
            row: None,
            source: None,
        }
    }

    /// The flow source could not be opened, decompressed or read
    pub fn source_unreadable(path: Option<&Path>, message: impl Into<String>) -> Self {
        Self::source_with_code(
            ErrorCode::SOURCE_UNREADABLE,
            message,
            path.map(Path::to_path_buf),
        )
    }

    /// A mapped column is absent from the flow source header
    pub fn missing_column(column: &str, available: &[String], path: Option<&Path>) -> Self {
        Self::source_with_code(
            ErrorCode::SOURCE_MISSING_COLUMN,
            format!(
                "column '{}' not found in header (available: {})",
                column,
                available.join(", ")
            ),
            path.map(Path::to_path_buf),
        )
    }

    /// Create a membership error with specific code
    pub fn membership_with_code(
        code: u16,
        message: impl Into<String>,
        path: Option<PathBuf>,
    ) -> Self {
        Self::Membership {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// The study area resolved to zero location identifiers
    pub fn empty_membership() -> Self {
        Self::membership_with_code(
            ErrorCode::MEMBERSHIP_EMPTY,
            "study area contains no location identifiers",
            None,
        )
    }

    /// Create an output error with specific code and path
    pub fn output_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Output {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Create a contract violation with specific code
    pub fn contract(code: u16, message: impl Into<String>) -> Self {
        Self::Contract {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Source { source: src, .. }
            | Self::Membership { source: src, .. }
            | Self::Output { source: src, .. }
            | Self::Contract { source: src, .. } => {
                *src = Some(source.into());
            }
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::Source { message, .. }
            | Self::Membership { message, .. }
            | Self::Output { message, .. }
            | Self::Contract { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
        }
        self
    }

    /// Attach the 1-based data row where a source error surfaced
    pub fn at_row(mut self, at: u64) -> Self {
        if let Self::Source { row, .. } = &mut self {
            *row = Some(at);
        }
        self
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Source { .. } => 3,
            Self::Membership { .. } => 4,
            Self::Output { .. } => 5,
            Self::Contract { .. } => 6,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Source { code, .. }
            | Self::Membership { code, .. }
            | Self::Output { code, .. }
            | Self::Contract { code, .. } => *code,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, field, .. } => match field {
                Some(f) => format!("Configuration problem with '{}': {}", f, message),
                None => format!("Configuration problem: {}", message),
            },
            Self::Source {
                message, path, row, ..
            } => {
                let mut msg = String::from("Flow source error");
                if let Some(p) = path {
                    msg.push_str(&format!(" in {}", p.display()));
                }
                if let Some(r) = row {
                    msg.push_str(&format!(" at row {}", r));
                }
                format!("{}: {}", msg, message)
            }
            Self::Membership { message, path, .. } => match path {
                Some(p) => format!("Study area error in {}: {}", p.display(), message),
                None => format!("Study area error: {}", message),
            },
            Self::Output { message, path, .. } => match path {
                Some(p) => format!("Failed to write {}: {}", p.display(), message),
                None => format!("Output error: {}", message),
            },
            Self::Contract { message, .. } => format!("Internal error: {}", message),
        }
    }

    /// Get a developer-friendly error message with full chain
    pub fn developer_message(&self) -> String {
        let mut msg = self.to_string();
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            msg.push_str(&format!("\n  caused by: {}", cause));
            current = std::error::Error::source(cause);
        }
        msg
    }
}

/// Type alias for Results using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;

impl From<csv::Error> for FlowError {
    fn from(err: csv::Error) -> Self {
        FlowError::output_with_code(ErrorCode::OUTPUT_WRITE_FAILED, "CSV write failed", None)
            .with_source(err)
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::output_with_code(
            ErrorCode::OUTPUT_SERIALIZATION,
            "JSON serialization failed",
            None,
        )
        .with_source(err)
    }
}

impl From<toml::de::Error> for FlowError {
    fn from(err: toml::de::Error) -> Self {
        FlowError::config_with_code(ErrorCode::CONFIG_INVALID_TOML, "Invalid TOML syntax", None)
            .with_source(err)
    }
}
