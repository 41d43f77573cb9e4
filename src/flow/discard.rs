//! Per-row failures and the discard tally
//!
//! A row that cannot be turned into a [`super::FlowRecord`] is skipped, never
//! merged into a category. Every skipped row is counted by kind; only the
//! first few are logged individually.

use super::identifier::IdentifierError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Default number of discards logged at warn level before going quiet
pub const DEFAULT_MAX_LOGGED_DISCARDS: usize = 20;

/// Recoverable, row-level parse failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("row {row}: column '{column}': {source}")]
    Identifier {
        row: u64,
        column: String,
        #[source]
        source: IdentifierError,
    },

    #[error("row {row}: measure '{value}' in column '{column}' is not a non-negative integer")]
    InvalidMeasure {
        row: u64,
        column: String,
        value: String,
    },

    #[error("row {row}: missing field for column '{column}'")]
    MissingField { row: u64, column: String },

    #[error("row {row}: malformed CSV record: {message}")]
    MalformedCsv { row: u64, message: String },
}

impl RowError {
    pub fn row(&self) -> u64 {
        match self {
            Self::Identifier { row, .. }
            | Self::InvalidMeasure { row, .. }
            | Self::MissingField { row, .. }
            | Self::MalformedCsv { row, .. } => *row,
        }
    }

    pub fn kind(&self) -> DiscardKind {
        match self {
            Self::Identifier { source, .. } if source.is_precision() => {
                DiscardKind::IdentifierPrecision
            }
            Self::Identifier { .. } => DiscardKind::UnparseableIdentifier,
            Self::InvalidMeasure { .. } => DiscardKind::InvalidMeasure,
            Self::MissingField { .. } => DiscardKind::MissingField,
            Self::MalformedCsv { .. } => DiscardKind::MalformedCsv,
        }
    }
}

/// Discard buckets reported at the end of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardKind {
    UnparseableIdentifier,
    IdentifierPrecision,
    InvalidMeasure,
    MissingField,
    MalformedCsv,
}

impl DiscardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscardKind::UnparseableIdentifier => "unparseable_identifier",
            DiscardKind::IdentifierPrecision => "identifier_precision",
            DiscardKind::InvalidMeasure => "invalid_measure",
            DiscardKind::MissingField => "missing_field",
            DiscardKind::MalformedCsv => "malformed_csv",
        }
    }
}

impl fmt::Display for DiscardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count of discarded rows per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardTally {
    counts: BTreeMap<DiscardKind, u64>,
}

impl DiscardTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: &RowError) {
        *self.counts.entry(error.kind()).or_insert(0) += 1;
    }

    pub fn get(&self, kind: DiscardKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Non-zero buckets in a stable order
    pub fn iter(&self) -> impl Iterator<Item = (DiscardKind, u64)> + '_ {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(kind, count)| (*kind, *count))
    }
}

/// Rate-limited logging of individual discards
#[derive(Debug, Clone)]
pub struct DiscardLogger {
    limit: usize,
    logged: usize,
}

impl DiscardLogger {
    pub fn new(limit: usize) -> Self {
        Self { limit, logged: 0 }
    }

    pub fn observe(&mut self, error: &RowError) {
        if self.logged < self.limit {
            self.logged += 1;
            warn!("Skipping {}", error);
            if self.logged == self.limit {
                warn!(
                    "Logged {} discarded rows; further discards are counted and logged at debug level",
                    self.limit
                );
            }
        } else {
            debug!("Skipping {}", error);
        }
    }
}

impl Default for DiscardLogger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOGGED_DISCARDS)
    }
}
