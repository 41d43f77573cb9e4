//! Origin-destination flow classification core
//!
//! Everything in here is synchronous and free of global state; the
//! [`crate::pipeline`] module decides how rows are scheduled.

pub mod aggregate;
pub mod classify;
pub mod discard;
pub mod identifier;
pub mod membership;
pub mod record;
pub mod source;

pub use aggregate::{
    Aggregator, CategoryCounts, CategoryTotals, PartialSummaries, StatTable, SummaryEntry,
    SummarySet, SummaryTable,
};
pub use classify::{Category, Classification, FlowClassifier};
pub use discard::{DiscardKind, DiscardLogger, DiscardTally, RowError, DEFAULT_MAX_LOGGED_DISCARDS};
pub use identifier::{
    IdentifierError, IdentifierNormalizer, KeyFormat, LocationId, IDENTIFIER_EPSILON,
    MAX_EXACT_FLOAT_ID,
};
pub use membership::{BlockListFile, MembershipSet, StudyAreaSelector};
pub use record::{Endpoint, FlowRecord};
pub use source::{parse_measure, ColumnIndices, FlowSource, SourceRow};
