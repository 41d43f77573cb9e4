//! Study area membership
//!
//! The spatial selection that decides which blocks fall inside the study area
//! happens outside this crate. Whatever performs it hands the resulting key
//! list over through [`StudyAreaSelector`]; the pipeline only ever sees the
//! frozen [`MembershipSet`].

use super::identifier::{IdentifierNormalizer, LocationId};
use super::source::open_decoded;
use crate::error::{ErrorCode, FlowError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Immutable set of study-area location identifiers
#[derive(Debug, Clone)]
pub struct MembershipSet {
    ids: HashSet<LocationId>,
}

impl MembershipSet {
    /// Build the set, dropping duplicates
    ///
    /// Fails with an empty-membership error when no identifier is supplied:
    /// every resident category would silently come out empty.
    pub fn new<I>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = LocationId>,
    {
        let ids: HashSet<LocationId> = ids.into_iter().collect();
        if ids.is_empty() {
            return Err(FlowError::empty_membership());
        }
        Ok(Self { ids })
    }

    /// Resolve membership through a selector
    pub fn from_selector(selector: &dyn StudyAreaSelector) -> Result<Self> {
        let ids = selector.select()?;
        let supplied = ids.len();
        let set = Self::new(ids).map_err(|e| e.with_context(selector.describe()))?;
        info!(
            "Study area resolved to {} blocks ({} supplied, {} duplicates)",
            set.len(),
            supplied,
            supplied - set.len()
        );
        Ok(set)
    }

    pub fn contains(&self, id: LocationId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Always false for a constructed set; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Supplies the identifiers of the blocks intersecting the study area
pub trait StudyAreaSelector {
    fn select(&self) -> Result<Vec<LocationId>>;

    /// Short description used in log lines and error context
    fn describe(&self) -> String;
}

impl StudyAreaSelector for Vec<LocationId> {
    fn select(&self) -> Result<Vec<LocationId>> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("{} in-memory identifiers", self.len())
    }
}

/// Block list exported from the spatial selection (one key per row)
///
/// Accepts a CSV whose header names the key column (`GEOID` by default,
/// matched case-insensitively) or a header-less single-column list.
/// Gzip-compressed files are read transparently.
#[derive(Debug, Clone)]
pub struct BlockListFile {
    path: PathBuf,
    column: String,
    normalizer: IdentifierNormalizer,
}

impl BlockListFile {
    pub fn new(path: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            column: column.into(),
            normalizer: IdentifierNormalizer::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unreadable(&self, message: impl Into<String>) -> FlowError {
        FlowError::membership_with_code(
            ErrorCode::MEMBERSHIP_UNREADABLE,
            message,
            Some(self.path.clone()),
        )
    }
}

impl StudyAreaSelector for BlockListFile {
    fn select(&self) -> Result<Vec<LocationId>> {
        let input = open_decoded(&self.path)
            .map_err(|e| self.unreadable("cannot open block list").with_source(e))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(input);

        let mut records = reader.records();
        let first = match records.next() {
            Some(record) => {
                record.map_err(|e| self.unreadable("cannot read block list").with_source(e))?
            }
            None => return Ok(Vec::new()),
        };

        let header_index = first
            .iter()
            .position(|field| field.trim().eq_ignore_ascii_case(&self.column));

        let (index, mut ids) = match header_index {
            Some(index) => (index, Vec::new()),
            None if first.len() == 1 => {
                // No header: the first line is already data.
                let id = self.normalizer.parse(&first[0]).map_err(|e| {
                    FlowError::membership_with_code(
                        ErrorCode::MEMBERSHIP_MISSING_COLUMN,
                        format!(
                            "column '{}' not found and first line is not an identifier",
                            self.column
                        ),
                        Some(self.path.clone()),
                    )
                    .with_source(e)
                })?;
                (0, vec![id])
            }
            None => {
                return Err(FlowError::membership_with_code(
                    ErrorCode::MEMBERSHIP_MISSING_COLUMN,
                    format!(
                        "column '{}' not found (available: {})",
                        self.column,
                        first.iter().collect::<Vec<_>>().join(", ")
                    ),
                    Some(self.path.clone()),
                ));
            }
        };

        for (line, record) in records.enumerate() {
            let record =
                record.map_err(|e| self.unreadable("cannot read block list").with_source(e))?;
            let raw = record.get(index).unwrap_or("");
            // Line numbers are 1-based and the first line was consumed above.
            let id = self.normalizer.parse(raw).map_err(|e| {
                FlowError::membership_with_code(
                    ErrorCode::MEMBERSHIP_INVALID_ID,
                    format!("invalid block identifier on line {}", line + 2),
                    Some(self.path.clone()),
                )
                .with_source(e)
            })?;
            ids.push(id);
        }

        debug!(
            "Read {} block identifiers from {}",
            ids.len(),
            self.path.display()
        );
        Ok(ids)
    }

    fn describe(&self) -> String {
        format!("block list {}", self.path.display())
    }
}
