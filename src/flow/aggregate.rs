//! Group-and-sum of classified records
//!
//! Each [`Aggregator`] owns its partial sums. Partials built by different
//! workers merge key-wise, so the final tables do not depend on row order
//! or on how rows were split into batches.

use super::classify::{Category, Classification};
use super::identifier::{IdentifierNormalizer, LocationId};
use super::record::{Endpoint, FlowRecord};
use crate::error::{ErrorCode, FlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// The five summaries produced by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatTable {
    /// Residents grouped by work block (inside/outside split happens downstream)
    #[serde(rename = "statTable1")]
    ResidentWork,
    /// Out-commuting residents grouped by home block
    #[serde(rename = "statTable2")]
    ResidentOutHome,
    /// Residents working inside, grouped by home block
    #[serde(rename = "statTable3")]
    ResidentInHome,
    /// In-commuters grouped by home block
    #[serde(rename = "statTable4")]
    NonResidentHome,
    /// In-commuters grouped by work block
    #[serde(rename = "statTable5")]
    NonResidentWork,
}

impl StatTable {
    pub const ALL: [StatTable; 5] = [
        StatTable::ResidentWork,
        StatTable::ResidentOutHome,
        StatTable::ResidentInHome,
        StatTable::NonResidentHome,
        StatTable::NonResidentWork,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StatTable::ResidentWork => "statTable1",
            StatTable::ResidentOutHome => "statTable2",
            StatTable::ResidentInHome => "statTable3",
            StatTable::NonResidentHome => "statTable4",
            StatTable::NonResidentWork => "statTable5",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            StatTable::ResidentWork => Category::ResidentAll,
            StatTable::ResidentOutHome => Category::ResidentCommuteOut,
            StatTable::ResidentInHome => Category::ResidentCommuteIn,
            StatTable::NonResidentHome | StatTable::NonResidentWork => {
                Category::NonResidentCommuteIn
            }
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            StatTable::ResidentWork | StatTable::NonResidentWork => Endpoint::Work,
            StatTable::ResidentOutHome | StatTable::ResidentInHome | StatTable::NonResidentHome => {
                Endpoint::Home
            }
        }
    }

    /// Layer name the downstream spatial join produces from this table
    pub fn layer_name(&self) -> &'static str {
        match self {
            StatTable::ResidentWork => "residentWorkLocations",
            StatTable::ResidentOutHome => "residentHomeLocWorkOutsideSA",
            StatTable::ResidentInHome => "residentHomeLocWorkInsideSA",
            StatTable::NonResidentHome => "nonResidentHomeLocations",
            StatTable::NonResidentWork => "nonResidentWorkLocations",
        }
    }
}

impl fmt::Display for StatTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    sum: u64,
    frequency: u64,
}

impl Tally {
    fn add(&mut self, measure: u64, frequency: u64) -> Result<()> {
        self.sum = self.sum.checked_add(measure).ok_or_else(overflow)?;
        self.frequency += frequency;
        Ok(())
    }
}

fn overflow() -> FlowError {
    FlowError::contract(
        ErrorCode::CONTRACT_MEASURE_OVERFLOW,
        "measure sum exceeded the 64-bit range",
    )
}

/// Partial group-by-and-sum for one (category, endpoint) pair
#[derive(Debug, Clone)]
pub struct Aggregator {
    category: Category,
    endpoint: Endpoint,
    sums: HashMap<LocationId, Tally>,
}

impl Aggregator {
    pub fn new(category: Category, endpoint: Endpoint) -> Self {
        Self {
            category,
            endpoint,
            sums: HashMap::new(),
        }
    }

    pub fn for_table(table: StatTable) -> Self {
        Self::new(table.category(), table.endpoint())
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Add a record already known to belong to this aggregator's category
    pub fn add(&mut self, record: &FlowRecord) -> Result<()> {
        self.sums
            .entry(record.endpoint(self.endpoint))
            .or_default()
            .add(record.measure, 1)
    }

    /// Fold another partial for the same (category, endpoint) into this one
    pub fn merge(&mut self, other: Aggregator) -> Result<()> {
        if other.category != self.category || other.endpoint != self.endpoint {
            return Err(FlowError::contract(
                ErrorCode::CONTRACT_GENERIC,
                format!(
                    "cannot merge {}/{} partial into {}/{}",
                    other.category, other.endpoint, self.category, self.endpoint
                ),
            ));
        }
        for (id, tally) in other.sums {
            self.sums
                .entry(id)
                .or_default()
                .add(tally.sum, tally.frequency)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Render keys once through the run's normalizer
    pub fn finish(self, normalizer: &IdentifierNormalizer) -> SummaryTable {
        let entries = self
            .sums
            .into_iter()
            .map(|(id, tally)| {
                (
                    normalizer.render(id),
                    SummaryEntry {
                        id,
                        sum: tally.sum,
                        frequency: tally.frequency,
                    },
                )
            })
            .collect();

        SummaryTable {
            category: self.category,
            endpoint: self.endpoint,
            entries,
        }
    }
}

/// One row of a summary table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub id: LocationId,
    pub sum: u64,
    /// Number of flow records that contributed to `sum`
    pub frequency: u64,
}

/// Sparse canonical key -> summed measure mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryTable {
    category: Category,
    endpoint: Endpoint,
    entries: BTreeMap<String, SummaryEntry>,
}

impl SummaryTable {
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Name of the join key field (`h_geo_txt` / `w_geo_txt`)
    pub fn key_field(&self) -> &'static str {
        self.endpoint.key_field()
    }

    /// Summed measure for a canonical key; absent keys had no records
    pub fn get(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|e| e.sum)
    }

    pub fn entry(&self, key: &str) -> Option<&SummaryEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total measure across all keys
    pub fn total(&self) -> u64 {
        self.entries.values().map(|e| e.sum).sum()
    }

    /// Rows ordered by canonical key
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SummaryEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    /// Key -> sum view, convenient for comparisons
    pub fn sums(&self) -> BTreeMap<String, u64> {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.sum))
            .collect()
    }

    /// Keep-only-matching join against a spatial layer's key values
    ///
    /// Returns `(key, sum)` for each layer key present in the table, in layer
    /// order; layer keys without a summary row are dropped rather than
    /// joined with a null measure.
    pub fn keep_common<'a, I>(&self, layer_keys: I) -> Vec<(&'a str, u64)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        layer_keys
            .into_iter()
            .filter(|key| seen.insert(*key))
            .filter_map(|key| self.get(key).map(|sum| (key, sum)))
            .collect()
    }
}

/// Record and measure totals for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub records: u64,
    pub measure: u64,
}

/// Per-category totals plus rows that fell in no category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    totals: BTreeMap<Category, CategoryTotals>,
    pub unclassified: u64,
}

impl CategoryCounts {
    pub fn record(&mut self, classification: Classification, measure: u64) -> Result<()> {
        if classification.is_unrelated() {
            self.unclassified += 1;
            return Ok(());
        }
        for category in classification.categories() {
            let totals = self.totals.entry(*category).or_default();
            totals.records += 1;
            totals.measure = totals.measure.checked_add(measure).ok_or_else(overflow)?;
        }
        Ok(())
    }

    pub fn get(&self, category: Category) -> CategoryTotals {
        self.totals.get(&category).copied().unwrap_or_default()
    }

    /// Totals for every category, zero-filled
    pub fn iter(&self) -> impl Iterator<Item = (Category, CategoryTotals)> + '_ {
        Category::ALL.iter().map(|c| (*c, self.get(*c)))
    }

    pub fn merge(&mut self, other: &CategoryCounts) -> Result<()> {
        for (category, other_totals) in &other.totals {
            let totals = self.totals.entry(*category).or_default();
            totals.records += other_totals.records;
            totals.measure = totals
                .measure
                .checked_add(other_totals.measure)
                .ok_or_else(overflow)?;
        }
        self.unclassified += other.unclassified;
        Ok(())
    }
}

/// The five aggregators a worker fills for its share of the rows
#[derive(Debug, Clone)]
pub struct PartialSummaries {
    aggregators: BTreeMap<StatTable, Aggregator>,
    counts: CategoryCounts,
}

impl PartialSummaries {
    pub fn new() -> Self {
        Self {
            aggregators: StatTable::ALL
                .iter()
                .map(|table| (*table, Aggregator::for_table(*table)))
                .collect(),
            counts: CategoryCounts::default(),
        }
    }

    /// Route a classified record into every table fed by its categories
    pub fn record(&mut self, classification: Classification, record: &FlowRecord) -> Result<()> {
        self.counts.record(classification, record.measure)?;
        for (table, aggregator) in self.aggregators.iter_mut() {
            if classification.contains(table.category()) {
                aggregator.add(record)?;
            }
        }
        Ok(())
    }

    pub fn merge(&mut self, other: PartialSummaries) -> Result<()> {
        self.counts.merge(&other.counts)?;
        for (table, aggregator) in other.aggregators {
            match self.aggregators.get_mut(&table) {
                Some(existing) => existing.merge(aggregator)?,
                None => {
                    self.aggregators.insert(table, aggregator);
                }
            }
        }
        Ok(())
    }

    pub fn counts(&self) -> &CategoryCounts {
        &self.counts
    }

    pub fn finish(self, normalizer: &IdentifierNormalizer) -> (SummarySet, CategoryCounts) {
        let tables = self
            .aggregators
            .into_iter()
            .map(|(table, aggregator)| (table, aggregator.finish(normalizer)))
            .collect();
        (SummarySet { tables }, self.counts)
    }
}

impl Default for PartialSummaries {
    fn default() -> Self {
        Self::new()
    }
}

/// All five normalized summary tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySet {
    tables: BTreeMap<StatTable, SummaryTable>,
}

impl SummarySet {
    pub fn get(&self, table: StatTable) -> &SummaryTable {
        // Always populated for every StatTable by PartialSummaries::finish.
        &self.tables[&table]
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatTable, &SummaryTable)> {
        self.tables.iter().map(|(t, s)| (*t, s))
    }
}
