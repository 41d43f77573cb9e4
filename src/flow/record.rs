use super::identifier::LocationId;
use crate::error::{ErrorCode, FlowError};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One row of the origin-destination table
///
/// `fields` keeps the complete original row so partition exports carry every
/// auxiliary column (SA01, SE01, SI01, createdate, ...) untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRecord {
    pub row: u64,
    pub home: LocationId,
    pub work: LocationId,
    pub measure: u64,
    fields: StringRecord,
}

impl FlowRecord {
    pub fn new(
        row: u64,
        home: LocationId,
        work: LocationId,
        measure: u64,
        fields: StringRecord,
    ) -> Self {
        Self {
            row,
            home,
            work,
            measure,
            fields,
        }
    }

    /// Record with a synthetic three-column row, for callers without a source file
    pub fn from_parts(home: u64, work: u64, measure: u64) -> Self {
        let fields = StringRecord::from(vec![
            home.to_string(),
            work.to_string(),
            measure.to_string(),
        ]);
        Self::new(
            0,
            LocationId::new(home),
            LocationId::new(work),
            measure,
            fields,
        )
    }

    pub fn endpoint(&self, endpoint: Endpoint) -> LocationId {
        match endpoint {
            Endpoint::Home => self.home,
            Endpoint::Work => self.work,
        }
    }

    pub fn fields(&self) -> &StringRecord {
        &self.fields
    }
}

/// Which end of a commute a summary is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Home,
    Work,
}

impl Endpoint {
    /// Name of the text key field the spatial join matches on
    pub fn key_field(&self) -> &'static str {
        match self {
            Endpoint::Home => "h_geo_txt",
            Endpoint::Work => "w_geo_txt",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Home => write!(f, "home"),
            Endpoint::Work => write!(f, "work"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" | "h" | "h_geocode" => Ok(Endpoint::Home),
            "work" | "w" | "w_geocode" => Ok(Endpoint::Work),
            other => Err(FlowError::contract(
                ErrorCode::CONTRACT_UNKNOWN_ENDPOINT,
                format!("unknown endpoint selector '{}' (expected home or work)", other),
            )),
        }
    }
}
