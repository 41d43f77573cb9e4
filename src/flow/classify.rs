//! Commuter categories
//!
//! `ResidentAll` is the base filter (home inside the study area). It is then
//! split by work membership into `ResidentCommuteIn` / `ResidentCommuteOut`,
//! so those two partition it exactly. `NonResidentCommuteIn` is evaluated
//! independently against the unfiltered stream.

use super::membership::MembershipSet;
use super::record::FlowRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Home inside, work anywhere
    ResidentAll,
    /// Home inside, work outside
    ResidentCommuteOut,
    /// Home inside, work inside
    ResidentCommuteIn,
    /// Home outside, work inside
    NonResidentCommuteIn,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::ResidentAll,
        Category::ResidentCommuteOut,
        Category::ResidentCommuteIn,
        Category::NonResidentCommuteIn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ResidentAll => "resident_all",
            Category::ResidentCommuteOut => "resident_commute_out",
            Category::ResidentCommuteIn => "resident_commute_in",
            Category::NonResidentCommuteIn => "non_resident_commute_in",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a single record landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Resident { works_inside: bool },
    NonResidentCommuteIn,
    /// Neither endpoint inside the study area
    Unrelated,
}

impl Classification {
    /// Every category the record belongs to
    pub fn categories(&self) -> &'static [Category] {
        match self {
            Classification::Resident { works_inside: true } => {
                &[Category::ResidentAll, Category::ResidentCommuteIn]
            }
            Classification::Resident {
                works_inside: false,
            } => &[Category::ResidentAll, Category::ResidentCommuteOut],
            Classification::NonResidentCommuteIn => &[Category::NonResidentCommuteIn],
            Classification::Unrelated => &[],
        }
    }

    pub fn contains(&self, category: Category) -> bool {
        self.categories().contains(&category)
    }

    pub fn is_unrelated(&self) -> bool {
        matches!(self, Classification::Unrelated)
    }
}

/// Evaluates home/work membership against one shared study area
#[derive(Debug, Clone)]
pub struct FlowClassifier {
    membership: Arc<MembershipSet>,
}

impl FlowClassifier {
    pub fn new(membership: Arc<MembershipSet>) -> Self {
        Self { membership }
    }

    pub fn membership(&self) -> &MembershipSet {
        &self.membership
    }

    pub fn classify(&self, record: &FlowRecord) -> Classification {
        let home_inside = self.membership.contains(record.home);
        let work_inside = self.membership.contains(record.work);

        if home_inside {
            Classification::Resident {
                works_inside: work_inside,
            }
        } else if work_inside {
            Classification::NonResidentCommuteIn
        } else {
            Classification::Unrelated
        }
    }
}
