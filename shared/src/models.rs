//! Shared data models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Priority classes that take part in ticket counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityClass {
    P1,
    P2,
    P3,
}

impl PriorityClass {
    /// All counted classes, in classification order.
    pub const ALL: [PriorityClass; 3] = [PriorityClass::P1, PriorityClass::P2, PriorityClass::P3];

    /// Classify a free-form priority label by substring match.
    ///
    /// Tokens are checked in order, so `"P1/P2"` classifies as `P1`. Labels
    /// containing none of the tokens are not counted.
    pub fn classify(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| label.contains(class.as_str()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityClass::P1 => "P1",
            PriorityClass::P2 => "P2",
            PriorityClass::P3 => "P3",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            PriorityClass::P1 => 0,
            PriorityClass::P2 => 1,
            PriorityClass::P3 => 2,
        }
    }
}

impl std::fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PriorityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "P1" => Ok(PriorityClass::P1),
            "P2" => Ok(PriorityClass::P2),
            "P3" => Ok(PriorityClass::P3),
            other => Err(format!("unknown priority class '{}'", other)),
        }
    }
}

/// A ticket as seen by the occupancy counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    /// Issue key, used for diagnostics only
    pub id: String,
    /// Raw priority label from the tracker
    pub priority_label: String,
    pub start_day: Option<NaiveDate>,
    /// Explicit last active day; derived from the duration table when absent
    pub end_day: Option<NaiveDate>,
}

impl Ticket {
    pub fn new(
        id: impl Into<String>,
        priority_label: impl Into<String>,
        start_day: Option<NaiveDate>,
        end_day: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: id.into(),
            priority_label: priority_label.into(),
            start_day,
            end_day,
        }
    }

    pub fn priority_class(&self) -> Option<PriorityClass> {
        PriorityClass::classify(&self.priority_label)
    }
}

/// Per-priority issue counts returned by the jira_tickets endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrioritySummary {
    pub p1: u32,
    pub p2: u32,
    pub p3: u32,
    /// Issue total as reported by the search API
    pub total: u32,
}

/// Vehicle specification lookup request, forwarded as-is to the remote API.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VehicleSpecLookup {
    #[validate(length(min = 1, message = "at least one eim entry is required"), nested)]
    pub eims: Vec<EimQuery>,
}

/// A single vehicle identified by its EIM code.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EimQuery {
    #[validate(length(min = 1))]
    pub eim: String,
    #[validate(length(min = 1))]
    pub model_year: String,
    #[validate(length(min = 1))]
    pub language_code: String,
    #[validate(length(min = 1))]
    pub country_code: String,
}
