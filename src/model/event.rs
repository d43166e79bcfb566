/// Event state: what was issued before, and what is recommended now.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FloodCategory, Trend, MISSING_VALUE};

// ---------------------------------------------------------------------------
// Codes
// ---------------------------------------------------------------------------

/// VTEC-style action for a point's event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VtecAction {
    New,
    Continue,
    ExtendInTime,
    Cancel,
    Expire,
    Routine,
    NoAction,
}

impl VtecAction {
    pub fn code(self) -> &'static str {
        match self {
            VtecAction::New => "NEW",
            VtecAction::Continue => "CON",
            VtecAction::ExtendInTime => "EXT",
            VtecAction::Cancel => "CAN",
            VtecAction::Expire => "EXP",
            VtecAction::Routine => "ROU",
            VtecAction::NoAction => "---",
        }
    }

    /// Parses a stored action code; unknown codes are `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "NEW" => Some(VtecAction::New),
            "CON" => Some(VtecAction::Continue),
            "EXT" => Some(VtecAction::ExtendInTime),
            "CAN" => Some(VtecAction::Cancel),
            "EXP" => Some(VtecAction::Expire),
            "ROU" => Some(VtecAction::Routine),
            "---" => Some(VtecAction::NoAction),
            _ => None,
        }
    }

    /// Cancel and Expire close an event.
    pub fn is_terminal(self) -> bool {
        matches!(self, VtecAction::Cancel | VtecAction::Expire)
    }
}

/// Warning product class, ordered by severity: RVS < FLS < FLW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductClass {
    /// Hydrologic statement, no flooding.
    Rvs,
    /// Flood statement (follow-up).
    Fls,
    /// Flood warning.
    Flw,
}

impl ProductClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductClass::Rvs => "RVS",
            ProductClass::Fls => "FLS",
            ProductClass::Flw => "FLW",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "RVS" => Some(ProductClass::Rvs),
            "FLS" => Some(ProductClass::Fls),
            "FLW" => Some(ProductClass::Flw),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a point received its action and product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecommendationReason {
    NewFlooding,
    IncreasedFlooding,
    ContinuedFlooding,
    EndedFlooding,
    RecentlyEnded,
    NoFlooding,
    NoData,
    GroupInclusion,
}

impl RecommendationReason {
    pub fn description(self) -> &'static str {
        match self {
            RecommendationReason::NewFlooding => "new flooding",
            RecommendationReason::IncreasedFlooding => "increased flooding",
            RecommendationReason::ContinuedFlooding => "continued flooding",
            RecommendationReason::EndedFlooding => "ended flooding",
            RecommendationReason::RecentlyEnded => "event ended recently",
            RecommendationReason::NoFlooding => "no flooding",
            RecommendationReason::NoData => "no data",
            RecommendationReason::GroupInclusion => "group inclusion",
        }
    }
}

/// Whether a point's max value approaches its flood of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Record not expected ("NO").
    NotExpected,
    /// Near or above record ("NR").
    NearRecord,
    /// No record threshold on file ("UU").
    NoRecord,
}

impl RecordStatus {
    pub fn code(self) -> &'static str {
        match self {
            RecordStatus::NotExpected => "NO",
            RecordStatus::NearRecord => "NR",
            RecordStatus::NoRecord => "UU",
        }
    }
}

// ---------------------------------------------------------------------------
// Previous event
// ---------------------------------------------------------------------------

/// The most recently issued event for a point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviousEvent {
    pub lid: String,
    pub action: VtecAction,
    pub product: ProductClass,
    pub begin_time: Option<DateTime<Utc>>,
    /// `None` means "until further notice".
    pub end_time: Option<DateTime<Utc>>,
    pub product_time: Option<DateTime<Utc>>,
    /// Current observed value at issuance.
    pub observed_value: f64,
    /// Max forecast value at issuance.
    pub max_forecast_value: f64,
    /// Overall (MOFO) category at issuance.
    pub category: FloodCategory,
}

impl PreviousEvent {
    pub fn new(lid: &str, action: VtecAction, product: ProductClass) -> Self {
        Self {
            lid: lid.to_string(),
            action,
            product,
            begin_time: None,
            end_time: None,
            product_time: None,
            observed_value: MISSING_VALUE,
            max_forecast_value: MISSING_VALUE,
            category: FloodCategory::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Recommended event
// ---------------------------------------------------------------------------

/// Category movement since the previous event, per series and overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiseFallFlags {
    pub observed: Trend,
    pub forecast: Trend,
    pub overall: Trend,
}

impl Default for RiseFallFlags {
    fn default() -> Self {
        Self {
            observed: Trend::Unchanged,
            forecast: Trend::Unchanged,
            overall: Trend::Unchanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedEvent {
    pub lid: String,
    pub action: VtecAction,
    pub product: ProductClass,
    pub reason: RecommendationReason,
    /// A previous event is still in effect.
    pub active: bool,
    pub rise_fall: RiseFallFlags,
    pub proposed_begin: Option<DateTime<Utc>>,
    pub proposed_end: Option<DateTime<Utc>>,
    pub record_status: RecordStatus,
    pub included: bool,
    pub previous: Option<PreviousEvent>,
}

impl RecommendedEvent {
    /// Actions other than NoAction are actionable.
    pub fn is_actionable(&self) -> bool {
        self.action != VtecAction::NoAction
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
