/// Core data types for the flood hazard recommendation service.
///
/// This module defines the shared domain model imported by all other modules.
/// It holds types and the small helpers that belong to them (sentinel checks,
/// ordering, code conversion). Analysis lives in `analysis`, recommendation
/// policy in `recommend`.
///
/// Submodules:
/// - `hydrograph`     — `Entry` and `Hydrograph<Observed|Forecast|Precip>`
/// - `forecast_point` — `ForecastPoint`, thresholds, derived `PointAnalysis`
/// - `groups`         — `ForecastGroup`, `CountyGroup`, `SeverityRollup`
/// - `event`          — previous-event state and recommended events
/// - `snapshot`       — the immutable `Snapshot` handed to downstream consumers

pub mod event;
pub mod forecast_point;
pub mod groups;
pub mod hydrograph;
pub mod snapshot;

use serde::{Deserialize, Serialize};

pub use event::{
    PreviousEvent, ProductClass, RecommendationReason, RecommendedEvent, RecordStatus,
    RiseFallFlags, VtecAction,
};
pub use forecast_point::{
    CategorizedValue, CategoryThresholds, CrestRecord, ForecastPoint, PointAnalysis,
    PointThresholds, SeriesAnalysis,
};
pub use groups::{CountyGroup, ForecastGroup, SeverityRollup};
pub use hydrograph::{
    Entry, Forecast, ForecastHydrograph, Hydrograph, Observed, ObservedHydrograph, Precip,
    PrecipHydrograph,
};
pub use snapshot::Snapshot;

// ---------------------------------------------------------------------------
// Missing-value sentinels
// ---------------------------------------------------------------------------

/// Reserved float marking a missing stage, flow, or threshold value.
pub const MISSING_VALUE: f64 = -9999.0;

/// Reserved integer marking a missing count, hour setting, or code.
pub const MISSING_INT: i64 = -9999;

/// Two floats closer than this are treated as equal when comparing stages
/// against thresholds.
pub const FLOAT_TOLERANCE: f64 = 0.0001;

/// Returns `true` if `value` is the missing sentinel (or not a number).
pub fn is_missing(value: f64) -> bool {
    value.is_nan() || (value - MISSING_VALUE).abs() < FLOAT_TOLERANCE
}

/// Returns `true` if `value` is the missing integer sentinel.
pub fn is_missing_int(value: i64) -> bool {
    value == MISSING_INT
}

// ---------------------------------------------------------------------------
// Physical elements
// ---------------------------------------------------------------------------

/// Default stage physical element (river stage height).
pub const PE_STAGE: &str = "HG";

/// Default precipitation physical element (precip accumulator increment).
pub const PE_PRECIP: &str = "PP";

/// Stage elements all start with `H`; everything else is treated as flow.
pub fn is_stage_element(physical_element: &str) -> bool {
    physical_element.starts_with('H') || physical_element.starts_with('h')
}

// ---------------------------------------------------------------------------
// Flood categories
// ---------------------------------------------------------------------------

/// Flood severity category, in ascending order of severity.
///
/// `Null` means "no data"; it sorts below `NoFlood` so that any real
/// classification outranks it in maxima.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FloodCategory {
    Null,
    NoFlood,
    Minor,
    Moderate,
    Major,
    Record,
}

impl FloodCategory {
    /// Numeric rank used by the warning database: -1 for Null, 0 for
    /// NoFlood, up to 4 for Record.
    pub fn index(self) -> i32 {
        match self {
            FloodCategory::Null => -1,
            FloodCategory::NoFlood => 0,
            FloodCategory::Minor => 1,
            FloodCategory::Moderate => 2,
            FloodCategory::Major => 3,
            FloodCategory::Record => 4,
        }
    }

    /// Inverse of `index`; anything out of range maps to `Null`.
    pub fn from_index(index: i64) -> Self {
        match index {
            0 => FloodCategory::NoFlood,
            1 => FloodCategory::Minor,
            2 => FloodCategory::Moderate,
            3 => FloodCategory::Major,
            4 => FloodCategory::Record,
            _ => FloodCategory::Null,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FloodCategory::Null => "null",
            FloodCategory::NoFlood => "no_flood",
            FloodCategory::Minor => "minor",
            FloodCategory::Moderate => "moderate",
            FloodCategory::Major => "major",
            FloodCategory::Record => "record",
        }
    }

    /// True for Minor and above.
    pub fn is_flooding(self) -> bool {
        self > FloodCategory::NoFlood
    }
}

impl std::fmt::Display for FloodCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Trend and series source
// ---------------------------------------------------------------------------

/// Direction of change, used both for the hydrograph trend and for the
/// category rise/fall flags of the continuity engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    Rise,
    Unchanged,
    Fall,
    Missing,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Rise => "rise",
            Trend::Unchanged => "unchanged",
            Trend::Fall => "fall",
            Trend::Missing => "missing",
        }
    }
}

/// Which half of the merged hydrograph a derived value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeriesSource {
    Observed,
    Forecast,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
