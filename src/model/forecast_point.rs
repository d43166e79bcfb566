/// Forecast point: a monitored river gauge with its thresholds, its current
/// hydrographs, and the values derived from them during a snapshot build.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::event::RecordStatus;
use super::hydrograph::{ForecastHydrograph, ObservedHydrograph, PrecipHydrograph};
use super::{
    is_missing, is_missing_int, is_stage_element, FloodCategory, SeriesSource, Trend,
    MISSING_INT, MISSING_VALUE,
};
use crate::config::HazardSettings;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Category thresholds for one unit (stage or flow).
///
/// Any threshold may be `MISSING_VALUE`; missing ones are skipped by the
/// classifier. When all four are present they are non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryThresholds {
    pub minor: f64,
    pub moderate: f64,
    pub major: f64,
    pub record: f64,
}

impl CategoryThresholds {
    pub fn missing() -> Self {
        Self {
            minor: MISSING_VALUE,
            moderate: MISSING_VALUE,
            major: MISSING_VALUE,
            record: MISSING_VALUE,
        }
    }

    pub fn new(minor: f64, moderate: f64, major: f64, record: f64) -> Self {
        Self { minor, moderate, major, record }
    }

    /// Thresholds paired with the category they open, least severe first.
    pub fn levels(&self) -> [(f64, FloodCategory); 4] {
        [
            (self.minor, FloodCategory::Minor),
            (self.moderate, FloodCategory::Moderate),
            (self.major, FloodCategory::Major),
            (self.record, FloodCategory::Record),
        ]
    }

    /// Present thresholds never decrease with severity.
    pub fn is_ordered(&self) -> bool {
        let present: Vec<f64> = self
            .levels()
            .iter()
            .map(|(t, _)| *t)
            .filter(|t| !is_missing(*t))
            .collect();
        present.windows(2).all(|w| w[0] <= w[1])
    }
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self::missing()
    }
}

/// Every threshold a point carries, in both units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointThresholds {
    pub flood_stage: f64,
    pub action_stage: f64,
    pub flood_flow: f64,
    pub action_flow: f64,
    pub stage: CategoryThresholds,
    pub flow: CategoryThresholds,
}

impl Default for PointThresholds {
    fn default() -> Self {
        Self {
            flood_stage: MISSING_VALUE,
            action_stage: MISSING_VALUE,
            flood_flow: MISSING_VALUE,
            action_flow: MISSING_VALUE,
            stage: CategoryThresholds::missing(),
            flow: CategoryThresholds::missing(),
        }
    }
}

// ---------------------------------------------------------------------------
// Crest history
// ---------------------------------------------------------------------------

/// One historical crest from the crest table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrestRecord {
    pub crest_time: DateTime<Utc>,
    pub stage: f64,
    pub flow: f64,
    /// Preliminary crests have not been verified by survey.
    pub preliminary: bool,
}

// ---------------------------------------------------------------------------
// Derived data
// ---------------------------------------------------------------------------

/// A value with its time and flood category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategorizedValue {
    pub value: f64,
    pub time: Option<DateTime<Utc>>,
    pub category: FloodCategory,
}

impl CategorizedValue {
    pub fn missing() -> Self {
        Self {
            value: MISSING_VALUE,
            time: None,
            category: FloodCategory::Null,
        }
    }

    pub fn is_missing(&self) -> bool {
        is_missing(self.value)
    }
}

impl Default for CategorizedValue {
    fn default() -> Self {
        Self::missing()
    }
}

/// Crest and threshold crossings of one stitched series.
///
/// `crest_index` indexes the point's own series (observed or forecast),
/// never the stitched copy used during the walk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesAnalysis {
    pub crest_index: Option<usize>,
    pub crest_value: f64,
    pub crest_time: Option<DateTime<Utc>>,
    pub rise_above_time: Option<DateTime<Utc>>,
    pub fall_below_time: Option<DateTime<Utc>>,
    /// Largest real value of the series itself, boundary point excluded.
    pub max_value: f64,
}

impl Default for SeriesAnalysis {
    fn default() -> Self {
        Self {
            crest_index: None,
            crest_value: MISSING_VALUE,
            crest_time: None,
            rise_above_time: None,
            fall_below_time: None,
            max_value: MISSING_VALUE,
        }
    }
}

/// Everything the analyzer derives for a point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointAnalysis {
    pub current_observed: CategorizedValue,
    pub current_observed_index: Option<usize>,
    pub max_forecast: CategorizedValue,
    pub max_forecast_index: Option<usize>,
    /// Larger of current observed and max forecast (MOFO).
    pub max_observed_forecast: CategorizedValue,
    pub max_observed_forecast_source: Option<SeriesSource>,

    pub observed_max_6hr_index: Option<usize>,
    pub observed_max_24hr_index: Option<usize>,

    pub trend: Trend,

    pub observed_series: SeriesAnalysis,
    pub forecast_series: SeriesAnalysis,

    pub crest_value: f64,
    pub crest_time: Option<DateTime<Utc>>,
    pub crest_source: Option<SeriesSource>,
    pub rise_above_time: Option<DateTime<Utc>>,
    pub rise_above_source: Option<SeriesSource>,
    pub fall_below_time: Option<DateTime<Utc>>,
    pub fall_below_source: Option<SeriesSource>,

    pub precip_total_6hr: f64,
    pub precip_total_24hr: f64,
    pub comparable_crest: Option<CrestRecord>,
    pub record_status: RecordStatus,
}

impl Default for PointAnalysis {
    fn default() -> Self {
        Self {
            current_observed: CategorizedValue::missing(),
            current_observed_index: None,
            max_forecast: CategorizedValue::missing(),
            max_forecast_index: None,
            max_observed_forecast: CategorizedValue::missing(),
            max_observed_forecast_source: None,
            observed_max_6hr_index: None,
            observed_max_24hr_index: None,
            trend: Trend::Missing,
            observed_series: SeriesAnalysis::default(),
            forecast_series: SeriesAnalysis::default(),
            crest_value: MISSING_VALUE,
            crest_time: None,
            crest_source: None,
            rise_above_time: None,
            rise_above_source: None,
            fall_below_time: None,
            fall_below_source: None,
            precip_total_6hr: MISSING_VALUE,
            precip_total_24hr: MISSING_VALUE,
            comparable_crest: None,
            record_status: RecordStatus::NoRecord,
        }
    }
}

// ---------------------------------------------------------------------------
// Forecast point
// ---------------------------------------------------------------------------

/// A river forecast point.
///
/// Group and county membership are plain identifiers; the groups hold lists
/// of LIDs rather than references back to the points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub lid: String,
    pub name: String,
    pub physical_element: String,
    pub group_id: String,
    pub state: String,
    pub county: String,
    /// Position within the forecast group.
    pub ordinal: i64,

    pub thresholds: PointThresholds,

    /// Observed look-back, hours; `MISSING_INT` defers to the settings.
    pub look_back_hours: i64,
    /// Forecast look-forward, hours; `MISSING_INT` defers to the settings.
    pub look_forward_hours: i64,
    /// Hours added to the fall-below time to propose an event end;
    /// `MISSING_INT` defers to the settings.
    pub end_shift_hours: i64,
    /// Noise tolerance for trend detection; `MISSING_VALUE` defers to the
    /// settings' default stage window.
    pub change_threshold: f64,
    pub use_latest_forecast: bool,

    pub observed: ObservedHydrograph,
    pub forecast: ForecastHydrograph,
    pub precip: Option<PrecipHydrograph>,
    pub crest_history: Vec<CrestRecord>,

    pub analysis: PointAnalysis,
    pub include_in_recommendation: bool,
}

impl ForecastPoint {
    /// A point with no thresholds, no data, and every hour setting
    /// deferring to the global settings.
    pub fn new(lid: &str, physical_element: &str) -> Self {
        Self {
            lid: lid.to_string(),
            name: String::new(),
            physical_element: physical_element.to_string(),
            group_id: String::new(),
            state: String::new(),
            county: String::new(),
            ordinal: 0,
            thresholds: PointThresholds::default(),
            look_back_hours: MISSING_INT,
            look_forward_hours: MISSING_INT,
            end_shift_hours: MISSING_INT,
            change_threshold: MISSING_VALUE,
            use_latest_forecast: false,
            observed: ObservedHydrograph::empty(lid, physical_element),
            forecast: ForecastHydrograph::empty(lid, physical_element),
            precip: None,
            crest_history: Vec::new(),
            analysis: PointAnalysis::default(),
            include_in_recommendation: false,
        }
    }

    pub fn is_stage_element(&self) -> bool {
        is_stage_element(&self.physical_element)
    }

    /// Category thresholds in the point's own unit.
    pub fn category_thresholds(&self) -> &CategoryThresholds {
        if self.is_stage_element() {
            &self.thresholds.stage
        } else {
            &self.thresholds.flow
        }
    }

    /// Level used for rise-above / fall-below crossings.
    pub fn flood_level(&self) -> f64 {
        if self.is_stage_element() {
            self.thresholds.flood_stage
        } else {
            self.thresholds.flood_flow
        }
    }

    pub fn has_observed_data(&self) -> bool {
        self.observed.has_data()
    }

    pub fn has_forecast_data(&self) -> bool {
        self.forecast.has_data()
    }

    pub fn has_data(&self) -> bool {
        self.has_observed_data() || self.has_forecast_data()
    }

    pub fn look_back_hours(&self, settings: &HazardSettings) -> i64 {
        pick_hours(&self.lid, "look_back_hours", self.look_back_hours, settings.obs_look_back_hours)
    }

    pub fn look_forward_hours(&self, settings: &HazardSettings) -> i64 {
        pick_hours(
            &self.lid,
            "look_forward_hours",
            self.look_forward_hours,
            settings.fcst_look_forward_hours,
        )
    }

    pub fn end_shift_hours(&self, settings: &HazardSettings) -> i64 {
        pick_hours(&self.lid, "end_shift_hours", self.end_shift_hours, settings.end_time_shift_hours)
    }

    /// Point-specific change threshold when positive, else the default.
    pub fn stage_window(&self, settings: &HazardSettings) -> f64 {
        if is_missing(self.change_threshold) || self.change_threshold <= 0.0 {
            settings.default_stage_window
        } else {
            self.change_threshold
        }
    }

    /// Offset below the record threshold that still counts as near-record.
    pub fn record_offset(&self, settings: &HazardSettings) -> f64 {
        if self.is_stage_element() {
            settings.record_stage_offset
        } else {
            settings.record_flow_offset
        }
    }
}

/// Upper bound on any per-point hour override (30 days).
const MAX_POINT_HOURS: i64 = 720;

fn pick_hours(lid: &str, name: &str, own: i64, default: i64) -> i64 {
    if is_missing_int(own) || own < 0 {
        default
    } else if own > MAX_POINT_HOURS {
        warn!(
            lid,
            setting = name,
            value = own,
            max = MAX_POINT_HOURS,
            fallback = default,
            "point hours out of range, using setting"
        );
        default
    } else {
        own
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_ordering_ignores_missing_levels() {
        let t = CategoryThresholds::new(20.0, MISSING_VALUE, 28.0, 31.2);
        assert!(t.is_ordered());

        let bad = CategoryThresholds::new(20.0, 19.0, 28.0, 31.2);
        assert!(!bad.is_ordered(), "moderate below minor must be flagged");

        assert!(CategoryThresholds::missing().is_ordered());
    }

    #[test]
    fn test_flood_level_follows_physical_element() {
        let mut point = ForecastPoint::new("PIAI2", "HG");
        point.thresholds.flood_stage = 18.0;
        point.thresholds.flood_flow = 60_000.0;
        assert_eq!(point.flood_level(), 18.0);

        point.physical_element = "QR".to_string();
        assert_eq!(point.flood_level(), 60_000.0);
    }

    #[test]
    fn test_point_hours_defer_to_settings_when_unset() {
        let settings = HazardSettings::default();
        let mut point = ForecastPoint::new("PIAI2", "HG");
        assert_eq!(point.look_back_hours(&settings), settings.obs_look_back_hours);
        assert_eq!(point.end_shift_hours(&settings), settings.end_time_shift_hours);

        point.look_back_hours = 48;
        point.end_shift_hours = 0;
        assert_eq!(point.look_back_hours(&settings), 48);
        assert_eq!(point.end_shift_hours(&settings), 0, "zero is a real setting");
    }

    #[test]
    fn test_point_hours_out_of_range_fall_back_to_settings() {
        let settings = HazardSettings::default();
        let mut point = ForecastPoint::new("PIAI2", "HG");
        point.end_shift_hours = 10_000_000_000_000;
        point.look_back_hours = i64::MAX;
        point.look_forward_hours = MAX_POINT_HOURS + 1;
        assert_eq!(point.end_shift_hours(&settings), settings.end_time_shift_hours);
        assert_eq!(point.look_back_hours(&settings), settings.obs_look_back_hours);
        assert_eq!(point.look_forward_hours(&settings), settings.fcst_look_forward_hours);

        point.look_forward_hours = MAX_POINT_HOURS;
        assert_eq!(point.look_forward_hours(&settings), MAX_POINT_HOURS);
    }

    #[test]
    fn test_stage_window_uses_point_change_threshold_when_positive() {
        let settings = HazardSettings::default();
        let mut point = ForecastPoint::new("PIAI2", "HG");
        assert_eq!(point.stage_window(&settings), settings.default_stage_window);

        point.change_threshold = 0.25;
        assert_eq!(point.stage_window(&settings), 0.25);

        point.change_threshold = 0.0;
        assert_eq!(point.stage_window(&settings), settings.default_stage_window);
    }

    #[test]
    fn test_new_point_has_no_data() {
        let point = ForecastPoint::new("PIAI2", "HG");
        assert!(!point.has_data());
        assert_eq!(point.analysis.current_observed.category, FloodCategory::Null);
        assert_eq!(point.analysis.trend, Trend::Missing);
    }
}
