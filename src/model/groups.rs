/// Forecast groups and county groups.
///
/// Both hold an ordered list of member LIDs plus the severity rollup the
/// aggregator computes for them. Points live in the snapshot's point list;
/// the groups only index into it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::FloodCategory;

/// Maximum categories (and the earliest time each was reached) across the
/// members of a group or county.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeverityRollup {
    pub observed_category: FloodCategory,
    pub observed_time: Option<DateTime<Utc>>,
    pub forecast_category: FloodCategory,
    pub forecast_time: Option<DateTime<Utc>>,
    pub overall_category: FloodCategory,
    pub overall_time: Option<DateTime<Utc>>,
}

impl Default for SeverityRollup {
    fn default() -> Self {
        Self {
            observed_category: FloodCategory::Null,
            observed_time: None,
            forecast_category: FloodCategory::Null,
            forecast_time: None,
            overall_category: FloodCategory::Null,
            overall_time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastGroup {
    pub id: String,
    pub name: String,
    pub ordinal: i64,
    /// Once any member is recommended, recommend every member.
    pub recommend_all_points: bool,
    pub point_ids: Vec<String>,
    pub rollup: SeverityRollup,
    pub include_in_recommendation: bool,
}

impl ForecastGroup {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ordinal: 0,
            recommend_all_points: false,
            point_ids: Vec::new(),
            rollup: SeverityRollup::default(),
            include_in_recommendation: false,
        }
    }

    pub fn contains(&self, lid: &str) -> bool {
        self.point_ids.iter().any(|p| p == lid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountyGroup {
    pub state: String,
    pub county: String,
    pub point_ids: Vec<String>,
    pub rollup: SeverityRollup,
    pub include_in_recommendation: bool,
}

impl CountyGroup {
    pub fn new(state: &str, county: &str) -> Self {
        Self {
            state: state.to_string(),
            county: county.to_string(),
            point_ids: Vec::new(),
            rollup: SeverityRollup::default(),
            include_in_recommendation: false,
        }
    }

    /// "County, ST" label used in logs and the endpoint.
    pub fn label(&self) -> String {
        format!("{}, {}", self.county, self.state)
    }

    pub fn contains(&self, lid: &str) -> bool {
        self.point_ids.iter().any(|p| p == lid)
    }
}
