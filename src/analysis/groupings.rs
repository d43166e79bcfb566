/// Severity rollups for forecast groups and county groups.
///
/// After every point has been analyzed, each group gets the maximum
/// observed and maximum forecast category among its members, with the
/// earliest time that maximum was reached. The overall category is the
/// observed one unless the forecast is strictly worse.
///
/// Groups reference their members by LID; `group_by_lid` builds the lookup
/// so each rollup is a walk over the member list rather than a scan of
/// every point.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::{CategorizedValue, CountyGroup, FloodCategory, ForecastGroup, ForecastPoint, SeverityRollup};

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Indexes points by LID. If a LID appears twice the last one wins.
pub fn group_by_lid(points: &[ForecastPoint]) -> HashMap<&str, &ForecastPoint> {
    points.iter().map(|p| (p.lid.as_str(), p)).collect()
}

// ---------------------------------------------------------------------------
// Rollup
// ---------------------------------------------------------------------------

/// Running maximum category; ties keep the earliest time.
#[derive(Debug, Clone, Copy)]
struct MaxCategory {
    category: FloodCategory,
    time: Option<DateTime<Utc>>,
}

impl MaxCategory {
    fn new() -> Self {
        Self {
            category: FloodCategory::Null,
            time: None,
        }
    }

    fn offer(&mut self, value: &CategorizedValue) {
        if value.category > self.category {
            self.category = value.category;
            self.time = value.time;
        } else if value.category == self.category {
            self.time = match (self.time, value.time) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
    }
}

/// Rolls up the analyzed members of one group.
pub fn rollup_points<'a>(members: impl IntoIterator<Item = &'a ForecastPoint>) -> SeverityRollup {
    let mut observed = MaxCategory::new();
    let mut forecast = MaxCategory::new();
    for point in members {
        observed.offer(&point.analysis.current_observed);
        forecast.offer(&point.analysis.max_forecast);
    }

    let overall = if observed.category >= forecast.category {
        observed
    } else {
        forecast
    };

    SeverityRollup {
        observed_category: observed.category,
        observed_time: observed.time,
        forecast_category: forecast.category,
        forecast_time: forecast.time,
        overall_category: overall.category,
        overall_time: overall.time,
    }
}

fn members<'a>(
    lookup: &'a HashMap<&str, &'a ForecastPoint>,
    point_ids: &'a [String],
) -> impl Iterator<Item = &'a ForecastPoint> + 'a {
    point_ids.iter().filter_map(move |lid| lookup.get(lid.as_str()).copied())
}

/// Sets the rollup of every forecast group.
pub fn compute_group_rollups(groups: &mut [ForecastGroup], points: &[ForecastPoint]) {
    let lookup = group_by_lid(points);
    for group in groups.iter_mut() {
        group.rollup = rollup_points(members(&lookup, &group.point_ids));
        debug!(
            group = %group.id,
            category = %group.rollup.overall_category,
            "group rollup"
        );
    }
}

/// Sets the rollup of every county group.
pub fn compute_county_rollups(counties: &mut [CountyGroup], points: &[ForecastPoint]) {
    let lookup = group_by_lid(points);
    for county in counties.iter_mut() {
        county.rollup = rollup_points(members(&lookup, &county.point_ids));
        debug!(
            county = %county.label(),
            category = %county.rollup.overall_category,
            "county rollup"
        );
    }
}

/// Builds county groups from point membership, for stores that have no
/// county table. Counties come out sorted by state then county name, each
/// listing its points in input order.
pub fn derive_county_groups(points: &[ForecastPoint]) -> Vec<CountyGroup> {
    let mut counties: Vec<CountyGroup> = Vec::new();
    for point in points {
        if point.county.is_empty() {
            continue;
        }
        match counties
            .iter_mut()
            .find(|c| c.state == point.state && c.county == point.county)
        {
            Some(county) => county.point_ids.push(point.lid.clone()),
            None => {
                let mut county = CountyGroup::new(&point.state, &point.county);
                county.point_ids.push(point.lid.clone());
                counties.push(county);
            }
        }
    }
    counties.sort_by(|a, b| (&a.state, &a.county).cmp(&(&b.state, &b.county)));
    counties
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
