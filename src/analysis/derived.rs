/// Per-point derived data.
///
/// `analyze_point` runs every analysis pass on one point and stores the
/// results in `point.analysis`. It reads only the point's own data and the
/// shared settings, so points can be analyzed in any order.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::classifier::{classify, record_status};
use super::hydrograph::compute_hydrograph_rise_fall;
use super::trend::{compute_trend_data, precip_total, rolling_max_index};
use crate::config::HazardSettings;
use crate::model::{
    is_missing, CategorizedValue, CrestRecord, Entry, ForecastPoint, PointAnalysis, SeriesSource,
};

fn categorized(point: &ForecastPoint, found: Option<(usize, &Entry)>) -> (CategorizedValue, Option<usize>) {
    match found {
        Some((i, entry)) => (
            CategorizedValue {
                value: entry.value,
                time: Some(entry.time),
                category: classify(point, entry.value),
            },
            Some(i),
        ),
        None => (CategorizedValue::missing(), None),
    }
}

/// Larger of the current observed and the max forecast. Ties go to the
/// observation.
fn max_observed_forecast(
    observed: &CategorizedValue,
    forecast: &CategorizedValue,
) -> (CategorizedValue, Option<SeriesSource>) {
    match (observed.is_missing(), forecast.is_missing()) {
        (true, true) => (CategorizedValue::missing(), None),
        (false, true) => (*observed, Some(SeriesSource::Observed)),
        (true, false) => (*forecast, Some(SeriesSource::Forecast)),
        (false, false) if observed.value >= forecast.value => (*observed, Some(SeriesSource::Observed)),
        (false, false) => (*forecast, Some(SeriesSource::Forecast)),
    }
}

/// The historical crest closest to `target`, measured in the point's unit.
/// Ties go to the most recent crest.
pub fn comparable_crest(point: &ForecastPoint, target: f64) -> Option<CrestRecord> {
    if is_missing(target) {
        return None;
    }
    let stage = point.is_stage_element();
    let mut best: Option<(&CrestRecord, f64)> = None;
    for crest in &point.crest_history {
        let value = if stage { crest.stage } else { crest.flow };
        if is_missing(value) {
            continue;
        }
        let distance = (value - target).abs();
        best = match best {
            Some((b, d)) if distance > d || (distance == d && crest.crest_time <= b.crest_time) => {
                Some((b, d))
            }
            _ => Some((crest, distance)),
        };
    }
    best.map(|(crest, _)| crest.clone())
}

/// Fills `point.analysis` for the snapshot instant `as_of`.
pub fn analyze_point(point: &mut ForecastPoint, settings: &HazardSettings, as_of: DateTime<Utc>) {
    let mut analysis = PointAnalysis::default();

    let (current, current_index) = categorized(point, point.observed.latest_valid());
    let (max_forecast, max_forecast_index) = categorized(point, point.forecast.max_valid());
    let (mofo, mofo_source) = max_observed_forecast(&current, &max_forecast);
    analysis.current_observed = current;
    analysis.current_observed_index = current_index;
    analysis.max_forecast = max_forecast;
    analysis.max_forecast_index = max_forecast_index;
    analysis.max_observed_forecast = mofo;
    analysis.max_observed_forecast_source = mofo_source;

    analysis.observed_max_6hr_index = rolling_max_index(&point.observed, as_of, 6);
    analysis.observed_max_24hr_index = rolling_max_index(&point.observed, as_of, 24);

    let rise_fall = compute_hydrograph_rise_fall(point);
    analysis.observed_series = rise_fall.observed;
    analysis.forecast_series = rise_fall.forecast;
    analysis.crest_value = rise_fall.crest_value;
    analysis.crest_time = rise_fall.crest_time;
    analysis.crest_source = rise_fall.crest_source;
    analysis.rise_above_time = rise_fall.rise_above_time;
    analysis.rise_above_source = rise_fall.rise_above_source;
    analysis.fall_below_time = rise_fall.fall_below_time;
    analysis.fall_below_source = rise_fall.fall_below_source;

    analysis.trend = compute_trend_data(point, settings);

    if let Some(precip) = &point.precip {
        analysis.precip_total_6hr = precip_total(precip, as_of, 6);
        analysis.precip_total_24hr = precip_total(precip, as_of, 24);
    }

    let crest_target = if is_missing(analysis.crest_value) {
        mofo.value
    } else {
        analysis.crest_value
    };
    analysis.comparable_crest = comparable_crest(point, crest_target);
    analysis.record_status = record_status(point, mofo.value, settings);

    debug!(
        lid = %point.lid,
        observed = current.value,
        max_forecast = max_forecast.value,
        category = %mofo.category,
        trend = analysis.trend.as_str(),
        "point analyzed"
    );
    point.analysis = analysis;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
