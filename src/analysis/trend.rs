/// Trend detection, rolling observed maxima, and precipitation totals.
///
/// Trend compares the reference value (latest observed) against the local
/// extrema around it, ignoring anything within the point's stage window.
/// Observed data are scanned backward from the reference, forecast data
/// forward from it; the forecast answer wins when there is one.

use chrono::{DateTime, Duration, Utc};

use crate::config::HazardSettings;
use crate::model::{
    is_missing, Entry, ForecastPoint, ObservedHydrograph, PrecipHydrograph, Trend, MISSING_VALUE,
};

// ---------------------------------------------------------------------------
// Extrema
// ---------------------------------------------------------------------------

/// Whether `values[i]` is a local extremum. Endpoints always are; interior
/// points are if they are >= both neighbours or <= both neighbours.
fn is_extremum(values: &[f64], i: usize) -> bool {
    if i == 0 || i + 1 >= values.len() {
        return true;
    }
    let (before, here, after) = (values[i - 1], values[i], values[i + 1]);
    (here >= before && here >= after) || (here <= before && here <= after)
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

/// Trend of an observed series whose last value is the reference.
///
/// Walks backward from the value before the reference and stops at the first
/// extremum that differs from the reference by more than `window`: an
/// earlier lower value means the river is rising, an earlier higher value
/// means it is falling.
pub fn observed_trend(values: &[f64], window: f64) -> Trend {
    let Some((&reference, history)) = values.split_last() else {
        return Trend::Missing;
    };
    for i in (0..history.len()).rev() {
        if !is_extremum(values, i) {
            continue;
        }
        let v = values[i];
        if (v - reference).abs() > window {
            return if v < reference { Trend::Rise } else { Trend::Fall };
        }
    }
    Trend::Unchanged
}

/// Trend of `reference` followed by the forecast values.
///
/// Walks forward and stops at the first extremum that differs from the
/// reference by more than `window`: a later higher value is a rise.
pub fn forecast_trend(reference: f64, forecast: &[f64], window: f64) -> Trend {
    if is_missing(reference) {
        return Trend::Missing;
    }
    let mut series = Vec::with_capacity(forecast.len() + 1);
    series.push(reference);
    series.extend_from_slice(forecast);

    for i in 1..series.len() {
        if !is_extremum(&series, i) {
            continue;
        }
        let v = series[i];
        if (v - reference).abs() > window {
            return if v > reference { Trend::Rise } else { Trend::Fall };
        }
    }
    Trend::Unchanged
}

fn real_values(entries: &[Entry]) -> Vec<f64> {
    entries.iter().filter(|e| !e.is_missing()).map(|e| e.value).collect()
}

/// Trend of a point: forecast-based when the point has forecast data,
/// observed-based when it only has observations, `Missing` otherwise.
///
/// The forecast reference is the latest observed value, or the first
/// forecast value when nothing has been observed.
pub fn compute_trend_data(point: &ForecastPoint, settings: &HazardSettings) -> Trend {
    let window = point.stage_window(settings);
    let observed = real_values(point.observed.entries());
    let forecast = real_values(point.forecast.entries());

    if !forecast.is_empty() {
        return match observed.last() {
            Some(&reference) => forecast_trend(reference, &forecast, window),
            None => forecast_trend(forecast[0], &forecast[1..], window),
        };
    }
    if !observed.is_empty() {
        return observed_trend(&observed, window);
    }
    Trend::Missing
}

// ---------------------------------------------------------------------------
// Rolling windows
// ---------------------------------------------------------------------------

/// Index of the largest observed value in `[as_of - hours, as_of]`.
/// Ties keep the earliest entry; `None` when the window has no real value.
pub fn rolling_max_index(series: &ObservedHydrograph, as_of: DateTime<Utc>, hours: i64) -> Option<usize> {
    let entries = series.entries();
    let mut best: Option<usize> = None;
    for i in series.indices_within(as_of, Duration::hours(hours)) {
        if entries[i].is_missing() {
            continue;
        }
        match best {
            Some(b) if entries[i].value <= entries[b].value => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Precipitation accumulated over `[as_of - hours, as_of]`.
/// `MISSING_VALUE` when the window has no real value.
pub fn precip_total(series: &PrecipHydrograph, as_of: DateTime<Utc>, hours: i64) -> f64 {
    let entries = series.entries();
    let values: Vec<f64> = series
        .indices_within(as_of, Duration::hours(hours))
        .into_iter()
        .map(|i| &entries[i])
        .filter(|e| !e.is_missing())
        .map(|e| e.value)
        .collect();
    if values.is_empty() {
        MISSING_VALUE
    } else {
        values.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
