/// Hydrograph analysis: crest detection and flood-level crossings.
///
/// Each series is analyzed on a "stitched" copy that borrows one point
/// from the other series so the observed/forecast seam is continuous:
///
/// ```text
///   observed walk:  o0 o1 ... oN | f0        (f0 is the boundary point)
///   forecast walk:          oN | f0 f1 ... fM (oN is the boundary point)
/// ```
///
/// Missing values are dropped from the stitched copy before walking, so a
/// gap never produces a crest or crossing. Every result is mapped back to
/// the point's own series; the boundary point is never reported as this
/// series' crest.
///
/// Crossing of the seam itself (the pair oN -> f0) belongs to the forecast
/// series; the observed walk skips it.

use chrono::{DateTime, Duration, Utc};

use crate::model::{
    is_missing, Entry, ForecastPoint, SeriesAnalysis, SeriesSource, MISSING_VALUE,
};

// ---------------------------------------------------------------------------
// Stitched series
// ---------------------------------------------------------------------------

/// One sample of a stitched series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StitchedSample {
    pub value: f64,
    pub time: DateTime<Utc>,
    /// Index in the owning series; `None` for the borrowed boundary point.
    pub source_index: Option<usize>,
}

impl StitchedSample {
    pub fn is_boundary(&self) -> bool {
        self.source_index.is_none()
    }
}

fn own_samples(entries: &[Entry]) -> impl Iterator<Item = StitchedSample> + '_ {
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_missing())
        .map(|(i, e)| StitchedSample {
            value: e.value,
            time: e.time,
            source_index: Some(i),
        })
}

fn boundary_sample(entry: &Entry) -> StitchedSample {
    StitchedSample {
        value: entry.value,
        time: entry.time,
        source_index: None,
    }
}

/// Observed series with the first real forecast value appended.
pub fn stitch_observed(point: &ForecastPoint) -> Vec<StitchedSample> {
    let mut samples: Vec<StitchedSample> = own_samples(point.observed.entries()).collect();
    if let Some((_, first_forecast)) = point.forecast.earliest_valid() {
        samples.push(boundary_sample(first_forecast));
    }
    samples
}

/// Forecast series with the most recent real observed value prepended.
pub fn stitch_forecast(point: &ForecastPoint) -> Vec<StitchedSample> {
    let mut samples = Vec::with_capacity(point.forecast.len() + 1);
    if let Some((_, latest_observed)) = point.observed.latest_valid() {
        samples.push(boundary_sample(latest_observed));
    }
    samples.extend(own_samples(point.forecast.entries()));
    samples
}

// ---------------------------------------------------------------------------
// Crest detection
// ---------------------------------------------------------------------------

/// Which crest to keep when a series has several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrestPolicy {
    /// Observed series: the latest crest is the relevant one.
    MostRecent,
    /// Forecast series: the next crest is the relevant one.
    First,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Rising,
    Falling,
    Flat,
}

/// Every crest in `values`, in time order.
///
/// A crest is the last point of a rising run immediately followed by a
/// fall. Flat steps right after a rise keep the run alive without moving
/// the candidate, so a sustained crest reports the start of its plateau.
pub fn crest_indices(values: &[f64]) -> Vec<usize> {
    let mut crests = Vec::new();
    let mut direction = Direction::Flat;
    let mut candidate: Option<usize> = None;

    for i in 1..values.len() {
        let (previous, current) = (values[i - 1], values[i]);
        if current > previous {
            direction = Direction::Rising;
            candidate = Some(i);
        } else if current < previous {
            if direction == Direction::Rising {
                if let Some(c) = candidate {
                    crests.push(c);
                }
            }
            direction = Direction::Falling;
            candidate = None;
        } else if direction != Direction::Rising {
            direction = Direction::Flat;
        }
    }
    crests
}

/// The crest `policy` selects from `values`.
pub fn crest_index(values: &[f64], policy: CrestPolicy) -> Option<usize> {
    let crests = crest_indices(values);
    match policy {
        CrestPolicy::MostRecent => crests.last().copied(),
        CrestPolicy::First => crests.first().copied(),
    }
}

fn stitched_crest(samples: &[StitchedSample], policy: CrestPolicy) -> Option<StitchedSample> {
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let mut own_crests = crest_indices(&values)
        .into_iter()
        .map(|i| samples[i])
        .filter(|s| !s.is_boundary());
    match policy {
        CrestPolicy::MostRecent => own_crests.last(),
        CrestPolicy::First => own_crests.next(),
    }
}

// ---------------------------------------------------------------------------
// Flood-level crossings
// ---------------------------------------------------------------------------

/// Time at which the straight line between two samples reaches `level`.
///
/// Equal samples are degenerate; the earlier time is returned.
pub fn interpolate_crossing(
    t0: DateTime<Utc>,
    v0: f64,
    t1: DateTime<Utc>,
    v1: f64,
    level: f64,
) -> DateTime<Utc> {
    if v1 == v0 {
        return t0;
    }
    let fraction = (level - v0) / (v1 - v0);
    let span_ms = (t1 - t0).num_milliseconds() as f64;
    t0 + Duration::milliseconds((span_ms * fraction).round() as i64)
}

/// Upward (below -> at/above) and downward (at/above -> below) crossings of
/// `level`, in time order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Crossings {
    pub rises: Vec<DateTime<Utc>>,
    pub falls: Vec<DateTime<Utc>>,
}

fn find_crossings(samples: &[StitchedSample], level: f64, skip_seam: bool) -> Crossings {
    let mut crossings = Crossings::default();
    for pair in samples.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if skip_seam && (a.is_boundary() || b.is_boundary()) {
            continue;
        }
        if a.value < level && b.value >= level {
            crossings
                .rises
                .push(interpolate_crossing(a.time, a.value, b.time, b.value, level));
        } else if a.value >= level && b.value < level {
            crossings
                .falls
                .push(interpolate_crossing(a.time, a.value, b.time, b.value, level));
        }
    }
    crossings
}

// ---------------------------------------------------------------------------
// Per-series analysis
// ---------------------------------------------------------------------------

fn series_max(samples: &[StitchedSample]) -> f64 {
    samples
        .iter()
        .filter(|s| !s.is_boundary())
        .map(|s| s.value)
        .fold(MISSING_VALUE, |max, v| if is_missing(max) || v > max { v } else { max })
}

fn with_crest(mut analysis: SeriesAnalysis, crest: Option<StitchedSample>) -> SeriesAnalysis {
    if let Some(crest) = crest {
        analysis.crest_index = crest.source_index;
        analysis.crest_value = crest.value;
        analysis.crest_time = Some(crest.time);
    }
    analysis
}

/// Crest and crossings of the observed series.
///
/// Keeps the most recent crest, the most recent rise-above and the most
/// recent fall-below; a fall-below older than the rise-above belongs to an
/// earlier event and is dropped.
pub fn analyze_observed(point: &ForecastPoint) -> SeriesAnalysis {
    let samples = stitch_observed(point);
    let mut analysis = SeriesAnalysis {
        max_value: series_max(&samples),
        ..SeriesAnalysis::default()
    };
    analysis = with_crest(analysis, stitched_crest(&samples, CrestPolicy::MostRecent));

    let level = point.flood_level();
    if is_missing(level) {
        return analysis;
    }

    let crossings = find_crossings(&samples, level, true);
    analysis.rise_above_time = crossings.rises.last().copied();
    analysis.fall_below_time = crossings.falls.last().copied();
    if let (Some(rise), Some(fall)) = (analysis.rise_above_time, analysis.fall_below_time) {
        if fall < rise {
            analysis.fall_below_time = None;
        }
    }
    analysis
}

/// Crest and crossings of the forecast series.
///
/// Keeps the first crest, the first rise-above, and the first fall-below
/// at or after it. If the forecast ends at or above flood level the
/// fall-below is unknown, whatever dips came earlier.
pub fn analyze_forecast(point: &ForecastPoint) -> SeriesAnalysis {
    let samples = stitch_forecast(point);
    let mut analysis = SeriesAnalysis {
        max_value: series_max(&samples),
        ..SeriesAnalysis::default()
    };
    analysis = with_crest(analysis, stitched_crest(&samples, CrestPolicy::First));

    let level = point.flood_level();
    if is_missing(level) {
        return analysis;
    }

    let crossings = find_crossings(&samples, level, false);
    analysis.rise_above_time = crossings.rises.first().copied();
    analysis.fall_below_time = match analysis.rise_above_time {
        Some(rise) => crossings.falls.iter().find(|&&fall| fall >= rise).copied(),
        None => crossings.falls.first().copied(),
    };

    let ends_above = samples
        .last()
        .map_or(false, |last| !last.is_boundary() && last.value >= level);
    if ends_above {
        analysis.fall_below_time = None;
    }
    analysis
}

// ---------------------------------------------------------------------------
// Rise-fall synthesis
// ---------------------------------------------------------------------------

/// Combined crest and crossings of a point's merged hydrograph.
#[derive(Debug, Clone, PartialEq)]
pub struct HydrographRiseFall {
    pub observed: SeriesAnalysis,
    pub forecast: SeriesAnalysis,
    pub rise_above_time: Option<DateTime<Utc>>,
    pub rise_above_source: Option<SeriesSource>,
    pub fall_below_time: Option<DateTime<Utc>>,
    pub fall_below_source: Option<SeriesSource>,
    pub crest_value: f64,
    pub crest_time: Option<DateTime<Utc>>,
    pub crest_source: Option<SeriesSource>,
}

/// Merges the observed and forecast analyses.
///
/// - rise-above: observed if present, else forecast;
/// - fall-below: forecast if present, else observed;
/// - crest: from whichever series has the larger maximum, ties to observed.
pub fn compute_hydrograph_rise_fall(point: &ForecastPoint) -> HydrographRiseFall {
    let observed = analyze_observed(point);
    let forecast = analyze_forecast(point);

    let (rise_above_time, rise_above_source) = match (observed.rise_above_time, forecast.rise_above_time) {
        (Some(t), _) => (Some(t), Some(SeriesSource::Observed)),
        (None, Some(t)) => (Some(t), Some(SeriesSource::Forecast)),
        (None, None) => (None, None),
    };

    let (fall_below_time, fall_below_source) = match (forecast.fall_below_time, observed.fall_below_time) {
        (Some(t), _) => (Some(t), Some(SeriesSource::Forecast)),
        (None, Some(t)) => (Some(t), Some(SeriesSource::Observed)),
        (None, None) => (None, None),
    };

    let crest_source = match (is_missing(observed.max_value), is_missing(forecast.max_value)) {
        (true, true) => None,
        (false, true) => Some(SeriesSource::Observed),
        (true, false) => Some(SeriesSource::Forecast),
        (false, false) if observed.max_value >= forecast.max_value => Some(SeriesSource::Observed),
        (false, false) => Some(SeriesSource::Forecast),
    };
    let chosen = match crest_source {
        Some(SeriesSource::Observed) => Some(&observed),
        Some(SeriesSource::Forecast) => Some(&forecast),
        None => None,
    };
    let (crest_value, crest_time) = chosen
        .map(|s| (s.crest_value, s.crest_time))
        .unwrap_or((MISSING_VALUE, None));

    HydrographRiseFall {
        observed,
        forecast,
        rise_above_time,
        rise_above_source,
        fall_below_time,
        fall_below_source,
        crest_value,
        crest_time,
        crest_source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, Forecast, ForecastHydrograph, Observed, ObservedHydrograph};
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn at(hours: f64) -> DateTime<Utc> {
        base() + Duration::milliseconds((hours * 3_600_000.0) as i64)
    }

    fn point_with(observed: &[(f64, f64)], forecast: &[(f64, f64)], flood_stage: f64) -> ForecastPoint {
        let mut point = ForecastPoint::new("PIAI2", "HG");
        point.thresholds.flood_stage = flood_stage;
        point.observed = ObservedHydrograph::new(
            "PIAI2",
            "HG",
            "RG",
            Observed,
            observed.iter().map(|&(h, v)| Entry::new(v, at(h), "RG")).collect(),
        );
        point.forecast = ForecastHydrograph::new(
            "PIAI2",
            "HG",
            "FF",
            Forecast::default(),
            forecast.iter().map(|&(h, v)| Entry::new(v, at(h), "FF")).collect(),
        );
        point
    }

    // --- Crest detection ----------------------------------------------------

    #[test]
    fn test_sustained_crest_reports_start_of_plateau() {
        let values = [10.0, 12.0, 15.0, 15.0, 13.0, 11.0];
        assert_eq!(crest_index(&values, CrestPolicy::First), Some(2));
        assert_eq!(crest_index(&values, CrestPolicy::MostRecent), Some(2));
    }

    #[test]
    fn test_monotonic_series_has_no_crest() {
        assert_eq!(crest_index(&[1.0, 2.0, 3.0, 4.0], CrestPolicy::First), None);
        assert_eq!(crest_index(&[4.0, 3.0, 2.0], CrestPolicy::First), None);
        assert_eq!(crest_index(&[], CrestPolicy::First), None);
    }

    #[test]
    fn test_rise_then_plateau_without_fall_is_not_a_crest() {
        assert_eq!(crest_index(&[10.0, 12.0, 12.0, 12.0], CrestPolicy::First), None);
    }

    #[test]
    fn test_policy_selects_first_or_most_recent_crest() {
        let values = [10.0, 14.0, 12.0, 16.0, 13.0];
        assert_eq!(crest_indices(&values), vec![1, 3]);
        assert_eq!(crest_index(&values, CrestPolicy::First), Some(1));
        assert_eq!(crest_index(&values, CrestPolicy::MostRecent), Some(3));
    }

    #[test]
    fn test_flat_before_rise_does_not_extend_candidate() {
        // Flat start, then a rise to 14 and a fall: crest at index 3.
        let values = [10.0, 10.0, 12.0, 14.0, 13.0];
        assert_eq!(crest_index(&values, CrestPolicy::First), Some(3));
    }

    #[test]
    fn test_observed_crest_confirmed_by_first_forecast_value() {
        // Observed rises to 21; the forecast starts lower, so the observed
        // series crests at its last value.
        let point = point_with(&[(0.0, 18.0), (1.0, 19.0), (2.0, 21.0)], &[(3.0, 20.0), (4.0, 19.0)], 25.0);
        let observed = analyze_observed(&point);
        assert_eq!(observed.crest_index, Some(2));
        assert_eq!(observed.crest_value, 21.0);

        let forecast = analyze_forecast(&point);
        assert_eq!(forecast.crest_index, None, "forecast only falls");
    }

    // --- Interpolation ------------------------------------------------------

    #[test]
    fn test_rise_above_interpolation_midpoint() {
        let t = interpolate_crossing(at(0.0), 18.0, at(10.0), 22.0, 20.0);
        assert_eq!(t, at(5.0));
    }

    #[test]
    fn test_degenerate_equal_samples_use_earlier_time() {
        let t = interpolate_crossing(at(2.0), 20.0, at(3.0), 20.0, 20.0);
        assert_eq!(t, at(2.0));
    }

    #[test]
    fn test_rise_above_from_series() {
        let point = point_with(&[(0.0, 18.0), (10.0, 22.0)], &[], 20.0);
        let observed = analyze_observed(&point);
        assert_eq!(observed.rise_above_time, Some(at(5.0)));
        assert_eq!(observed.fall_below_time, None);
    }

    #[test]
    fn test_reaching_flood_level_exactly_counts_as_rise_above() {
        let point = point_with(&[(0.0, 18.0), (1.0, 20.0)], &[], 20.0);
        let observed = analyze_observed(&point);
        assert_eq!(observed.rise_above_time, Some(at(1.0)));
    }

    // --- Seam rule ----------------------------------------------------------

    #[test]
    fn test_seam_crossing_belongs_to_forecast_only() {
        // Last observed 19 (below), first forecast 21 (above).
        let point = point_with(&[(0.0, 18.0), (1.0, 19.0)], &[(2.0, 21.0), (3.0, 22.0)], 20.0);
        let observed = analyze_observed(&point);
        assert_eq!(observed.rise_above_time, None, "observed must not claim the seam");

        let forecast = analyze_forecast(&point);
        assert_eq!(forecast.rise_above_time, Some(at(1.5)));
    }

    // --- Fall-below invalidation --------------------------------------------

    #[test]
    fn test_forecast_ending_above_flood_invalidates_fall_below() {
        let point = point_with(
            &[(0.0, 21.0)],
            &[(1.0, 22.0), (2.0, 19.0), (3.0, 21.0), (4.0, 23.0)],
            20.0,
        );
        let forecast = analyze_forecast(&point);
        assert_eq!(forecast.fall_below_time, None, "end time unknown while still above flood");
        assert!(forecast.rise_above_time.is_some());
    }

    #[test]
    fn test_forecast_fall_below_after_rise_above() {
        let point = point_with(
            &[(0.0, 18.0)],
            &[(1.0, 19.0), (2.0, 22.0), (3.0, 18.0)],
            20.0,
        );
        let forecast = analyze_forecast(&point);
        let rise = forecast.rise_above_time.expect("forecast rises above flood");
        let fall = forecast.fall_below_time.expect("forecast falls below flood");
        assert!(rise < fall);
        assert_eq!(fall, at(2.5));
    }

    #[test]
    fn test_observed_fall_below_before_latest_rise_is_dropped() {
        let point = point_with(
            &[(0.0, 21.0), (1.0, 19.0), (2.0, 19.5), (3.0, 22.0)],
            &[],
            20.0,
        );
        let observed = analyze_observed(&point);
        assert!(observed.rise_above_time.is_some());
        assert_eq!(observed.fall_below_time, None, "earlier event's fall-below is stale");
    }

    #[test]
    fn test_missing_flood_level_yields_no_crossings() {
        let point = point_with(&[(0.0, 18.0), (1.0, 22.0)], &[(2.0, 17.0)], MISSING_VALUE);
        let merged = compute_hydrograph_rise_fall(&point);
        assert_eq!(merged.rise_above_time, None);
        assert_eq!(merged.fall_below_time, None);
    }

    #[test]
    fn test_missing_values_are_skipped_not_crossed() {
        let point = point_with(&[(0.0, 18.0), (1.0, MISSING_VALUE), (2.0, 19.0)], &[], 20.0);
        let observed = analyze_observed(&point);
        assert_eq!(observed.rise_above_time, None);
        assert_eq!(observed.max_value, 19.0);
    }

    // --- Synthesis ----------------------------------------------------------

    #[test]
    fn test_end_to_end_observed_rise_forecast_crest_and_fall() {
        let point = point_with(
            &[(0.0, 18.0), (1.0, 19.0), (2.0, 21.0)],
            &[(3.0, 23.0), (4.0, 19.0), (5.0, 17.0)],
            20.0,
        );
        let merged = compute_hydrograph_rise_fall(&point);

        assert_eq!(merged.rise_above_time, Some(at(1.5)));
        assert_eq!(merged.rise_above_source, Some(SeriesSource::Observed));

        assert_eq!(merged.crest_value, 23.0);
        assert_eq!(merged.crest_time, Some(at(3.0)));
        assert_eq!(merged.crest_source, Some(SeriesSource::Forecast));

        let fall = merged.fall_below_time.expect("forecast falls below flood");
        assert!(fall > at(3.0) && fall < at(4.0));
        assert_eq!(fall, at(3.75));
        assert_eq!(merged.fall_below_source, Some(SeriesSource::Forecast));
    }

    #[test]
    fn test_crest_ties_favor_observed() {
        let point = point_with(
            &[(0.0, 18.0), (1.0, 22.0), (2.0, 21.0)],
            &[(3.0, 22.0), (4.0, 20.5)],
            20.0,
        );
        let merged = compute_hydrograph_rise_fall(&point);
        assert_eq!(merged.crest_source, Some(SeriesSource::Observed));
        assert_eq!(merged.crest_time, Some(at(1.0)));
    }

    #[test]
    fn test_fall_below_falls_back_to_observed() {
        let point = point_with(&[(0.0, 21.0), (1.0, 22.0), (2.0, 19.0), (3.0, 18.0)], &[], 20.0);
        let merged = compute_hydrograph_rise_fall(&point);
        assert_eq!(merged.fall_below_source, Some(SeriesSource::Observed));
        assert_eq!(merged.fall_below_time, Some(at(1.0) + Duration::minutes(40)));
    }

    #[test]
    fn test_no_data_produces_nothing() {
        let point = point_with(&[], &[], 20.0);
        let merged = compute_hydrograph_rise_fall(&point);
        assert_eq!(merged.crest_source, None);
        assert!(is_missing(merged.crest_value));
        assert_eq!(merged.rise_above_time, None);
    }
}
