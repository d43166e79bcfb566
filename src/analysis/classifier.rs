/// Flood category classification.
///
/// Maps a stage or flow value to a `FloodCategory` using the point's
/// thresholds in its own unit. Pure functions, no side effects.

use crate::config::HazardSettings;
use crate::model::{
    is_missing, FloodCategory, ForecastPoint, RecordStatus, FLOAT_TOLERANCE,
};

/// Classifies `value` against the point's category thresholds.
///
/// Returns `Null` for a missing value. Otherwise the highest threshold the
/// value reaches wins, where "reaches" means `value >= threshold` or within
/// `FLOAT_TOLERANCE` of it. Missing thresholds are skipped, so a point with
/// only minor and major on file goes straight from Minor to Major.
pub fn classify(point: &ForecastPoint, value: f64) -> FloodCategory {
    if is_missing(value) {
        return FloodCategory::Null;
    }

    let mut category = FloodCategory::NoFlood;
    for (threshold, level) in point.category_thresholds().levels() {
        if is_missing(threshold) {
            continue;
        }
        if value >= threshold || (value - threshold).abs() < FLOAT_TOLERANCE {
            category = level;
        }
    }
    category
}

/// Whether `max_value` approaches the point's flood of record.
///
/// `NoRecord` when no record threshold is on file; `NearRecord` when the
/// value is at or above `record - offset`; otherwise `NotExpected`. A
/// missing value never counts as near-record.
pub fn record_status(
    point: &ForecastPoint,
    max_value: f64,
    settings: &HazardSettings,
) -> RecordStatus {
    let record = point.category_thresholds().record;
    if is_missing(record) {
        return RecordStatus::NoRecord;
    }
    if is_missing(max_value) {
        return RecordStatus::NotExpected;
    }
    let near = record - point.record_offset(settings);
    if max_value >= near || (max_value - near).abs() < FLOAT_TOLERANCE {
        RecordStatus::NearRecord
    } else {
        RecordStatus::NotExpected
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryThresholds, MISSING_VALUE};

    fn kingston_mines() -> ForecastPoint {
        let mut point = ForecastPoint::new("KNGI2", "HG");
        point.thresholds.flood_stage = 14.0;
        point.thresholds.stage = CategoryThresholds::new(14.0, 20.0, 24.0, 29.1);
        point
    }

    #[test]
    fn test_missing_value_is_null() {
        assert_eq!(classify(&kingston_mines(), MISSING_VALUE), FloodCategory::Null);
    }

    #[test]
    fn test_each_band_maps_to_its_category() {
        let point = kingston_mines();
        assert_eq!(classify(&point, 10.0), FloodCategory::NoFlood);
        assert_eq!(classify(&point, 14.0), FloodCategory::Minor);
        assert_eq!(classify(&point, 18.42), FloodCategory::Minor);
        assert_eq!(classify(&point, 20.0), FloodCategory::Moderate);
        assert_eq!(classify(&point, 24.5), FloodCategory::Major);
        assert_eq!(classify(&point, 30.0), FloodCategory::Record);
    }

    #[test]
    fn test_value_within_tolerance_below_threshold_reaches_it() {
        let point = kingston_mines();
        assert_eq!(classify(&point, 19.99995), FloodCategory::Moderate);
        assert_eq!(classify(&point, 19.999), FloodCategory::Minor);
    }

    #[test]
    fn test_missing_thresholds_are_skipped() {
        let mut point = kingston_mines();
        point.thresholds.stage.moderate = MISSING_VALUE;
        assert_eq!(classify(&point, 21.0), FloodCategory::Minor);
        assert_eq!(classify(&point, 25.0), FloodCategory::Major);

        point.thresholds.stage = CategoryThresholds::missing();
        assert_eq!(
            classify(&point, 25.0),
            FloodCategory::NoFlood,
            "a point without thresholds never floods"
        );
    }

    #[test]
    fn test_flow_points_use_flow_thresholds() {
        let mut point = kingston_mines();
        point.physical_element = "QR".to_string();
        point.thresholds.flow = CategoryThresholds::new(60_000.0, 80_000.0, 100_000.0, MISSING_VALUE);
        assert_eq!(classify(&point, 20.0), FloodCategory::NoFlood);
        assert_eq!(classify(&point, 85_000.0), FloodCategory::Moderate);
    }

    #[test]
    fn test_classification_is_monotonic_in_value() {
        let point = kingston_mines();
        let mut previous = classify(&point, 0.0);
        let mut value = 0.0;
        while value < 40.0 {
            let category = classify(&point, value);
            assert!(
                category >= previous,
                "category dropped from {:?} to {:?} at {}",
                previous,
                category,
                value
            );
            assert_ne!(category, FloodCategory::Null, "only the sentinel is Null");
            previous = category;
            value += 0.05;
        }
    }

    #[test]
    fn test_record_status() {
        let settings = HazardSettings::default();
        let point = kingston_mines();
        assert_eq!(record_status(&point, 20.0, &settings), RecordStatus::NotExpected);
        assert_eq!(record_status(&point, 27.1, &settings), RecordStatus::NearRecord);
        assert_eq!(record_status(&point, 31.0, &settings), RecordStatus::NearRecord);
        assert_eq!(record_status(&point, MISSING_VALUE, &settings), RecordStatus::NotExpected);

        let mut no_record = kingston_mines();
        no_record.thresholds.stage.record = MISSING_VALUE;
        assert_eq!(record_status(&no_record, 31.0, &settings), RecordStatus::NoRecord);
    }
}
