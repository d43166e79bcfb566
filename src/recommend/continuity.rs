/// Per-point event continuity.
///
/// Compares a point's analyzed state against the event last issued for it
/// and decides the action (NEW/CON/EXT/CAN/EXP/---) and the product class
/// (FLW/FLS/RVS).
///
/// ```text
///   active previous event?
///     yes: MOFO NoFlood            -> CAN
///          begin moved (not yet begun) or end moved -> EXT
///          otherwise               -> CON
///     no:  MOFO above NoFlood      -> NEW / FLW
///          NoFlood, ended recently -> EXP / FLS
///          otherwise               -> --- / RVS
/// ```

use chrono::{DateTime, Duration, Utc};

use crate::analysis::classify;
use crate::config::HazardSettings;
use crate::model::{
    is_missing, FloodCategory, ForecastPoint, PreviousEvent, ProductClass, RecommendationReason,
    RecommendedEvent, RiseFallFlags, Trend, VtecAction,
};

// ---------------------------------------------------------------------------
// Rise/fall flags
// ---------------------------------------------------------------------------

fn compare(previous: FloodCategory, current: FloodCategory) -> Trend {
    if previous == FloodCategory::Null || current == FloodCategory::Null {
        Trend::Unchanged
    } else if current > previous {
        Trend::Rise
    } else if current < previous {
        Trend::Fall
    } else {
        Trend::Unchanged
    }
}

fn previous_category(point: &ForecastPoint, value: f64) -> FloodCategory {
    if is_missing(value) {
        FloodCategory::Null
    } else {
        classify(point, value)
    }
}

/// Category movement since the previous event. Everything is Unchanged
/// when there is no previous event or it carried no values.
pub fn rise_fall_flags(point: &ForecastPoint, previous: Option<&PreviousEvent>) -> RiseFallFlags {
    let Some(previous) = previous else {
        return RiseFallFlags::default();
    };
    let analysis = &point.analysis;
    RiseFallFlags {
        observed: compare(
            previous_category(point, previous.observed_value),
            analysis.current_observed.category,
        ),
        forecast: compare(
            previous_category(point, previous.max_forecast_value),
            analysis.max_forecast.category,
        ),
        overall: compare(previous.category, analysis.max_observed_forecast.category),
    }
}

// ---------------------------------------------------------------------------
// Event state
// ---------------------------------------------------------------------------

/// A previous event is active until it is cancelled, expired, or its end
/// time has passed. No end time means "until further notice".
pub fn is_active(previous: Option<&PreviousEvent>, as_of: DateTime<Utc>) -> bool {
    match previous {
        Some(event) if !event.action.is_terminal() => event.end_time.map_or(true, |end| end > as_of),
        _ => false,
    }
}

/// An inactive, non-terminal event whose end time lies within the expire
/// window before `as_of`.
pub fn recently_ended(previous: Option<&PreviousEvent>, as_of: DateTime<Utc>, settings: &HazardSettings) -> bool {
    let Some(event) = previous else {
        return false;
    };
    if event.action.is_terminal() {
        return false;
    }
    match event.end_time {
        Some(end) => end <= as_of && as_of - end <= Duration::hours(settings.expire_window_hours),
        None => false,
    }
}

/// Proposed event end: fall-below plus the point's end-time shift.
pub fn proposed_end_time(point: &ForecastPoint, settings: &HazardSettings) -> Option<DateTime<Utc>> {
    point
        .analysis
        .fall_below_time
        .map(|t| t + Duration::hours(point.end_shift_hours(settings)))
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

fn active_action(
    category: FloodCategory,
    previous: &PreviousEvent,
    proposed_begin: Option<DateTime<Utc>>,
    proposed_end: Option<DateTime<Utc>>,
    as_of: DateTime<Utc>,
) -> VtecAction {
    if category == FloodCategory::NoFlood {
        return VtecAction::Cancel;
    }
    let begin_pending = previous.begin_time.map_or(false, |begin| begin > as_of);
    if begin_pending && proposed_begin != previous.begin_time {
        VtecAction::ExtendInTime
    } else if proposed_end != previous.end_time {
        VtecAction::ExtendInTime
    } else {
        VtecAction::Continue
    }
}

/// Recommends an action and product for one analyzed point.
///
/// Inclusion is decided later, across all points.
pub fn recommend_point(
    point: &ForecastPoint,
    previous: Option<&PreviousEvent>,
    settings: &HazardSettings,
    as_of: DateTime<Utc>,
) -> RecommendedEvent {
    let category = point.analysis.max_observed_forecast.category;
    let rise_fall = rise_fall_flags(point, previous);
    let proposed_begin = point.analysis.rise_above_time;
    let proposed_end = proposed_end_time(point, settings);
    let active = is_active(previous, as_of);

    let (action, product, reason) = match previous {
        Some(prev) if active => {
            let action = active_action(category, prev, proposed_begin, proposed_end, as_of);
            let (product, reason) = if rise_fall.overall == Trend::Rise {
                (ProductClass::Flw, RecommendationReason::IncreasedFlooding)
            } else if category.is_flooding() || category == FloodCategory::Null {
                (ProductClass::Fls, RecommendationReason::ContinuedFlooding)
            } else {
                (ProductClass::Fls, RecommendationReason::EndedFlooding)
            };
            (action, product, reason)
        }
        _ if category.is_flooding() => (
            VtecAction::New,
            ProductClass::Flw,
            RecommendationReason::NewFlooding,
        ),
        _ if category == FloodCategory::NoFlood && recently_ended(previous, as_of, settings) => (
            VtecAction::Expire,
            ProductClass::Fls,
            RecommendationReason::RecentlyEnded,
        ),
        _ if category == FloodCategory::NoFlood => (
            VtecAction::NoAction,
            ProductClass::Rvs,
            RecommendationReason::NoFlooding,
        ),
        _ => (
            VtecAction::NoAction,
            ProductClass::Rvs,
            RecommendationReason::NoData,
        ),
    };

    RecommendedEvent {
        lid: point.lid.clone(),
        action,
        product,
        reason,
        active,
        rise_fall,
        proposed_begin,
        proposed_end,
        record_status: point.analysis.record_status,
        included: false,
        previous: previous.cloned(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategorizedValue, CategoryThresholds};
    use chrono::TimeZone;

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn categorized(value: f64, category: FloodCategory) -> CategorizedValue {
        CategorizedValue {
            value,
            time: Some(at(0)),
            category,
        }
    }

    /// Henry, IL with a Minor observation and a Moderate forecast crest.
    fn henry(observed: FloodCategory, forecast: FloodCategory) -> ForecastPoint {
        let mut point = ForecastPoint::new("HNYI2", "HG");
        point.thresholds.flood_stage = 23.0;
        point.thresholds.stage = CategoryThresholds::new(23.0, 25.0, 28.0, 31.0);
        point.analysis.current_observed = categorized(24.0, observed);
        point.analysis.max_forecast = categorized(26.0, forecast);
        point.analysis.max_observed_forecast = categorized(26.0, observed.max(forecast));
        point
    }

    fn previous(action: VtecAction, category: FloodCategory) -> PreviousEvent {
        let mut event = PreviousEvent::new("HNYI2", action, ProductClass::Flw);
        event.category = category;
        event.observed_value = 24.0;
        event.max_forecast_value = 26.0;
        event
    }

    #[test]
    fn test_no_previous_event_and_no_flooding_is_no_action_rvs() {
        let point = henry(FloodCategory::NoFlood, FloodCategory::NoFlood);
        let event = recommend_point(&point, None, &HazardSettings::default(), at(0));
        assert_eq!(event.action, VtecAction::NoAction);
        assert_eq!(event.product, ProductClass::Rvs);
        assert_eq!(event.reason, RecommendationReason::NoFlooding);
        assert!(!event.active);
    }

    #[test]
    fn test_no_data_is_no_action_rvs() {
        let point = henry(FloodCategory::Null, FloodCategory::Null);
        let event = recommend_point(&point, None, &HazardSettings::default(), at(0));
        assert_eq!(event.action, VtecAction::NoAction);
        assert_eq!(event.reason, RecommendationReason::NoData);
    }

    #[test]
    fn test_new_flooding_is_new_flw() {
        let point = henry(FloodCategory::Minor, FloodCategory::Moderate);
        let event = recommend_point(&point, None, &HazardSettings::default(), at(0));
        assert_eq!(event.action, VtecAction::New);
        assert_eq!(event.product, ProductClass::Flw);
        assert_eq!(event.reason, RecommendationReason::NewFlooding);
    }

    #[test]
    fn test_active_event_with_unchanged_times_continues() {
        let point = henry(FloodCategory::Minor, FloodCategory::Moderate);
        let prev = previous(VtecAction::New, FloodCategory::Moderate);
        let event = recommend_point(&point, Some(&prev), &HazardSettings::default(), at(0));
        assert!(event.active);
        assert_eq!(event.action, VtecAction::Continue);
        assert_eq!(event.product, ProductClass::Fls);
        assert_eq!(event.reason, RecommendationReason::ContinuedFlooding);
    }

    #[test]
    fn test_active_event_with_higher_category_is_flw() {
        let point = henry(FloodCategory::Minor, FloodCategory::Moderate);
        let prev = previous(VtecAction::Continue, FloodCategory::Minor);
        let event = recommend_point(&point, Some(&prev), &HazardSettings::default(), at(0));
        assert_eq!(event.rise_fall.overall, Trend::Rise);
        assert_eq!(event.product, ProductClass::Flw);
        assert_eq!(event.reason, RecommendationReason::IncreasedFlooding);
    }

    #[test]
    fn test_active_event_end_moved_is_extended() {
        let settings = HazardSettings::default();
        let mut point = henry(FloodCategory::Minor, FloodCategory::Moderate);
        point.analysis.fall_below_time = Some(at(30));
        let mut prev = previous(VtecAction::New, FloodCategory::Moderate);
        prev.end_time = Some(at(24));

        let event = recommend_point(&point, Some(&prev), &settings, at(0));
        assert_eq!(event.action, VtecAction::ExtendInTime);
        assert_eq!(event.proposed_end, Some(at(30 + settings.end_time_shift_hours)));
    }

    #[test]
    fn test_corrupt_end_shift_uses_setting() {
        let settings = HazardSettings::default();
        let mut point = henry(FloodCategory::Minor, FloodCategory::Moderate);
        point.analysis.fall_below_time = Some(at(30));
        point.end_shift_hours = 10_000_000_000_000;

        assert_eq!(
            proposed_end_time(&point, &settings),
            Some(at(30 + settings.end_time_shift_hours))
        );
        let event = recommend_point(&point, None, &settings, at(0));
        assert_eq!(event.action, VtecAction::New);
    }

    #[test]
    fn test_active_event_with_same_shifted_end_continues() {
        let settings = HazardSettings::default();
        let mut point = henry(FloodCategory::Minor, FloodCategory::Moderate);
        point.analysis.fall_below_time = Some(at(18));
        let mut prev = previous(VtecAction::ExtendInTime, FloodCategory::Moderate);
        prev.end_time = Some(at(18 + settings.end_time_shift_hours));

        let event = recommend_point(&point, Some(&prev), &settings, at(0));
        assert_eq!(event.action, VtecAction::Continue);
    }

    #[test]
    fn test_pending_begin_moved_is_extended() {
        let mut point = henry(FloodCategory::NoFlood, FloodCategory::Minor);
        point.analysis.rise_above_time = Some(at(12));
        let mut prev = previous(VtecAction::New, FloodCategory::Minor);
        prev.begin_time = Some(at(6));

        let event = recommend_point(&point, Some(&prev), &HazardSettings::default(), at(0));
        assert_eq!(event.action, VtecAction::ExtendInTime);
    }

    #[test]
    fn test_begin_already_passed_is_not_an_extension() {
        let mut point = henry(FloodCategory::Minor, FloodCategory::Minor);
        point.analysis.rise_above_time = Some(at(-2));
        let mut prev = previous(VtecAction::New, FloodCategory::Minor);
        prev.begin_time = Some(at(-6));

        let event = recommend_point(&point, Some(&prev), &HazardSettings::default(), at(0));
        assert_eq!(event.action, VtecAction::Continue);
    }

    #[test]
    fn test_active_event_receding_to_no_flood_is_cancelled() {
        let point = henry(FloodCategory::NoFlood, FloodCategory::NoFlood);
        let prev = previous(VtecAction::Continue, FloodCategory::Minor);
        let event = recommend_point(&point, Some(&prev), &HazardSettings::default(), at(0));
        assert_eq!(event.action, VtecAction::Cancel);
        assert_eq!(event.product, ProductClass::Fls);
        assert_eq!(event.reason, RecommendationReason::EndedFlooding);
    }

    #[test]
    fn test_recently_ended_event_expires() {
        let settings = HazardSettings::default();
        let point = henry(FloodCategory::NoFlood, FloodCategory::NoFlood);
        let mut prev = previous(VtecAction::Continue, FloodCategory::Minor);
        prev.end_time = Some(at(-3));

        let event = recommend_point(&point, Some(&prev), &settings, at(0));
        assert!(!event.active);
        assert_eq!(event.action, VtecAction::Expire);
        assert_eq!(event.product, ProductClass::Fls);
    }

    #[test]
    fn test_long_ended_or_cancelled_event_is_no_action() {
        let settings = HazardSettings::default();
        let point = henry(FloodCategory::NoFlood, FloodCategory::NoFlood);

        let mut old = previous(VtecAction::Continue, FloodCategory::Minor);
        old.end_time = Some(at(-(settings.expire_window_hours + 1)));
        let event = recommend_point(&point, Some(&old), &settings, at(0));
        assert_eq!(event.action, VtecAction::NoAction);

        let mut cancelled = previous(VtecAction::Cancel, FloodCategory::Minor);
        cancelled.end_time = Some(at(-1));
        let event = recommend_point(&point, Some(&cancelled), &settings, at(0));
        assert_eq!(event.action, VtecAction::NoAction, "a cancelled event is not expired again");
    }

    #[test]
    fn test_activity_bounds() {
        let mut event = previous(VtecAction::New, FloodCategory::Minor);
        assert!(is_active(Some(&event), at(0)), "no end time is until further notice");

        event.end_time = Some(at(5));
        assert!(is_active(Some(&event), at(4)));
        assert!(!is_active(Some(&event), at(5)));

        event.action = VtecAction::Expire;
        event.end_time = None;
        assert!(!is_active(Some(&event), at(0)));
        assert!(!is_active(None, at(0)));
    }

    #[test]
    fn test_rise_fall_flags_compare_previous_categories() {
        let point = henry(FloodCategory::Minor, FloodCategory::Moderate);
        let mut prev = previous(VtecAction::New, FloodCategory::Major);
        prev.observed_value = 20.0;
        prev.max_forecast_value = 29.0;

        let flags = rise_fall_flags(&point, Some(&prev));
        assert_eq!(flags.observed, Trend::Rise, "NoFlood then, Minor now");
        assert_eq!(flags.forecast, Trend::Fall, "Major then, Moderate now");
        assert_eq!(flags.overall, Trend::Fall);

        assert_eq!(rise_fall_flags(&point, None), RiseFallFlags::default());
    }
}
