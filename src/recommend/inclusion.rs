/// Cross-point inclusion rules.
///
/// Once every point has a recommended event, the most severe product
/// decides which points go into the recommendation. Groups flagged to
/// recommend all points pull in their quiet members, and groups and
/// counties are included when any member is.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::model::{
    CountyGroup, ForecastGroup, ForecastPoint, ProductClass, RecommendationReason, RecommendedEvent,
    VtecAction,
};

/// Most severe product across all events; RVS when there are none.
pub fn most_severe_product(events: &BTreeMap<String, RecommendedEvent>) -> ProductClass {
    events
        .values()
        .map(|e| e.product)
        .max()
        .unwrap_or(ProductClass::Rvs)
}

/// Flags points whose product matches the most severe one. When the most
/// severe product is RVS, every point with data is included.
pub fn include_points(
    points: &mut [ForecastPoint],
    events: &mut BTreeMap<String, RecommendedEvent>,
    most_severe: ProductClass,
) {
    for point in points.iter_mut() {
        let Some(event) = events.get_mut(&point.lid) else {
            point.include_in_recommendation = false;
            continue;
        };
        let included = if most_severe == ProductClass::Rvs {
            point.has_data()
        } else {
            event.product == most_severe
        };
        event.included = included;
        point.include_in_recommendation = included;
    }
}

/// Pulls the quiet members of "recommend all points" groups into the
/// recommendation once any member of the group is included.
///
/// Members with no action of their own become Routine with the most severe
/// product. Returns the LIDs that were pulled in.
pub fn apply_group_bleed_through(
    groups: &[ForecastGroup],
    points: &mut [ForecastPoint],
    events: &mut BTreeMap<String, RecommendedEvent>,
    most_severe: ProductClass,
) -> Vec<String> {
    let mut pulled = Vec::new();
    if most_severe == ProductClass::Rvs {
        return pulled;
    }

    for group in groups.iter().filter(|g| g.recommend_all_points) {
        let any_included = group
            .point_ids
            .iter()
            .any(|lid| events.get(lid).map_or(false, |e| e.included));
        if !any_included {
            continue;
        }
        for lid in &group.point_ids {
            let Some(event) = events.get_mut(lid) else {
                continue;
            };
            if event.included || event.action != VtecAction::NoAction {
                continue;
            }
            event.action = VtecAction::Routine;
            event.reason = RecommendationReason::GroupInclusion;
            event.product = most_severe;
            event.included = true;
            pulled.push(lid.clone());
            debug!(lid = %lid, group = %group.id, "pulled in by group");
        }
    }

    let pulled_set: HashSet<&str> = pulled.iter().map(String::as_str).collect();
    for point in points.iter_mut() {
        if pulled_set.contains(point.lid.as_str()) {
            point.include_in_recommendation = true;
        }
    }
    pulled
}

/// A group or county is included when at least one member point is.
pub fn include_groups(groups: &mut [ForecastGroup], counties: &mut [CountyGroup], points: &[ForecastPoint]) {
    let included: HashSet<&str> = points
        .iter()
        .filter(|p| p.include_in_recommendation)
        .map(|p| p.lid.as_str())
        .collect();
    for group in groups.iter_mut() {
        group.include_in_recommendation = group.point_ids.iter().any(|lid| included.contains(lid.as_str()));
    }
    for county in counties.iter_mut() {
        county.include_in_recommendation = county.point_ids.iter().any(|lid| included.contains(lid.as_str()));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Entry, Observed, ObservedHydrograph, RecordStatus, RiseFallFlags,
    };
    use chrono::{TimeZone, Utc};

    fn point(lid: &str, with_data: bool) -> ForecastPoint {
        let mut point = ForecastPoint::new(lid, "HG");
        if with_data {
            let t = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
            point.observed = ObservedHydrograph::new(lid, "HG", "RG", Observed, vec![Entry::new(10.0, t, "RG")]);
        }
        point
    }

    fn event(lid: &str, action: VtecAction, product: ProductClass) -> RecommendedEvent {
        RecommendedEvent {
            lid: lid.to_string(),
            action,
            product,
            reason: RecommendationReason::NoFlooding,
            active: false,
            rise_fall: RiseFallFlags::default(),
            proposed_begin: None,
            proposed_end: None,
            record_status: RecordStatus::NoRecord,
            included: false,
            previous: None,
        }
    }

    fn events(list: Vec<RecommendedEvent>) -> BTreeMap<String, RecommendedEvent> {
        list.into_iter().map(|e| (e.lid.clone(), e)).collect()
    }

    #[test]
    fn test_most_severe_product() {
        let map = events(vec![
            event("HAVI2", VtecAction::NoAction, ProductClass::Rvs),
            event("PIAI2", VtecAction::New, ProductClass::Flw),
            event("HNYI2", VtecAction::Expire, ProductClass::Fls),
        ]);
        assert_eq!(most_severe_product(&map), ProductClass::Flw);
        assert_eq!(most_severe_product(&BTreeMap::new()), ProductClass::Rvs);
    }

    #[test]
    fn test_only_most_severe_product_is_included() {
        let mut points = vec![point("HAVI2", true), point("PIAI2", true), point("HNYI2", true)];
        let mut map = events(vec![
            event("HAVI2", VtecAction::NoAction, ProductClass::Rvs),
            event("PIAI2", VtecAction::New, ProductClass::Flw),
            event("HNYI2", VtecAction::Expire, ProductClass::Fls),
        ]);
        include_points(&mut points, &mut map, ProductClass::Flw);
        assert!(!points[0].include_in_recommendation);
        assert!(points[1].include_in_recommendation);
        assert!(!points[2].include_in_recommendation);
        assert!(map["PIAI2"].included);
    }

    #[test]
    fn test_rvs_inclusion_depends_on_data() {
        let mut points = vec![point("HAVI2", true), point("LASI2", false)];
        let mut map = events(vec![
            event("HAVI2", VtecAction::NoAction, ProductClass::Rvs),
            event("LASI2", VtecAction::NoAction, ProductClass::Rvs),
        ]);
        include_points(&mut points, &mut map, ProductClass::Rvs);
        assert!(points[0].include_in_recommendation);
        assert!(!points[1].include_in_recommendation, "no data, nothing to say");
    }

    #[test]
    fn test_group_bleed_through_pulls_quiet_members() {
        let mut points = vec![point("HAVI2", true), point("PIAI2", true), point("HNYI2", true)];
        let mut map = events(vec![
            event("HAVI2", VtecAction::NoAction, ProductClass::Rvs),
            event("PIAI2", VtecAction::New, ProductClass::Flw),
            event("HNYI2", VtecAction::Expire, ProductClass::Fls),
        ]);
        let mut group = ForecastGroup::new("ILLINOIS", "Illinois River");
        group.recommend_all_points = true;
        group.point_ids = vec!["HAVI2".into(), "PIAI2".into(), "HNYI2".into()];

        include_points(&mut points, &mut map, ProductClass::Flw);
        let pulled = apply_group_bleed_through(&[group], &mut points, &mut map, ProductClass::Flw);

        assert_eq!(pulled, vec!["HAVI2".to_string()]);
        assert_eq!(map["HAVI2"].action, VtecAction::Routine);
        assert_eq!(map["HAVI2"].reason, RecommendationReason::GroupInclusion);
        assert_eq!(map["HAVI2"].product, ProductClass::Flw);
        assert!(points[0].include_in_recommendation);
        assert_eq!(map["HNYI2"].action, VtecAction::Expire, "members with their own action keep it");
        assert!(!map["HNYI2"].included);
    }

    #[test]
    fn test_no_bleed_through_without_flag_or_included_member() {
        let mut points = vec![point("HAVI2", true), point("PIAI2", true)];
        let mut map = events(vec![
            event("HAVI2", VtecAction::NoAction, ProductClass::Rvs),
            event("PIAI2", VtecAction::New, ProductClass::Flw),
        ]);
        let mut unflagged = ForecastGroup::new("ILLINOIS", "Illinois River");
        unflagged.point_ids = vec!["HAVI2".into(), "PIAI2".into()];
        let mut quiet = ForecastGroup::new("SPOON", "Spoon River");
        quiet.recommend_all_points = true;
        quiet.point_ids = vec!["HAVI2".into()];

        include_points(&mut points, &mut map, ProductClass::Flw);
        let pulled = apply_group_bleed_through(&[unflagged, quiet], &mut points, &mut map, ProductClass::Flw);
        assert!(pulled.is_empty());
        assert_eq!(map["HAVI2"].action, VtecAction::NoAction);
    }

    #[test]
    fn test_groups_and_counties_follow_members() {
        let mut points = vec![point("HAVI2", true), point("PIAI2", true)];
        points[1].include_in_recommendation = true;

        let mut illinois = ForecastGroup::new("ILLINOIS", "Illinois River");
        illinois.point_ids = vec!["HAVI2".into(), "PIAI2".into()];
        let mut spoon = ForecastGroup::new("SPOON", "Spoon River");
        spoon.point_ids = vec!["HAVI2".into()];
        let mut groups = vec![illinois, spoon];

        let mut peoria = CountyGroup::new("IL", "Peoria");
        peoria.point_ids = vec!["PIAI2".into()];
        let mut counties = vec![peoria];

        include_groups(&mut groups, &mut counties, &points);
        assert!(groups[0].include_in_recommendation);
        assert!(!groups[1].include_in_recommendation);
        assert!(counties[0].include_in_recommendation);
    }
}
