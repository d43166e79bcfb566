/// Event continuity and recommendation policy.
///
/// Submodules:
/// - `continuity` — per-point action/product from the previous event
/// - `inclusion`  — most severe product, group bleed-through, group flags
///
/// `recommend_events` runs both in order over an analyzed point set.

pub mod continuity;
pub mod inclusion;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::HazardSettings;
use crate::model::{CountyGroup, ForecastGroup, ForecastPoint, PreviousEvent, ProductClass, RecommendedEvent};

pub use continuity::{is_active, recommend_point, rise_fall_flags};
pub use inclusion::{apply_group_bleed_through, include_groups, include_points, most_severe_product};

/// Outcome of one recommendation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub events: BTreeMap<String, RecommendedEvent>,
    pub most_severe_product: ProductClass,
}

/// Recommends an event for every point, then applies the inclusion rules.
///
/// Updates the inclusion flags on points, groups and counties in place.
pub fn recommend_events(
    points: &mut [ForecastPoint],
    groups: &mut [ForecastGroup],
    counties: &mut [CountyGroup],
    previous: &HashMap<String, PreviousEvent>,
    settings: &HazardSettings,
    as_of: DateTime<Utc>,
) -> Recommendation {
    let mut events: BTreeMap<String, RecommendedEvent> = points
        .iter()
        .map(|point| {
            let event = recommend_point(point, previous.get(&point.lid), settings, as_of);
            (point.lid.clone(), event)
        })
        .collect();

    let most_severe = most_severe_product(&events);
    include_points(points, &mut events, most_severe);
    let pulled = apply_group_bleed_through(groups, points, &mut events, most_severe);
    include_groups(groups, counties, points);

    info!(
        product = %most_severe,
        points = points.len(),
        included = points.iter().filter(|p| p.include_in_recommendation).count(),
        pulled_in = pulled.len(),
        "recommendation complete"
    );

    Recommendation {
        events,
        most_severe_product: most_severe,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
