/// The recommendation snapshot: the single data contract with downstream
/// consumers (staging UI, product generation).
///
/// Built once per orchestration pass, then frozen. The cache hands out
/// `Arc<Snapshot>`; nothing mutates a snapshot after it is stored.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{CountyGroup, ForecastGroup, ForecastPoint, ProductClass, RecommendedEvent};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// The `as_of` instant the snapshot was built for.
    pub build_time: DateTime<Utc>,
    pub home_region: String,
    pub groups: Vec<ForecastGroup>,
    pub counties: Vec<CountyGroup>,
    /// Points in group order.
    pub points: Vec<ForecastPoint>,
    pub events: BTreeMap<String, RecommendedEvent>,
    pub most_severe_product: ProductClass,
    #[serde(skip)]
    point_index: HashMap<String, usize>,
}

impl Snapshot {
    pub fn new(
        build_time: DateTime<Utc>,
        home_region: &str,
        groups: Vec<ForecastGroup>,
        counties: Vec<CountyGroup>,
        points: Vec<ForecastPoint>,
        events: BTreeMap<String, RecommendedEvent>,
        most_severe_product: ProductClass,
    ) -> Self {
        let point_index = points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.lid.clone(), i))
            .collect();
        Self {
            build_time,
            home_region: home_region.to_string(),
            groups,
            counties,
            points,
            events,
            most_severe_product,
            point_index,
        }
    }

    pub fn point(&self, lid: &str) -> Option<&ForecastPoint> {
        self.point_index.get(lid).map(|&i| &self.points[i])
    }

    pub fn event(&self, lid: &str) -> Option<&RecommendedEvent> {
        self.events.get(lid)
    }

    pub fn group(&self, id: &str) -> Option<&ForecastGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn county(&self, state: &str, county: &str) -> Option<&CountyGroup> {
        self.counties
            .iter()
            .find(|c| c.state == state && c.county == county)
    }

    /// Members of a group, in the group's order. Unknown LIDs are skipped.
    pub fn points_in_group<'a>(
        &'a self,
        group: &'a ForecastGroup,
    ) -> impl Iterator<Item = &'a ForecastPoint> + 'a {
        group.point_ids.iter().filter_map(move |lid| self.point(lid))
    }

    /// Points flagged for the recommendation.
    pub fn included_points(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter().filter(|p| p.include_in_recommendation)
    }
}
