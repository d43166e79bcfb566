/// Data access for the hazard recommendation service.
///
/// `HazardDataAccess` is the only way the recommender reads the outside
/// world. Every query returns typed domain values; positional rows never
/// leave the adapter. Any query failure is an error, never an empty result.
///
/// Implementations:
/// - `memory`   — `MemoryStore`, an in-process store for tests and demos
/// - `pg`       — `PgHazardStore`, reads the IHFS-style tables

pub mod memory;
pub mod pg;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::HazardSettings;
use crate::error::HazardError;
use crate::model::{
    CountyGroup, CrestRecord, ForecastGroup, ForecastHydrograph, ForecastPoint, ObservedHydrograph,
    PrecipHydrograph, PreviousEvent,
};

pub use memory::MemoryStore;
pub use pg::PgHazardStore;

/// Which hydrograph table a type-source ranking applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HydrographKind {
    Observed,
    Forecast,
    Precip,
}

impl HydrographKind {
    /// Type-source codes of this kind start with this letter.
    pub fn type_source_prefix(self) -> char {
        match self {
            HydrographKind::Observed | HydrographKind::Precip => 'R',
            HydrographKind::Forecast => 'F',
        }
    }
}

/// Inclusive time window for a hydrograph query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { begin, end }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.begin && t <= self.end
    }
}

/// Read-only queries the recommender needs.
///
/// Points come back with identity, thresholds and per-point settings but
/// no hydrographs; the recommender selects type-sources and loads series
/// separately.
pub trait HazardDataAccess {
    /// Global hazard settings.
    fn settings(&self) -> Result<HazardSettings, HazardError>;

    /// Forecast groups of a home region, in display order, with member LIDs.
    fn forecast_groups(&self, region: &str) -> Result<Vec<ForecastGroup>, HazardError>;

    /// Points of one forecast group, in group order.
    fn forecast_points_for_group(&self, group_id: &str) -> Result<Vec<ForecastPoint>, HazardError>;

    /// Points by LID; unknown LIDs are left out.
    fn forecast_points(&self, lids: &[String]) -> Result<Vec<ForecastPoint>, HazardError>;

    /// County groups of a home region, with member LIDs.
    fn county_groups(&self, region: &str) -> Result<Vec<CountyGroup>, HazardError>;

    fn observed_hydrograph(
        &self,
        lid: &str,
        physical_element: &str,
        type_source: &str,
        window: TimeWindow,
    ) -> Result<ObservedHydrograph, HazardError>;

    /// Forecast entries valid inside `window`, every issuance included.
    fn forecast_hydrograph(
        &self,
        lid: &str,
        physical_element: &str,
        type_source: &str,
        window: TimeWindow,
    ) -> Result<ForecastHydrograph, HazardError>;

    fn precip_hydrograph(
        &self,
        lid: &str,
        physical_element: &str,
        type_source: &str,
        window: TimeWindow,
    ) -> Result<PrecipHydrograph, HazardError>;

    /// Historical crests, most recent first.
    fn crest_history(&self, lid: &str) -> Result<Vec<CrestRecord>, HazardError>;

    /// Type-sources for a point and element, best first.
    fn type_source_ranking(
        &self,
        lid: &str,
        physical_element: &str,
        kind: HydrographKind,
    ) -> Result<Vec<String>, HazardError>;

    /// Most recently issued event per LID. LIDs without one are absent.
    fn previous_events(&self, lids: &[String]) -> Result<HashMap<String, PreviousEvent>, HazardError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_window_is_inclusive() {
        let begin = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let window = TimeWindow::new(begin, begin + Duration::hours(6));
        assert!(window.contains(begin));
        assert!(window.contains(begin + Duration::hours(6)));
        assert!(!window.contains(begin - Duration::seconds(1)));
    }

    #[test]
    fn test_type_source_prefixes() {
        assert_eq!(HydrographKind::Observed.type_source_prefix(), 'R');
        assert_eq!(HydrographKind::Forecast.type_source_prefix(), 'F');
        assert_eq!(HydrographKind::Precip.type_source_prefix(), 'R');
    }
}
