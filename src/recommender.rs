/// Snapshot orchestration.
///
/// `Recommender` owns a data-access store and a `SnapshotCache`. A call to
/// `get_snapshot` either returns the cached snapshot or runs one full pass:
///
/// 1. Load settings, the home region's groups and their points
/// 2. Per point: pick type-sources by ranking and load observed, forecast
///    and precipitation series plus crest history
/// 3. Analyze every point, roll up groups and counties
/// 4. Load previous events and run the continuity and inclusion rules
/// 5. Assemble the snapshot and cache it
///
/// Any data-access failure abandons the pass; nothing is cached.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::analysis::{analyze_point, compute_county_rollups, compute_group_rollups, derive_county_groups};
use crate::cache::SnapshotCache;
use crate::config::{HazardSettings, ServiceConfig};
use crate::data_access::{HazardDataAccess, HydrographKind, TimeWindow};
use crate::error::HazardError;
use crate::model::{
    ForecastHydrograph, ForecastPoint, ObservedHydrograph, PrecipHydrograph, Snapshot, PE_PRECIP,
};
use crate::recommend::recommend_events;

pub struct Recommender<S: HazardDataAccess> {
    store: S,
    home_region: String,
    cache: SnapshotCache,
}

impl<S: HazardDataAccess> Recommender<S> {
    pub fn new(store: S, config: &ServiceConfig) -> Self {
        Self {
            store,
            home_region: config.home_region.clone(),
            cache: SnapshotCache::new(config.cache),
        }
    }

    pub fn home_region(&self) -> &str {
        &self.home_region
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Returns the cached snapshot when it is valid at `as_of`, otherwise
    /// builds, caches and returns a new one.
    pub fn get_snapshot(&self, as_of: DateTime<Utc>) -> Result<Arc<Snapshot>, HazardError> {
        if let Some(snapshot) = self.cache.get(as_of, false) {
            debug!(as_of = %as_of, built = %snapshot.build_time, "snapshot cache hit");
            return Ok(snapshot);
        }

        let snapshot = Arc::new(self.build_snapshot(as_of)?);
        self.cache.put(as_of, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Runs one full pass without touching the cache.
    pub fn build_snapshot(&self, as_of: DateTime<Utc>) -> Result<Snapshot, HazardError> {
        let settings = self.store.settings()?.validated();
        let mut groups = self.store.forecast_groups(&self.home_region)?;

        let mut points: Vec<ForecastPoint> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for group in &groups {
            for point in self.store.forecast_points_for_group(&group.id)? {
                if seen.insert(point.lid.clone()) {
                    points.push(point);
                } else {
                    warn!(lid = %point.lid, group = %group.id, "point listed in more than one group");
                }
            }
        }

        for point in points.iter_mut() {
            self.load_point_data(point, &settings, as_of)?;
            analyze_point(point, &settings, as_of);
        }

        compute_group_rollups(&mut groups, &points);
        let mut counties = self.store.county_groups(&self.home_region)?;
        if counties.is_empty() {
            counties = derive_county_groups(&points);
        }
        compute_county_rollups(&mut counties, &points);

        let lids: Vec<String> = points.iter().map(|p| p.lid.clone()).collect();
        let previous = self.store.previous_events(&lids)?;

        let recommendation = recommend_events(
            &mut points,
            &mut groups,
            &mut counties,
            &previous,
            &settings,
            as_of,
        );

        info!(
            region = %self.home_region,
            as_of = %as_of,
            groups = groups.len(),
            points = points.len(),
            previous_events = previous.len(),
            product = %recommendation.most_severe_product,
            "snapshot built"
        );

        Ok(Snapshot::new(
            as_of,
            &self.home_region,
            groups,
            counties,
            points,
            recommendation.events,
            recommendation.most_severe_product,
        ))
    }

    /// Loads the series and crest history a point is analyzed from.
    fn load_point_data(
        &self,
        point: &mut ForecastPoint,
        settings: &HazardSettings,
        as_of: DateTime<Utc>,
    ) -> Result<(), HazardError> {
        let lid = point.lid.clone();
        let pe = point.physical_element.clone();
        let look_back = TimeWindow::new(as_of - Duration::hours(point.look_back_hours(settings)), as_of);
        let look_forward = TimeWindow::new(as_of, as_of + Duration::hours(point.look_forward_hours(settings)));

        point.observed = self
            .select_observed(&lid, &pe, look_back)?
            .unwrap_or_else(|| ObservedHydrograph::empty(&lid, &pe));

        let basis_cutoff = as_of - Duration::hours(settings.basis_hours);
        point.forecast = self
            .select_forecast(&lid, &pe, look_forward, basis_cutoff, point.use_latest_forecast)?
            .unwrap_or_else(|| ForecastHydrograph::empty(&lid, &pe));

        point.precip = self.select_precip(&lid, look_back)?;
        point.crest_history = self.store.crest_history(&lid)?;

        debug!(
            lid = %lid,
            observed_ts = %point.observed.type_source,
            observed = point.observed.len(),
            forecast_ts = %point.forecast.type_source,
            forecast = point.forecast.len(),
            "point data loaded"
        );
        Ok(())
    }

    /// First ranked observed type-source with data in the window.
    fn select_observed(
        &self,
        lid: &str,
        pe: &str,
        window: TimeWindow,
    ) -> Result<Option<ObservedHydrograph>, HazardError> {
        for ts in self.store.type_source_ranking(lid, pe, HydrographKind::Observed)? {
            let series = self.store.observed_hydrograph(lid, pe, &ts, window)?;
            if series.has_data() {
                return Ok(Some(series));
            }
        }
        Ok(None)
    }

    /// First ranked forecast type-source with data left after the basis rules.
    fn select_forecast(
        &self,
        lid: &str,
        pe: &str,
        window: TimeWindow,
        basis_cutoff: DateTime<Utc>,
        use_latest: bool,
    ) -> Result<Option<ForecastHydrograph>, HazardError> {
        for ts in self.store.type_source_ranking(lid, pe, HydrographKind::Forecast)? {
            let mut series = self.store.forecast_hydrograph(lid, pe, &ts, window)?;
            series.kind.basis_time_cutoff = Some(basis_cutoff);
            series.kind.use_latest_forecast = use_latest;
            series.apply_basis_rules();
            if series.has_data() {
                return Ok(Some(series));
            }
        }
        Ok(None)
    }

    fn select_precip(&self, lid: &str, window: TimeWindow) -> Result<Option<PrecipHydrograph>, HazardError> {
        for ts in self.store.type_source_ranking(lid, PE_PRECIP, HydrographKind::Precip)? {
            let series = self.store.precip_hydrograph(lid, PE_PRECIP, &ts, window)?;
            if series.has_data() {
                return Ok(Some(series));
            }
        }
        Ok(None)
    }

    pub fn purge(&self) {
        self.cache.purge();
    }

    pub fn purge_on_complete(&self) {
        self.cache.purge_on_complete();
    }

    pub fn set_cache_ttl(&self, ttl: Duration) {
        self.cache.set_ttl(ttl);
    }

    pub fn set_auto_purge(&self, enabled: bool) {
        self.cache.set_auto_purge(enabled);
    }

    pub fn set_purge_on_complete(&self, enabled: bool) {
        self.cache.set_purge_on_complete(enabled);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
