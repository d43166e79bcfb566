/// In-process hazard store.
///
/// Holds everything a snapshot build reads, keyed the same way the
/// database tables are. Used by the tests in place of PostgreSQL. A store
/// can be told to fail one operation so callers can exercise their error
/// paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{HazardDataAccess, HydrographKind, TimeWindow};
use crate::config::HazardSettings;
use crate::error::HazardError;
use crate::model::{
    CountyGroup, CrestRecord, Entry, Forecast, ForecastGroup, ForecastHydrograph, ForecastPoint, Observed,
    ObservedHydrograph, Precip, PrecipHydrograph, PreviousEvent,
};

type SeriesKey = (String, String, String);

fn series_key(lid: &str, physical_element: &str, type_source: &str) -> SeriesKey {
    (lid.to_string(), physical_element.to_string(), type_source.to_string())
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: HazardSettings,
    groups: Vec<(String, ForecastGroup)>,
    counties: Vec<(String, CountyGroup)>,
    points: Vec<ForecastPoint>,
    observed: HashMap<SeriesKey, Vec<Entry>>,
    forecast: HashMap<SeriesKey, Vec<Entry>>,
    precip: HashMap<SeriesKey, Vec<Entry>>,
    crests: HashMap<String, Vec<CrestRecord>>,
    rankings: HashMap<(String, String, HydrographKind), Vec<String>>,
    previous: HashMap<String, PreviousEvent>,
    failing_operation: Option<String>,
    queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new(settings: HazardSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Adds a group to a region. Member LIDs come from the group itself.
    pub fn add_group(&mut self, region: &str, group: ForecastGroup) -> &mut Self {
        self.groups.push((region.to_string(), group));
        self
    }

    pub fn add_county(&mut self, region: &str, county: CountyGroup) -> &mut Self {
        self.counties.push((region.to_string(), county));
        self
    }

    /// Adds a point. Any hydrographs on it are ignored; add series with
    /// the `add_*` methods below.
    pub fn add_point(&mut self, point: ForecastPoint) -> &mut Self {
        self.points.push(point);
        self
    }

    pub fn add_observed(&mut self, lid: &str, pe: &str, ts: &str, entries: Vec<Entry>) -> &mut Self {
        self.observed.entry(series_key(lid, pe, ts)).or_default().extend(entries);
        self
    }

    pub fn add_forecast(&mut self, lid: &str, pe: &str, ts: &str, entries: Vec<Entry>) -> &mut Self {
        self.forecast.entry(series_key(lid, pe, ts)).or_default().extend(entries);
        self
    }

    pub fn add_precip(&mut self, lid: &str, pe: &str, ts: &str, entries: Vec<Entry>) -> &mut Self {
        self.precip.entry(series_key(lid, pe, ts)).or_default().extend(entries);
        self
    }

    pub fn add_crest(&mut self, lid: &str, crest: CrestRecord) -> &mut Self {
        self.crests.entry(lid.to_string()).or_default().push(crest);
        self
    }

    /// Sets the type-source ranking for a point, best first. Without one,
    /// every type-source with stored data is ranked alphabetically.
    pub fn set_ranking(&mut self, lid: &str, pe: &str, kind: HydrographKind, ranking: &[&str]) -> &mut Self {
        self.rankings.insert(
            (lid.to_string(), pe.to_string(), kind),
            ranking.iter().map(|ts| ts.to_string()).collect(),
        );
        self
    }

    pub fn add_previous_event(&mut self, event: PreviousEvent) -> &mut Self {
        self.previous.insert(event.lid.clone(), event);
        self
    }

    /// Makes every later call of `operation` fail.
    pub fn fail_on(&mut self, operation: &str) -> &mut Self {
        self.failing_operation = Some(operation.to_string());
        self
    }

    pub fn clear_failure(&mut self) -> &mut Self {
        self.failing_operation = None;
        self
    }

    /// Number of queries served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn begin(&self, operation: &str) -> Result<(), HazardError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match &self.failing_operation {
            Some(failing) if failing == operation => {
                Err(HazardError::data_access(operation, "injected failure"))
            }
            _ => Ok(()),
        }
    }

    fn series(
        table: &HashMap<SeriesKey, Vec<Entry>>,
        lid: &str,
        pe: &str,
        ts: &str,
        window: TimeWindow,
    ) -> Vec<Entry> {
        table
            .get(&series_key(lid, pe, ts))
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| window.contains(e.time))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn point_template(point: &ForecastPoint) -> ForecastPoint {
        let mut template = point.clone();
        template.observed = ObservedHydrograph::empty(&point.lid, &point.physical_element);
        template.forecast = ForecastHydrograph::empty(&point.lid, &point.physical_element);
        template.precip = None;
        template.crest_history.clear();
        template
    }
}

impl HazardDataAccess for MemoryStore {
    fn settings(&self) -> Result<HazardSettings, HazardError> {
        self.begin("settings")?;
        Ok(self.settings.clone())
    }

    fn forecast_groups(&self, region: &str) -> Result<Vec<ForecastGroup>, HazardError> {
        self.begin("forecast_groups")?;
        let mut groups: Vec<ForecastGroup> = self
            .groups
            .iter()
            .filter(|(r, _)| r == region)
            .map(|(_, g)| g.clone())
            .collect();
        groups.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.id.cmp(&b.id)));
        Ok(groups)
    }

    fn forecast_points_for_group(&self, group_id: &str) -> Result<Vec<ForecastPoint>, HazardError> {
        self.begin("forecast_points_for_group")?;
        let mut points: Vec<ForecastPoint> = self
            .points
            .iter()
            .filter(|p| p.group_id == group_id)
            .map(Self::point_template)
            .collect();
        points.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.lid.cmp(&b.lid)));
        Ok(points)
    }

    fn forecast_points(&self, lids: &[String]) -> Result<Vec<ForecastPoint>, HazardError> {
        self.begin("forecast_points")?;
        Ok(self
            .points
            .iter()
            .filter(|p| lids.contains(&p.lid))
            .map(Self::point_template)
            .collect())
    }

    fn county_groups(&self, region: &str) -> Result<Vec<CountyGroup>, HazardError> {
        self.begin("county_groups")?;
        Ok(self
            .counties
            .iter()
            .filter(|(r, _)| r == region)
            .map(|(_, c)| c.clone())
            .collect())
    }

    fn observed_hydrograph(
        &self,
        lid: &str,
        physical_element: &str,
        type_source: &str,
        window: TimeWindow,
    ) -> Result<ObservedHydrograph, HazardError> {
        self.begin("observed_hydrograph")?;
        let entries = Self::series(&self.observed, lid, physical_element, type_source, window);
        Ok(ObservedHydrograph::new(lid, physical_element, type_source, Observed, entries)
            .with_window(window.begin, window.end))
    }

    fn forecast_hydrograph(
        &self,
        lid: &str,
        physical_element: &str,
        type_source: &str,
        window: TimeWindow,
    ) -> Result<ForecastHydrograph, HazardError> {
        self.begin("forecast_hydrograph")?;
        let entries = Self::series(&self.forecast, lid, physical_element, type_source, window);
        Ok(ForecastHydrograph::new(lid, physical_element, type_source, Forecast::default(), entries)
            .with_window(window.begin, window.end))
    }

    fn precip_hydrograph(
        &self,
        lid: &str,
        physical_element: &str,
        type_source: &str,
        window: TimeWindow,
    ) -> Result<PrecipHydrograph, HazardError> {
        self.begin("precip_hydrograph")?;
        let entries = Self::series(&self.precip, lid, physical_element, type_source, window);
        Ok(PrecipHydrograph::new(lid, physical_element, type_source, Precip, entries)
            .with_window(window.begin, window.end))
    }

    fn crest_history(&self, lid: &str) -> Result<Vec<CrestRecord>, HazardError> {
        self.begin("crest_history")?;
        let mut crests = self.crests.get(lid).cloned().unwrap_or_default();
        crests.sort_by(|a, b| b.crest_time.cmp(&a.crest_time));
        Ok(crests)
    }

    fn type_source_ranking(
        &self,
        lid: &str,
        physical_element: &str,
        kind: HydrographKind,
    ) -> Result<Vec<String>, HazardError> {
        self.begin("type_source_ranking")?;
        if let Some(ranking) = self
            .rankings
            .get(&(lid.to_string(), physical_element.to_string(), kind))
        {
            return Ok(ranking.clone());
        }
        let table = match kind {
            HydrographKind::Observed => &self.observed,
            HydrographKind::Forecast => &self.forecast,
            HydrographKind::Precip => &self.precip,
        };
        let mut ranking: Vec<String> = table
            .keys()
            .filter(|(l, pe, _)| l == lid && pe == physical_element)
            .map(|(_, _, ts)| ts.clone())
            .collect();
        ranking.sort();
        Ok(ranking)
    }

    fn previous_events(&self, lids: &[String]) -> Result<HashMap<String, PreviousEvent>, HazardError> {
        self.begin("previous_events")?;
        Ok(lids
            .iter()
            .filter_map(|lid| self.previous.get(lid).map(|e| (lid.clone(), e.clone())))
            .collect())
    }
}
