/// PostgreSQL hazard store over the IHFS-style tables.
///
/// Schema: `sql/001_hazard_schema.sql`. Every row is mapped field by field
/// with `try_get`; a field that cannot be read becomes "no data" (the
/// missing sentinel, `None`, or an empty string) with a warning, and the
/// rest of the row is kept. Query failures are errors.
///
/// NUMERIC columns (thresholds, change threshold, crest values) are read as
/// `rust_decimal::Decimal` and converted to `f64`.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use postgres::types::{FromSql, ToSql};
use postgres::{Client, Row};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::{HazardDataAccess, HydrographKind, TimeWindow};
use crate::config::HazardSettings;
use crate::db;
use crate::error::HazardError;
use crate::model::{
    is_stage_element, CategoryThresholds, CountyGroup, CrestRecord, Entry, FloodCategory, Forecast, ForecastGroup,
    ForecastHydrograph, ForecastPoint, Observed, ObservedHydrograph, Precip, PrecipHydrograph, PreviousEvent,
    ProductClass, VtecAction, MISSING_INT, MISSING_VALUE, PE_STAGE,
};

// ---------------------------------------------------------------------------
// Field mapping
// ---------------------------------------------------------------------------

/// Reads an optional column, logging and returning `None` when the value
/// has an unexpected type.
fn field<'a, T: FromSql<'a>>(row: &'a Row, column: &str, context: &str) -> Option<T> {
    match row.try_get::<_, Option<T>>(column) {
        Ok(value) => value,
        Err(e) => {
            warn!(context, column, error = %e, "unreadable field, treating as no data");
            None
        }
    }
}

fn numeric(row: &Row, column: &str, context: &str) -> f64 {
    field::<Decimal>(row, column, context)
        .and_then(|d| d.to_f64())
        .unwrap_or(MISSING_VALUE)
}

fn float(row: &Row, column: &str, context: &str) -> f64 {
    field::<f64>(row, column, context).unwrap_or(MISSING_VALUE)
}

fn integer(row: &Row, column: &str, context: &str) -> i64 {
    field::<i32>(row, column, context).map_or(MISSING_INT, i64::from)
}

fn text(row: &Row, column: &str, context: &str) -> String {
    field::<String>(row, column, context).unwrap_or_default()
}

fn code(row: &Row, column: &str, context: &str) -> char {
    text(row, column, context).chars().next().unwrap_or('Z')
}

fn timestamp(row: &Row, column: &str, context: &str) -> Option<DateTime<Utc>> {
    field::<DateTime<Utc>>(row, column, context)
}

/// IHFS flags are single characters; `T` and `Y` mean yes.
fn flag(row: &Row, column: &str, context: &str) -> bool {
    matches!(code(row, column, context), 'T' | 't' | 'Y' | 'y')
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const POINT_COLUMNS: &str = "p.lid, p.group_id, p.ordinal, p.chg_threshold, p.backhrs, p.forwardhrs, \
     p.adjustendhrs, l.name, l.county, l.state, r.primary_pe, r.fs, r.wstg, r.fq, r.action_flow, \
     r.use_latest_fcst, f.minor_stage, f.moderate_stage, f.major_stage, f.record_stage, \
     f.minor_flow, f.moderate_flow, f.major_flow, f.record_flow";

const POINT_FROM: &str = "FROM rpffcstpoint p \
     JOIN location l ON l.lid = p.lid \
     LEFT JOIN riverstat r ON r.lid = p.lid \
     LEFT JOIN floodcat f ON f.lid = p.lid";

fn point_from_row(row: &Row) -> Option<ForecastPoint> {
    let lid: String = field(row, "lid", "rpffcstpoint")?;
    let ctx = lid.as_str();
    let mut pe = text(row, "primary_pe", ctx);
    if pe.is_empty() {
        pe = PE_STAGE.to_string();
    }

    let mut point = ForecastPoint::new(&lid, &pe);
    point.name = text(row, "name", ctx);
    point.group_id = text(row, "group_id", ctx);
    point.county = text(row, "county", ctx);
    point.state = text(row, "state", ctx);
    point.ordinal = integer(row, "ordinal", ctx);
    point.change_threshold = numeric(row, "chg_threshold", ctx);
    point.look_back_hours = integer(row, "backhrs", ctx);
    point.look_forward_hours = integer(row, "forwardhrs", ctx);
    point.end_shift_hours = field::<Decimal>(row, "adjustendhrs", ctx)
        .and_then(|d| d.round().to_i64())
        .unwrap_or(MISSING_INT);
    point.use_latest_forecast = flag(row, "use_latest_fcst", ctx);

    point.thresholds.flood_stage = numeric(row, "fs", ctx);
    point.thresholds.action_stage = numeric(row, "wstg", ctx);
    point.thresholds.flood_flow = numeric(row, "fq", ctx);
    point.thresholds.action_flow = numeric(row, "action_flow", ctx);
    point.thresholds.stage = CategoryThresholds::new(
        numeric(row, "minor_stage", ctx),
        numeric(row, "moderate_stage", ctx),
        numeric(row, "major_stage", ctx),
        numeric(row, "record_stage", ctx),
    );
    point.thresholds.flow = CategoryThresholds::new(
        numeric(row, "minor_flow", ctx),
        numeric(row, "moderate_flow", ctx),
        numeric(row, "major_flow", ctx),
        numeric(row, "record_flow", ctx),
    );
    if !point.category_thresholds().is_ordered() {
        warn!(lid = %lid, "category thresholds out of order");
    }
    Some(point)
}

fn entry_from_row(row: &Row, time_column: &str, context: &str) -> Option<Entry> {
    let time = timestamp(row, time_column, context)?;
    let mut entry = Entry::new(float(row, "value", context), time, &text(row, "ts", context));
    entry.extremum = code(row, "extremum", context);
    entry.shef_qual_code = code(row, "shef_qual_code", context);
    entry.quality_code = integer(row, "quality_code", context);
    entry.product_id = text(row, "product_id", context);
    entry.product_time = timestamp(row, "producttime", context);
    Some(entry)
}

fn previous_event_from_row(row: &Row) -> Option<PreviousEvent> {
    let lid: String = field(row, "lid", "vtecevent")?;
    let ctx = lid.as_str();
    let action_code = text(row, "action", ctx);
    let product_code = text(row, "product_class", ctx);
    let (Some(action), Some(product)) = (VtecAction::from_code(&action_code), ProductClass::from_code(&product_code))
    else {
        warn!(lid = %lid, action = %action_code, product = %product_code, "unknown event codes, ignoring event");
        return None;
    };

    let mut event = PreviousEvent::new(&lid, action, product);
    event.begin_time = timestamp(row, "begintime", ctx);
    event.end_time = timestamp(row, "endtime", ctx);
    event.product_time = timestamp(row, "producttime", ctx);
    event.observed_value = float(row, "obsvalue", ctx);
    event.max_forecast_value = float(row, "maxfcstvalue", ctx);
    event.category = FloodCategory::from_index(integer(row, "severity_cat", ctx));
    Some(event)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Hazard store backed by one PostgreSQL connection.
///
/// The connection sits behind a mutex so the store can be shared by the
/// endpoint's worker threads; queries are serialized. `defaults` fills any
/// setting the `hazard_settings` table leaves empty.
pub struct PgHazardStore {
    client: Mutex<Client>,
    defaults: HazardSettings,
}

impl PgHazardStore {
    pub fn new(client: Client, defaults: HazardSettings) -> Self {
        Self {
            client: Mutex::new(client),
            defaults,
        }
    }

    /// Connects using `DATABASE_URL` and checks the hazard tables exist.
    pub fn connect(defaults: HazardSettings) -> Result<Self, HazardError> {
        let client = db::connect_and_verify_tables(db::HAZARD_TABLES)?;
        Ok(Self::new(client, defaults))
    }

    fn query(
        &self,
        operation: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, HazardError> {
        let mut client = self
            .client
            .lock()
            .map_err(|_| HazardError::data_access(operation, "database client lock poisoned"))?;
        let rows = client
            .query(sql, params)
            .map_err(|e| HazardError::data_access(operation, e))?;
        debug!(operation, rows = rows.len(), "query complete");
        Ok(rows)
    }

    #[allow(clippy::too_many_arguments)]
    fn entries(
        &self,
        operation: &str,
        sql: &str,
        time_column: &str,
        lid: &str,
        pe: &str,
        ts: &str,
        window: TimeWindow,
    ) -> Result<Vec<Entry>, HazardError> {
        let rows = self.query(operation, sql, &[&lid, &pe, &ts, &window.begin, &window.end])?;
        let forecast = time_column == "validtime";
        Ok(rows
            .iter()
            .filter_map(|row| {
                let entry = entry_from_row(row, time_column, lid)?;
                if !forecast {
                    return Some(entry);
                }
                Some(match timestamp(row, "basistime", lid) {
                    Some(basis) => entry.with_basis_time(basis),
                    None => entry,
                })
            })
            .collect())
    }
}

fn observed_table(pe: &str) -> &'static str {
    if is_stage_element(pe) { "height" } else { "discharge" }
}

fn forecast_table(pe: &str) -> &'static str {
    if is_stage_element(pe) { "fcstheight" } else { "fcstdischarge" }
}

impl HazardDataAccess for PgHazardStore {
    fn settings(&self) -> Result<HazardSettings, HazardError> {
        let rows = self.query(
            "settings",
            "SELECT obs_look_back_hours, fcst_look_forward_hours, basis_hours, end_time_shift_hours, \
                    default_stage_window, record_stage_offset, record_flow_offset, expire_window_hours \
             FROM hazard_settings ORDER BY id LIMIT 1",
            &[],
        )?;
        let defaults = &self.defaults;
        let Some(row) = rows.first() else {
            return Ok(defaults.validated());
        };
        let ctx = "hazard_settings";
        let hours = |column: &str, default: i64| {
            let value = integer(row, column, ctx);
            if value == MISSING_INT { default } else { value }
        };
        let value = |column: &str, default: f64| {
            let v = numeric(row, column, ctx);
            if v == MISSING_VALUE { default } else { v }
        };
        let settings = HazardSettings {
            obs_look_back_hours: hours("obs_look_back_hours", defaults.obs_look_back_hours),
            fcst_look_forward_hours: hours("fcst_look_forward_hours", defaults.fcst_look_forward_hours),
            basis_hours: hours("basis_hours", defaults.basis_hours),
            end_time_shift_hours: hours("end_time_shift_hours", defaults.end_time_shift_hours),
            default_stage_window: value("default_stage_window", defaults.default_stage_window),
            record_stage_offset: value("record_stage_offset", defaults.record_stage_offset),
            record_flow_offset: value("record_flow_offset", defaults.record_flow_offset),
            expire_window_hours: hours("expire_window_hours", defaults.expire_window_hours),
        };
        Ok(settings.validated())
    }

    fn forecast_groups(&self, region: &str) -> Result<Vec<ForecastGroup>, HazardError> {
        let rows = self.query(
            "forecast_groups",
            "SELECT g.group_id, g.group_name, g.ordinal, g.rec_all_included, p.lid \
             FROM rpffcstgroup g \
             JOIN rpffcstpoint p ON p.group_id = g.group_id \
             JOIN location l ON l.lid = p.lid \
             WHERE l.hsa = $1 \
             ORDER BY g.ordinal, g.group_id, p.ordinal, p.lid",
            &[&region],
        )?;

        let mut groups: Vec<ForecastGroup> = Vec::new();
        for row in &rows {
            let Some(id) = field::<String>(row, "group_id", "rpffcstgroup") else {
                continue;
            };
            let lid = text(row, "lid", &id);
            match groups.last_mut() {
                Some(group) if group.id == id => group.point_ids.push(lid),
                _ => {
                    let mut group = ForecastGroup::new(&id, &text(row, "group_name", &id));
                    group.ordinal = integer(row, "ordinal", &id);
                    group.recommend_all_points = flag(row, "rec_all_included", &id);
                    group.point_ids.push(lid);
                    groups.push(group);
                }
            }
        }
        Ok(groups)
    }

    fn forecast_points_for_group(&self, group_id: &str) -> Result<Vec<ForecastPoint>, HazardError> {
        let sql = format!(
            "SELECT {} {} WHERE p.group_id = $1 ORDER BY p.ordinal, p.lid",
            POINT_COLUMNS, POINT_FROM
        );
        let rows = self.query("forecast_points_for_group", &sql, &[&group_id])?;
        Ok(rows.iter().filter_map(point_from_row).collect())
    }

    fn forecast_points(&self, lids: &[String]) -> Result<Vec<ForecastPoint>, HazardError> {
        let sql = format!(
            "SELECT {} {} WHERE p.lid = ANY($1) ORDER BY p.group_id, p.ordinal, p.lid",
            POINT_COLUMNS, POINT_FROM
        );
        let rows = self.query("forecast_points", &sql, &[&lids])?;
        Ok(rows.iter().filter_map(point_from_row).collect())
    }

    fn county_groups(&self, region: &str) -> Result<Vec<CountyGroup>, HazardError> {
        let rows = self.query(
            "county_groups",
            "SELECT c.state, c.county, c.lid \
             FROM countynum c \
             JOIN location l ON l.lid = c.lid \
             JOIN rpffcstpoint p ON p.lid = c.lid \
             WHERE l.hsa = $1 \
             ORDER BY c.state, c.county, p.ordinal, c.lid",
            &[&region],
        )?;

        let mut counties: Vec<CountyGroup> = Vec::new();
        for row in &rows {
            let state = text(row, "state", "countynum");
            let county = text(row, "county", "countynum");
            let lid = text(row, "lid", "countynum");
            if county.is_empty() || lid.is_empty() {
                continue;
            }
            match counties.last_mut() {
                Some(c) if c.state == state && c.county == county => c.point_ids.push(lid),
                _ => {
                    let mut c = CountyGroup::new(&state, &county);
                    c.point_ids.push(lid);
                    counties.push(c);
                }
            }
        }
        Ok(counties)
    }

    fn observed_hydrograph(
        &self,
        lid: &str,
        physical_element: &str,
        type_source: &str,
        window: TimeWindow,
    ) -> Result<ObservedHydrograph, HazardError> {
        let sql = format!(
            "SELECT value, obstime, ts, extremum, shef_qual_code, quality_code, product_id, producttime \
             FROM {} WHERE lid = $1 AND pe = $2 AND ts = $3 AND obstime BETWEEN $4 AND $5 \
             ORDER BY obstime",
            observed_table(physical_element)
        );
        let entries = self.entries("observed_hydrograph", &sql, "obstime", lid, physical_element, type_source, window)?;
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
        let sql = format!(
            "SELECT value, validtime, basistime, ts, extremum, shef_qual_code, quality_code, product_id, producttime \
             FROM {} WHERE lid = $1 AND pe = $2 AND ts = $3 AND validtime BETWEEN $4 AND $5 \
             ORDER BY validtime, basistime",
            forecast_table(physical_element)
        );
        let entries = self.entries("forecast_hydrograph", &sql, "validtime", lid, physical_element, type_source, window)?;
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
        let entries = self.entries(
            "precip_hydrograph",
            "SELECT value, obstime, ts, extremum, shef_qual_code, quality_code, product_id, producttime \
             FROM curpp WHERE lid = $1 AND pe = $2 AND ts = $3 AND obstime BETWEEN $4 AND $5 \
             ORDER BY obstime",
            "obstime",
            lid,
            physical_element,
            type_source,
            window,
        )?;
        Ok(PrecipHydrograph::new(lid, physical_element, type_source, Precip, entries)
            .with_window(window.begin, window.end))
    }

    fn crest_history(&self, lid: &str) -> Result<Vec<CrestRecord>, HazardError> {
        let rows = self.query(
            "crest_history",
            "SELECT crest_time, stage, flow, prelim FROM crest WHERE lid = $1 ORDER BY crest_time DESC",
            &[&lid],
        )?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(CrestRecord {
                    crest_time: timestamp(row, "crest_time", lid)?,
                    stage: numeric(row, "stage", lid),
                    flow: numeric(row, "flow", lid),
                    preliminary: flag(row, "prelim", lid),
                })
            })
            .collect())
    }

    fn type_source_ranking(
        &self,
        lid: &str,
        physical_element: &str,
        kind: HydrographKind,
    ) -> Result<Vec<String>, HazardError> {
        let pattern = format!("{}%", kind.type_source_prefix());
        let rows = self.query(
            "type_source_ranking",
            "SELECT ts FROM ingestfilter \
             WHERE lid = $1 AND pe = $2 AND ts LIKE $3 AND ingest = 'T' \
             ORDER BY ts_rank, ts",
            &[&lid, &physical_element, &pattern],
        )?;
        Ok(rows
            .iter()
            .map(|row| text(row, "ts", lid))
            .filter(|ts| !ts.is_empty())
            .collect())
    }

    fn previous_events(&self, lids: &[String]) -> Result<HashMap<String, PreviousEvent>, HazardError> {
        let rows = self.query(
            "previous_events",
            "SELECT DISTINCT ON (lid) lid, action, product_class, begintime, endtime, producttime, \
                    obsvalue, maxfcstvalue, severity_cat \
             FROM vtecevent WHERE lid = ANY($1) \
             ORDER BY lid, producttime DESC",
            &[&lids],
        )?;
        Ok(rows
            .iter()
            .filter_map(previous_event_from_row)
            .map(|event| (event.lid.clone(), event))
            .collect())
    }
}
