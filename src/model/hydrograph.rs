/// Time series types: `Entry` and `Hydrograph<K>`.
///
/// A hydrograph is the time-ordered series of values for one
/// (point, physical element, type-source) tuple. The kind parameter `K`
/// distinguishes observed, forecast and precipitation series at the type
/// level, and carries the metadata only one of them needs (forecast basis
/// time cutoff and the "use latest forecast" flag).
///
/// Entries are always kept sorted by time, ascending. Constructors sort, so
/// callers may hand over rows in whatever order the store returned them.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{is_missing, MISSING_INT};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A single value in a hydrograph.
///
/// `time` is the observation time for observed and precip series and the
/// valid time for forecast series. `value` is `MISSING_VALUE` when the
/// store had a row but no usable number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub value: f64,
    pub time: DateTime<Utc>,
    pub type_source: String,
    /// SHEF extremum code; `Z` means "not an extremum".
    pub extremum: char,
    /// SHEF data qualifier, e.g. `Z` (none), `E` (estimated).
    pub shef_qual_code: char,
    /// Quality-control flags, `MISSING_INT` when not supplied.
    pub quality_code: i64,
    pub product_id: String,
    pub product_time: Option<DateTime<Utc>>,
    /// Forecast issuance time; `None` for observed and precip entries.
    pub basis_time: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn new(value: f64, time: DateTime<Utc>, type_source: &str) -> Self {
        Self {
            value,
            time,
            type_source: type_source.to_string(),
            extremum: 'Z',
            shef_qual_code: 'Z',
            quality_code: MISSING_INT,
            product_id: String::new(),
            product_time: None,
            basis_time: None,
        }
    }

    pub fn with_basis_time(mut self, basis_time: DateTime<Utc>) -> Self {
        self.basis_time = Some(basis_time);
        self
    }

    pub fn is_missing(&self) -> bool {
        is_missing(self.value)
    }
}

// ---------------------------------------------------------------------------
// Series kinds
// ---------------------------------------------------------------------------

/// Marker for observed series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Observed;

/// Forecast series metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Forecast {
    /// Forecasts issued before this instant are not considered.
    pub basis_time_cutoff: Option<DateTime<Utc>>,
    /// Keep only the entries of the most recently issued forecast.
    pub use_latest_forecast: bool,
}

/// Marker for precipitation series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Precip;

pub type ObservedHydrograph = Hydrograph<Observed>;
pub type ForecastHydrograph = Hydrograph<Forecast>;
pub type PrecipHydrograph = Hydrograph<Precip>;

// ---------------------------------------------------------------------------
// Hydrograph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hydrograph<K> {
    pub lid: String,
    pub physical_element: String,
    /// Selected type-source; empty when no ranked source had data.
    pub type_source: String,
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub kind: K,
    entries: Vec<Entry>,
}

impl<K: Default> Hydrograph<K> {
    /// An empty series with no window, used when a point has no data.
    pub fn empty(lid: &str, physical_element: &str) -> Self {
        Self {
            lid: lid.to_string(),
            physical_element: physical_element.to_string(),
            type_source: String::new(),
            begin: None,
            end: None,
            kind: K::default(),
            entries: Vec::new(),
        }
    }
}

impl<K> Hydrograph<K> {
    pub fn new(
        lid: &str,
        physical_element: &str,
        type_source: &str,
        kind: K,
        mut entries: Vec<Entry>,
    ) -> Self {
        entries.sort_by(|a, b| a.time.cmp(&b.time));
        Self {
            lid: lid.to_string(),
            physical_element: physical_element.to_string(),
            type_source: type_source.to_string(),
            begin: None,
            end: None,
            kind,
            entries,
        }
    }

    /// Sets the query window the series was drawn from.
    pub fn with_window(mut self, begin: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.begin = Some(begin);
        self.end = Some(end);
        self
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if at least one entry carries a real value.
    pub fn has_data(&self) -> bool {
        self.entries.iter().any(|e| !e.is_missing())
    }

    /// Most recent entry with a real value, with its index.
    pub fn latest_valid(&self) -> Option<(usize, &Entry)> {
        self.entries
            .iter()
            .enumerate()
            .rev()
            .find(|(_, e)| !e.is_missing())
    }

    /// Earliest entry with a real value, with its index.
    pub fn earliest_valid(&self) -> Option<(usize, &Entry)> {
        self.entries.iter().enumerate().find(|(_, e)| !e.is_missing())
    }

    /// Largest real value; on ties the earliest entry wins.
    pub fn max_valid(&self) -> Option<(usize, &Entry)> {
        let mut best: Option<(usize, &Entry)> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.is_missing() {
                continue;
            }
            match best {
                Some((_, b)) if entry.value <= b.value => {}
                _ => best = Some((i, entry)),
            }
        }
        best
    }

    /// Entries whose time lies in `[end - span, end]`.
    pub fn indices_within(&self, end: DateTime<Utc>, span: Duration) -> Vec<usize> {
        let start = end - span;
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.time >= start && e.time <= end)
            .map(|(i, _)| i)
            .collect()
    }
}

impl Hydrograph<Forecast> {
    /// Issuance time of the newest forecast present in the series.
    pub fn latest_basis_time(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().filter_map(|e| e.basis_time).max()
    }

    /// Drops entries issued before the basis cutoff and, when the
    /// "use latest forecast" flag is set, every entry not belonging to the
    /// newest forecast. When several forecasts overlap without the flag,
    /// the newest issuance wins for each valid time.
    pub fn apply_basis_rules(&mut self) {
        if let Some(cutoff) = self.kind.basis_time_cutoff {
            self.entries
                .retain(|e| e.basis_time.map_or(true, |basis| basis >= cutoff));
        }

        if self.kind.use_latest_forecast {
            if let Some(latest) = self.latest_basis_time() {
                self.entries
                    .retain(|e| e.basis_time.map_or(false, |basis| basis == latest));
            }
            return;
        }

        // One entry per valid time, newest basis first.
        let mut kept: Vec<Entry> = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            match kept.last_mut() {
                Some(prev) if prev.time == entry.time => {
                    if entry.basis_time > prev.basis_time {
                        *prev = entry;
                    }
                }
                _ => kept.push(entry),
            }
        }
        self.entries = kept;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
