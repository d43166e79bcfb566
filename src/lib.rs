/// flowarn_service: flood severity analysis and warning-action recommendation.
///
/// # Module structure
///
/// ```text
/// flowarn_service
/// ├── model        — shared data types (ForecastPoint, Hydrograph, Snapshot, …)
/// ├── config       — hazard settings and cache configuration (hazard_settings.toml)
/// ├── error        — HazardError
/// ├── logging      — tracing subscriber setup
/// ├── db           — PostgreSQL connection and table validation
/// ├── data_access
/// │   ├── memory   — in-process store used by tests
/// │   └── pg       — PostgreSQL store over the hazard tables
/// ├── analysis
/// │   ├── classifier — flood category and record status
/// │   ├── hydrograph — crests, rise-above/fall-below, observed/forecast stitching
/// │   ├── trend      — trend, rolling maxima, precipitation totals
/// │   ├── derived    — per-point analysis pass
/// │   └── groupings  — group and county severity rollups
/// ├── recommend
/// │   ├── continuity — per-point action from the previous event
/// │   └── inclusion  — most severe product and group inclusion
/// ├── cache        — time-bounded snapshot cache
/// ├── recommender  — snapshot orchestration
/// └── endpoint     — HTTP API for snapshots
/// ```

/// Public modules
pub mod analysis;
pub mod cache;
pub mod config;
pub mod data_access;
pub mod db;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod model;
pub mod recommend;
pub mod recommender;
