/// Per-point and per-group analysis for the hazard recommendation service.
///
/// Submodules:
/// - `classifier` — value -> flood category, near-record status
/// - `hydrograph` — crest detection and flood-level crossings
/// - `trend`      — rise/fall/unchanged, rolling maxima, precip totals
/// - `derived`    — runs every pass on a point and stores `PointAnalysis`
/// - `groupings`  — severity rollups for forecast groups and counties

pub mod classifier;
pub mod derived;
pub mod groupings;
pub mod hydrograph;
pub mod trend;

pub use classifier::{classify, record_status};
pub use derived::analyze_point;
pub use groupings::{compute_county_rollups, compute_group_rollups, derive_county_groups};
pub use hydrograph::compute_hydrograph_rise_fall;
pub use trend::compute_trend_data;
