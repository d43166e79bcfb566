/// Service configuration loader - parses hazard_settings.toml
///
/// Separates the operational knobs (look-back windows, end-time shift,
/// record offsets, cache lifetime) from code, so they can be tuned per
/// office without recompiling the service.
///
/// Out-of-range values are soft errors: they are logged and replaced with
/// the documented default, and recommendation processing carries on.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::HazardError;

/// Default location of the configuration file, relative to the working
/// directory.
pub const DEFAULT_CONFIG_PATH: &str = "hazard_settings.toml";

// ---------------------------------------------------------------------------
// Hazard settings
// ---------------------------------------------------------------------------

/// Global defaults shared read-only by every analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardSettings {
    /// Hours of observed data to look back from the snapshot instant.
    pub obs_look_back_hours: i64,
    /// Hours of forecast data to look forward from the snapshot instant.
    pub fcst_look_forward_hours: i64,
    /// Forecasts issued more than this many hours before the snapshot
    /// instant are ignored.
    pub basis_hours: i64,
    /// Hours added to the fall-below time when proposing an event end.
    pub end_time_shift_hours: i64,
    /// Trend noise tolerance when a point has no change threshold.
    pub default_stage_window: f64,
    /// A stage max within this distance of record counts as near-record.
    pub record_stage_offset: f64,
    /// Same as `record_stage_offset`, for flow points.
    pub record_flow_offset: f64,
    /// An inactive event that ended at most this many hours ago is
    /// recommended for expiration.
    pub expire_window_hours: i64,
}

impl Default for HazardSettings {
    fn default() -> Self {
        Self {
            obs_look_back_hours: 72,
            fcst_look_forward_hours: 168,
            basis_hours: 72,
            end_time_shift_hours: 6,
            default_stage_window: 0.5,
            record_stage_offset: 2.0,
            record_flow_offset: 5000.0,
            expire_window_hours: 12,
        }
    }
}

impl HazardSettings {
    /// Returns a copy with every out-of-range value replaced by its default.
    pub fn validated(&self) -> Self {
        let defaults = Self::default();
        Self {
            obs_look_back_hours: int_in_range(
                "obs_look_back_hours",
                self.obs_look_back_hours,
                1,
                720,
                defaults.obs_look_back_hours,
            ),
            fcst_look_forward_hours: int_in_range(
                "fcst_look_forward_hours",
                self.fcst_look_forward_hours,
                1,
                720,
                defaults.fcst_look_forward_hours,
            ),
            basis_hours: int_in_range("basis_hours", self.basis_hours, 1, 480, defaults.basis_hours),
            end_time_shift_hours: int_in_range(
                "end_time_shift_hours",
                self.end_time_shift_hours,
                0,
                48,
                defaults.end_time_shift_hours,
            ),
            default_stage_window: positive_or_default(
                "default_stage_window",
                self.default_stage_window,
                defaults.default_stage_window,
            ),
            record_stage_offset: non_negative_or_default(
                "record_stage_offset",
                self.record_stage_offset,
                defaults.record_stage_offset,
            ),
            record_flow_offset: non_negative_or_default(
                "record_flow_offset",
                self.record_flow_offset,
                defaults.record_flow_offset,
            ),
            expire_window_hours: int_in_range(
                "expire_window_hours",
                self.expire_window_hours,
                0,
                168,
                defaults.expire_window_hours,
            ),
        }
    }
}

fn int_in_range(name: &str, value: i64, min: i64, max: i64, default: i64) -> i64 {
    if (min..=max).contains(&value) {
        value
    } else {
        warn!(setting = name, value, min, max, fallback = default, "setting out of range, using default");
        default
    }
}

fn positive_or_default(name: &str, value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!(setting = name, value, fallback = default, "setting must be positive, using default");
        default
    }
}

fn non_negative_or_default(name: &str, value: f64, default: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        warn!(setting = name, value, fallback = default, "setting must not be negative, using default");
        default
    }
}

// ---------------------------------------------------------------------------
// Cache configuration
// ---------------------------------------------------------------------------

/// Result cache lifetime and purge behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a snapshot stays valid around its build instant, minutes.
    pub ttl_minutes: i64,
    /// Drop the snapshot automatically once the TTL has elapsed.
    pub auto_purge: bool,
    /// Drop the snapshot when a consumer signals it has finished with it.
    pub purge_on_complete: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 10,
            auto_purge: true,
            purge_on_complete: true,
        }
    }
}

impl CacheConfig {
    pub fn validated(&self) -> Self {
        Self {
            ttl_minutes: int_in_range(
                "ttl_minutes",
                self.ttl_minutes,
                1,
                24 * 60,
                CacheConfig::default().ttl_minutes,
            ),
            ..*self
        }
    }
}

// ---------------------------------------------------------------------------
// File loading
// ---------------------------------------------------------------------------

/// Root structure of hazard_settings.toml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Home region (hydrologic service area) whose groups are analyzed.
    pub home_region: String,
    #[serde(default)]
    pub settings: HazardSettings,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl ServiceConfig {
    pub fn new(home_region: &str) -> Self {
        Self {
            home_region: home_region.to_string(),
            settings: HazardSettings::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Parses configuration text and applies the soft range fallbacks.
pub fn parse_config(contents: &str, origin: &str) -> Result<ServiceConfig, HazardError> {
    let mut config: ServiceConfig = toml::from_str(contents).map_err(|e| HazardError::Config {
        path: origin.to_string(),
        reason: e.to_string(),
    })?;
    config.settings = config.settings.validated();
    config.cache = config.cache.validated();
    Ok(config)
}

/// Loads and validates a configuration file.
///
/// A missing or unparseable file is a hard error (there is no home region
/// to fall back to); individual out-of-range values are not.
pub fn load_config(path: impl AsRef<Path>) -> Result<ServiceConfig, HazardError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| HazardError::Config {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_config(&contents, &path.display().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
