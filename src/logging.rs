/// Structured logging for the hazard recommendation service
///
/// All modules log through `tracing` macros with point/group identifiers as
/// fields (`lid = %point.lid`). This module only installs the subscriber:
/// console output with timestamps and targets, filtered by verbosity or by
/// `RUST_LOG` when it is set.

use tracing_subscriber::{fmt, EnvFilter};

/// Crate target that receives the verbosity-selected level.
const CRATE_TARGET: &str = "flowarn_service";

/// Maps a CLI verbosity count to a level name.
///
/// - 0 (none) -> warn
/// - 1 (-v)   -> info
/// - 2 (-vv)  -> debug
/// - 3+       -> trace
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` overrides the verbosity flag if set. Calling this twice is a
/// no-op rather than a panic.
pub fn init(verbosity: u8) {
    let default_filter = format!("warn,{}={}", CRATE_TARGET, level_for_verbosity(verbosity));
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(false)
        .try_init();
}

/// Initialize logging for tests: debug level, captured by the test harness.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new(format!("{}=debug", CRATE_TARGET)))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for_verbosity(0), "warn");
        assert_eq!(level_for_verbosity(1), "info");
        assert_eq!(level_for_verbosity(2), "debug");
        assert_eq!(level_for_verbosity(9), "trace");
    }

    #[test]
    fn test_init_test_is_idempotent() {
        init_test();
        init_test();
    }
}
