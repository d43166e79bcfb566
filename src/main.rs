//! Flood Warning Recommendation Service
//!
//! Builds one recommendation snapshot for the configured home region and
//! prints it, optionally serving snapshots over HTTP afterwards.
//!
//! Usage:
//!   cargo run --release                                  # Summary for now
//!   cargo run --release -- --as-of 2024-05-01T12:00:00Z  # Summary at an instant
//!   cargo run --release -- --json                        # Full snapshot as JSON
//!   cargo run --release -- --endpoint 8080               # Then serve HTTP on 8080
//!   cargo run --release -- --config other.toml -vv       # Other config, debug logs
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string
//!   RUST_LOG     - Overrides the -v log level

use std::env;
use std::process;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flowarn_service::config::{self, DEFAULT_CONFIG_PATH};
use flowarn_service::data_access::PgHazardStore;
use flowarn_service::endpoint;
use flowarn_service::logging;
use flowarn_service::model::Snapshot;
use flowarn_service::recommender::Recommender;

struct Args {
    config_path: String,
    as_of: Option<DateTime<Utc>>,
    json: bool,
    endpoint_port: Option<u16>,
    workers: usize,
    verbosity: u8,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} [--config PATH] [--as-of RFC3339] [--json] [--endpoint PORT] [--workers N] [-v|-vv]",
        program
    )
}

fn option_value<'a>(args: &'a [String], i: usize, name: &str) -> Result<&'a String, String> {
    args.get(i + 1).ok_or_else(|| format!("{} requires a value", name))
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args {
        config_path: DEFAULT_CONFIG_PATH.to_string(),
        as_of: None,
        json: false,
        endpoint_port: None,
        workers: 4,
        verbosity: 0,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                parsed.config_path = option_value(args, i, "--config")?.clone();
                i += 2;
            }
            "--as-of" => {
                let raw = option_value(args, i, "--as-of")?;
                let t = DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| format!("invalid --as-of '{}': {}", raw, e))?;
                parsed.as_of = Some(t.with_timezone(&Utc));
                i += 2;
            }
            "--endpoint" => {
                let raw = option_value(args, i, "--endpoint")?;
                parsed.endpoint_port = Some(raw.parse().map_err(|_| format!("invalid port '{}'", raw))?);
                i += 2;
            }
            "--workers" => {
                let raw = option_value(args, i, "--workers")?;
                parsed.workers = raw.parse().map_err(|_| format!("invalid worker count '{}'", raw))?;
                i += 2;
            }
            "--json" => {
                parsed.json = true;
                i += 1;
            }
            "-v" => {
                parsed.verbosity = parsed.verbosity.saturating_add(1);
                i += 1;
            }
            "-vv" => {
                parsed.verbosity = parsed.verbosity.saturating_add(2);
                i += 1;
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }
    Ok(parsed)
}

fn print_summary(snapshot: &Snapshot) {
    println!(
        "📋 Snapshot for {} at {} (most severe product: {})\n",
        snapshot.home_region,
        snapshot.build_time.to_rfc3339(),
        snapshot.most_severe_product
    );

    for group in &snapshot.groups {
        let marker = if group.include_in_recommendation { "*" } else { " " };
        println!(
            "{} {} ({}) - observed {}, forecast {}, overall {}",
            marker,
            group.name,
            group.id,
            group.rollup.observed_category,
            group.rollup.forecast_category,
            group.rollup.overall_category
        );
        for point in snapshot.points_in_group(group) {
            let Some(event) = snapshot.event(&point.lid) else {
                continue;
            };
            let analysis = &point.analysis;
            println!(
                "    {} {:<8} {:>3} {} - {} | obs {:.2} fcst {:.2} {} trend {}",
                if event.included { "*" } else { " " },
                point.lid,
                event.action.code(),
                event.product,
                event.reason.description(),
                analysis.current_observed.value,
                analysis.max_forecast.value,
                analysis.max_observed_forecast.category,
                analysis.trend.as_str()
            );
        }
    }

    let included = snapshot.included_points().count();
    println!("\n✓ {} of {} points included", included, snapshot.points.len());
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("flowarn_service");
    let args = match parse_args(&args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", usage(program));
            process::exit(1);
        }
    };

    logging::init(args.verbosity);

    let config = match config::load_config(&args.config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ {}", e);
            process::exit(1);
        }
    };

    let store = match PgHazardStore::connect(config.settings.clone()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ {}", e);
            process::exit(1);
        }
    };

    let recommender = Arc::new(Recommender::new(store, &config));
    let as_of = args.as_of.unwrap_or_else(Utc::now);

    let snapshot = match recommender.get_snapshot(as_of) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Snapshot build failed: {}", e);
            process::exit(1);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(snapshot.as_ref()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize snapshot: {}", e);
                process::exit(1);
            }
        }
    } else {
        print_summary(&snapshot);
    }

    if let Some(port) = args.endpoint_port {
        println!("\n🚀 Serving snapshots on http://0.0.0.0:{}", port);
        if let Err(e) = endpoint::start_endpoint_server(port, args.workers, recommender) {
            eprintln!("❌ {}", e);
            process::exit(1);
        }
    }
}
