/// HTTP endpoint serving recommendation snapshots
///
/// Lets downstream tools (product generation, dashboards) read the current
/// snapshot and signal when they are done with it.
///
/// Endpoints:
/// - GET /health - Service health check
/// - GET /snapshot[?as_of=RFC3339] - Snapshot at an instant (default: now)
/// - GET /point/{lid} - One point with its recommended event
/// - POST /purge - Drop the cached snapshot
/// - POST /complete - Consumer finished; purges when purge-on-complete is set

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use threadpool::ThreadPool;
use tiny_http::{Method, Response, Server};
use tracing::{debug, error, info, warn};

use crate::data_access::HazardDataAccess;
use crate::error::HazardError;
use crate::recommender::Recommender;

type JsonResponse = Response<std::io::Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

fn split_query(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

/// Reads `as_of` from a query string. Absent means now.
fn parse_as_of(query: Option<&str>) -> Result<DateTime<Utc>, String> {
    let Some(raw) = query.and_then(|q| {
        q.split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "as_of")
            .map(|(_, value)| value)
    }) else {
        return Ok(Utc::now());
    };
    let decoded = urlencoding::decode(raw).map_err(|e| format!("invalid as_of '{}': {}", raw, e))?;
    DateTime::parse_from_rfc3339(&decoded)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid as_of '{}': {}", raw, e))
}

/// Maps a request to a status code and JSON body.
fn route<S: HazardDataAccess>(
    method: &Method,
    url: &str,
    recommender: &Recommender<S>,
) -> (u16, serde_json::Value) {
    let (path, query) = split_query(url);
    match (method, path) {
        (Method::Get, "/health") => (
            200,
            json!({
                "status": "ok",
                "service": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "home_region": recommender.home_region(),
                "cached": !recommender.cache().is_empty(),
            }),
        ),
        (Method::Get, "/snapshot") => {
            let as_of = match parse_as_of(query) {
                Ok(t) => t,
                Err(e) => return (400, json!({ "error": e })),
            };
            match recommender.get_snapshot(as_of) {
                Ok(snapshot) => match serde_json::to_value(snapshot.as_ref()) {
                    Ok(value) => (200, value),
                    Err(e) => (500, json!({ "error": HazardError::from(e).to_string() })),
                },
                Err(e) => {
                    error!(error = %e, "snapshot build failed");
                    (500, json!({ "error": e.to_string() }))
                }
            }
        }
        (Method::Get, p) if p.starts_with("/point/") => {
            let lid = p.trim_start_matches("/point/");
            let snapshot = match recommender.get_snapshot(Utc::now()) {
                Ok(s) => s,
                Err(e) => return (500, json!({ "error": e.to_string() })),
            };
            match snapshot.point(lid) {
                Some(point) => (
                    200,
                    json!({
                        "point": point,
                        "event": snapshot.event(lid),
                    }),
                ),
                None => {
                    let err = HazardError::NotFound {
                        kind: "forecast point",
                        id: lid.to_string(),
                    };
                    (404, json!({ "error": err.to_string() }))
                }
            }
        }
        (Method::Post, "/purge") => {
            recommender.purge();
            (200, json!({ "purged": true }))
        }
        (Method::Post, "/complete") => {
            recommender.purge_on_complete();
            (200, json!({ "cached": !recommender.cache().is_empty() }))
        }
        _ => (
            404,
            json!({
                "error": "Not found",
                "available_endpoints": [
                    "GET /health",
                    "GET /snapshot?as_of=RFC3339",
                    "GET /point/{lid}",
                    "POST /purge",
                    "POST /complete"
                ]
            }),
        ),
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start the HTTP endpoint on `port`, serving requests from `workers` threads.
/// Blocks for the life of the server.
pub fn start_endpoint_server<S>(
    port: u16,
    workers: usize,
    recommender: Arc<Recommender<S>>,
) -> Result<(), HazardError>
where
    S: HazardDataAccess + Send + Sync + 'static,
{
    let server = Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| HazardError::Endpoint(format!("failed to start HTTP server: {}", e)))?;
    let pool = ThreadPool::with_name("endpoint".to_string(), workers.max(1));

    info!(port, workers = workers.max(1), "HTTP endpoint listening");

    for request in server.incoming_requests() {
        let recommender = Arc::clone(&recommender);
        pool.execute(move || {
            let (status, body) = route(request.method(), request.url(), &recommender);
            debug!(method = %request.method(), url = %request.url(), status, "request served");
            if let Err(e) = request.respond(create_response(status, &body)) {
                warn!(error = %e, "failed to send response");
            }
        });
    }

    Ok(())
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: &serde_json::Value) -> JsonResponse {
    let body = serde_json::to_string_pretty(json).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e));
    let response = Response::from_data(body.into_bytes()).with_status_code(tiny_http::StatusCode::from(status_code));
    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
