// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! HTTP surface for the triage pipeline
//!
//! JSON everywhere except the image bodies. The scan endpoint runs one full
//! pass synchronously; the image endpoints serve originals through the
//! published index (with filesystem fallbacks on the `/images/` route).

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::index::lookup_with_fallback;
use crate::scan::{ScanOrchestrator, ScanOutcome};
use crate::OakwatchError;

/// Shared application state
pub struct AppState {
    pub orchestrator: ScanOrchestrator,
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/scan-and-process", get(scan_and_process))
        .route("/images/:filename", get(serve_image))
        .route("/get-image", get(get_image))
        .route("/list-images", get(list_images))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn scan_and_process(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.run_scan().await {
        Ok(outcome) => Json(scan_response_body(&outcome)).into_response(),
        Err(e @ (OakwatchError::NoMountFound | OakwatchError::NoImagesFound)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

fn scan_response_body(outcome: &ScanOutcome) -> Value {
    let mut by_category = serde_json::Map::new();
    for (tier, records) in outcome.result.by_tier() {
        by_category.insert(tier.label().to_string(), json!(records));
    }

    let all_results: Vec<&crate::scan::ImageRecord> = outcome.result.all().collect();

    json!({
        "message": "Processing complete",
        "results_by_category": by_category,
        "all_results": all_results,
        "csv_saved_to": outcome.csv_path.as_ref().map(|p| p.display().to_string()),
        "geojson_saved_to": outcome.geojson_path.as_ref().map(|p| p.display().to_string()),
    })
}

/// Serve an original by filename: index hit, then direct probe, then bounded
/// search under the mount.
async fn serve_image(
    State(state): State<Arc<AppState>>,
    AxumPath(filename): AxumPath<String>,
) -> Response {
    let index = state.orchestrator.index().snapshot();
    let mount = state.orchestrator.mount_path().to_path_buf();

    let resolved = tokio::task::spawn_blocking(move || {
        lookup_with_fallback(&index, &mount, &filename)
    })
    .await
    .ok()
    .flatten();

    match resolved {
        Some(path) => image_bytes_response(&path).await,
        None => not_found_response(),
    }
}

#[derive(Deserialize)]
struct GetImageQuery {
    name: String,
}

/// Index-only variant of the image lookup.
async fn get_image(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GetImageQuery>,
) -> Response {
    let index = state.orchestrator.index().snapshot();
    match index.get(&query.name) {
        Some(path) => image_bytes_response(&path.to_path_buf()).await,
        None => not_found_response(),
    }
}

/// Diagnostic dump of the mount path and the currently served filenames.
async fn list_images(State(state): State<Arc<AppState>>) -> Json<Value> {
    let index = state.orchestrator.index().snapshot();
    let mut files: Vec<String> = index.filenames().iter().map(|s| s.to_string()).collect();
    files.sort();

    Json(json!({
        "mount": state.orchestrator.mount_path().display().to_string(),
        "files": files,
    }))
}

async fn image_bytes_response(path: &std::path::Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            ([(header::CONTENT_TYPE, content_type_for(path))], bytes).into_response()
        }
        Err(e) => {
            tracing::warn!("Indexed file {:?} could not be read: {}", path, e);
            not_found_response()
        }
    }
}

fn not_found_response() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Image not found" }))).into_response()
}

fn content_type_for(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Bind and serve until shutdown.
pub async fn start_server(config: AppConfig, state: Arc<AppState>) -> crate::Result<()> {
    let addr = format!("{}:{}", config.web.host, config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Oakwatch API available at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .await
        .map_err(|e| OakwatchError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Tier;
    use crate::geotag::{Coordinate, GeoTag};
    use crate::scan::{ImageRecord, ScanResult};
    use std::path::PathBuf;

    #[test]
    fn content_types_cover_the_extension_set() {
        assert_eq!(content_type_for(std::path::Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(std::path::Path::new("a.png")), "image/png");
        assert_eq!(content_type_for(std::path::Path::new("a.gif")), "image/gif");
        assert_eq!(
            content_type_for(std::path::Path::new("a.bin")),
            "application/octet-stream"
        );
    }

    #[test]
    fn scan_body_has_all_four_categories_and_null_paths() {
        let mut result = ScanResult::new();
        result.push(ImageRecord {
            filename: "a.jpg".to_string(),
            source_path: PathBuf::from("/mnt/a.jpg"),
            probability_percent: 95.0,
            tier: Tier::HighChance,
            geotag: GeoTag::Fallback(Coordinate { lat: 1.0, lon: 2.0 }),
        });

        let outcome = ScanOutcome {
            mount: PathBuf::from("/mnt"),
            result,
            csv_path: Some(PathBuf::from("/mnt/results.csv")),
            geojson_path: None,
        };

        let body = scan_response_body(&outcome);
        assert_eq!(body["message"], "Processing complete");
        assert_eq!(body["results_by_category"].as_object().unwrap().len(), 4);
        assert_eq!(
            body["results_by_category"]["THERE'S A HIGH CHANCE OF OAK WILT"]
                .as_array()
                .unwrap()
                .len(),
            1
        );
        assert_eq!(body["all_results"].as_array().unwrap().len(), 1);
        assert_eq!(body["csv_saved_to"], "/mnt/results.csv");
        assert!(body["geojson_saved_to"].is_null());
    }
}
