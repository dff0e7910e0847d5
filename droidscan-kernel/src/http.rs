/**
 * API HTTP DROIDSCAN - Serveur axum + flux WebSocket
 *
 * RÔLE :
 * Expose le tracker de présence, les scans et les rapports persistés.
 * Couche de transport uniquement : aucune logique métier ici.
 *
 * FONCTIONNEMENT :
 * - /device/… : appareils suivis, contrôle du polling, attente d'un appareil
 * - /scan/{fast,full}/… : lancement en tâche de fond, dernier scan, comparaison
 * - /reports/… : consultation, téléchargement JSON, suppression
 * - /ws : chaque événement du bus en JSON
 * - Erreurs : `{"detail": ...}` avec 400 / 404 / 500
 */

use crate::compare::{compare_scans, CompareError, ScanComparison};
use crate::events::{Event, EventBus};
use crate::models::{ScanSnapshot, ScanType, TrackedDevice};
use crate::presence::SharedPresenceTracker;
use crate::scanner::Scanner;
use crate::store::{StoreError, DEFAULT_REPORT_LIMIT};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub tracker: SharedPresenceTracker,
    pub scanner: Arc<Scanner>,
    pub events: EventBus,
}

/// Erreur HTTP : statut + message renvoyé sous `detail`
#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl ApiError {
    fn not_found(msg: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, msg.into())
    }

    fn bad_request(msg: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "detail": self.1 }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        warn!("[http] store error: {e}");
        Self(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl From<CompareError> for ApiError {
    fn from(_: CompareError) -> Self {
        Self::bad_request("Both scans must be for the specified device")
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/device/connected", get(connected_devices))
        .route("/device/start-polling", post(start_polling))
        .route("/device/stop-polling", post(stop_polling))
        .route("/device/wait", post(wait_for_device))
        .route("/device/{id}", get(get_device))
        .route("/scan/fast/{id}", post(start_fast_scan))
        .route("/scan/fast/{id}/last", get(last_fast_scan))
        .route("/scan/full/{id}", post(start_full_scan))
        .route("/scan/full/{id}/last", get(last_full_scan))
        .route("/scan/full/{id}/compare/{scan1}/{scan2}", get(compare_full_scans))
        .route("/reports", get(list_reports))
        .route("/reports/device/{id}", get(device_reports))
        .route("/reports/{scan_id}", get(get_report).delete(delete_report))
        .route("/reports/{scan_id}/download", get(download_report))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}

// GET /device/connected
async fn connected_devices(State(app): State<AppState>) -> Json<Vec<TrackedDevice>> {
    Json(app.tracker.connected_devices())
}

// GET /device/{id}
async fn get_device(State(app): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<TrackedDevice>> {
    app.tracker
        .device(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Device {id} not found")))
}

async fn start_polling(State(app): State<AppState>) -> Json<Value> {
    app.tracker.start_polling().await;
    Json(json!({ "status": "polling started" }))
}

async fn stop_polling(State(app): State<AppState>) -> Json<Value> {
    let status = if app.tracker.stop_polling() { "polling stopped" } else { "polling was not running" };
    Json(json!({ "status": status }))
}

#[derive(Debug, Deserialize)]
struct WaitParams {
    timeout: Option<u64>,
}

// POST /device/wait?timeout=30
async fn wait_for_device(State(app): State<AppState>, Query(params): Query<WaitParams>) -> ApiResult<Json<Value>> {
    let timeout = Duration::from_secs(params.timeout.unwrap_or(30));
    match app.tracker.await_any_device(timeout).await {
        Ok(Some(device_id)) => Ok(Json(json!({ "status": "connected", "device_id": device_id }))),
        Ok(None) => Ok(Json(json!({ "status": "timeout" }))),
        Err(e) => Err(ApiError(StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
    }
}

async fn start_fast_scan(State(app): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    spawn_scan(&app, id, ScanType::Fast)
}

async fn start_full_scan(State(app): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    spawn_scan(&app, id, ScanType::Full)
}

/// Le scan tourne en tâche de fond ; la progression passe par /ws
fn spawn_scan(app: &AppState, device_id: String, scan_type: ScanType) -> ApiResult<Json<Value>> {
    if !app.tracker.is_tracked(&device_id) {
        return Err(ApiError::not_found(format!("Device {device_id} not found or not connected")));
    }
    let scanner = app.scanner.clone();
    let id = device_id.clone();
    tokio::spawn(async move {
        if let Err(e) = scanner.scan(&id, scan_type).await {
            debug!(device = %id, "[http] background {scan_type} scan ended with error: {e}");
        }
    });
    info!(device = %device_id, "[http] {scan_type} scan requested");
    Ok(Json(json!({ "message": "Scan started", "device_id": device_id, "scan_type": scan_type })))
}

async fn last_fast_scan(State(app): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ScanSnapshot>> {
    last_scan(&app, &id, ScanType::Fast)
}

async fn last_full_scan(State(app): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ScanSnapshot>> {
    last_scan(&app, &id, ScanType::Full)
}

fn last_scan(app: &AppState, device_id: &str, scan_type: ScanType) -> ApiResult<Json<ScanSnapshot>> {
    app.scanner
        .last_scan(device_id, scan_type)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No {scan_type} scans found for device {device_id}")))
}

// GET /scan/full/{id}/compare/{scan1}/{scan2}
async fn compare_full_scans(
    State(app): State<AppState>,
    Path((device_id, first, second)): Path<(String, u64, u64)>,
) -> ApiResult<Json<ScanComparison>> {
    let (Some(a), Some(b)) = (app.scanner.scan_by_id(first)?, app.scanner.scan_by_id(second)?) else {
        return Err(ApiError::not_found("One or both scan IDs not found"));
    };
    Ok(Json(compare_scans(&device_id, &a, &b)?))
}

#[derive(Debug, Deserialize)]
struct ReportsParams {
    limit: Option<usize>,
}

// GET /reports?limit=50
async fn list_reports(
    State(app): State<AppState>,
    Query(params): Query<ReportsParams>,
) -> ApiResult<Json<Vec<ScanSnapshot>>> {
    Ok(Json(app.scanner.all_scans(params.limit.unwrap_or(DEFAULT_REPORT_LIMIT))?))
}

async fn get_report(State(app): State<AppState>, Path(scan_id): Path<u64>) -> ApiResult<Json<ScanSnapshot>> {
    app.scanner
        .scan_by_id(scan_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Scan {scan_id} not found")))
}

async fn device_reports(State(app): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Vec<ScanSnapshot>>> {
    Ok(Json(app.scanner.scans_for_device(&id)?))
}

#[derive(Debug, Deserialize)]
struct DownloadParams {
    format: Option<String>,
}

// GET /reports/{scan_id}/download?format=json
async fn download_report(
    State(app): State<AppState>,
    Path(scan_id): Path<u64>,
    Query(params): Query<DownloadParams>,
) -> ApiResult<Response> {
    let format = params.format.unwrap_or_else(|| "json".into());
    if !is_json_format(&format) {
        return Err(ApiError::bad_request(format!("Unsupported format: {format}")));
    }
    let scan = app
        .scanner
        .scan_by_id(scan_id)?
        .ok_or_else(|| ApiError::not_found(format!("Scan {scan_id} not found")))?;
    let body = serde_json::to_string_pretty(&scan).map_err(StoreError::from)?;
    let disposition = format!("attachment; filename=\"{}\"", download_filename(&scan));
    Ok((
        [(header::CONTENT_TYPE, "application/json".to_string()), (header::CONTENT_DISPOSITION, disposition)],
        body,
    )
        .into_response())
}

fn is_json_format(format: &str) -> bool {
    format.trim().eq_ignore_ascii_case("json")
}

/// `scan_{model}_{device}_{AAAAMMJJ_HHMMSS}.json`
pub fn download_filename(scan: &ScanSnapshot) -> String {
    let stamp = scan
        .created_at
        .format(time::macros::format_description!("[year][month][day]_[hour][minute][second]"))
        .unwrap_or_default();
    format!("scan_{}_{}_{}.json", file_safe(&scan.model), file_safe(&scan.device_id), stamp)
}

fn file_safe(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

async fn delete_report(State(app): State<AppState>, Path(scan_id): Path<u64>) -> ApiResult<Json<Value>> {
    if !app.scanner.delete_scan(scan_id)? {
        return Err(ApiError::not_found(format!("Scan {scan_id} not found")));
    }
    info!("[http] scan {scan_id} deleted");
    Ok(Json(json!({ "message": format!("Scan {scan_id} deleted") })))
}

async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> Response {
    let rx = app.events.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, rx))
}

async fn stream_events(mut socket: WebSocket, mut rx: broadcast::Receiver<Event>) {
    debug!("[ws] client connected");
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(p) => p,
                        Err(e) => {
                            warn!("[ws] cannot encode event: {e}");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("[ws] client lagging, {skipped} events skipped"),
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("[ws] client disconnected");
}
