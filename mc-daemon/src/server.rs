//! HTTP API
//!
//! One axum route per endpoint. Handlers lock the controller, run one
//! synchronous operation and release the lock before building the response.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mc_core::SharedController;
use mc_error::MicError;
use mc_protocol::{endpoints, ActionResponse, SetQuery};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::deferred::DeferredActionScheduler;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub controller: SharedController,
    pub scheduler: Arc<DeferredActionScheduler>,
    pub reboot_delay: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::STATUS, get(status))
        .route(endpoints::AUDIO_STATUS, get(audio_status))
        .route(endpoints::PERF_STATUS, get(perf_status))
        .route(endpoints::THERMAL, get(thermal))
        .route(endpoints::THERMAL_CLEAR, post(thermal_clear))
        .route(endpoints::LOGS, get(logs))
        .route(endpoints::SET, get(set))
        .route(endpoints::SERVER_START, get(server_start))
        .route(endpoints::SERVER_STOP, get(server_stop))
        .route(endpoints::RESET_AUDIO, get(reset_audio))
        .route(endpoints::REBOOT, get(reboot))
        .route(endpoints::FACTORY_RESET, get(factory_reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP API listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// JSON body with caching disabled
fn json<T: Serialize>(body: T) -> Response {
    ([(header::CACHE_CONTROL, "no-cache")], Json(body)).into_response()
}

// ============================================================================
// Read paths
// ============================================================================

async fn status(State(app): State<AppState>) -> Response {
    let payload = app.controller.lock().status(Instant::now());
    json(payload)
}

async fn audio_status(State(app): State<AppState>) -> Response {
    let payload = app.controller.lock().audio_status();
    json(payload)
}

async fn perf_status(State(app): State<AppState>) -> Response {
    let payload = app.controller.lock().perf_status();
    json(payload)
}

async fn thermal(State(app): State<AppState>) -> Response {
    let payload = app.controller.lock().thermal(Instant::now());
    json(payload)
}

async fn logs(State(app): State<AppState>) -> Response {
    let text = app.controller.lock().logs();
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        text,
    )
        .into_response()
}

// ============================================================================
// Write paths
// ============================================================================

/// Always answers `{ok:true}`; rejected values only show up in the log.
/// The query is taken as raw pairs so repeated parameters never reject.
async fn set(State(app): State<AppState>, Query(pairs): Query<Vec<(String, String)>>) -> Response {
    let query = SetQuery::from_pairs(pairs);
    let key = query.key.unwrap_or_default();
    let result = app.controller.lock().set(&key, query.value.as_deref());
    match result {
        Ok(value) => debug!("Set {} = {}", key, value),
        Err(e) if e.is_validation() => debug!("Set ignored: {}", e),
        Err(e) => warn!("Set {} failed: {}", key, e),
    }
    json(ActionResponse::ok())
}

async fn server_start(State(app): State<AppState>) -> Response {
    let result = app.controller.lock().start_streaming();
    match result {
        Ok(()) => json(ActionResponse::ok()),
        Err(MicError::ThermalLatched) => json(ActionResponse::thermal_latched()),
        Err(e) => {
            warn!("Stream server start failed: {}", e);
            json(ActionResponse {
                ok: false,
                error: Some(e.to_string()),
            })
        }
    }
}

async fn server_stop(State(app): State<AppState>) -> Response {
    app.controller.lock().stop_streaming();
    json(ActionResponse::ok())
}

async fn thermal_clear(State(app): State<AppState>) -> Response {
    let result = app.controller.lock().clear_thermal_latch();
    match result {
        Ok(()) => json(ActionResponse::ok()),
        Err(e) => {
            debug!("Thermal clear rejected: {}", e);
            json(ActionResponse::failed())
        }
    }
}

async fn reset_audio(State(app): State<AppState>) -> Response {
    let result = app.controller.lock().reset_audio();
    if let Err(e) = result {
        warn!("Audio pipeline restart failed: {}", e);
    }
    json(ActionResponse::ok())
}

async fn reboot(State(app): State<AppState>) -> Response {
    app.controller.lock().note_action("reboot");
    app.scheduler.schedule(false, app.reboot_delay);
    json(ActionResponse::ok())
}

async fn factory_reset(State(app): State<AppState>) -> Response {
    app.controller.lock().note_action("factory_reset");
    app.scheduler.schedule(true, app.reboot_delay);
    json(ActionResponse::ok())
}
