//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - "*" opens the surface, otherwise a
    // comma-separated origin list
    let cors = if state.config.client_origin.trim() == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let allowed_origins: Vec<header::HeaderValue> = state
            .config
            .client_origin
            .split(',')
            .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/scoreboard", get(scoreboard_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    session_id: uuid::Uuid,
    tick: u64,
    controllers: usize,
    alive_characters: usize,
    total_deaths: f32,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.session.stats.read().clone();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        session_id: state.session.id,
        tick: stats.tick,
        controllers: stats.controllers,
        alive_characters: stats.alive_characters,
        total_deaths: stats.total_deaths,
    })
}

// ============================================================================
// Scoreboard endpoint
// ============================================================================

#[derive(Serialize)]
struct ScoreboardResponse {
    players: Vec<ScoreboardEntry>,
}

#[derive(Serialize)]
struct ScoreboardEntry {
    display_name: String,
    death_count: f32,
    score: u32,
}

async fn scoreboard_handler(State(state): State<AppState>) -> Json<ScoreboardResponse> {
    let mut players: Vec<ScoreboardEntry> = state
        .roster
        .snapshot()
        .into_iter()
        .map(|record| ScoreboardEntry {
            death_count: record.death_count(),
            score: record.score(),
            display_name: record.display_name,
        })
        .collect();

    // Best score first, most deaths last
    players.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.death_count.total_cmp(&b.death_count))
    });

    Json(ScoreboardResponse { players })
}
