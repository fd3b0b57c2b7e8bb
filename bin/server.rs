// Bitjita Sync - API Server
// Read-only JSON API over the snapshot store

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use bitjita_sync::{
    latest_inventory, latest_skill_summary, list_players, open_database, CanonicalItemRecord,
    Config, ItemKind, LevelingTable, SkillSummary,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    table: Arc<LevelingTable>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::err(message))).into_response()
}

fn lock_db(state: &AppState) -> Result<MutexGuard<'_, Connection>, Response> {
    state.db.lock().map_err(|_| {
        error!("database mutex poisoned");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable")
    })
}

/// Inventory response: the ledger plus its totals
#[derive(Serialize)]
struct InventoryResponse {
    player_id: String,
    lines: usize,
    total_quantity: u64,
    records: Vec<CanonicalItemRecord>,
}

#[derive(Deserialize)]
struct InventoryQuery {
    /// item | cargo | sell | buy
    kind: Option<String>,
}

#[derive(Serialize)]
struct LevelThreshold {
    level: u32,
    experience: u64,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/players - Every player with a snapshot
async fn get_players(State(state): State<AppState>) -> Response {
    let conn = match lock_db(&state) {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    match list_players(&conn) {
        Ok(players) => (StatusCode::OK, Json(ApiResponse::ok(players))).into_response(),
        Err(e) => {
            error!("Error listing players: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/players/:id/inventory?kind= - Latest ledger, optionally one kind only
async fn get_player_inventory(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Query(query): Query<InventoryQuery>,
) -> Response {
    let kind = match query.kind.as_deref() {
        None => None,
        Some(raw) => match ItemKind::parse(raw) {
            Some(kind) => Some(kind),
            None => {
                return error_response(StatusCode::BAD_REQUEST, format!("unknown item kind: {}", raw))
            }
        },
    };

    let conn = match lock_db(&state) {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    match latest_inventory(&conn, &player_id) {
        Ok(records) => {
            let records: Vec<CanonicalItemRecord> = records
                .into_iter()
                .filter(|r| kind.map_or(true, |k| r.kind == k))
                .collect();

            let response = InventoryResponse {
                player_id,
                lines: records.len(),
                total_quantity: records.iter().map(|r| r.quantity).sum(),
                records,
            };
            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(e) => {
            error!("Error getting inventory for {}: {:#}", player_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/players/:id/skills - Latest skill summary
async fn get_player_skills(State(state): State<AppState>, Path(player_id): Path<String>) -> Response {
    let conn = match lock_db(&state) {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    match latest_skill_summary(&conn, &player_id) {
        Ok(Some(summary)) => (StatusCode::OK, Json(ApiResponse::<SkillSummary>::ok(summary))).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("no skill snapshot for player {}", player_id),
        ),
        Err(e) => {
            error!("Error getting skills for {}: {:#}", player_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/leveling - Threshold per level
async fn get_leveling(State(state): State<AppState>) -> impl IntoResponse {
    let levels: Vec<LevelThreshold> = state
        .table
        .iter()
        .map(|(level, experience)| LevelThreshold { level, experience })
        .collect();

    Json(ApiResponse::ok(levels))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("🌐 Bitjita Sync - API Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::load(None)?;

    let conn = open_database(&config.storage.database)?;
    println!("✓ Database opened: {}", config.storage.database.display());

    let table = LevelingTable::build(config.leveling.max_level)
        .context("Invalid leveling configuration")?;

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        table: Arc::new(table),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/players", get(get_players))
        .route("/players/:id/inventory", get(get_player_inventory))
        .route("/players/:id/skills", get(get_player_skills))
        .route("/leveling", get(get_leveling))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = config.server.bind.as_str();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("listening on {}", addr);
    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/players", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
