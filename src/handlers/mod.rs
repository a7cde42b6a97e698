//! HTTP handlers. Thin adapters between axum and the service layer;
//! every fallible handler returns `Result<_, GatewayError>` and lets the
//! error envelope do the formatting.

pub mod payments;
pub mod stores;
pub mod webhooks;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database_ok = match &state.db {
        Some(pool) => sqlx::query("SELECT 1").execute(pool).await.is_ok(),
        None => true,
    };
    Json(json!({
        "status": if database_ok { "ok" } else { "degraded" },
        "database": database_ok,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
