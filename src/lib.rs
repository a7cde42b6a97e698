pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod nuvemshop;
pub mod payco;
pub mod ports;
pub mod services;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::payco::TokenCache;
use crate::ports::{StoreRepository, TransactionRepository};
use crate::services::{PaymentService, ReconciliationService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Arc<dyn StoreRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub payments: Arc<PaymentService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub db: Option<PgPool>,
    pub http: reqwest::Client,
}

/// Wires the services onto the given repositories. `db` is only used by
/// the health endpoint; the repositories already encapsulate storage.
pub fn build_state(
    config: Config,
    stores: Arc<dyn StoreRepository>,
    transactions: Arc<dyn TransactionRepository>,
    db: Option<PgPool>,
) -> AppState {
    let http = reqwest::Client::new();
    let auth = Arc::new(TokenCache::new(config.payco_sso_url.clone(), http.clone()));

    let payments = Arc::new(PaymentService::new(
        stores.clone(),
        transactions.clone(),
        http.clone(),
        auth.clone(),
        config.payco_api_url.clone(),
        config.nuvemshop_api_url.clone(),
    ));
    let reconciliation = Arc::new(ReconciliationService::new(
        stores.clone(),
        transactions.clone(),
        http.clone(),
        auth,
        config.payco_api_url.clone(),
        config.nuvemshop_api_url.clone(),
    ));

    AppState {
        config: Arc::new(config),
        stores,
        transactions,
        payments,
        reconciliation,
        db,
        http,
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = match state.config.cors_allowed_origins.as_deref() {
        Some(raw) => {
            let origins: Vec<HeaderValue> = raw
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments/process", post(handlers::payments::process))
        .route("/payments/check/:transaction_id", get(handlers::payments::check))
        .route("/payments/status/:transaction_id", get(handlers::payments::status))
        .route("/payments/refund/:transaction_id", post(handlers::payments::refund))
        .route("/webhooks/payco", post(handlers::webhooks::payco))
        .route("/webhooks/nuvemshop", post(handlers::webhooks::nuvemshop))
        .route(
            "/webhooks/simulate-status-change",
            post(handlers::webhooks::simulate_status_change),
        )
        .route(
            "/stores/:store_id/settings",
            get(handlers::stores::get_settings).put(handlers::stores::update_settings),
        )
        .layer(cors)
        .with_state(state)
}
