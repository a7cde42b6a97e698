//! Webhook endpoints for the payment processor and the commerce
//! platform, plus a development-only status simulator.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use sha2::Sha256;

use crate::domain::PaymentStatus;
use crate::error::GatewayError;
use crate::services::WebhookPayload;
use crate::AppState;

const SIGNATURE_HEADER: &str = "x-payco-signature";

/// Processor webhook. The signature covers the raw body, so the body is
/// taken as a string and parsed only after verification.
pub async fn payco(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, GatewayError> {
    if let Some(secret) = state.config.payco_webhook_secret.as_deref() {
        verify_signature(secret, &headers, &body)?;
    } else {
        tracing::warn!("webhook signature check skipped, no secret configured");
    }

    let payload: WebhookPayload = serde_json::from_str(&body)
        .map_err(|err| GatewayError::InvalidInput(format!("unreadable webhook body: {err}")))?;

    tracing::info!(
        transaction_id = %payload.transaction_id,
        event = payload.event.as_deref().unwrap_or("-"),
        "processor webhook received"
    );

    let updated = state.reconciliation.apply_webhook(payload).await?;
    Ok(Json(json!({
        "success": true,
        "transaction_id": updated.transaction_id,
        "status": updated.status,
    })))
}

fn verify_signature(secret: &str, headers: &HeaderMap, body: &str) -> Result<(), GatewayError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::SignatureInvalid)?;
    let decoded = hex::decode(provided.trim()).map_err(|_| GatewayError::SignatureInvalid)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| GatewayError::Internal("webhook secret is unusable".to_string()))?;
    mac.update(body.as_bytes());
    mac.verify_slice(&decoded)
        .map_err(|_| GatewayError::SignatureInvalid)
}

/// Platform webhook body. The platform sends ids inconsistently as
/// numbers or strings.
#[derive(Debug, Deserialize)]
pub struct PlatformWebhook {
    pub event: String,
    #[serde(deserialize_with = "string_or_number")]
    pub store_id: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub id: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom("expected a string or a number")),
    }
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(serde::de::Error::custom("expected a string or a number")),
    }
}

pub async fn nuvemshop(
    State(state): State<AppState>,
    Json(payload): Json<PlatformWebhook>,
) -> Result<Json<Value>, GatewayError> {
    tracing::info!(
        event = %payload.event,
        store_id = %payload.store_id,
        "platform webhook received"
    );

    if payload.event == "order/cancelled" {
        let order_id = payload.id.ok_or_else(|| {
            GatewayError::InvalidInput("order/cancelled webhook carries no order id".to_string())
        })?;
        let cancelled = state
            .reconciliation
            .cancel_order_transactions(&payload.store_id, &order_id)
            .await?;
        return Ok(Json(json!({"success": true, "cancelled": cancelled})));
    }

    // other platform events carry nothing to reconcile
    Ok(Json(json!({"success": true})))
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub transaction_id: String,
    pub status: PaymentStatus,
}

/// Development helper: forces a status transition without the processor.
pub async fn simulate_status_change(
    State(state): State<AppState>,
    Json(request): Json<SimulateRequest>,
) -> Result<Json<Value>, GatewayError> {
    if state.config.is_production() {
        return Err(GatewayError::GatewayDisabled(
            "status simulation is not available in production".to_string(),
        ));
    }

    let updated = state
        .reconciliation
        .advance(
            &request.transaction_id,
            request.status,
            json!({"source": "simulation"}),
        )
        .await?;
    Ok(Json(json!({
        "success": true,
        "transaction_id": updated.transaction_id,
        "status": updated.status,
    })))
}
