//! Payment endpoints: process, check, status, refund.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::domain::{PaymentMethod, PaymentStatus, Transaction, TransactionEvent};
use crate::services::{CheckResult, ProcessRequest, ProcessResponse, RefundReceipt};
use crate::AppState;

pub async fn process(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, GatewayError> {
    let response = state.payments.process(request).await?;
    Ok(Json(response))
}

pub async fn check(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<CheckResult>, GatewayError> {
    let result = state.reconciliation.check_status(&transaction_id).await?;
    Ok(Json(result))
}

/// Full transaction detail, minus customer PII.
#[derive(Debug, Serialize)]
pub struct TransactionSummary {
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_transaction_id: Option<String>,
    pub store_id: String,
    pub order_id: String,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub installments: i32,
    pub events: Vec<TransactionEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionSummary {
    fn from(tx: Transaction) -> Self {
        Self {
            transaction_id: tx.transaction_id,
            platform_transaction_id: tx.platform_transaction_id,
            store_id: tx.store_id,
            order_id: tx.order_id,
            status: tx.status,
            amount_cents: tx.amount_cents,
            currency: tx.currency,
            payment_method: tx.payment_method,
            installments: tx.installments,
            events: tx.events,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

pub async fn status(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<TransactionSummary>, GatewayError> {
    let transaction = state
        .transactions
        .find_by_transaction_id(&transaction_id)
        .await?
        .ok_or(GatewayError::TransactionNotFound)?;
    Ok(Json(transaction.into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundBody {
    /// Integer minor units; omit for a full refund.
    pub amount: Option<i64>,
}

pub async fn refund(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    body: Option<Json<RefundBody>>,
) -> Result<Json<RefundReceipt>, GatewayError> {
    let amount = body.and_then(|Json(b)| b.amount);
    if let Some(cents) = amount {
        if cents <= 0 {
            return Err(GatewayError::InvalidInput(
                "refund amount must be a positive number of cents".to_string(),
            ));
        }
    }
    let receipt = state.reconciliation.refund(&transaction_id, amount).await?;
    Ok(Json(receipt))
}
