//! Status reconciliation: webhooks, on-demand checks, polling, refunds,
//! and platform-driven cancellation all converge on one advance path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::Duration;

use crate::domain::{format_major_units, PaymentStatus, Transaction, TransactionEvent};
use crate::error::GatewayError;
use crate::payco::{RefundOutcome, StatusProbe, TokenCache};
use crate::ports::{RepositoryError, StoreRepository, TransactionRepository};

/// Result of a status check, shaped for the checkout poller.
#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub paid: bool,
    pub status: PaymentStatus,
    pub transaction_id: String,
}

#[derive(Debug, Serialize)]
pub struct RefundReceipt {
    pub success: bool,
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
}

/// Processor webhook body. Either a dotted event name or a raw status
/// field identifies the transition.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub transaction_id: String,
    pub status: Option<String>,
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Polling cadence for payments awaiting asynchronous settlement.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    // first answer usually lands within seconds, then the budget covers
    // roughly the 30 minute PIX expiration window
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            interval: Duration::from_secs(30),
            max_attempts: 60,
        }
    }
}

#[derive(Debug)]
pub enum PollOutcome {
    Paid(CheckResult),
    TimedOut { last_status: PaymentStatus },
}

/// Maps processor webhook event names onto the internal vocabulary.
fn map_webhook_event(event: &str) -> Option<PaymentStatus> {
    match event {
        "payment.authorized" => Some(PaymentStatus::Authorized),
        "payment.paid" => Some(PaymentStatus::Paid),
        "payment.cancelled" => Some(PaymentStatus::Cancelled),
        "payment.refunded" => Some(PaymentStatus::Refunded),
        "payment.failed" => Some(PaymentStatus::Failed),
        _ => None,
    }
}

pub struct ReconciliationService {
    stores: Arc<dyn StoreRepository>,
    transactions: Arc<dyn TransactionRepository>,
    http: reqwest::Client,
    auth: Arc<TokenCache>,
    payco_api_url: String,
    nuvemshop_api_url: String,
}

impl ReconciliationService {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        transactions: Arc<dyn TransactionRepository>,
        http: reqwest::Client,
        auth: Arc<TokenCache>,
        payco_api_url: String,
        nuvemshop_api_url: String,
    ) -> Self {
        Self {
            stores,
            transactions,
            http,
            auth,
            payco_api_url,
            nuvemshop_api_url,
        }
    }

    /// Checks whether a payment has settled, consulting the processor
    /// only when the stored status leaves the question open.
    pub async fn check_status(&self, transaction_id: &str) -> Result<CheckResult, GatewayError> {
        let transaction = self.load(transaction_id).await?;

        // settled or terminal: the stored answer is final
        if transaction.status.is_paid() || transaction.status.is_terminal() {
            return Ok(result_of(&transaction));
        }

        let store = self
            .stores
            .get(&transaction.store_id)
            .await?
            .ok_or(GatewayError::StoreNotFound)?;
        let processor =
            super::processor_client(&self.http, &self.payco_api_url, self.auth.clone(), &store)?;

        match processor.payment_status(transaction_id).await {
            StatusProbe::Known { status, paid } => {
                let target = if paid { PaymentStatus::Authorized } else { status };
                if target == transaction.status {
                    return Ok(result_of(&transaction));
                }
                let updated = self
                    .advance(
                        transaction_id,
                        target,
                        json!({"source": "poll"}),
                    )
                    .await?;
                Ok(result_of(&updated))
            }
            StatusProbe::Unavailable { error } => {
                tracing::warn!(
                    transaction_id,
                    error = %error,
                    "processor status check unavailable, keeping stored status"
                );
                Ok(result_of(&transaction))
            }
        }
    }

    /// Moves a transaction to `new_status`, appending an audit event and
    /// mirroring the change onto the platform. A terminal transaction is
    /// left untouched and returned as-is.
    pub async fn advance(
        &self,
        transaction_id: &str,
        new_status: PaymentStatus,
        details: Value,
    ) -> Result<Transaction, GatewayError> {
        let event = TransactionEvent::now(new_status.clone(), details);
        let updated = match self
            .transactions
            .update_status(transaction_id, new_status.clone(), event, None)
            .await
        {
            Ok(updated) => updated,
            Err(RepositoryError::TerminalState { id, status }) => {
                tracing::warn!(
                    transaction_id = %id,
                    current = %status,
                    requested = %new_status,
                    "ignoring status update for terminal transaction"
                );
                return Ok(self.load(transaction_id).await?);
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            transaction_id,
            status = %updated.status,
            "transaction status advanced"
        );

        self.mirror_status(&updated).await;
        Ok(updated)
    }

    /// Applies a processor webhook notification.
    pub async fn apply_webhook(
        &self,
        payload: WebhookPayload,
    ) -> Result<Transaction, GatewayError> {
        let status = payload
            .event
            .as_deref()
            .and_then(map_webhook_event)
            .or_else(|| {
                payload
                    .status
                    .as_deref()
                    .map(crate::payco::map_status)
            })
            .ok_or_else(|| {
                GatewayError::InvalidInput(
                    "webhook carries neither a known event nor a status".to_string(),
                )
            })?;

        let details = json!({
            "source": "webhook",
            "event": payload.event,
            "data": payload.data,
        });
        self.advance(&payload.transaction_id, status, details).await
    }

    /// Refunds an authorized or paid transaction, full refund when
    /// `amount_cents` is `None`.
    pub async fn refund(
        &self,
        transaction_id: &str,
        amount_cents: Option<i64>,
    ) -> Result<RefundReceipt, GatewayError> {
        let transaction = self.load(transaction_id).await?;
        if transaction.status == PaymentStatus::Refunded {
            return Err(GatewayError::AlreadyRefunded);
        }
        if !transaction.status.is_paid() {
            return Err(GatewayError::InvalidInput(format!(
                "only authorized or paid transactions can be refunded, current status is {}",
                transaction.status
            )));
        }

        let store = self
            .stores
            .get(&transaction.store_id)
            .await?
            .ok_or(GatewayError::StoreNotFound)?;
        let processor =
            super::processor_client(&self.http, &self.payco_api_url, self.auth.clone(), &store)?;

        let (refund_id, raw) = match processor.refund(transaction_id, amount_cents).await {
            RefundOutcome::Refunded { refund_id, raw } => (refund_id, raw),
            RefundOutcome::Failed { error } => return Err(GatewayError::RefundFailed(error)),
        };

        let details = json!({
            "source": "refund",
            "refund_id": refund_id,
            "amount": amount_cents.map(format_major_units),
            "response": raw,
        });
        self.advance(transaction_id, PaymentStatus::Refunded, details)
            .await?;

        Ok(RefundReceipt {
            success: true,
            transaction_id: transaction_id.to_string(),
            refund_id,
        })
    }

    /// Cancels the open transactions of a platform order, typically in
    /// response to an order-cancelled notification.
    pub async fn cancel_order_transactions(
        &self,
        store_id: &str,
        order_id: &str,
    ) -> Result<usize, GatewayError> {
        let open = self
            .transactions
            .find_by_store_and_statuses(
                store_id,
                &[
                    PaymentStatus::Pending,
                    PaymentStatus::Authorized,
                    PaymentStatus::Paid,
                ],
            )
            .await?;

        let mut cancelled = 0;
        for transaction in open.iter().filter(|t| t.order_id == order_id) {
            self.advance(
                &transaction.transaction_id,
                PaymentStatus::Cancelled,
                json!({"source": "platform_webhook", "reason": "order cancelled"}),
            )
            .await?;
            cancelled += 1;
        }
        Ok(cancelled)
    }

    /// Polls the processor until the payment settles or the attempt
    /// budget runs out. A timeout mutates nothing.
    pub async fn poll_until_paid(
        &self,
        transaction_id: &str,
        policy: PollPolicy,
    ) -> Result<PollOutcome, GatewayError> {
        tokio::time::sleep(policy.initial_delay).await;

        // seed from the stored row so an exhausted (or zero-attempt)
        // budget reports the actual last known status
        let mut last_status = self.load(transaction_id).await?.status;
        for attempt in 0..policy.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(policy.interval).await;
            }
            let result = self.check_status(transaction_id).await?;
            if result.paid {
                return Ok(PollOutcome::Paid(result));
            }
            if result.status.is_terminal() {
                return Ok(PollOutcome::TimedOut {
                    last_status: result.status,
                });
            }
            last_status = result.status;
        }
        Ok(PollOutcome::TimedOut { last_status })
    }

    async fn load(&self, transaction_id: &str) -> Result<Transaction, GatewayError> {
        self.transactions
            .find_by_transaction_id(transaction_id)
            .await?
            .ok_or(GatewayError::TransactionNotFound)
    }

    /// Mirrors a status change onto the platform transaction, when one
    /// is linked. Log-and-continue: reconciliation state is already
    /// durable here.
    async fn mirror_status(&self, transaction: &Transaction) {
        let Some(platform_id) = transaction.platform_transaction_id.as_deref() else {
            return;
        };
        let store = match self.stores.get(&transaction.store_id).await {
            Ok(Some(store)) => store,
            Ok(None) => {
                tracing::warn!(
                    store_id = %transaction.store_id,
                    "store missing, skipping platform status mirror"
                );
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "store lookup failed, skipping platform status mirror");
                return;
            }
        };

        let platform = super::platform_client(&self.http, &self.nuvemshop_api_url, &store);
        if let Err(err) = platform
            .create_transaction_event(
                &transaction.order_id,
                platform_id,
                transaction.status.as_str(),
                &format_major_units(transaction.amount_cents),
            )
            .await
        {
            tracing::warn!(
                transaction_id = %transaction.transaction_id,
                error = %err,
                "failed to mirror status change onto the platform"
            );
        }
    }
}

fn result_of(transaction: &Transaction) -> CheckResult {
    CheckResult {
        paid: transaction.status.is_paid(),
        status: transaction.status.clone(),
        transaction_id: transaction.transaction_id.clone(),
    }
}
