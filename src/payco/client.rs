//! HTTP client for the Payco payment processor.
//!
//! The client never propagates processor failures as errors past this
//! boundary: a payment attempt always resolves to an outcome value
//! ([`PaymentOutcome`], [`StatusProbe`], [`RefundOutcome`]) so callers
//! can treat a dead processor the same way as a declined card.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::card::{split_expiration, CardData};
use crate::domain::{format_major_units, Customer, PaymentStatus};
use crate::payco::auth::TokenCache;

/// Per-store OAuth credential pair.
#[derive(Clone)]
pub struct PaycoCredentials {
    pub client_id: String,
    pub api_key: String,
}

#[derive(Clone)]
pub struct PaycoClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<TokenCache>,
    credentials: PaycoCredentials,
}

/// Outcome of a payment creation attempt.
#[derive(Debug)]
pub enum PaymentOutcome {
    Approved(ApprovedPayment),
    Declined(DeclinedPayment),
}

#[derive(Debug)]
pub struct ApprovedPayment {
    /// Processor-issued transaction id.
    pub transaction_id: String,
    pub status: PaymentStatus,
    pub details: MethodDetails,
    /// Full processor response, retained for diagnostics.
    pub raw: Value,
}

/// Method-specific artifacts returned to the checkout.
#[derive(Debug)]
pub enum MethodDetails {
    Card {
        authorization_code: Option<String>,
    },
    Pix {
        qr_image: Option<String>,
        qr_code: Option<String>,
        expires_at: Option<String>,
    },
    Boleto {
        document_url: Option<String>,
        barcode: Option<String>,
        due_date: Option<String>,
    },
}

#[derive(Debug)]
pub struct DeclinedPayment {
    pub error: String,
    pub code: String,
    pub raw: Value,
}

/// Result of a status lookup. `Unavailable` means the processor could
/// not be asked, which is not the same as a negative answer.
#[derive(Debug)]
pub enum StatusProbe {
    Known { status: PaymentStatus, paid: bool },
    Unavailable { error: String },
}

#[derive(Debug)]
pub enum RefundOutcome {
    Refunded { refund_id: Option<String>, raw: Value },
    Failed { error: String },
}

/// Inputs for a card payment, borrowed from the orchestrator.
pub struct CardPaymentRequest<'a> {
    pub amount_cents: i64,
    pub currency: &'a str,
    pub card: &'a CardData,
    pub customer: &'a Customer,
    pub installments: i32,
    pub order_id: &'a str,
    pub description: &'a str,
}

/// Maps a processor status string onto the internal vocabulary.
/// Unmapped values pass through as [`PaymentStatus::Other`].
pub fn map_status(raw: &str) -> PaymentStatus {
    match raw {
        "approved" | "paid" | "authorized" => PaymentStatus::Authorized,
        "pending" | "processing" | "waiting_payment" => PaymentStatus::Pending,
        "rejected" | "failed" => PaymentStatus::Rejected,
        "cancelled" => PaymentStatus::Cancelled,
        "refunded" | "chargeback" => PaymentStatus::Refunded,
        other => {
            tracing::warn!(status = other, "unmapped processor status, passing through");
            PaymentStatus::Other(other.to_string())
        }
    }
}

impl PaycoClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        auth: Arc<TokenCache>,
        credentials: PaycoCredentials,
    ) -> Self {
        Self {
            http,
            base_url,
            auth,
            credentials,
        }
    }

    pub async fn create_credit_card_payment(
        &self,
        request: &CardPaymentRequest<'_>,
    ) -> PaymentOutcome {
        self.create_card_payment("/payments/credit-card", request, true)
            .await
    }

    pub async fn create_debit_card_payment(
        &self,
        request: &CardPaymentRequest<'_>,
    ) -> PaymentOutcome {
        self.create_card_payment("/payments/debit-card", request, false)
            .await
    }

    async fn create_card_payment(
        &self,
        path: &str,
        request: &CardPaymentRequest<'_>,
        with_installments: bool,
    ) -> PaymentOutcome {
        // Expiration was validated upstream; a malformed value here is a
        // caller bug and resolves as a decline rather than a panic.
        let Some((month, year)) = split_expiration(&request.card.expiration) else {
            return PaymentOutcome::Declined(DeclinedPayment {
                error: "invalid card expiration".to_string(),
                code: "invalid_card".to_string(),
                raw: Value::Null,
            });
        };

        let mut payload = json!({
            "amount": major_amount(request.amount_cents),
            "currency": request.currency,
            "description": request.description,
            "external_reference": request.order_id,
            "card": {
                "number": request.card.number.replace(' ', ""),
                "holder_name": request.card.holder_name,
                "expiration_month": month,
                "expiration_year": format!("20{year}"),
                "cvv": request.card.cvv,
            },
            "customer": customer_payload(request.customer),
        });
        if with_installments {
            payload["installments"] = json!(request.installments);
        }

        match self.post_payment(path, &payload).await {
            Ok(raw) => approved_from(raw, |raw| MethodDetails::Card {
                authorization_code: pick_string(raw, &["authorization_code"]),
            }),
            Err(declined) => PaymentOutcome::Declined(declined),
        }
    }

    pub async fn create_pix_payment(
        &self,
        amount_cents: i64,
        currency: &str,
        customer: &Customer,
        order_id: &str,
        description: &str,
    ) -> PaymentOutcome {
        let payload = json!({
            "amount": major_amount(amount_cents),
            "currency": currency,
            "description": description,
            "external_reference": order_id,
            "expiration_minutes": 30,
            "customer": customer_payload(customer),
        });

        match self.post_payment("/payments/pix", &payload).await {
            Ok(raw) => approved_from(raw, |raw| MethodDetails::Pix {
                qr_image: pick_string(raw, &["qr_code_image", "qr_image"]),
                qr_code: pick_string(raw, &["qr_code", "pix_code"]),
                expires_at: pick_string(raw, &["expires_at", "expiration_date"]),
            }),
            Err(declined) => PaymentOutcome::Declined(declined),
        }
    }

    pub async fn create_boleto_payment(
        &self,
        amount_cents: i64,
        currency: &str,
        customer: &Customer,
        order_id: &str,
        description: &str,
    ) -> PaymentOutcome {
        let payload = json!({
            "amount": major_amount(amount_cents),
            "currency": currency,
            "description": description,
            "external_reference": order_id,
            "due_days": 3,
            "customer": customer_payload(customer),
        });

        match self.post_payment("/payments/boleto", &payload).await {
            Ok(raw) => approved_from(raw, |raw| MethodDetails::Boleto {
                document_url: pick_string(raw, &["boleto_url", "document_url"]),
                barcode: pick_string(raw, &["barcode", "digitable_line"]),
                due_date: pick_string(raw, &["due_date"]),
            }),
            Err(declined) => PaymentOutcome::Declined(declined),
        }
    }

    /// Asks the processor for the current status of a transaction.
    pub async fn payment_status(&self, transaction_id: &str) -> StatusProbe {
        let token = match self.bearer_token().await {
            Ok(token) => token,
            Err(error) => return StatusProbe::Unavailable { error },
        };

        let url = format!("{}/payments/{transaction_id}", self.base_url);
        let response = match self.http.get(&url).bearer_auth(token).send().await {
            Ok(response) => response,
            Err(err) => {
                return StatusProbe::Unavailable {
                    error: format!("status request failed: {err}"),
                }
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return StatusProbe::Unavailable {
                error: format!("status request rejected ({status}): {body}"),
            };
        }

        let raw: Value = match response.json().await {
            Ok(raw) => raw,
            Err(err) => {
                return StatusProbe::Unavailable {
                    error: format!("unreadable status response: {err}"),
                }
            }
        };

        let raw_status = pick_string(&raw, &["status"]).unwrap_or_default();
        StatusProbe::Known {
            status: map_status(&raw_status),
            paid: matches!(raw_status.as_str(), "approved" | "paid"),
        }
    }

    /// Requests a refund, full when `amount_cents` is `None`.
    pub async fn refund(&self, transaction_id: &str, amount_cents: Option<i64>) -> RefundOutcome {
        let token = match self.bearer_token().await {
            Ok(token) => token,
            Err(error) => return RefundOutcome::Failed { error },
        };

        let mut payload = json!({});
        if let Some(cents) = amount_cents {
            payload["amount"] = major_amount(cents);
        }

        let url = format!("{}/payments/{transaction_id}/refund", self.base_url);
        let response = match self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                return RefundOutcome::Failed {
                    error: format!("refund request failed: {err}"),
                }
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or_else(|| body.clone());
            return RefundOutcome::Failed {
                error: format!("refund rejected ({status}): {message}"),
            };
        }

        let raw: Value = response.json().await.unwrap_or(Value::Null);
        RefundOutcome::Refunded {
            refund_id: pick_string(&raw, &["refund_id", "id"]),
            raw,
        }
    }

    async fn bearer_token(&self) -> Result<String, String> {
        self.auth
            .token(&self.credentials.client_id, &self.credentials.api_key)
            .await
            .map_err(|err| format!("processor authentication failed: {err}"))
    }

    async fn post_payment<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<Value, DeclinedPayment> {
        let token = self.bearer_token().await.map_err(|error| DeclinedPayment {
            error,
            code: "processor_unavailable".to_string(),
            raw: Value::Null,
        })?;

        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(|err| DeclinedPayment {
                error: format!("payment request failed: {err}"),
                code: "processor_unavailable".to_string(),
                raw: Value::Null,
            })?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let raw: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            return Err(DeclinedPayment {
                error: pick_string(&raw, &["message", "error"])
                    .unwrap_or_else(|| "payment was not approved".to_string()),
                code: pick_string(&raw, &["code"])
                    .unwrap_or_else(|| "payment_error".to_string()),
                raw,
            });
        }

        response.json().await.map_err(|err| DeclinedPayment {
            error: format!("unreadable payment response: {err}"),
            code: "processor_unavailable".to_string(),
            raw: Value::Null,
        })
    }
}

fn approved_from(raw: Value, details: impl Fn(&Value) -> MethodDetails) -> PaymentOutcome {
    let Some(transaction_id) = extract_id(&raw) else {
        return PaymentOutcome::Declined(DeclinedPayment {
            error: "processor response carried no transaction id".to_string(),
            code: "processor_unavailable".to_string(),
            raw,
        });
    };

    let raw_status = pick_string(&raw, &["status"]).unwrap_or_else(|| "pending".to_string());
    let details = details(&raw);
    PaymentOutcome::Approved(ApprovedPayment {
        transaction_id,
        status: map_status(&raw_status),
        details,
        raw,
    })
}

/// Amounts cross the wire as decimal-major values.
fn major_amount(cents: i64) -> Value {
    // serde_json renders the string form exactly; going through f64 here
    // would reintroduce the rounding the integer representation avoids
    Value::String(format_major_units(cents))
}

fn customer_payload(customer: &Customer) -> Value {
    json!({
        "name": customer.name,
        "email": customer.email,
        "document": customer.document,
        "phone": customer.phone,
    })
}

/// The processor is inconsistent about where and how it returns ids:
/// `id` or `transaction_id`, string or number.
fn extract_id(raw: &Value) -> Option<String> {
    for key in ["id", "transaction_id"] {
        match raw.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn pick_string(raw: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(Value::String(s)) = raw.get(key) {
            return Some(s.clone());
        }
    }
    None
}

fn error_message(body: &str) -> Option<String> {
    let raw: Value = serde_json::from_str(body).ok()?;
    pick_string(&raw, &["message", "error"])
}
