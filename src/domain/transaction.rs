//! Transaction domain entity.
//! Framework-agnostic representation of a payment attempt and its
//! append-only lifecycle event trail.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::card::CardSnapshot;

/// Payment methods offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Pix,
    Boleto,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Boleto => "boleto",
        }
    }

    /// Card methods settle synchronously; PIX and boleto settle later via
    /// webhooks or polling.
    pub fn is_card(&self) -> bool {
        matches!(self, PaymentMethod::CreditCard | PaymentMethod::DebitCard)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "debit_card" => Ok(PaymentMethod::DebitCard),
            "pix" => Ok(PaymentMethod::Pix),
            "boleto" => Ok(PaymentMethod::Boleto),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// Internal transaction status vocabulary.
///
/// Processor statuses the mapping table does not recognize are carried
/// through unchanged as [`PaymentStatus::Other`] so a new vendor status
/// never breaks reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Authorized,
    Paid,
    Rejected,
    Cancelled,
    Refunded,
    Failed,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => PaymentStatus::Pending,
            "authorized" => PaymentStatus::Authorized,
            "paid" => PaymentStatus::Paid,
            "rejected" => PaymentStatus::Rejected,
            "cancelled" => PaymentStatus::Cancelled,
            "refunded" => PaymentStatus::Refunded,
            "failed" => PaymentStatus::Failed,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Other(s) => s.as_str(),
        }
    }

    /// Terminal statuses admit no further automatic transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Refunded | PaymentStatus::Cancelled | PaymentStatus::Failed
        )
    }

    /// Settled successfully from the payer's point of view.
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Authorized | PaymentStatus::Paid)
    }

    /// A terminal status blocks every transition except re-asserting the
    /// same status (duplicate notifications stay visible in the audit
    /// trail). Refund of an authorized or paid transaction is an ordinary
    /// non-terminal transition and is not blocked here.
    pub fn blocks_transition_to(&self, next: &PaymentStatus) -> bool {
        self.is_terminal() && self != next
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PaymentStatus::parse(s))
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(PaymentStatus::parse(&raw))
    }
}

/// Customer snapshot captured at creation time. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// One entry in the append-only audit trail. Insertion order is
/// significant and entries are never reordered or pruned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub status: PaymentStatus,
    pub timestamp: DateTime<Utc>,
    pub details: Value,
}

impl TransactionEvent {
    pub fn now(status: PaymentStatus, details: Value) -> Self {
        Self {
            status,
            timestamp: Utc::now(),
            details,
        }
    }
}

/// Durable record of a payment attempt.
///
/// Created once per successfully initiated payment; afterwards only the
/// reconciliation paths mutate it (status, events, platform link).
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    /// Surrogate row id.
    pub id: Uuid,
    /// Processor-issued id, unique and immutable once assigned.
    pub transaction_id: String,
    /// Commerce-platform transaction id, set once the mirror succeeds.
    pub platform_transaction_id: Option<String>,
    pub store_id: String,
    pub order_id: String,
    /// Integer minor units (centavos). Converted to decimal-major strings
    /// only at the outbound edges.
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub customer: Customer,
    pub card: Option<CardSnapshot>,
    pub installments: i32,
    pub events: Vec<TransactionEvent>,
    /// Opaque processor payload retained for diagnostics.
    pub processor_response: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_id: String,
        store_id: String,
        order_id: String,
        amount_cents: i64,
        currency: String,
        payment_method: PaymentMethod,
        status: PaymentStatus,
        customer: Customer,
        card: Option<CardSnapshot>,
        installments: i32,
        processor_response: Value,
        creation_details: Value,
    ) -> Self {
        let now = Utc::now();
        let creation_event = TransactionEvent {
            status: status.clone(),
            timestamp: now,
            details: creation_details,
        };
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            platform_transaction_id: None,
            store_id,
            order_id,
            amount_cents,
            currency,
            payment_method,
            status,
            customer,
            card,
            installments: if payment_method == PaymentMethod::CreditCard {
                installments
            } else {
                1
            },
            events: vec![creation_event],
            processor_response,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn latest_event(&self) -> Option<&TransactionEvent> {
        self.events.last()
    }

    /// Sole status mutation path after creation: appends the event, sets
    /// the status, and optionally links the platform transaction id.
    ///
    /// Returns the current status unchanged when it is terminal and the
    /// requested status differs, so racing triggers cannot regress a
    /// settled outcome.
    pub fn apply_status_update(
        &mut self,
        new_status: PaymentStatus,
        event: TransactionEvent,
        platform_transaction_id: Option<String>,
    ) -> Result<(), PaymentStatus> {
        if self.status.blocks_transition_to(&new_status) {
            return Err(self.status.clone());
        }
        self.status = new_status;
        self.events.push(event);
        if platform_transaction_id.is_some() {
            self.platform_transaction_id = platform_transaction_id;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Formats integer minor units as a decimal-major string, e.g. 1050 ->
/// "10.50". Used only at outbound boundaries.
pub fn format_major_units(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let magnitude = cents.unsigned_abs();
    format!("{sign}{}.{:02}", magnitude / 100, magnitude % 100)
}
