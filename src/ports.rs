//! Repository traits. The orchestrator and reconciliation engine depend
//! only on these; the storage engine lives behind them in `adapters`.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{PaymentStatus, StoreConfig, StoreUpdate, Transaction, TransactionEvent};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate transaction id: {0}")]
    Duplicate(String),

    #[error("transaction {id} is terminal in status {status}")]
    TerminalState { id: String, status: PaymentStatus },

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(db.message().to_string())
            }
            _ => RepositoryError::Storage(err.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Durable record of payment attempts, keyed by the processor-issued
/// transaction id.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> RepositoryResult<Option<Transaction>>;

    async fn find_by_store_and_order(
        &self,
        store_id: &str,
        order_id: &str,
    ) -> RepositoryResult<Vec<Transaction>>;

    async fn find_by_store_and_statuses(
        &self,
        store_id: &str,
        statuses: &[PaymentStatus],
    ) -> RepositoryResult<Vec<Transaction>>;

    /// Sole status mutation path. Always appends `event`, never replaces
    /// the list. Must be read-modify-write safe per transaction id:
    /// racing reconciliation triggers may interleave but no update may
    /// be lost and a terminal status may not regress
    /// ([`RepositoryError::TerminalState`]).
    async fn update_status(
        &self,
        transaction_id: &str,
        new_status: PaymentStatus,
        event: TransactionEvent,
        platform_transaction_id: Option<String>,
    ) -> RepositoryResult<Transaction>;

    /// Links the commerce-platform transaction id after a successful
    /// mirror. Does not touch status or events.
    async fn link_platform_transaction(
        &self,
        transaction_id: &str,
        platform_transaction_id: &str,
    ) -> RepositoryResult<Transaction>;
}

/// Per-merchant configuration registry.
#[async_trait]
pub trait StoreRepository: Send + Sync {
    async fn get(&self, store_id: &str) -> RepositoryResult<Option<StoreConfig>>;

    /// Partial-field update; inserts a fresh record when the store does
    /// not exist yet.
    async fn upsert(&self, store_id: &str, update: StoreUpdate) -> RepositoryResult<StoreConfig>;

    async fn delete(&self, store_id: &str) -> RepositoryResult<()>;
}
