//! In-memory repository implementations. Used by the test suite and for
//! running the gateway locally without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{PaymentStatus, StoreConfig, StoreUpdate, Transaction, TransactionEvent};
use crate::ports::{
    RepositoryError, RepositoryResult, StoreRepository, TransactionRepository,
};

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    // Keyed by processor transaction id. The map lock serializes
    // read-modify-write updates, which satisfies the per-row atomicity
    // the trait requires.
    rows: Mutex<HashMap<String, Transaction>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&tx.transaction_id) {
            return Err(RepositoryError::Duplicate(tx.transaction_id.clone()));
        }
        rows.insert(tx.transaction_id.clone(), tx.clone());
        Ok(tx.clone())
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> RepositoryResult<Option<Transaction>> {
        Ok(self.rows.lock().await.get(transaction_id).cloned())
    }

    async fn find_by_store_and_order(
        &self,
        store_id: &str,
        order_id: &str,
    ) -> RepositoryResult<Vec<Transaction>> {
        let rows = self.rows.lock().await;
        let mut found: Vec<Transaction> = rows
            .values()
            .filter(|t| t.store_id == store_id && t.order_id == order_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        Ok(found)
    }

    async fn find_by_store_and_statuses(
        &self,
        store_id: &str,
        statuses: &[PaymentStatus],
    ) -> RepositoryResult<Vec<Transaction>> {
        let rows = self.rows.lock().await;
        let mut found: Vec<Transaction> = rows
            .values()
            .filter(|t| t.store_id == store_id && statuses.contains(&t.status))
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at);
        Ok(found)
    }

    async fn update_status(
        &self,
        transaction_id: &str,
        new_status: PaymentStatus,
        event: TransactionEvent,
        platform_transaction_id: Option<String>,
    ) -> RepositoryResult<Transaction> {
        let mut rows = self.rows.lock().await;
        let tx = rows
            .get_mut(transaction_id)
            .ok_or_else(|| RepositoryError::NotFound(transaction_id.to_string()))?;
        tx.apply_status_update(new_status, event, platform_transaction_id)
            .map_err(|current| RepositoryError::TerminalState {
                id: transaction_id.to_string(),
                status: current,
            })?;
        Ok(tx.clone())
    }

    async fn link_platform_transaction(
        &self,
        transaction_id: &str,
        platform_transaction_id: &str,
    ) -> RepositoryResult<Transaction> {
        let mut rows = self.rows.lock().await;
        let tx = rows
            .get_mut(transaction_id)
            .ok_or_else(|| RepositoryError::NotFound(transaction_id.to_string()))?;
        tx.platform_transaction_id = Some(platform_transaction_id.to_string());
        tx.updated_at = chrono::Utc::now();
        Ok(tx.clone())
    }
}

#[derive(Default)]
pub struct InMemoryStoreRepository {
    rows: Mutex<HashMap<String, StoreConfig>>,
}

impl InMemoryStoreRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a fully built store config, bypassing the partial-update
    /// path. Test convenience.
    pub async fn seed(&self, store: StoreConfig) {
        self.rows
            .lock()
            .await
            .insert(store.store_id.clone(), store);
    }
}

#[async_trait]
impl StoreRepository for InMemoryStoreRepository {
    async fn get(&self, store_id: &str) -> RepositoryResult<Option<StoreConfig>> {
        Ok(self.rows.lock().await.get(store_id).cloned())
    }

    async fn upsert(&self, store_id: &str, update: StoreUpdate) -> RepositoryResult<StoreConfig> {
        let mut rows = self.rows.lock().await;
        let store = rows.entry(store_id.to_string()).or_insert_with(|| {
            StoreConfig::new(store_id.to_string(), String::new())
        });
        update.apply(store);
        Ok(store.clone())
    }

    async fn delete(&self, store_id: &str) -> RepositoryResult<()> {
        self.rows
            .lock()
            .await
            .remove(store_id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(store_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Customer, PaymentMethod};
    use serde_json::json;

    fn tx(id: &str, store: &str, order: &str, status: PaymentStatus) -> Transaction {
        Transaction::new(
            id.to_string(),
            store.to_string(),
            order.to_string(),
            1000,
            "BRL".to_string(),
            PaymentMethod::Pix,
            status,
            Customer {
                name: "Maria Souza".to_string(),
                email: "maria@example.com".to_string(),
                document: "12345678901".to_string(),
                phone: None,
            },
            None,
            1,
            serde_json::Value::Null,
            json!({"message": "created"}),
        )
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_transaction_id() {
        let repo = InMemoryTransactionRepository::new();
        repo.insert(&tx("T1", "S1", "O1", PaymentStatus::Pending))
            .await
            .unwrap();
        let err = repo
            .insert(&tx("T1", "S1", "O2", PaymentStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(_)));
    }

    #[tokio::test]
    async fn update_status_appends_event() {
        let repo = InMemoryTransactionRepository::new();
        repo.insert(&tx("T1", "S1", "O1", PaymentStatus::Pending))
            .await
            .unwrap();

        let updated = repo
            .update_status(
                "T1",
                PaymentStatus::Paid,
                TransactionEvent::now(PaymentStatus::Paid, json!({})),
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.status, PaymentStatus::Paid);
        assert_eq!(updated.events.len(), 2);
    }

    #[tokio::test]
    async fn update_status_refuses_terminal_regression() {
        let repo = InMemoryTransactionRepository::new();
        repo.insert(&tx("T1", "S1", "O1", PaymentStatus::Refunded))
            .await
            .unwrap();

        let err = repo
            .update_status(
                "T1",
                PaymentStatus::Authorized,
                TransactionEvent::now(PaymentStatus::Authorized, json!({})),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::TerminalState { .. }));

        let stored = repo.find_by_transaction_id("T1").await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Refunded);
        assert_eq!(stored.events.len(), 1);
    }

    #[tokio::test]
    async fn finds_by_store_and_statuses() {
        let repo = InMemoryTransactionRepository::new();
        repo.insert(&tx("T1", "S1", "O1", PaymentStatus::Authorized))
            .await
            .unwrap();
        repo.insert(&tx("T2", "S1", "O1", PaymentStatus::Rejected))
            .await
            .unwrap();
        repo.insert(&tx("T3", "S2", "O9", PaymentStatus::Paid))
            .await
            .unwrap();

        let open = repo
            .find_by_store_and_statuses("S1", &[PaymentStatus::Authorized, PaymentStatus::Paid])
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].transaction_id, "T1");
    }

    #[tokio::test]
    async fn store_upsert_creates_then_patches() {
        let repo = InMemoryStoreRepository::new();
        repo.upsert(
            "S1",
            StoreUpdate {
                access_token: Some("tok".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let store = repo
            .upsert(
                "S1",
                StoreUpdate {
                    enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(store.enabled);
        assert_eq!(store.access_token, "tok");

        repo.delete("S1").await.unwrap();
        assert!(repo.get("S1").await.unwrap().is_none());
        assert!(matches!(
            repo.delete("S1").await.unwrap_err(),
            RepositoryError::NotFound(_)
        ));
    }
}
