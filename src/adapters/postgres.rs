//! Postgres implementations of the repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    PaymentStatus, StoreConfig, StoreUpdate, Transaction, TransactionEvent,
};
use crate::ports::{
    RepositoryError, RepositoryResult, StoreRepository, TransactionRepository,
};

#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TRANSACTION_COLUMNS: &str = "id, transaction_id, platform_transaction_id, store_id, \
     order_id, amount_cents, currency, payment_method, status, customer, card, installments, \
     events, processor_response, created_at, updated_at";

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions ({TRANSACTION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(tx.id)
        .bind(&tx.transaction_id)
        .bind(&tx.platform_transaction_id)
        .bind(&tx.store_id)
        .bind(&tx.order_id)
        .bind(tx.amount_cents)
        .bind(&tx.currency)
        .bind(tx.payment_method.as_str())
        .bind(tx.status.as_str())
        .bind(to_json(&tx.customer)?)
        .bind(tx.card.as_ref().map(to_json).transpose()?)
        .bind(tx.installments)
        .bind(to_json(&tx.events)?)
        .bind(&tx.processor_response)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> RepositoryResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn find_by_store_and_order(
        &self,
        store_id: &str,
        order_id: &str,
    ) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE store_id = $1 AND order_id = $2 \
             ORDER BY created_at",
        )
        .bind(store_id)
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn find_by_store_and_statuses(
        &self,
        store_id: &str,
        statuses: &[PaymentStatus],
    ) -> RepositoryResult<Vec<Transaction>> {
        let status_strings: Vec<String> =
            statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE store_id = $1 AND status = ANY($2) \
             ORDER BY created_at",
        )
        .bind(store_id)
        .bind(&status_strings)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn update_status(
        &self,
        transaction_id: &str,
        new_status: PaymentStatus,
        event: TransactionEvent,
        platform_transaction_id: Option<String>,
    ) -> RepositoryResult<Transaction> {
        let mut db_tx = self.pool.begin().await?;

        // Row lock serializes racing reconciliation triggers on the same
        // transaction id; the terminal guard runs under the lock.
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE transaction_id = $1 FOR UPDATE",
        )
        .bind(transaction_id)
        .fetch_optional(&mut *db_tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(transaction_id.to_string()))?;

        let mut current = row.into_domain()?;
        current
            .apply_status_update(new_status, event, platform_transaction_id)
            .map_err(|status| RepositoryError::TerminalState {
                id: transaction_id.to_string(),
                status,
            })?;

        let updated = sqlx::query_as::<_, TransactionRow>(
            "UPDATE transactions SET status = $2, events = $3, \
             platform_transaction_id = $4, updated_at = $5 \
             WHERE transaction_id = $1 RETURNING *",
        )
        .bind(transaction_id)
        .bind(current.status.as_str())
        .bind(to_json(&current.events)?)
        .bind(&current.platform_transaction_id)
        .bind(current.updated_at)
        .fetch_one(&mut *db_tx)
        .await?;

        db_tx.commit().await?;
        updated.into_domain()
    }

    async fn link_platform_transaction(
        &self,
        transaction_id: &str,
        platform_transaction_id: &str,
    ) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "UPDATE transactions SET platform_transaction_id = $2, updated_at = now() \
             WHERE transaction_id = $1 RETURNING *",
        )
        .bind(transaction_id)
        .bind(platform_transaction_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(transaction_id.to_string()))?;

        row.into_domain()
    }
}

#[derive(Clone)]
pub struct PostgresStoreRepository {
    pool: PgPool,
}

impl PostgresStoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StoreRepository for PostgresStoreRepository {
    async fn get(&self, store_id: &str) -> RepositoryResult<Option<StoreConfig>> {
        let row = sqlx::query_as::<_, StoreRow>("SELECT * FROM stores WHERE store_id = $1")
            .bind(store_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(StoreRow::into_domain).transpose()
    }

    async fn upsert(&self, store_id: &str, update: StoreUpdate) -> RepositoryResult<StoreConfig> {
        let mut db_tx = self.pool.begin().await?;

        let existing =
            sqlx::query_as::<_, StoreRow>("SELECT * FROM stores WHERE store_id = $1 FOR UPDATE")
                .bind(store_id)
                .fetch_optional(&mut *db_tx)
                .await?;

        let mut store = match existing {
            Some(row) => row.into_domain()?,
            None => StoreConfig::new(store_id.to_string(), String::new()),
        };
        update.apply(&mut store);

        let saved = sqlx::query_as::<_, StoreRow>(
            r#"
            INSERT INTO stores (
                store_id, access_token, store_name, payment_provider_id,
                payco_client_id, payco_api_key, enabled, payment_methods,
                installed_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (store_id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                store_name = EXCLUDED.store_name,
                payment_provider_id = EXCLUDED.payment_provider_id,
                payco_client_id = EXCLUDED.payco_client_id,
                payco_api_key = EXCLUDED.payco_api_key,
                enabled = EXCLUDED.enabled,
                payment_methods = EXCLUDED.payment_methods,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(&store.store_id)
        .bind(&store.access_token)
        .bind(&store.store_name)
        .bind(&store.payment_provider_id)
        .bind(&store.payco_client_id)
        .bind(&store.payco_api_key)
        .bind(store.enabled)
        .bind(to_json(&store.payment_methods)?)
        .bind(store.installed_at)
        .bind(store.updated_at)
        .fetch_one(&mut *db_tx)
        .await?;

        db_tx.commit().await?;
        saved.into_domain()
    }

    async fn delete(&self, store_id: &str) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM stores WHERE store_id = $1")
            .bind(store_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(store_id.to_string()));
        }
        Ok(())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> RepositoryResult<Value> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Storage(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> RepositoryResult<T> {
    serde_json::from_value(value).map_err(|e| RepositoryError::Storage(e.to_string()))
}

/// Internal row type for sqlx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    transaction_id: String,
    platform_transaction_id: Option<String>,
    store_id: String,
    order_id: String,
    amount_cents: i64,
    currency: String,
    payment_method: String,
    status: String,
    customer: Value,
    card: Option<Value>,
    installments: i32,
    events: Value,
    processor_response: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            transaction_id: self.transaction_id,
            platform_transaction_id: self.platform_transaction_id,
            store_id: self.store_id,
            order_id: self.order_id,
            amount_cents: self.amount_cents,
            currency: self.currency,
            payment_method: self
                .payment_method
                .parse()
                .map_err(RepositoryError::Storage)?,
            status: PaymentStatus::parse(&self.status),
            customer: from_json(self.customer)?,
            card: self.card.map(from_json).transpose()?,
            installments: self.installments,
            events: from_json(self.events)?,
            processor_response: self.processor_response.unwrap_or(Value::Null),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    store_id: String,
    access_token: String,
    store_name: Option<String>,
    payment_provider_id: Option<String>,
    payco_client_id: Option<String>,
    payco_api_key: Option<String>,
    enabled: bool,
    payment_methods: Value,
    installed_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoreRow {
    fn into_domain(self) -> RepositoryResult<StoreConfig> {
        Ok(StoreConfig {
            store_id: self.store_id,
            access_token: self.access_token,
            store_name: self.store_name,
            payment_provider_id: self.payment_provider_id,
            payco_client_id: self.payco_client_id,
            payco_api_key: self.payco_api_key,
            enabled: self.enabled,
            payment_methods: from_json(self.payment_methods)?,
            installed_at: self.installed_at,
            updated_at: self.updated_at,
        })
    }
}
