//! HTTP client for the Nuvemshop commerce platform, scoped to a single
//! store's access token.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

const USER_AGENT: &str = concat!("payco-gateway/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum NuvemshopError {
    #[error("platform request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("platform rejected request with status {status}: {body}")]
    Api { status: u16, body: String },
}

/// Transaction mirror payload. Amounts are decimal-major strings, which
/// is what the platform API expects.
#[derive(Debug, Serialize)]
pub struct PlatformTransaction<'a> {
    pub order_id: &'a str,
    pub amount: String,
    pub currency: &'a str,
    pub status: &'a str,
    pub payment_method_id: String,
    /// Processor transaction id, for cross-referencing.
    pub external_id: &'a str,
}

#[derive(Clone)]
pub struct NuvemshopClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl NuvemshopClient {
    pub fn new(
        http: reqwest::Client,
        api_base: &str,
        access_token: String,
        store_id: &str,
    ) -> Self {
        Self {
            http,
            base_url: format!("{api_base}/{store_id}"),
            access_token,
        }
    }

    /// Mirrors a gateway transaction onto the platform order. Returns the
    /// platform-issued transaction id.
    pub async fn create_transaction(
        &self,
        transaction: &PlatformTransaction<'_>,
    ) -> Result<String, NuvemshopError> {
        let raw = self
            .post(
                &format!("/orders/{}/transactions", transaction.order_id),
                transaction,
            )
            .await?;
        Ok(id_from(&raw))
    }

    /// Appends a status event to a previously mirrored transaction.
    pub async fn create_transaction_event(
        &self,
        order_id: &str,
        platform_transaction_id: &str,
        status: &str,
        amount: &str,
    ) -> Result<(), NuvemshopError> {
        self.post(
            &format!("/orders/{order_id}/transactions/{platform_transaction_id}/events"),
            &json!({ "status": status, "amount": amount }),
        )
        .await?;
        Ok(())
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Value, NuvemshopError> {
        self.get(&format!("/orders/{order_id}")).await
    }

    pub async fn get_store_info(&self) -> Result<Value, NuvemshopError> {
        self.get("/store").await
    }

    /// Registers this gateway as a payment provider for the store.
    /// Returns the provider registration id.
    pub async fn create_payment_provider(
        &self,
        name: &str,
        enabled_methods: &[&str],
    ) -> Result<String, NuvemshopError> {
        let raw = self
            .post(
                "/payment_providers",
                &json!({
                    "name": name,
                    "supported_payment_methods": enabled_methods,
                }),
            )
            .await?;
        Ok(id_from(&raw))
    }

    pub async fn update_payment_provider(
        &self,
        provider_id: &str,
        enabled_methods: &[&str],
    ) -> Result<(), NuvemshopError> {
        let url = format!("{}/payment_providers/{provider_id}", self.base_url);
        let response = self
            .http
            .put(&url)
            .header("Authentication", format!("bearer {}", self.access_token))
            .header("User-Agent", USER_AGENT)
            .json(&json!({ "supported_payment_methods": enabled_methods }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Value, NuvemshopError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header("Authentication", format!("bearer {}", self.access_token))
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn post<T: Serialize>(&self, path: &str, payload: &T) -> Result<Value, NuvemshopError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("Authentication", format!("bearer {}", self.access_token))
            .header("User-Agent", USER_AGENT)
            .json(payload)
            .send()
            .await?;
        Ok(check(response).await?.json().await.unwrap_or(Value::Null))
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, NuvemshopError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(NuvemshopError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Platform ids arrive as numbers or strings depending on the endpoint.
fn id_from(raw: &Value) -> String {
    match raw.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
