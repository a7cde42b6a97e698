//! OAuth client-credentials token cache for the payment processor.
//!
//! Tokens are cached per client id and refreshed shortly before expiry.
//! Concurrent requests for the same client id share a single fetch
//! instead of stampeding the SSO endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Refresh this far before the token actually expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("token request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }
}

pub struct TokenCache {
    sso_url: String,
    http: reqwest::Client,
    // One slot per client id. Holding the slot's lock across the fetch
    // gives single-flight refresh per credential pair.
    entries: Mutex<HashMap<String, Arc<Mutex<Option<CachedToken>>>>>,
}

impl TokenCache {
    pub fn new(sso_url: String, http: reqwest::Client) -> Self {
        Self {
            sso_url,
            http,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a valid bearer token for the given credentials, fetching
    /// a new one when the cached token is missing or close to expiry.
    pub async fn token(&self, client_id: &str, client_secret: &str) -> Result<String, AuthError> {
        let slot = {
            let mut entries = self.entries.lock().await;
            entries
                .entry(client_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .clone()
        };

        let mut cached = slot.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.token.clone());
        }

        let fetched = self.fetch(client_id, client_secret).await?;
        tracing::debug!(client_id, "fetched new processor access token");
        let token = fetched.token.clone();
        *cached = Some(fetched);
        Ok(token)
    }

    async fn fetch(&self, client_id: &str, client_secret: &str) -> Result<CachedToken, AuthError> {
        let response = self
            .http
            .post(&self.sso_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = response.json().await?;
        Ok(CachedToken {
            token: parsed.access_token,
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in),
        })
    }
}
