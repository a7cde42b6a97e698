//! Merchant settings endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::domain::{PaymentMethods, StoreConfig, StoreUpdate};
use crate::error::GatewayError;
use crate::AppState;

/// Settings view returned to the merchant panel. Processor credentials
/// and the platform access token never leave the gateway; only their
/// presence is reported.
#[derive(Debug, Serialize)]
pub struct StoreSettings {
    pub store_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    pub enabled: bool,
    pub has_credentials: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_provider_id: Option<String>,
    pub payment_methods: PaymentMethods,
}

impl From<StoreConfig> for StoreSettings {
    fn from(store: StoreConfig) -> Self {
        let has_credentials = matches!(
            (&store.payco_client_id, &store.payco_api_key),
            (Some(id), Some(key)) if !id.is_empty() && !key.is_empty()
        );
        Self {
            store_id: store.store_id,
            store_name: store.store_name,
            enabled: store.enabled,
            has_credentials,
            payment_provider_id: store.payment_provider_id,
            payment_methods: store.payment_methods,
        }
    }
}

pub async fn get_settings(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Result<Json<StoreSettings>, GatewayError> {
    let store = state
        .stores
        .get(&store_id)
        .await?
        .ok_or(GatewayError::StoreNotFound)?;
    Ok(Json(store.into()))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Json(update): Json<StoreUpdate>,
) -> Result<Json<StoreSettings>, GatewayError> {
    let store = state.stores.upsert(&store_id, update).await?;
    let store = sync_payment_provider(&state, store).await;
    Ok(Json(store.into()))
}

/// Keeps the platform's payment-provider registration in step with the
/// enabled method set. Best effort: settings are already saved, a
/// platform hiccup only delays the registration.
async fn sync_payment_provider(state: &AppState, store: StoreConfig) -> StoreConfig {
    if store.access_token.is_empty() {
        return store;
    }

    let methods: Vec<&str> = store
        .payment_methods
        .enabled_methods()
        .into_iter()
        .map(|m| m.as_str())
        .collect();
    let platform = crate::nuvemshop::NuvemshopClient::new(
        state.http.clone(),
        &state.config.nuvemshop_api_url,
        store.access_token.clone(),
        &store.store_id,
    );

    match store.payment_provider_id.as_deref() {
        Some(provider_id) => {
            if let Err(err) = platform.update_payment_provider(provider_id, &methods).await {
                tracing::warn!(
                    store_id = %store.store_id,
                    error = %err,
                    "failed to update platform payment provider"
                );
            }
            store
        }
        None => match platform.create_payment_provider("Payco", &methods).await {
            Ok(provider_id) if !provider_id.is_empty() => {
                let link = StoreUpdate {
                    payment_provider_id: Some(provider_id),
                    ..Default::default()
                };
                match state.stores.upsert(&store.store_id, link).await {
                    Ok(updated) => updated,
                    Err(err) => {
                        tracing::warn!(
                            store_id = %store.store_id,
                            error = %err,
                            "failed to save platform provider id"
                        );
                        store
                    }
                }
            }
            Ok(_) => store,
            Err(err) => {
                tracing::warn!(
                    store_id = %store.store_id,
                    error = %err,
                    "failed to register platform payment provider"
                );
                store
            }
        },
    }
}
