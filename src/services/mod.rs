//! Service layer: payment orchestration and status reconciliation.

pub mod orchestrator;
pub mod reconciliation;

pub use orchestrator::{CustomerInput, PaymentService, ProcessRequest, ProcessResponse};
pub use reconciliation::{
    CheckResult, PollOutcome, PollPolicy, ReconciliationService, RefundReceipt, WebhookPayload,
};

use std::sync::Arc;

use crate::domain::StoreConfig;
use crate::error::GatewayError;
use crate::nuvemshop::NuvemshopClient;
use crate::payco::{PaycoClient, PaycoCredentials, TokenCache};

/// Builds a processor client for the store. Processing requires both
/// halves of the credential pair; anything less reads as a disabled
/// gateway rather than a server fault.
fn processor_client(
    http: &reqwest::Client,
    api_url: &str,
    auth: Arc<TokenCache>,
    store: &StoreConfig,
) -> Result<PaycoClient, GatewayError> {
    let credentials = match (&store.payco_client_id, &store.payco_api_key) {
        (Some(client_id), Some(api_key)) if !client_id.is_empty() && !api_key.is_empty() => {
            PaycoCredentials {
                client_id: client_id.clone(),
                api_key: api_key.clone(),
            }
        }
        _ => {
            return Err(GatewayError::GatewayDisabled(
                "store has no processor credentials configured".to_string(),
            ))
        }
    };
    Ok(PaycoClient::new(
        http.clone(),
        api_url.to_string(),
        auth,
        credentials,
    ))
}

fn platform_client(http: &reqwest::Client, api_url: &str, store: &StoreConfig) -> NuvemshopClient {
    NuvemshopClient::new(
        http.clone(),
        api_url,
        store.access_token.clone(),
        &store.store_id,
    )
}
