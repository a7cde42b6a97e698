//! Store (merchant) configuration domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::transaction::PaymentMethod;

/// Per-method toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSettings {
    pub enabled: bool,
}

/// Credit card carries an installment ceiling on top of the toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCardSettings {
    pub enabled: bool,
    pub max_installments: i32,
}

impl Default for CreditCardSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_installments: 12,
        }
    }
}

/// Enabled payment methods and their settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentMethods {
    pub credit_card: CreditCardSettings,
    pub debit_card: MethodSettings,
    pub pix: MethodSettings,
    pub boleto: MethodSettings,
}

impl PaymentMethods {
    pub fn supports(&self, method: PaymentMethod) -> bool {
        match method {
            PaymentMethod::CreditCard => self.credit_card.enabled,
            PaymentMethod::DebitCard => self.debit_card.enabled,
            PaymentMethod::Pix => self.pix.enabled,
            PaymentMethod::Boleto => self.boleto.enabled,
        }
    }

    /// Enabled method names, used when registering the payment provider
    /// with the commerce platform.
    pub fn enabled_methods(&self) -> Vec<PaymentMethod> {
        [
            (PaymentMethod::CreditCard, self.credit_card.enabled),
            (PaymentMethod::DebitCard, self.debit_card.enabled),
            (PaymentMethod::Pix, self.pix.enabled),
            (PaymentMethod::Boleto, self.boleto.enabled),
        ]
        .into_iter()
        .filter_map(|(m, enabled)| enabled.then_some(m))
        .collect()
    }
}

/// Per-merchant configuration. Created on install, edited incrementally
/// by merchant configuration actions, deleted on uninstall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub store_id: String,
    /// Commerce-platform access token for this store.
    pub access_token: String,
    pub store_name: Option<String>,
    /// Commerce-platform payment provider registration id.
    pub payment_provider_id: Option<String>,
    /// Processor OAuth client id. Processing requires both credentials.
    pub payco_client_id: Option<String>,
    /// Processor OAuth client secret.
    pub payco_api_key: Option<String>,
    /// Master gate for payment processing.
    pub enabled: bool,
    pub payment_methods: PaymentMethods,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoreConfig {
    pub fn new(store_id: String, access_token: String) -> Self {
        let now = Utc::now();
        Self {
            store_id,
            access_token,
            store_name: None,
            payment_provider_id: None,
            payco_client_id: None,
            payco_api_key: None,
            enabled: false,
            payment_methods: PaymentMethods::default(),
            installed_at: now,
            updated_at: now,
        }
    }

    pub fn display_name(&self) -> &str {
        self.store_name.as_deref().unwrap_or(&self.store_id)
    }
}

/// Partial update: only supplied fields change, everything else keeps
/// its prior value. Credentials, the enabled flag, and the method set
/// are edited by different merchant actions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreUpdate {
    pub access_token: Option<String>,
    pub store_name: Option<String>,
    pub payment_provider_id: Option<String>,
    pub payco_client_id: Option<String>,
    pub payco_api_key: Option<String>,
    pub enabled: Option<bool>,
    pub payment_methods: Option<PaymentMethods>,
}

impl StoreUpdate {
    pub fn apply(self, store: &mut StoreConfig) {
        if let Some(token) = self.access_token {
            store.access_token = token;
        }
        if let Some(name) = self.store_name {
            store.store_name = Some(name);
        }
        if let Some(provider_id) = self.payment_provider_id {
            store.payment_provider_id = Some(provider_id);
        }
        if let Some(client_id) = self.payco_client_id {
            store.payco_client_id = Some(client_id);
        }
        if let Some(api_key) = self.payco_api_key {
            store.payco_api_key = Some(api_key);
        }
        if let Some(enabled) = self.enabled {
            store.enabled = enabled;
        }
        if let Some(methods) = self.payment_methods {
            store.payment_methods = methods;
        }
        store.updated_at = Utc::now();
    }
}
