//! Payment orchestration: validates the checkout request, dispatches to
//! the processor, persists the transaction, and mirrors it onto the
//! commerce platform.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::{
    format_major_units, validate_card, CardData, CardSnapshot, Customer, PaymentMethod,
    PaymentStatus, StoreConfig, Transaction,
};
use crate::error::GatewayError;
use crate::nuvemshop::PlatformTransaction;
use crate::payco::{
    CardPaymentRequest, MethodDetails, PaycoClient, PaymentOutcome, TokenCache,
};
use crate::ports::{StoreRepository, TransactionRepository};

/// Checkout payment request body.
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub store_id: String,
    pub order_id: String,
    /// Integer minor units (centavos).
    pub amount: i64,
    pub currency: Option<String>,
    pub payment_method: PaymentMethod,
    pub card_data: Option<CardData>,
    pub customer: CustomerInput,
    pub installments: Option<i32>,
}

/// Customer fields as they arrive from the checkout form. All optional
/// at the wire level; validation decides what is actually required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomerInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub document: Option<String>,
    pub phone: Option<String>,
}

impl CustomerInput {
    /// Identification is required for every method; payments are not
    /// created against placeholder customers.
    fn validate(self) -> Result<Customer, GatewayError> {
        let required = |field: Option<String>, name: &str| {
            field
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| GatewayError::InvalidInput(format!("customer {name} is required")))
        };
        Ok(Customer {
            name: required(self.name, "name")?,
            email: required(self.email, "email")?,
            document: required(self.document, "document")?,
            phone: self.phone.filter(|v| !v.trim().is_empty()),
        })
    }
}

/// Successful payment response. Method-specific artifacts are present
/// only for the method that produced them.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub transaction_id: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boleto_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Where the checkout should send the payer next, when the method
    /// has a follow-up page (boleto document).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

pub struct PaymentService {
    stores: Arc<dyn StoreRepository>,
    transactions: Arc<dyn TransactionRepository>,
    http: reqwest::Client,
    auth: Arc<TokenCache>,
    payco_api_url: String,
    nuvemshop_api_url: String,
}

impl PaymentService {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        transactions: Arc<dyn TransactionRepository>,
        http: reqwest::Client,
        auth: Arc<TokenCache>,
        payco_api_url: String,
        nuvemshop_api_url: String,
    ) -> Self {
        Self {
            stores,
            transactions,
            http,
            auth,
            payco_api_url,
            nuvemshop_api_url,
        }
    }

    pub async fn process(&self, request: ProcessRequest) -> Result<ProcessResponse, GatewayError> {
        let customer = request.customer.clone().validate()?;

        let store = self
            .stores
            .get(&request.store_id)
            .await?
            .ok_or(GatewayError::StoreNotFound)?;
        self.check_gates(&store, request.payment_method)?;

        if request.amount <= 0 {
            return Err(GatewayError::InvalidInput(
                "amount must be a positive number of cents".to_string(),
            ));
        }

        let installments = request.installments.unwrap_or(1);
        if request.payment_method == PaymentMethod::CreditCard {
            let ceiling = store.payment_methods.credit_card.max_installments;
            if installments < 1 || installments > ceiling {
                return Err(GatewayError::InvalidInput(format!(
                    "installments must be between 1 and {ceiling}"
                )));
            }
        }

        let card = if request.payment_method.is_card() {
            let card = request.card_data.clone().ok_or_else(|| {
                GatewayError::InvalidCardData("card data is required".to_string())
            })?;
            validate_card(&card).map_err(|msg| GatewayError::InvalidCardData(msg.to_string()))?;
            Some(card)
        } else {
            None
        };

        let currency = request.currency.clone().unwrap_or_else(|| "BRL".to_string());
        let description = format!("Order {} - {}", request.order_id, store.display_name());
        let processor = super::processor_client(
            &self.http,
            &self.payco_api_url,
            self.auth.clone(),
            &store,
        )?;

        let outcome = self
            .dispatch(
                &processor,
                &request,
                card.as_ref(),
                &customer,
                &currency,
                installments,
                &description,
            )
            .await;

        let approved = match outcome {
            PaymentOutcome::Approved(approved) => approved,
            PaymentOutcome::Declined(declined) => {
                tracing::info!(
                    store_id = %request.store_id,
                    order_id = %request.order_id,
                    code = %declined.code,
                    "payment declined"
                );
                return Err(GatewayError::Declined {
                    error: declined.error,
                    code: declined.code,
                });
            }
        };

        let transaction = Transaction::new(
            approved.transaction_id.clone(),
            request.store_id.clone(),
            request.order_id.clone(),
            request.amount,
            currency,
            request.payment_method,
            approved.status.clone(),
            customer,
            card.as_ref().map(CardSnapshot::from_card),
            installments,
            approved.raw.clone(),
            json!({"source": "checkout", "message": "payment created"}),
        );
        let stored = self.transactions.insert(&transaction).await?;

        tracing::info!(
            transaction_id = %stored.transaction_id,
            store_id = %stored.store_id,
            order_id = %stored.order_id,
            method = %stored.payment_method,
            status = %stored.status,
            "payment created"
        );

        self.mirror(&store, &stored).await;

        Ok(build_response(stored.transaction_id, stored.status, approved.details))
    }

    fn check_gates(
        &self,
        store: &StoreConfig,
        method: PaymentMethod,
    ) -> Result<(), GatewayError> {
        if !store.enabled {
            return Err(GatewayError::GatewayDisabled(
                "payments are disabled for this store".to_string(),
            ));
        }
        if !store.payment_methods.supports(method) {
            return Err(GatewayError::GatewayDisabled(format!(
                "{method} is not enabled for this store"
            )));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        processor: &PaycoClient,
        request: &ProcessRequest,
        card: Option<&CardData>,
        customer: &Customer,
        currency: &str,
        installments: i32,
        description: &str,
    ) -> PaymentOutcome {
        match request.payment_method {
            PaymentMethod::CreditCard | PaymentMethod::DebitCard => {
                // gated above, card is present for card methods
                let Some(card) = card else {
                    return PaymentOutcome::Declined(crate::payco::DeclinedPayment {
                        error: "card data is required".to_string(),
                        code: "invalid_card_data".to_string(),
                        raw: serde_json::Value::Null,
                    });
                };
                let card_request = CardPaymentRequest {
                    amount_cents: request.amount,
                    currency,
                    card,
                    customer,
                    installments,
                    order_id: &request.order_id,
                    description,
                };
                if request.payment_method == PaymentMethod::CreditCard {
                    processor.create_credit_card_payment(&card_request).await
                } else {
                    processor.create_debit_card_payment(&card_request).await
                }
            }
            PaymentMethod::Pix => {
                processor
                    .create_pix_payment(
                        request.amount,
                        currency,
                        customer,
                        &request.order_id,
                        description,
                    )
                    .await
            }
            PaymentMethod::Boleto => {
                processor
                    .create_boleto_payment(
                        request.amount,
                        currency,
                        customer,
                        &request.order_id,
                        description,
                    )
                    .await
            }
        }
    }

    /// Mirrors the new transaction onto the platform order. Best effort:
    /// the payment already succeeded, so mirror failures are logged and
    /// reconciled later rather than surfaced to the payer.
    async fn mirror(&self, store: &StoreConfig, transaction: &Transaction) {
        let platform = super::platform_client(&self.http, &self.nuvemshop_api_url, store);
        let payload = PlatformTransaction {
            order_id: &transaction.order_id,
            amount: format_major_units(transaction.amount_cents),
            currency: &transaction.currency,
            status: transaction.status.as_str(),
            payment_method_id: format!("payco_{}", transaction.payment_method),
            external_id: &transaction.transaction_id,
        };

        match platform.create_transaction(&payload).await {
            Ok(platform_id) if !platform_id.is_empty() => {
                if let Err(err) = self
                    .transactions
                    .link_platform_transaction(&transaction.transaction_id, &platform_id)
                    .await
                {
                    tracing::warn!(
                        transaction_id = %transaction.transaction_id,
                        error = %err,
                        "failed to link platform transaction id"
                    );
                }
            }
            Ok(_) => {
                tracing::warn!(
                    transaction_id = %transaction.transaction_id,
                    "platform mirror returned no transaction id"
                );
            }
            Err(err) => {
                tracing::warn!(
                    transaction_id = %transaction.transaction_id,
                    order_id = %transaction.order_id,
                    error = %err,
                    "failed to mirror transaction onto the platform"
                );
            }
        }
    }
}

fn build_response(
    transaction_id: String,
    status: PaymentStatus,
    details: MethodDetails,
) -> ProcessResponse {
    let mut response = ProcessResponse {
        success: true,
        transaction_id,
        status,
        authorization_code: None,
        pix_qr_code: None,
        pix_code: None,
        expires_at: None,
        boleto_url: None,
        barcode: None,
        due_date: None,
        redirect_url: None,
    };
    match details {
        MethodDetails::Card { authorization_code } => {
            response.authorization_code = authorization_code;
        }
        MethodDetails::Pix {
            qr_image,
            qr_code,
            expires_at,
        } => {
            response.pix_qr_code = qr_image;
            response.pix_code = qr_code;
            response.expires_at = expires_at;
        }
        MethodDetails::Boleto {
            document_url,
            barcode,
            due_date,
        } => {
            response.redirect_url = document_url.clone();
            response.boleto_url = document_url;
            response.barcode = barcode;
            response.due_date = due_date;
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryStoreRepository, InMemoryTransactionRepository};
    use crate::domain::{CreditCardSettings, MethodSettings, PaymentMethods, StoreConfig};
    use serde_json::json;

    async fn seeded_stores() -> Arc<InMemoryStoreRepository> {
        let stores = Arc::new(InMemoryStoreRepository::new());
        let mut store = StoreConfig::new("S1".to_string(), "tok-s1".to_string());
        store.enabled = true;
        store.payco_client_id = Some("client-a".to_string());
        store.payco_api_key = Some("secret".to_string());
        store.store_name = Some("Loja Teste".to_string());
        store.payment_methods = PaymentMethods {
            credit_card: CreditCardSettings {
                enabled: true,
                max_installments: 6,
            },
            debit_card: MethodSettings { enabled: false },
            pix: MethodSettings { enabled: true },
            boleto: MethodSettings { enabled: true },
        };
        stores.seed(store).await;
        stores
    }

    fn service(
        server: &mockito::ServerGuard,
        stores: Arc<InMemoryStoreRepository>,
        transactions: Arc<InMemoryTransactionRepository>,
    ) -> PaymentService {
        let http = reqwest::Client::new();
        let auth = Arc::new(TokenCache::new(
            format!("{}/token", server.url()),
            http.clone(),
        ));
        PaymentService::new(
            stores,
            transactions,
            http,
            auth,
            server.url(),
            server.url(),
        )
    }

    async fn mock_token(server: &mut mockito::ServerGuard) {
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(
                json!({"access_token": "tok", "expires_in": 3600}).to_string(),
            )
            .create_async()
            .await;
    }

    fn card_request(installments: Option<i32>) -> ProcessRequest {
        ProcessRequest {
            store_id: "S1".to_string(),
            order_id: "O1".to_string(),
            amount: 10050,
            currency: None,
            payment_method: PaymentMethod::CreditCard,
            card_data: Some(CardData {
                number: "4111111111111111".to_string(),
                holder_name: "Maria Souza".to_string(),
                expiration: "12/30".to_string(),
                cvv: "123".to_string(),
            }),
            customer: CustomerInput {
                name: Some("Maria Souza".to_string()),
                email: Some("maria@example.com".to_string()),
                document: Some("12345678901".to_string()),
                phone: None,
            },
            installments,
        }
    }

    #[tokio::test]
    async fn card_success_persists_one_transaction_with_one_event() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("POST", "/payments/credit-card")
            .with_status(200)
            .with_body(
                json!({"id": "T1", "status": "approved", "authorization_code": "A1"}).to_string(),
            )
            .create_async()
            .await;
        // platform mirror
        server
            .mock("POST", "/S1/orders/O1/transactions")
            .with_status(201)
            .with_body(json!({"id": 777}).to_string())
            .create_async()
            .await;

        let stores = seeded_stores().await;
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let service = service(&server, stores, transactions.clone());

        let response = service.process(card_request(Some(3))).await.unwrap();
        assert!(response.success);
        assert_eq!(response.transaction_id, "T1");
        assert_eq!(response.status, PaymentStatus::Authorized);
        assert_eq!(response.authorization_code.as_deref(), Some("A1"));

        let stored = transactions
            .find_by_transaction_id("T1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.events.len(), 1);
        assert_eq!(stored.installments, 3);
        assert_eq!(stored.platform_transaction_id.as_deref(), Some("777"));
        let snapshot = stored.card.unwrap();
        assert_eq!(snapshot.last_four, "1111");
    }

    #[tokio::test]
    async fn mirror_failure_does_not_fail_the_payment() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("POST", "/payments/pix")
            .with_status(200)
            .with_body(json!({"id": "P1", "status": "pending"}).to_string())
            .create_async()
            .await;
        server
            .mock("POST", "/S1/orders/O1/transactions")
            .with_status(500)
            .create_async()
            .await;

        let stores = seeded_stores().await;
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let service = service(&server, stores, transactions.clone());

        let mut request = card_request(None);
        request.payment_method = PaymentMethod::Pix;
        request.card_data = None;

        let response = service.process(request).await.unwrap();
        assert!(response.success);

        let stored = transactions
            .find_by_transaction_id("P1")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.platform_transaction_id.is_none());
        assert_eq!(stored.events.len(), 1);
    }

    #[tokio::test]
    async fn decline_creates_no_transaction() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("POST", "/payments/credit-card")
            .with_status(402)
            .with_body(
                json!({"message": "insufficient funds", "code": "card_declined"}).to_string(),
            )
            .create_async()
            .await;

        let stores = seeded_stores().await;
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let service = service(&server, stores, transactions.clone());

        let err = service.process(card_request(None)).await.unwrap_err();
        match err {
            GatewayError::Declined { code, .. } => assert_eq!(code, "card_declined"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(transactions
            .find_by_store_and_order("S1", "O1")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn invalid_card_never_reaches_the_processor() {
        let mut server = mockito::Server::new_async().await;
        let processor = server
            .mock("POST", "/payments/credit-card")
            .expect(0)
            .create_async()
            .await;

        let stores = seeded_stores().await;
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let service = service(&server, stores, transactions);

        let mut request = card_request(None);
        request.card_data = Some(CardData {
            number: "411111".to_string(),
            holder_name: "Maria Souza".to_string(),
            expiration: "12/30".to_string(),
            cvv: "123".to_string(),
        });
        let err = service.process(request).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidCardData(_)));
        processor.assert_async().await;
    }

    #[tokio::test]
    async fn blank_customer_is_rejected() {
        let server = mockito::Server::new_async().await;
        let stores = seeded_stores().await;
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let service = service(&server, stores, transactions);

        let mut request = card_request(None);
        request.customer = CustomerInput {
            name: Some("  ".to_string()),
            email: Some("maria@example.com".to_string()),
            document: Some("12345678901".to_string()),
            phone: None,
        };
        let err = service.process(request).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn disabled_method_is_rejected() {
        let server = mockito::Server::new_async().await;
        let stores = seeded_stores().await;
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let service = service(&server, stores, transactions);

        let mut request = card_request(None);
        request.payment_method = PaymentMethod::DebitCard;
        let err = service.process(request).await.unwrap_err();
        assert!(matches!(err, GatewayError::GatewayDisabled(_)));
    }

    #[tokio::test]
    async fn missing_credentials_read_as_disabled_gateway() {
        let server = mockito::Server::new_async().await;
        let stores = Arc::new(InMemoryStoreRepository::new());
        let mut store = StoreConfig::new("S1".to_string(), "tok".to_string());
        store.enabled = true;
        store.payment_methods.pix = MethodSettings { enabled: true };
        stores.seed(store).await;
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let service = service(&server, stores, transactions);

        let mut request = card_request(None);
        request.payment_method = PaymentMethod::Pix;
        request.card_data = None;
        let err = service.process(request).await.unwrap_err();
        assert!(matches!(err, GatewayError::GatewayDisabled(_)));
    }

    #[tokio::test]
    async fn unknown_store_is_not_found() {
        let server = mockito::Server::new_async().await;
        let stores = Arc::new(InMemoryStoreRepository::new());
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let service = service(&server, stores, transactions);

        let err = service.process(card_request(None)).await.unwrap_err();
        assert!(matches!(err, GatewayError::StoreNotFound));
    }

    #[tokio::test]
    async fn installments_over_store_ceiling_rejected() {
        let server = mockito::Server::new_async().await;
        let stores = seeded_stores().await;
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let service = service(&server, stores, transactions);

        let err = service.process(card_request(Some(12))).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }
}
