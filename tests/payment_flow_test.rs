//! End-to-end flows through the HTTP surface, backed by the in-memory
//! repositories and a mocked processor/platform.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use payco_gateway::adapters::{InMemoryStoreRepository, InMemoryTransactionRepository};
use payco_gateway::config::Config;
use payco_gateway::domain::{
    CreditCardSettings, MethodSettings, PaymentMethods, StoreConfig,
};
use payco_gateway::ports::TransactionRepository;
use payco_gateway::{build_state, create_app};

fn test_config(server_url: &str) -> Config {
    Config {
        server_port: 0,
        database_url: "postgres://unused/test".to_string(),
        payco_api_url: server_url.to_string(),
        payco_sso_url: format!("{server_url}/token"),
        payco_webhook_secret: None,
        nuvemshop_api_url: server_url.to_string(),
        cors_allowed_origins: None,
        environment: "test".to_string(),
    }
}

async fn seeded_app(
    server: &mockito::ServerGuard,
) -> (Router, Arc<InMemoryTransactionRepository>) {
    let stores = Arc::new(InMemoryStoreRepository::new());
    let mut store = StoreConfig::new("S1".to_string(), "tok-s1".to_string());
    store.enabled = true;
    store.store_name = Some("Loja Teste".to_string());
    store.payco_client_id = Some("client-a".to_string());
    store.payco_api_key = Some("secret".to_string());
    store.payment_methods = PaymentMethods {
        credit_card: CreditCardSettings {
            enabled: true,
            max_installments: 12,
        },
        debit_card: MethodSettings { enabled: false },
        pix: MethodSettings { enabled: true },
        boleto: MethodSettings { enabled: true },
    };
    stores.seed(store).await;

    let transactions = Arc::new(InMemoryTransactionRepository::new());
    let state = build_state(
        test_config(&server.url()),
        stores,
        transactions.clone(),
        None,
    );
    (create_app(state), transactions)
}

async fn mock_token(server: &mut mockito::ServerGuard) {
    server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(json!({"access_token": "tok", "expires_in": 3600}).to_string())
        .create_async()
        .await;
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let parsed = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, parsed)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let parsed = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, parsed)
}

fn pix_request() -> Value {
    json!({
        "store_id": "S1",
        "order_id": "O1",
        "amount": 2500,
        "payment_method": "pix",
        "customer": {
            "name": "Maria Souza",
            "email": "maria@example.com",
            "document": "12345678901"
        }
    })
}

#[tokio::test]
async fn pix_payment_settles_through_webhook() {
    let mut server = mockito::Server::new_async().await;
    mock_token(&mut server).await;
    server
        .mock("POST", "/payments/pix")
        .with_status(200)
        .with_body(
            json!({
                "id": "P1",
                "status": "waiting_payment",
                "qr_code_image": "data:image/png;base64,abc",
                "qr_code": "00020126pix"
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("POST", "/S1/orders/O1/transactions")
        .with_status(201)
        .with_body(json!({"id": 777}).to_string())
        .create_async()
        .await;
    // status mirror after the webhook
    server
        .mock("POST", "/S1/orders/O1/transactions/777/events")
        .with_status(201)
        .with_body("{}")
        .create_async()
        .await;

    let (app, transactions) = seeded_app(&server).await;

    let (status, body) = post_json(&app, "/payments/process", pix_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["transaction_id"], "P1");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["pix_qr_code"], "data:image/png;base64,abc");
    assert_eq!(body["pix_code"], "00020126pix");

    let (status, body) = post_json(
        &app,
        "/webhooks/payco",
        json!({"transaction_id": "P1", "event": "payment.paid"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paid");

    let (status, body) = get_json(&app, "/payments/status/P1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paid");
    assert_eq!(body["events"].as_array().unwrap().len(), 2);
    assert_eq!(body["platform_transaction_id"], "777");
    // PII stays out of the status endpoint
    assert!(body.get("customer").is_none());

    let stored = transactions
        .find_by_transaction_id("P1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.amount_cents, 2500);
}

#[tokio::test]
async fn card_payment_then_refund() {
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
    server
        .mock("POST", "/S1/orders/O1/transactions")
        .with_status(201)
        .with_body(json!({"id": 888}).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/payments/T1/refund")
        .with_status(200)
        .with_body(json!({"refund_id": "R1"}).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/S1/orders/O1/transactions/888/events")
        .with_status(201)
        .with_body("{}")
        .create_async()
        .await;
    let status_probe = server
        .mock("GET", "/payments/T1")
        .expect(0)
        .create_async()
        .await;

    let (app, _transactions) = seeded_app(&server).await;

    let (status, body) = post_json(
        &app,
        "/payments/process",
        json!({
            "store_id": "S1",
            "order_id": "O1",
            "amount": 10050,
            "payment_method": "credit_card",
            "installments": 3,
            "card_data": {
                "number": "4111111111111111",
                "holder_name": "Maria Souza",
                "expiration": "12/30",
                "cvv": "123"
            },
            "customer": {
                "name": "Maria Souza",
                "email": "maria@example.com",
                "document": "12345678901"
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "authorized");
    assert_eq!(body["authorization_code"], "A1");
    assert!(body.get("pix_qr_code").is_none());

    // settled card payments report paid without asking the processor
    let (status, body) = get_json(&app, "/payments/check/T1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paid"], true);
    status_probe.assert_async().await;

    let (status, body) = post_json(&app, "/payments/refund/T1", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["refund_id"], "R1");

    let (status, body) = post_json(&app, "/payments/refund/T1", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "already_refunded");
}

#[tokio::test]
async fn declined_payment_returns_processor_code() {
    let mut server = mockito::Server::new_async().await;
    mock_token(&mut server).await;
    server
        .mock("POST", "/payments/pix")
        .with_status(402)
        .with_body(json!({"message": "limit exceeded", "code": "limit_exceeded"}).to_string())
        .create_async()
        .await;

    let (app, transactions) = seeded_app(&server).await;
    let (status, body) = post_json(&app, "/payments/process", pix_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "limit_exceeded");
    assert_eq!(body["error"], "payment declined: limit exceeded");

    assert!(transactions
        .find_by_store_and_order("S1", "O1")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unknown_store_yields_the_error_envelope() {
    let server = mockito::Server::new_async().await;
    let (app, _) = seeded_app(&server).await;

    let mut request = pix_request();
    request["store_id"] = json!("S404");
    let (status, body) = post_json(&app, "/payments/process", request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "store_not_found");
}

#[tokio::test]
async fn unknown_transaction_is_not_found() {
    let server = mockito::Server::new_async().await;
    let (app, _) = seeded_app(&server).await;

    let (status, body) = get_json(&app, "/payments/status/NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "transaction_not_found");
}

#[tokio::test]
async fn order_cancelled_webhook_cancels_open_transactions() {
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

    let (app, _) = seeded_app(&server).await;
    let (status, _) = post_json(&app, "/payments/process", pix_request()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &app,
        "/webhooks/nuvemshop",
        json!({"event": "order/cancelled", "store_id": "S1", "id": "O1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], 1);

    let (_, body) = get_json(&app, "/payments/status/P1").await;
    assert_eq!(body["status"], "cancelled");
}

#[tokio::test]
async fn store_settings_round_trip_redacts_credentials() {
    let server = mockito::Server::new_async().await;
    let (app, _) = seeded_app(&server).await;

    let (status, body) = get_json(&app, "/stores/S1/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store_id"], "S1");
    assert_eq!(body["has_credentials"], true);
    assert!(body.get("payco_api_key").is_none());
    assert!(body.get("access_token").is_none());

    let response = app
        .clone()
        .oneshot(
            Request::put("/stores/S1/settings")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"enabled": false, "store_name": "Loja Nova"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["enabled"], false);
    assert_eq!(body["store_name"], "Loja Nova");

    let (status, body) = get_json(&app, "/stores/S404/settings").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "store_not_found");
}

#[tokio::test]
async fn health_reports_ok_without_a_database() {
    let server = mockito::Server::new_async().await;
    let (app, _) = seeded_app(&server).await;

    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
