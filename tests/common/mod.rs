#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde_json::{json, Value};

use unitedpay_gateway::adapters::{MemoryOrderStore, MemoryPendingStore, MemoryStorefront};
use unitedpay_gateway::config::Config;
use unitedpay_gateway::domain::{Customer, Order, OrderId, PaymentInit};
use unitedpay_gateway::gateway::PaymentClient;
use unitedpay_gateway::logging::MemorySink;
use unitedpay_gateway::ports::OrderStore;
use unitedpay_gateway::{create_app, AppState, Collaborators};

pub const ORDER_KEY: &str = "wc_order_abc";
pub const CHECKOUT_URL: &str = "https://shop.example/checkout";
pub const CONFIRMATION_URL: &str = "https://shop.example/checkout/order-received";

pub struct TestApp {
    pub router: Router,
    pub orders: Arc<MemoryOrderStore>,
    pub pending: Arc<MemoryPendingStore>,
    pub storefront: Arc<MemoryStorefront>,
    pub sink: Arc<MemorySink>,
}

pub fn config(test_mode: bool, extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("PUBLIC_BASE_URL", "http://localhost:3000"),
        ("GATEWAY_DEALER_CODE", "1730"),
        ("GATEWAY_USERNAME", "api-user"),
        ("GATEWAY_PASSWORD", "api-pass"),
        ("GATEWAY_TEST_MODE", if test_mode { "true" } else { "false" }),
        ("CHECKOUT_URL", CHECKOUT_URL),
        ("CONFIRMATION_URL", CONFIRMATION_URL),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn spawn_app(config: Config) -> TestApp {
    spawn_app_with_client(config, None)
}

pub fn spawn_app_with_client(config: Config, client: Option<Arc<dyn PaymentClient>>) -> TestApp {
    let orders = Arc::new(MemoryOrderStore::new());
    let pending = Arc::new(MemoryPendingStore::new());
    let storefront = Arc::new(MemoryStorefront::new(config.storefront.clone()));
    let sink = Arc::new(MemorySink::default());

    let state = AppState::new(
        config,
        Collaborators {
            orders: orders.clone(),
            pending: pending.clone(),
            storefront: storefront.clone(),
            sink: sink.clone(),
            client,
            db: None,
        },
    );

    TestApp {
        router: create_app(state),
        orders,
        pending,
        storefront,
        sink,
    }
}

pub fn customer() -> Customer {
    Customer {
        customer_id: None,
        first_name: "Nino".to_string(),
        last_name: "Beridze".to_string(),
        email: "nino@example.com".to_string(),
        address_1: "1 Rustaveli Ave".to_string(),
        address_2: String::new(),
    }
}

pub async fn seed_order(app: &TestApp, id: OrderId, total: i64) -> Order {
    let order = Order::new(
        id,
        ORDER_KEY.to_string(),
        BigDecimal::from(total),
        "GEL".to_string(),
        customer(),
    );
    app.orders.insert(&order).await.unwrap();
    order
}

/// Seeds an order that already went through payment creation.
pub async fn seed_paying_order(app: &TestApp, id: OrderId, code_for_hash: &str) {
    seed_order(app, id, 50).await;
    app.orders
        .attach_payment(
            id,
            PaymentInit {
                code_for_hash: code_for_hash.to_string(),
                payment_url: "https://pay.example/3d".to_string(),
                response: json!({}),
                created_at: Utc::now(),
            },
            "United Payment payment initiated.",
        )
        .await
        .unwrap();
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

pub fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap()
        .to_string()
}

/// Path and query of an absolute URL, for replaying it against the router.
pub fn path_and_query(absolute: &str) -> String {
    let url = url::Url::parse(absolute).unwrap();
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}
