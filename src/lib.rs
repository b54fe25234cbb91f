pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod ports;
pub mod sandbox;
pub mod secrets;
pub mod services;
pub mod startup;
pub mod utils;

use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderValue, Method};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::gateway::{build_payment_client, PaymentClient};
use crate::health::{DependencyChecker, GatewayChecker, PostgresChecker, RedisChecker};
use crate::logging::NotificationSink;
use crate::middleware::{ClientIpResolver, IpFilterLayer, RequestLogging};
use crate::ports::{OrderStore, PendingPaymentStore, Storefront};
use crate::sandbox::{SandboxPage, PAYMENT_PAGE_PATH};
use crate::services::checkout::CALLBACK_PATH;
use crate::services::{CallbackHandler, CheckoutService, KeyedLocks};

/// Storage, storefront and logging handles the services are built from.
pub struct Collaborators {
    pub orders: Arc<dyn OrderStore>,
    pub pending: Arc<dyn PendingPaymentStore>,
    pub storefront: Arc<dyn Storefront>,
    pub sink: Arc<dyn NotificationSink>,
    /// Overrides the client picked from the test-mode flag.
    pub client: Option<Arc<dyn PaymentClient>>,
    pub db: Option<sqlx::PgPool>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orders: Arc<dyn OrderStore>,
    pub client: Arc<dyn PaymentClient>,
    pub checkout: Arc<CheckoutService>,
    pub callbacks: Arc<CallbackHandler>,
    pub sandbox: Option<Arc<SandboxPage>>,
    pub health_checkers: Arc<Vec<Arc<dyn DependencyChecker>>>,
    pub client_ip: ClientIpResolver,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let Collaborators {
            orders,
            pending,
            storefront,
            sink,
            client,
            db,
        } = collaborators;

        let client = client.unwrap_or_else(|| {
            build_payment_client(
                &config.gateway,
                pending.clone(),
                &config.public_base_url,
                sink.clone(),
            )
        });

        // Payment creation and settlement of one order never interleave.
        let order_locks = Arc::new(KeyedLocks::new());
        let checkout = CheckoutService::new(
            orders.clone(),
            client.clone(),
            storefront.clone(),
            sink.clone(),
            config.gateway.clone(),
            &config.public_base_url,
        )
        .with_locks(order_locks.clone());
        let callbacks = CallbackHandler::new(
            orders.clone(),
            storefront,
            sink.clone(),
            config.gateway.test_mode,
        )
        .with_locks(order_locks);

        // The simulated hosted page is never reachable outside test mode.
        let sandbox = config
            .gateway
            .test_mode
            .then(|| Arc::new(SandboxPage::new(pending, sink)));

        let mut health_checkers: Vec<Arc<dyn DependencyChecker>> = Vec::new();
        if let Some(pool) = db {
            health_checkers.push(Arc::new(PostgresChecker::new(pool)));
        }
        if let Some(url) = &config.redis_url {
            health_checkers.push(Arc::new(RedisChecker::new(url.clone())));
        }
        health_checkers.push(Arc::new(GatewayChecker::new(client.clone())));

        Self {
            client_ip: ClientIpResolver::new(config.trusted_proxy_depth),
            config: Arc::new(config),
            orders,
            client,
            checkout: Arc::new(checkout),
            callbacks: Arc::new(callbacks),
            sandbox,
            health_checkers: Arc::new(health_checkers),
            start_time: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let callback_routes = Router::new()
        .route(
            CALLBACK_PATH,
            get(handlers::callback::callback_get).post(handlers::callback::callback_post),
        )
        .layer(IpFilterLayer::new(
            config.allowed_ips.clone(),
            config.trusted_proxy_depth,
        ));

    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/orders/:id/payment",
            post(handlers::checkout::process_payment),
        )
        .merge(callback_routes);

    if state.sandbox.is_some() {
        app = app.route(
            PAYMENT_PAGE_PATH,
            get(handlers::sandbox::show_payment_page).post(handlers::sandbox::submit_payment),
        );
    }

    app.with_state(state)
        .layer(axum::middleware::from_fn_with_state(
            RequestLogging {
                log_body: config.log_request_body,
            },
            middleware::request_logger_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.cors_allowed_origins.as_deref()))
}

fn cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]);
    match allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .filter_map(|o| HeaderValue::from_str(o).ok())
                .collect();
            layer.allow_origin(origins)
        }
        None => layer.allow_origin(Any),
    }
}
