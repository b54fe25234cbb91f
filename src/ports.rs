//! Storage and storefront seams. Services depend on these traits; adapters
//! under `crate::adapters` implement them.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CallbackAudit, Order, OrderId, OrderStatus, PaymentInit, Settlement};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Order persistence. Every mutating call is atomic per order.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find(&self, id: OrderId) -> RepositoryResult<Option<Order>>;

    async fn insert(&self, order: &Order) -> RepositoryResult<()>;

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        note: Option<&str>,
    ) -> RepositoryResult<()>;

    async fn add_note(&self, id: OrderId, note: &str) -> RepositoryResult<()>;

    /// Stores `code_for_hash` and `payment_url` together, clears any previous
    /// outcome and leaves the order pending.
    async fn attach_payment(&self, id: OrderId, init: PaymentInit, note: &str)
        -> RepositoryResult<()>;

    /// Keeps the raw callback for audit without touching the outcome.
    async fn record_callback(&self, id: OrderId, audit: CallbackAudit) -> RepositoryResult<()>;

    /// Writes the terminal outcome only if none has been recorded yet.
    /// Returns `false` when another callback got there first.
    async fn settle(&self, id: OrderId, settlement: Settlement) -> RepositoryResult<bool>;
}

/// Sandbox payment session waiting for the simulated 3-D Secure decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub amount: f64,
    pub currency: String,
    pub other_trx_code: String,
    pub redirect_url: String,
    pub dealer_code: String,
    pub code_for_hash: String,
}

#[async_trait]
pub trait PendingPaymentStore: Send + Sync {
    async fn put(&self, code: &str, payment: &PendingPayment, ttl: Duration)
        -> RepositoryResult<()>;

    async fn get(&self, code: &str) -> RepositoryResult<Option<PendingPayment>>;

    /// Removes and returns the record in one step; at most one caller wins.
    async fn take(&self, code: &str) -> RepositoryResult<Option<PendingPayment>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Error,
    Success,
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// The shop the shopper returns to.
#[async_trait]
pub trait Storefront: Send + Sync {
    async fn empty_cart(&self, order: &Order);

    async fn add_notice(&self, notice: Notice);

    /// Order confirmation page.
    fn return_url(&self, order: &Order) -> String;

    fn checkout_url(&self) -> String;
}
