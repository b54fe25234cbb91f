//! Inbound processor callback: authenticate, then settle the order once.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::Level;

use crate::domain::{CallbackAudit, Order, OrderId, OrderStatus, PaymentStatus, Settlement};
use crate::gateway::error_catalog;
use crate::gateway::hash::{secure_eq, verify, HashVerdict};
use crate::logging::NotificationSink;
use crate::ports::{Notice, NoticeLevel, OrderStore, RepositoryError, Storefront};
use crate::services::locks::KeyedLocks;

pub const VERIFICATION_FAILED_NOTICE: &str = "Payment verification failed.";

#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("Invalid callback request.")]
    InvalidRequest,

    #[error("Order not found.")]
    OrderNotFound,

    #[error("Invalid order key.")]
    InvalidOrderKey,

    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),
}

/// Callback fields, read from the merged GET + POST parameter map.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub order_id: Option<String>,
    pub order_key: Option<String>,
    pub hash_value: Option<String>,
    pub trx_code: Option<String>,
    pub result_code: Option<String>,
    pub result_message: Option<String>,
    pub sandbox_payment: Option<String>,
    pub raw: BTreeMap<String, String>,
}

impl CallbackParams {
    pub fn from_map(map: HashMap<String, String>) -> Self {
        let raw: BTreeMap<String, String> = map.into_iter().collect();
        let field = |name: &str| {
            raw.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            order_id: field("order_id"),
            order_key: field("order_key"),
            hash_value: field("hashValue"),
            trx_code: field("trxCode"),
            result_code: field("resultCode"),
            result_message: field("resultMessage"),
            sandbox_payment: field("sandbox_payment"),
            raw,
        }
    }

    /// Merges query and form parameters; form values win on collision.
    pub fn merged(query: HashMap<String, String>, form: HashMap<String, String>) -> Self {
        let mut map = query;
        map.extend(form);
        Self::from_map(map)
    }

    fn payload(&self) -> Value {
        json!(self.raw)
    }

    fn claims_sandbox(&self) -> bool {
        matches!(self.sandbox_payment.as_deref(), Some(flag) if flag != "0")
    }
}

/// How the shopper leaves the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The order was settled earlier; nothing was written.
    AlreadyProcessed { redirect: String },
    Paid { redirect: String },
    Failed { redirect: String, message: String },
    /// Digest did not match. Audit kept, order left unsettled.
    Rejected { redirect: String },
}

impl CallbackOutcome {
    pub fn redirect_url(&self) -> &str {
        match self {
            CallbackOutcome::AlreadyProcessed { redirect }
            | CallbackOutcome::Paid { redirect }
            | CallbackOutcome::Failed { redirect, .. }
            | CallbackOutcome::Rejected { redirect } => redirect,
        }
    }
}

pub struct CallbackHandler {
    orders: Arc<dyn OrderStore>,
    storefront: Arc<dyn Storefront>,
    sink: Arc<dyn NotificationSink>,
    test_mode: bool,
    locks: Arc<KeyedLocks<OrderId>>,
}

impl CallbackHandler {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        storefront: Arc<dyn Storefront>,
        sink: Arc<dyn NotificationSink>,
        test_mode: bool,
    ) -> Self {
        Self {
            orders,
            storefront,
            sink,
            test_mode,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn with_locks(mut self, locks: Arc<KeyedLocks<OrderId>>) -> Self {
        self.locks = locks;
        self
    }

    pub async fn handle(&self, params: CallbackParams) -> Result<CallbackOutcome, CallbackError> {
        let (order_id, order_key) = match (&params.order_id, &params.order_key) {
            (Some(id), Some(key)) => match id.parse::<OrderId>() {
                Ok(id) => (id, key.clone()),
                Err(_) => return Err(self.invalid_request(&params)),
            },
            _ => return Err(self.invalid_request(&params)),
        };

        // Duplicate deliveries for one order run one at a time.
        let _guard = self.locks.lock(order_id).await;

        let order = match self.orders.find(order_id).await? {
            Some(order) => order,
            None => {
                self.sink.log(
                    Level::ERROR,
                    "Order not found",
                    json!({ "order_id": order_id }),
                );
                return Err(CallbackError::OrderNotFound);
            }
        };

        if !secure_eq(&order.order_key, &order_key) {
            self.sink.log(
                Level::ERROR,
                "Invalid order key",
                json!({ "order_id": order_id }),
            );
            return Err(CallbackError::InvalidOrderKey);
        }

        self.sink.log(
            Level::INFO,
            "Payment callback received",
            json!({ "order_id": order_id, "callback_data": params.payload() }),
        );

        if let Some(outcome) = self.already_settled(&order) {
            return Ok(outcome);
        }

        let code_for_hash = order.payment.code_for_hash.clone().unwrap_or_default();
        let hash_value = params.hash_value.clone().unwrap_or_default();
        let verdict = verify(&code_for_hash, &hash_value);

        let audit = CallbackAudit {
            payload: params.payload(),
            received_at: Utc::now(),
            verdict,
        };

        let bypass = self.test_mode && params.claims_sandbox();
        if bypass {
            self.sink.log(
                Level::INFO,
                "Sandbox payment callback, skipping hash validation",
                json!({ "order_id": order_id, "verdict": verdict.as_str() }),
            );
        }

        match verdict {
            HashVerdict::Success => self.settle_success(&order, &params, audit).await,
            HashVerdict::Failure => self.settle_failure(&order, &params, audit).await,
            HashVerdict::Invalid if bypass => self.settle_failure(&order, &params, audit).await,
            HashVerdict::Invalid => self.reject(&order, &hash_value, audit).await,
        }
    }

    fn invalid_request(&self, params: &CallbackParams) -> CallbackError {
        self.sink.log(
            Level::ERROR,
            "Invalid callback request",
            json!({ "callback_data": params.payload() }),
        );
        CallbackError::InvalidRequest
    }

    fn already_settled(&self, order: &Order) -> Option<CallbackOutcome> {
        let redirect = if order.status.is_paid() || order.payment.payment_status == PaymentStatus::Success {
            self.storefront.return_url(order)
        } else if order.payment.payment_status == PaymentStatus::Failed {
            self.storefront.checkout_url()
        } else {
            return None;
        };

        self.sink.log(
            Level::INFO,
            "Order already processed",
            json!({
                "order_id": order.id,
                "status": order.status.as_str(),
                "payment_status": order.payment.payment_status.as_str(),
            }),
        );
        Some(CallbackOutcome::AlreadyProcessed { redirect })
    }

    async fn settle_success(
        &self,
        order: &Order,
        params: &CallbackParams,
        audit: CallbackAudit,
    ) -> Result<CallbackOutcome, CallbackError> {
        let trx_code = params.trx_code.clone();
        let settlement = Settlement {
            payment_status: PaymentStatus::Success,
            order_status: OrderStatus::Completed,
            trx_code: trx_code.clone(),
            note: format!(
                "United Payment payment successful. Transaction Code: {}",
                trx_code.as_deref().unwrap_or("N/A")
            ),
            audit,
        };

        if !self.orders.settle(order.id, settlement).await? {
            return Ok(self.lost_race(order, self.storefront.return_url(order)));
        }

        self.storefront.empty_cart(order).await;

        self.sink.log(
            Level::INFO,
            "Payment completed successfully",
            json!({ "order_id": order.id, "trx_code": trx_code }),
        );

        Ok(CallbackOutcome::Paid {
            redirect: self.storefront.return_url(order),
        })
    }

    async fn settle_failure(
        &self,
        order: &Order,
        params: &CallbackParams,
        audit: CallbackAudit,
    ) -> Result<CallbackOutcome, CallbackError> {
        let result_code = params.result_code.clone().unwrap_or_default();
        let result_message = params.result_message.clone().unwrap_or_default();
        let message = error_catalog::message(&result_code, &result_message);

        let settlement = Settlement {
            payment_status: PaymentStatus::Failed,
            order_status: OrderStatus::Failed,
            trx_code: None,
            note: format!(
                "United Payment payment failed [{}]: {}",
                result_code, message
            ),
            audit,
        };

        if !self.orders.settle(order.id, settlement).await? {
            return Ok(self.lost_race(order, self.storefront.checkout_url()));
        }

        self.storefront
            .add_notice(Notice {
                level: NoticeLevel::Error,
                message: format!("Payment failed: {}", message),
            })
            .await;

        self.sink.log(
            Level::ERROR,
            "Payment failed",
            json!({
                "order_id": order.id,
                "result_code": result_code,
                "result_message": result_message,
                "audience": error_catalog::audience(&result_code),
            }),
        );

        Ok(CallbackOutcome::Failed {
            redirect: self.storefront.checkout_url(),
            message,
        })
    }

    async fn reject(
        &self,
        order: &Order,
        hash_value: &str,
        audit: CallbackAudit,
    ) -> Result<CallbackOutcome, CallbackError> {
        self.sink.log(
            Level::ERROR,
            "Hash validation failed",
            json!({
                "order_id": order.id,
                "received_hash": hash_value,
                "has_code_for_hash": order.payment.code_for_hash.is_some(),
            }),
        );

        self.orders.record_callback(order.id, audit).await?;
        self.orders
            .add_note(order.id, "United Payment: Hash validation failed.")
            .await?;
        self.storefront
            .add_notice(Notice {
                level: NoticeLevel::Error,
                message: VERIFICATION_FAILED_NOTICE.to_string(),
            })
            .await;

        Ok(CallbackOutcome::Rejected {
            redirect: self.storefront.checkout_url(),
        })
    }

    fn lost_race(&self, order: &Order, redirect: String) -> CallbackOutcome {
        self.sink.log(
            Level::WARN,
            "Callback raced an earlier settlement",
            json!({ "order_id": order.id }),
        );
        CallbackOutcome::AlreadyProcessed { redirect }
    }
}
