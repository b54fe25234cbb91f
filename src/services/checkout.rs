//! Payment creation for an order: build the processor request, store the
//! correlation record and hand back the hosted page URL.

use std::sync::Arc;

use bigdecimal::ToPrimitive;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::Level;

use crate::config::GatewaySettings;
use crate::domain::{Order, OrderId, OrderStatus, PaymentInit, PaymentStatus};
use crate::gateway::{
    transaction_reference, BuyerInformation, CustomerInformation, PaymentClient, PaymentRequest,
};
use crate::logging::NotificationSink;
use crate::ports::{Notice, NoticeLevel, OrderStore, RepositoryError, Storefront};
use crate::services::locks::KeyedLocks;
use crate::utils::sanitize::mask;

pub const CALLBACK_PATH: &str = "/callback";

const SOFTWARE: &str = concat!("unitedpay-gateway/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Invalid order.")]
    OrderNotFound,

    #[error("United Payment is not configured.")]
    GatewayUnavailable,

    #[error("Order has already been paid.")]
    AlreadyPaid,

    #[error("Invalid order total.")]
    InvalidAmount,

    #[error("Payment error: {0}")]
    Payment(String),

    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutResponse {
    pub result: &'static str,
    pub redirect: String,
}

pub struct CheckoutService {
    orders: Arc<dyn OrderStore>,
    client: Arc<dyn PaymentClient>,
    storefront: Arc<dyn Storefront>,
    sink: Arc<dyn NotificationSink>,
    settings: GatewaySettings,
    public_base_url: String,
    locks: Arc<KeyedLocks<OrderId>>,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        client: Arc<dyn PaymentClient>,
        storefront: Arc<dyn Storefront>,
        sink: Arc<dyn NotificationSink>,
        settings: GatewaySettings,
        public_base_url: &str,
    ) -> Self {
        Self {
            orders,
            client,
            storefront,
            sink,
            settings,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Shares per-order locks with the callback handler so payment creation
    /// never interleaves with a settlement.
    pub fn with_locks(mut self, locks: Arc<KeyedLocks<OrderId>>) -> Self {
        self.locks = locks;
        self
    }

    pub async fn process_payment(
        &self,
        order_id: OrderId,
        client_ip: &str,
    ) -> Result<CheckoutResponse, CheckoutError> {
        let _guard = self.locks.lock(order_id).await;

        let order = self
            .orders
            .find(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        // A settled success is final; a new payment would reset it.
        if order.status.is_paid() || order.payment.payment_status == PaymentStatus::Success {
            self.sink.log(
                Level::WARN,
                "Payment requested for an order that is already paid",
                json!({
                    "order_id": order_id,
                    "status": order.status.as_str(),
                    "payment_status": order.payment.payment_status.as_str(),
                }),
            );
            return Err(CheckoutError::AlreadyPaid);
        }

        if !self.settings.is_configured() {
            self.sink.log(
                Level::ERROR,
                "Payment gateway is not configured",
                json!({ "order_id": order_id }),
            );
            return Err(CheckoutError::GatewayUnavailable);
        }

        let request = match self.build_request(&order, client_ip) {
            Some(request) => request,
            None => {
                self.sink.log(
                    Level::ERROR,
                    "Order total cannot be sent to the processor",
                    json!({ "order_id": order_id, "total": order.total.to_string() }),
                );
                return Err(CheckoutError::InvalidAmount);
            }
        };

        self.orders
            .update_status(
                order_id,
                OrderStatus::Pending,
                Some("Awaiting United Payment payment."),
            )
            .await?;

        self.sink.log(
            Level::INFO,
            "[API Request] POST /payments/create",
            json!({
                "order_id": order_id,
                "client": self.client.name(),
                "other_trx_code": request.other_trx_code,
                "amount": request.amount,
                "currency": request.currency,
            }),
        );

        match self.client.create_payment(&request).await {
            Ok(created) => {
                let note = format!(
                    "United Payment payment initiated. CodeForHash: {}",
                    mask(&created.code_for_hash)
                );
                self.orders
                    .attach_payment(
                        order_id,
                        PaymentInit {
                            code_for_hash: created.code_for_hash,
                            payment_url: created.url.clone(),
                            response: created.raw,
                            created_at: Utc::now(),
                        },
                        &note,
                    )
                    .await?;

                self.sink.log(
                    Level::INFO,
                    "Payment created successfully",
                    json!({ "order_id": order_id, "other_trx_code": request.other_trx_code }),
                );

                Ok(CheckoutResponse {
                    result: "success",
                    redirect: created.url,
                })
            }
            Err(e) => {
                let message = e.user_message();

                self.sink.log(
                    Level::ERROR,
                    "Payment processing failed",
                    json!({
                        "order_id": order_id,
                        "result_code": e.result_code(),
                        "error": e.to_string(),
                    }),
                );

                self.orders
                    .add_note(order_id, &format!("United Payment payment failed: {}", message))
                    .await?;
                self.storefront
                    .add_notice(Notice {
                        level: NoticeLevel::Error,
                        message: format!("Payment error: {}", message),
                    })
                    .await;

                Err(CheckoutError::Payment(message))
            }
        }
    }

    /// Where the processor sends the shopper back to.
    pub fn callback_url(&self, order: &Order) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("order_id", &order.id.to_string())
            .append_pair("order_key", &order.order_key)
            .finish();
        format!("{}{}?{}", self.public_base_url, CALLBACK_PATH, query)
    }

    /// `None` when the total has no finite decimal representation.
    fn build_request(&self, order: &Order, client_ip: &str) -> Option<PaymentRequest> {
        let amount = order.total.to_f64().filter(|amount| amount.is_finite())?;
        let customer = &order.customer;
        Some(PaymentRequest {
            amount,
            currency: order.currency.clone(),
            bank_code: 1,
            installment_number: 1,
            client_ip: client_ip.to_string(),
            other_trx_code: transaction_reference(order.id, Utc::now()),
            sub_merchant_name: String::new(),
            is_pool_payment: 0,
            is_pre_auth: 0,
            is_tokenized: 0,
            integrator_id: 0,
            software: SOFTWARE.to_string(),
            description: String::new(),
            return_hash: 1,
            redirect_url: self.callback_url(order),
            redirect_type: 0,
            buyer_information: BuyerInformation {
                buyer_full_name: customer.full_name(),
                buyer_email: customer.email.clone(),
                buyer_address: customer.address(),
            },
            customer_information: CustomerInformation {
                dealer_customer_id: String::new(),
                customer_code: customer.customer_code(order.id),
                first_name: customer.first_name.clone(),
                last_name: customer.last_name.clone(),
                email: customer.email.clone(),
            },
        })
    }
}
