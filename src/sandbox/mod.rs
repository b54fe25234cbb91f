//! Offline stand-in for the processor.
//!
//! `SandboxClient` answers payment creation the way the processor does and
//! parks a pending record; `SandboxPage` plays the hosted 3-D Secure page and
//! fires the callback with digests from `gateway::hash`.

pub mod page;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::Level;
use uuid::Uuid;

use crate::gateway::error_catalog::{INVALID_REQUEST, REDIRECT_URL_REQUIRED};
use crate::gateway::{ApiResponse, CreatedPayment, GatewayError, PaymentClient, PaymentData, PaymentRequest};
use crate::logging::NotificationSink;
use crate::ports::{PendingPayment, PendingPaymentStore, RepositoryError};

pub use page::{SandboxAction, SandboxPage};

/// Pending sessions live this long.
pub const PENDING_TTL: Duration = Duration::from_secs(3600);

pub const PAYMENT_PAGE_PATH: &str = "/sandbox/payment";

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Invalid payment parameters.")]
    InvalidParameters,

    #[error("Payment session expired.")]
    SessionExpired,

    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),
}

pub struct SandboxClient {
    dealer_code: String,
    pending: Arc<dyn PendingPaymentStore>,
    base_url: String,
    sink: Arc<dyn NotificationSink>,
}

impl SandboxClient {
    pub fn new(
        dealer_code: String,
        pending: Arc<dyn PendingPaymentStore>,
        public_base_url: &str,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        sink.log(
            Level::INFO,
            "API client initialized",
            json!({ "dealer_code": dealer_code, "test_mode": true }),
        );
        Self {
            dealer_code,
            pending,
            base_url: public_base_url.trim_end_matches('/').to_string(),
            sink,
        }
    }

    /// Produces the processor's response envelope. Validation failures come
    /// back as error envelopes, only storage problems are `Err`.
    pub async fn respond(&self, request: &PaymentRequest) -> Result<ApiResponse, RepositoryError> {
        if request.amount <= 0.0 || request.currency.trim().is_empty() {
            return Ok(ApiResponse::error(
                INVALID_REQUEST,
                "Amount and Currency are required",
            ));
        }

        if request.redirect_url.trim().is_empty() {
            return Ok(ApiResponse::error(
                REDIRECT_URL_REQUIRED,
                "RedirectURL is required",
            ));
        }

        let three_d_trx_code = Uuid::new_v4().to_string();
        let code_for_hash = Uuid::new_v4().to_string().to_uppercase();

        let record = PendingPayment {
            amount: request.amount,
            currency: request.currency.clone(),
            other_trx_code: request.other_trx_code.clone(),
            redirect_url: request.redirect_url.clone(),
            dealer_code: self.dealer_code.clone(),
            code_for_hash: code_for_hash.clone(),
        };
        self.pending.put(&three_d_trx_code, &record, PENDING_TTL).await?;

        let url = self.payment_page_url(&three_d_trx_code);

        self.sink.log(
            Level::INFO,
            "[Sandbox] Payment created",
            json!({
                "three_d_trx_code": three_d_trx_code,
                "other_trx_code": request.other_trx_code,
                "amount": request.amount,
                "currency": request.currency,
            }),
        );

        Ok(ApiResponse::success(PaymentData {
            url: Some(url),
            code_for_hash: Some(code_for_hash),
        }))
    }

    fn payment_page_url(&self, three_d_trx_code: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("threeDTrxCode", three_d_trx_code)
            .append_pair("RedirectType", "0")
            .finish();
        format!("{}{}?{}", self.base_url, PAYMENT_PAGE_PATH, query)
    }
}

#[async_trait]
impl PaymentClient for SandboxClient {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment, GatewayError> {
        let envelope = self.respond(request).await?;

        if !envelope.is_successful() {
            self.sink.log(
                Level::ERROR,
                "[Sandbox] Payment request rejected",
                json!({
                    "other_trx_code": request.other_trx_code,
                    "result_code": envelope.result_code,
                    "result_message": envelope.result_message,
                }),
            );
        }

        envelope.into_created()
    }
}
