//! Processor-facing types and the payment-creation capability.
//!
//! The real HTTP client and the sandbox simulator both implement
//! [`PaymentClient`]; `build_payment_client` picks one from the test-mode flag.

pub mod client;
pub mod error_catalog;
pub mod hash;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GatewaySettings;
use crate::domain::OrderId;
use crate::logging::NotificationSink;
use crate::ports::{PendingPaymentStore, RepositoryError};
use crate::sandbox::SandboxClient;

pub use client::HttpPaymentClient;

pub const SUCCESS_RESULT_CODE: &str = "Success";

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Processor rejected the request [{code}]: {message}")]
    Rejected { code: String, message: String },

    #[error("Payment URL not received from gateway.")]
    IncompleteResponse,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response from processor: {0}")]
    InvalidResponse(String),

    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),

    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl GatewayError {
    /// Text safe to show the shopper.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Rejected { code, message } => error_catalog::message(code, message),
            GatewayError::IncompleteResponse => self.to_string(),
            _ => error_catalog::message(error_catalog::UNEXPECTED_ERROR_CODE, ""),
        }
    }

    pub fn result_code(&self) -> Option<&str> {
        match self {
            GatewayError::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuyerInformation {
    pub buyer_full_name: String,
    pub buyer_email: String,
    pub buyer_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerInformation {
    pub dealer_customer_id: String,
    pub customer_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Body of a 3-D Secure payment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentRequest {
    pub amount: f64,
    pub currency: String,
    pub bank_code: u32,
    pub installment_number: u32,
    #[serde(rename = "ClientIP")]
    pub client_ip: String,
    pub other_trx_code: String,
    pub sub_merchant_name: String,
    pub is_pool_payment: u8,
    pub is_pre_auth: u8,
    pub is_tokenized: u8,
    pub integrator_id: u32,
    pub software: String,
    pub description: String,
    pub return_hash: u8,
    pub redirect_url: String,
    pub redirect_type: u8,
    pub buyer_information: BuyerInformation,
    pub customer_information: CustomerInformation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub code_for_hash: Option<String>,
}

/// Processor response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResponse {
    #[serde(default)]
    pub data: Option<PaymentData>,
    pub result_code: String,
    #[serde(default)]
    pub result_message: Option<String>,
    #[serde(default)]
    pub exception: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn success(data: PaymentData) -> Self {
        Self {
            data: Some(data),
            result_code: SUCCESS_RESULT_CODE.to_string(),
            result_message: Some(String::new()),
            exception: None,
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            data: None,
            result_code: code.to_string(),
            result_message: Some(message.to_string()),
            exception: None,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.result_code == SUCCESS_RESULT_CODE
    }

    /// Accepts the response only if it carries both the redirect URL and the
    /// hash seed; a half-filled success is treated as a failure.
    pub fn into_created(self) -> Result<CreatedPayment, GatewayError> {
        if !self.is_successful() {
            return Err(GatewayError::Rejected {
                code: self.result_code,
                message: self.result_message.unwrap_or_default(),
            });
        }

        let raw = serde_json::to_value(&self)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let data = self.data.unwrap_or_default();

        match (data.url, data.code_for_hash) {
            (Some(url), Some(code)) if !url.trim().is_empty() && !code.trim().is_empty() => {
                Ok(CreatedPayment {
                    url,
                    code_for_hash: code,
                    raw,
                })
            }
            _ => Err(GatewayError::IncompleteResponse),
        }
    }
}

/// Accepted payment: where to send the shopper and the callback secret.
#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub url: String,
    pub code_for_hash: String,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait PaymentClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment, GatewayError>;

    /// "closed" while calls are permitted.
    fn circuit_state(&self) -> &'static str {
        "closed"
    }
}

/// `ORDER-<YYYYMMDD>-<HHMMSS>-<order_id>` in UTC.
pub fn transaction_reference(order_id: OrderId, now: DateTime<Utc>) -> String {
    format!(
        "ORDER-{}-{}-{}",
        now.format("%Y%m%d"),
        now.format("%H%M%S"),
        order_id
    )
}

pub fn build_payment_client(
    settings: &GatewaySettings,
    pending: Arc<dyn PendingPaymentStore>,
    public_base_url: &str,
    sink: Arc<dyn NotificationSink>,
) -> Arc<dyn PaymentClient> {
    if settings.test_mode {
        Arc::new(SandboxClient::new(
            settings.dealer_code.clone(),
            pending,
            public_base_url,
            sink,
        ))
    } else {
        Arc::new(HttpPaymentClient::new(settings.clone(), sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_transaction_reference_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(transaction_reference(123, now), "ORDER-20260309-070501-123");
    }

    #[test]
    fn test_envelope_deserializes_processor_json() {
        let body = r#"{
            "Data": {"Url": "https://pay.example/3d?x=1", "CodeForHash": "ABC-123"},
            "ResultCode": "Success",
            "ResultMessage": "",
            "Exception": null
        }"#;
        let response: ApiResponse = serde_json::from_str(body).unwrap();
        let created = response.into_created().unwrap();
        assert_eq!(created.url, "https://pay.example/3d?x=1");
        assert_eq!(created.code_for_hash, "ABC-123");
        assert_eq!(created.raw["ResultCode"], "Success");
    }

    #[test]
    fn test_rejected_envelope_carries_code_and_message() {
        let response = ApiResponse::error(error_catalog::INVALID_CARD_INFO, "bad card");
        let err = response.into_created().unwrap_err();
        assert_eq!(err.result_code(), Some(error_catalog::INVALID_CARD_INFO));
        assert!(err.user_message().starts_with("Card information is invalid"));
    }

    #[test]
    fn test_success_without_code_for_hash_is_incomplete() {
        let response = ApiResponse::success(PaymentData {
            url: Some("https://pay.example".to_string()),
            code_for_hash: None,
        });
        assert!(matches!(
            response.into_created(),
            Err(GatewayError::IncompleteResponse)
        ));
    }

    #[test]
    fn test_transport_errors_get_generic_message() {
        let err = GatewayError::CircuitBreakerOpen("open".to_string());
        assert_eq!(
            err.user_message(),
            "A system error occurred. Please try again or contact support."
        );
    }

    #[test]
    fn test_request_serializes_with_processor_field_names() {
        let request = PaymentRequest {
            amount: 25.5,
            currency: "GEL".to_string(),
            bank_code: 1,
            installment_number: 1,
            client_ip: "203.0.113.9".to_string(),
            other_trx_code: "ORDER-20260101-000000-1".to_string(),
            sub_merchant_name: String::new(),
            is_pool_payment: 0,
            is_pre_auth: 0,
            is_tokenized: 0,
            integrator_id: 0,
            software: "unitedpay-gateway".to_string(),
            description: String::new(),
            return_hash: 1,
            redirect_url: "https://shop.example/callback".to_string(),
            redirect_type: 0,
            buyer_information: BuyerInformation {
                buyer_full_name: "Nino B".to_string(),
                buyer_email: "nino@example.com".to_string(),
                buyer_address: "Tbilisi".to_string(),
            },
            customer_information: CustomerInformation {
                dealer_customer_id: String::new(),
                customer_code: "guest-1".to_string(),
                first_name: "Nino".to_string(),
                last_name: "B".to_string(),
                email: "nino@example.com".to_string(),
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["Amount"], 25.5);
        assert_eq!(json["ClientIP"], "203.0.113.9");
        assert_eq!(json["OtherTrxCode"], "ORDER-20260101-000000-1");
        assert_eq!(json["BuyerInformation"]["BuyerFullName"], "Nino B");
        assert_eq!(json["CustomerInformation"]["CustomerCode"], "guest-1");
        assert_eq!(json["ReturnHash"], 1);
    }
}
