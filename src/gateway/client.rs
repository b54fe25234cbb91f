use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::Level;

use super::{ApiResponse, CreatedPayment, GatewayError, PaymentClient, PaymentRequest};
use crate::config::GatewaySettings;
use crate::logging::NotificationSink;

const CREATE_PAYMENT_PATH: &str = "/PaymentDealer/DoDirectPaymentThreeD";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DealerAuthentication<'a> {
    dealer_code: &'a str,
    username: &'a str,
    password: &'a str,
    check_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreatePaymentBody<'a> {
    payment_dealer_authentication: DealerAuthentication<'a>,
    payment_dealer_request: &'a PaymentRequest,
}

/// `hex(SHA256(DealerCode + "MK" + Username + "PD" + Password))`
pub fn check_key(dealer_code: &str, username: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}MK{}PD{}", dealer_code, username, password).as_bytes());
    hex::encode(hasher.finalize())
}

/// HTTP client for the processor's payment API.
#[derive(Clone)]
pub struct HttpPaymentClient {
    client: Client,
    settings: GatewaySettings,
    sink: Arc<dyn NotificationSink>,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HttpPaymentClient {
    pub fn new(settings: GatewaySettings, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_circuit_breaker(settings, sink, 3, 60)
    }

    pub fn with_circuit_breaker(
        settings: GatewaySettings,
        sink: Arc<dyn NotificationSink>,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        sink.log(
            Level::INFO,
            "API client initialized",
            json!({ "dealer_code": settings.dealer_code, "test_mode": false }),
        );

        Self {
            client,
            settings,
            sink,
            circuit_breaker,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.settings.api_url.trim_end_matches('/'),
            CREATE_PAYMENT_PATH
        )
    }
}

#[async_trait]
impl PaymentClient for HttpPaymentClient {
    fn name(&self) -> &'static str {
        "unitedpayment"
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment, GatewayError> {
        let body = CreatePaymentBody {
            payment_dealer_authentication: DealerAuthentication {
                dealer_code: &self.settings.dealer_code,
                username: &self.settings.username,
                password: &self.settings.password,
                check_key: check_key(
                    &self.settings.dealer_code,
                    &self.settings.username,
                    &self.settings.password,
                ),
            },
            payment_dealer_request: request,
        };
        let payload = serde_json::to_value(&body)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let url = self.endpoint();
        let client = self.client.clone();

        // Only transport-level failures trip the breaker; processor rejections
        // come back as a successful envelope.
        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).json(&payload).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(GatewayError::InvalidResponse(format!(
                        "processor returned HTTP {}",
                        status
                    )));
                }
                let envelope = response.json::<ApiResponse>().await?;
                Ok::<ApiResponse, GatewayError>(envelope)
            })
            .await;

        let envelope = match result {
            Ok(envelope) => envelope,
            Err(FailsafeError::Rejected) => {
                return Err(GatewayError::CircuitBreakerOpen(
                    "payment API circuit breaker is open".to_string(),
                ))
            }
            Err(FailsafeError::Inner(e)) => return Err(e),
        };

        let level = if envelope.is_successful() {
            Level::INFO
        } else {
            Level::ERROR
        };
        self.sink.log(
            level,
            "[API Response] POST /payments/create",
            json!({
                "other_trx_code": request.other_trx_code,
                "result_code": envelope.result_code,
                "result_message": envelope.result_message,
            }),
        );

        envelope.into_created()
    }

    fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{BuyerInformation, CustomerInformation};
    use crate::logging::MemorySink;

    fn settings(api_url: String) -> GatewaySettings {
        GatewaySettings {
            dealer_code: "D1".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
            test_mode: false,
            api_url,
        }
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            amount: 10.0,
            currency: "GEL".to_string(),
            bank_code: 1,
            installment_number: 1,
            client_ip: "127.0.0.1".to_string(),
            other_trx_code: "ORDER-20260101-120000-5".to_string(),
            sub_merchant_name: String::new(),
            is_pool_payment: 0,
            is_pre_auth: 0,
            is_tokenized: 0,
            integrator_id: 0,
            software: "unitedpay-gateway".to_string(),
            description: String::new(),
            return_hash: 1,
            redirect_url: "https://shop.example/callback?order_id=5&order_key=k".to_string(),
            redirect_type: 0,
            buyer_information: BuyerInformation {
                buyer_full_name: "A B".to_string(),
                buyer_email: "a@example.com".to_string(),
                buyer_address: String::new(),
            },
            customer_information: CustomerInformation {
                dealer_customer_id: String::new(),
                customer_code: "guest-5".to_string(),
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                email: "a@example.com".to_string(),
            },
        }
    }

    #[test]
    fn test_check_key() {
        let mut hasher = Sha256::new();
        hasher.update(b"D1MKuserPDpass");
        assert_eq!(check_key("D1", "user", "pass"), hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_circuit_starts_closed() {
        let client = HttpPaymentClient::new(
            settings("https://service.unitedpayment.ge".to_string()),
            Arc::new(MemorySink::default()),
        );
        assert_eq!(client.circuit_state(), "closed");
    }

    #[tokio::test]
    async fn test_create_payment_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", CREATE_PAYMENT_PATH)
            .match_body(mockito::Matcher::PartialJson(json!({
                "PaymentDealerAuthentication": {
                    "DealerCode": "D1",
                    "CheckKey": check_key("D1", "user", "pass"),
                },
                "PaymentDealerRequest": { "OtherTrxCode": "ORDER-20260101-120000-5" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"Data":{"Url":"https://3d.example/pay/abc","CodeForHash":"0F5B-77"},"ResultCode":"Success","ResultMessage":"","Exception":null}"#,
            )
            .create_async()
            .await;

        let client = HttpPaymentClient::new(settings(server.url()), Arc::new(MemorySink::default()));
        let created = client.create_payment(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(created.url, "https://3d.example/pay/abc");
        assert_eq!(created.code_for_hash, "0F5B-77");
    }

    #[tokio::test]
    async fn test_create_payment_rejected_by_processor() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", CREATE_PAYMENT_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"Data":null,"ResultCode":"PaymentDealer.CheckPaymentDealerAuthentication.InvalidAccount","ResultMessage":"","Exception":null}"#,
            )
            .create_async()
            .await;

        let sink = Arc::new(MemorySink::default());
        let client = HttpPaymentClient::new(settings(server.url()), sink.clone());
        let err = client.create_payment(&request()).await.unwrap_err();

        assert_eq!(
            err.result_code(),
            Some("PaymentDealer.CheckPaymentDealerAuthentication.InvalidAccount")
        );
        assert!(sink.contains(Level::ERROR, "[API Response] POST /payments/create"));
        assert_eq!(client.circuit_state(), "closed");
    }

    #[tokio::test]
    async fn test_server_errors_open_the_circuit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", CREATE_PAYMENT_PATH)
            .with_status(500)
            .expect_at_least(2)
            .create_async()
            .await;

        let client = HttpPaymentClient::with_circuit_breaker(
            settings(server.url()),
            Arc::new(MemorySink::default()),
            2,
            60,
        );

        for _ in 0..2 {
            let err = client.create_payment(&request()).await.unwrap_err();
            assert!(matches!(err, GatewayError::InvalidResponse(_)));
        }

        let result = client.create_payment(&request()).await;
        assert!(matches!(result, Err(GatewayError::CircuitBreakerOpen(_))));
        assert_eq!(client.circuit_state(), "open");
    }
}
