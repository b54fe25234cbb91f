//! Order domain entity.
//! Typed view of a storefront order plus the payment correlation record the
//! gateway keeps on it.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gateway::hash::HashVerdict;

pub type OrderId = i64;

/// Lifecycle status of an order as seen by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    OnHold,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Paid orders never go back through the callback path.
    pub fn is_paid(&self) -> bool {
        matches!(self, OrderStatus::Processing | OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "on-hold" => Ok(OrderStatus::OnHold),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "failed" => Ok(OrderStatus::Failed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// Outcome recorded by the callback path. Written once per payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unset,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unset => "unset",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, PaymentStatus::Unset)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unset" | "" => Ok(PaymentStatus::Unset),
            "success" => Ok(PaymentStatus::Success),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address_1: String,
    pub address_2: String,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn address(&self) -> String {
        format!("{} {}", self.address_1, self.address_2)
            .trim()
            .to_string()
    }

    /// Processor-side customer code; guests are keyed by their order.
    pub fn customer_code(&self, order_id: OrderId) -> String {
        match self.customer_id {
            Some(id) => id.to_string(),
            None => format!("guest-{}", order_id),
        }
    }
}

/// Transaction correlation record kept on the order.
///
/// `code_for_hash` is the per-payment secret issued by the processor. It is
/// written together with `payment_url` or not at all, and callbacks can only be
/// authenticated while it is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub code_for_hash: Option<String>,
    pub payment_url: Option<String>,
    pub payment_response: Option<serde_json::Value>,
    pub trx_code: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_created_at: Option<DateTime<Utc>>,
    pub callback_received_at: Option<DateTime<Utc>>,
    pub callback_payload: Option<serde_json::Value>,
    pub last_verdict: Option<HashVerdict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNote {
    pub note: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_key: String,
    pub status: OrderStatus,
    pub total: BigDecimal,
    pub currency: String,
    pub customer: Customer,
    pub payment: TransactionRecord,
    pub notes: Vec<OrderNote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        id: OrderId,
        order_key: String,
        total: BigDecimal,
        currency: String,
        customer: Customer,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            order_key,
            status: OrderStatus::Pending,
            total,
            currency,
            customer,
            payment: TransactionRecord::default(),
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn generate_key() -> String {
        format!("wc_order_{}", Uuid::new_v4().simple())
    }

    pub fn has_status(&self, statuses: &[OrderStatus]) -> bool {
        statuses.contains(&self.status)
    }
}

/// Fields written when the processor accepts a payment request.
#[derive(Debug, Clone)]
pub struct PaymentInit {
    pub code_for_hash: String,
    pub payment_url: String,
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Raw callback as received, kept for audit on every handled branch.
#[derive(Debug, Clone)]
pub struct CallbackAudit {
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
    pub verdict: HashVerdict,
}

/// Terminal write produced by the callback path.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub trx_code: Option<String>,
    pub note: String,
    pub audit: CallbackAudit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_round_trips_through_str() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::OnHold,
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_paid_statuses() {
        assert!(OrderStatus::Completed.is_paid());
        assert!(OrderStatus::Processing.is_paid());
        assert!(!OrderStatus::Failed.is_paid());
        assert!(!OrderStatus::Pending.is_paid());
    }

    #[test]
    fn test_guest_customer_code() {
        let guest = Customer::default();
        assert_eq!(guest.customer_code(42), "guest-42");

        let known = Customer {
            customer_id: Some(7),
            ..Customer::default()
        };
        assert_eq!(known.customer_code(42), "7");
    }

    #[test]
    fn test_full_name_and_address_are_trimmed() {
        let customer = Customer {
            first_name: "Nino".to_string(),
            address_1: "Rustaveli Ave 12".to_string(),
            ..Customer::default()
        };
        assert_eq!(customer.full_name(), "Nino");
        assert_eq!(customer.address(), "Rustaveli Ave 12");
    }

    #[test]
    fn test_new_order_has_no_payment() {
        let order = Order::new(
            1,
            Order::generate_key(),
            BigDecimal::from(10),
            "GEL".to_string(),
            Customer::default(),
        );
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment.payment_status, PaymentStatus::Unset);
        assert!(order.payment.code_for_hash.is_none());
        assert!(order.order_key.starts_with("wc_order_"));
    }
}
