//! In-process adapters. Used when no database or cache is configured and
//! throughout the tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::config::StorefrontSettings;
use crate::domain::{
    CallbackAudit, Order, OrderId, OrderNote, OrderStatus, PaymentInit, PaymentStatus, Settlement,
};
use crate::ports::{
    Notice, OrderStore, PendingPayment, PendingPaymentStore, RepositoryError, RepositoryResult,
    Storefront,
};

#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify<F>(&self, id: OrderId, f: F) -> RepositoryResult<()>
    where
        F: FnOnce(&mut Order) + Send,
    {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        f(order);
        order.updated_at = Utc::now();
        Ok(())
    }
}

fn push_note(order: &mut Order, note: &str) {
    order.notes.push(OrderNote {
        note: note.to_string(),
        created_at: Utc::now(),
    });
}

fn apply_audit(order: &mut Order, audit: CallbackAudit) {
    order.payment.callback_payload = Some(audit.payload);
    order.payment.callback_received_at = Some(audit.received_at);
    order.payment.last_verdict = Some(audit.verdict);
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find(&self, id: OrderId) -> RepositoryResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn insert(&self, order: &Order) -> RepositoryResult<()> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        note: Option<&str>,
    ) -> RepositoryResult<()> {
        self.modify(id, |order| {
            order.status = status;
            if let Some(note) = note {
                push_note(order, note);
            }
        })
        .await
    }

    async fn add_note(&self, id: OrderId, note: &str) -> RepositoryResult<()> {
        self.modify(id, |order| push_note(order, note)).await
    }

    async fn attach_payment(
        &self,
        id: OrderId,
        init: PaymentInit,
        note: &str,
    ) -> RepositoryResult<()> {
        self.modify(id, |order| {
            order.status = OrderStatus::Pending;
            order.payment.code_for_hash = Some(init.code_for_hash);
            order.payment.payment_url = Some(init.payment_url);
            order.payment.payment_response = Some(init.response);
            order.payment.payment_created_at = Some(init.created_at);
            order.payment.payment_status = PaymentStatus::Unset;
            order.payment.trx_code = None;
            push_note(order, note);
        })
        .await
    }

    async fn record_callback(&self, id: OrderId, audit: CallbackAudit) -> RepositoryResult<()> {
        self.modify(id, |order| apply_audit(order, audit)).await
    }

    async fn settle(&self, id: OrderId, settlement: Settlement) -> RepositoryResult<bool> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        if order.payment.payment_status.is_settled() {
            return Ok(false);
        }

        order.payment.payment_status = settlement.payment_status;
        order.status = settlement.order_status;
        if settlement.trx_code.is_some() {
            order.payment.trx_code = settlement.trx_code;
        }
        apply_audit(order, settlement.audit);
        push_note(order, &settlement.note);
        order.updated_at = Utc::now();
        Ok(true)
    }
}

/// Sandbox sessions with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryPendingStore {
    entries: Mutex<HashMap<String, (PendingPayment, Instant)>>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingPaymentStore for MemoryPendingStore {
    async fn put(
        &self,
        code: &str,
        payment: &PendingPayment,
        ttl: Duration,
    ) -> RepositoryResult<()> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(code.to_string(), (payment.clone(), now + ttl));
        Ok(())
    }

    async fn get(&self, code: &str) -> RepositoryResult<Option<PendingPayment>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(code)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(payment, _)| payment.clone()))
    }

    async fn take(&self, code: &str) -> RepositoryResult<Option<PendingPayment>> {
        let mut entries = self.entries.lock().await;
        Ok(entries
            .remove(code)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(payment, _)| payment))
    }
}

/// Storefront that records side effects instead of rendering a shop.
#[derive(Debug)]
pub struct MemoryStorefront {
    settings: StorefrontSettings,
    notices: Mutex<Vec<Notice>>,
    emptied_carts: Mutex<Vec<OrderId>>,
}

impl MemoryStorefront {
    pub fn new(settings: StorefrontSettings) -> Self {
        Self {
            settings,
            notices: Mutex::new(Vec::new()),
            emptied_carts: Mutex::new(Vec::new()),
        }
    }

    pub async fn notices(&self) -> Vec<Notice> {
        self.notices.lock().await.clone()
    }

    pub async fn emptied_carts(&self) -> Vec<OrderId> {
        self.emptied_carts.lock().await.clone()
    }
}

#[async_trait]
impl Storefront for MemoryStorefront {
    async fn empty_cart(&self, order: &Order) {
        self.emptied_carts.lock().await.push(order.id);
    }

    async fn add_notice(&self, notice: Notice) {
        self.notices.lock().await.push(notice);
    }

    fn return_url(&self, order: &Order) -> String {
        match url::Url::parse(&self.settings.confirmation_url) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .append_pair("order_id", &order.id.to_string())
                    .append_pair("key", &order.order_key);
                url.to_string()
            }
            Err(_) => self.settings.confirmation_url.clone(),
        }
    }

    fn checkout_url(&self) -> String {
        self.settings.checkout_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::hash::HashVerdict;
    use crate::ports::NoticeLevel;
    use bigdecimal::BigDecimal;
    use serde_json::json;

    fn order(id: OrderId) -> Order {
        Order::new(
            id,
            "wc_order_test".to_string(),
            BigDecimal::from(20),
            "GEL".to_string(),
            Default::default(),
        )
    }

    fn settlement(status: PaymentStatus) -> Settlement {
        Settlement {
            payment_status: status,
            order_status: if status == PaymentStatus::Success {
                OrderStatus::Completed
            } else {
                OrderStatus::Failed
            },
            trx_code: Some("TRX-1".to_string()),
            note: "settled".to_string(),
            audit: CallbackAudit {
                payload: json!({ "resultCode": "Success" }),
                received_at: Utc::now(),
                verdict: HashVerdict::Success,
            },
        }
    }

    fn pending() -> PendingPayment {
        PendingPayment {
            amount: 12.5,
            currency: "GEL".to_string(),
            other_trx_code: "ORDER-1".to_string(),
            redirect_url: "https://shop.example/callback".to_string(),
            dealer_code: "D1".to_string(),
            code_for_hash: "CODE".to_string(),
        }
    }

    #[tokio::test]
    async fn test_settle_only_once() {
        let store = MemoryOrderStore::new();
        store.insert(&order(1)).await.unwrap();

        assert!(store.settle(1, settlement(PaymentStatus::Success)).await.unwrap());
        assert!(!store.settle(1, settlement(PaymentStatus::Failed)).await.unwrap());

        let stored = store.find(1).await.unwrap().unwrap();
        assert_eq!(stored.payment.payment_status, PaymentStatus::Success);
        assert_eq!(stored.status, OrderStatus::Completed);
        assert_eq!(stored.notes.len(), 1);
    }

    #[tokio::test]
    async fn test_attach_payment_resets_outcome() {
        let store = MemoryOrderStore::new();
        store.insert(&order(2)).await.unwrap();
        store.settle(2, settlement(PaymentStatus::Failed)).await.unwrap();

        store
            .attach_payment(
                2,
                PaymentInit {
                    code_for_hash: "NEW".to_string(),
                    payment_url: "https://pay.example".to_string(),
                    response: json!({}),
                    created_at: Utc::now(),
                },
                "initiated",
            )
            .await
            .unwrap();

        let stored = store.find(2).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.payment.payment_status, PaymentStatus::Unset);
        assert_eq!(stored.payment.code_for_hash.as_deref(), Some("NEW"));
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let store = MemoryOrderStore::new();
        let err = store.add_note(99, "note").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_pending_take_is_single_use() {
        let store = MemoryPendingStore::new();
        store.put("abc", &pending(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get("abc").await.unwrap(), Some(pending()));
        assert_eq!(store.take("abc").await.unwrap(), Some(pending()));
        assert_eq!(store.take("abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_pending_entries_expire() {
        let store = MemoryPendingStore::new();
        store.put("abc", &pending(), Duration::ZERO).await.unwrap();
        assert_eq!(store.get("abc").await.unwrap(), None);
        assert_eq!(store.take("abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_storefront_return_url_carries_order_key() {
        let storefront = MemoryStorefront::new(StorefrontSettings {
            checkout_url: "https://shop.example/checkout".to_string(),
            confirmation_url: "https://shop.example/checkout/order-received".to_string(),
        });
        let url = storefront.return_url(&order(7));
        assert_eq!(
            url,
            "https://shop.example/checkout/order-received?order_id=7&key=wc_order_test"
        );

        storefront
            .add_notice(Notice {
                level: NoticeLevel::Error,
                message: "declined".to_string(),
            })
            .await;
        assert_eq!(storefront.notices().await.len(), 1);
    }
}
