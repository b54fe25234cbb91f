//! Postgres implementation of OrderStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{
    CallbackAudit, Customer, Order, OrderId, OrderNote, OrderStatus, PaymentInit, PaymentStatus,
    Settlement, TransactionRecord,
};
use crate::gateway::hash::HashVerdict;
use crate::ports::{OrderStore, RepositoryError, RepositoryResult};

/// Postgres-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_note(
        tx: &mut Transaction<'_, Postgres>,
        id: OrderId,
        note: &str,
    ) -> RepositoryResult<()> {
        sqlx::query("INSERT INTO order_notes (order_id, note) VALUES ($1, $2)")
            .bind(id)
            .bind(note)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    fn ensure_updated(id: OrderId, rows_affected: u64) -> RepositoryResult<()> {
        if rows_affected == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn find(&self, id: OrderId) -> RepositoryResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let notes = sqlx::query_as::<_, NoteRow>(
            "SELECT note, created_at FROM order_notes WHERE order_id = $1 ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.into_domain(notes).map(Some)
    }

    async fn insert(&self, order: &Order) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_key, status, total, currency, customer,
                payment_status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_key)
        .bind(order.status.as_str())
        .bind(&order.total)
        .bind(&order.currency)
        .bind(Json(&order.customer))
        .bind(order.payment.payment_status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        note: Option<&str>,
    ) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;
        Self::ensure_updated(id, result.rows_affected())?;

        if let Some(note) = note {
            Self::insert_note(&mut tx, id, note).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn add_note(&self, id: OrderId, note: &str) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE orders SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        Self::ensure_updated(id, result.rows_affected())?;

        Self::insert_note(&mut tx, id, note).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn attach_payment(
        &self,
        id: OrderId,
        init: PaymentInit,
        note: &str,
    ) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = 'pending',
                code_for_hash = $2,
                payment_url = $3,
                payment_response = $4,
                payment_created_at = $5,
                payment_status = 'unset',
                trx_code = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&init.code_for_hash)
        .bind(&init.payment_url)
        .bind(&init.response)
        .bind(init.created_at)
        .execute(&mut *tx)
        .await?;
        Self::ensure_updated(id, result.rows_affected())?;

        Self::insert_note(&mut tx, id, note).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_callback(&self, id: OrderId, audit: CallbackAudit) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                callback_payload = $2,
                callback_received_at = $3,
                last_verdict = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&audit.payload)
        .bind(audit.received_at)
        .bind(audit.verdict.as_str())
        .execute(&self.pool)
        .await?;

        Self::ensure_updated(id, result.rows_affected())
    }

    async fn settle(&self, id: OrderId, settlement: Settlement) -> RepositoryResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Conditional on the outcome still being unset, so concurrent
        // callbacks cannot both write one.
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                payment_status = $2,
                status = $3,
                trx_code = COALESCE($4, trx_code),
                callback_payload = $5,
                callback_received_at = $6,
                last_verdict = $7,
                updated_at = NOW()
            WHERE id = $1 AND payment_status = 'unset'
            "#,
        )
        .bind(id)
        .bind(settlement.payment_status.as_str())
        .bind(settlement.order_status.as_str())
        .bind(&settlement.trx_code)
        .bind(&settlement.audit.payload)
        .bind(settlement.audit.received_at)
        .bind(settlement.audit.verdict.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return match exists {
                Some(_) => Ok(false),
                None => Err(RepositoryError::NotFound(id.to_string())),
            };
        }

        Self::insert_note(&mut tx, id, &settlement.note).await?;
        tx.commit().await?;
        Ok(true)
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_key: String,
    status: String,
    total: bigdecimal::BigDecimal,
    currency: String,
    customer: Json<Customer>,
    code_for_hash: Option<String>,
    payment_url: Option<String>,
    payment_response: Option<serde_json::Value>,
    trx_code: Option<String>,
    payment_status: String,
    payment_created_at: Option<DateTime<Utc>>,
    callback_received_at: Option<DateTime<Utc>>,
    callback_payload: Option<serde_json::Value>,
    last_verdict: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct NoteRow {
    note: String,
    created_at: DateTime<Utc>,
}

fn parse_verdict(raw: &str) -> RepositoryResult<HashVerdict> {
    match raw {
        "success" => Ok(HashVerdict::Success),
        "failure" => Ok(HashVerdict::Failure),
        "invalid" => Ok(HashVerdict::Invalid),
        other => Err(RepositoryError::Corrupt(format!("unknown verdict: {}", other))),
    }
}

impl OrderRow {
    fn into_domain(self, notes: Vec<NoteRow>) -> RepositoryResult<Order> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(RepositoryError::Corrupt)?;
        let payment_status = self
            .payment_status
            .parse::<PaymentStatus>()
            .map_err(RepositoryError::Corrupt)?;
        let last_verdict = self.last_verdict.as_deref().map(parse_verdict).transpose()?;

        Ok(Order {
            id: self.id,
            order_key: self.order_key,
            status,
            total: self.total,
            currency: self.currency,
            customer: self.customer.0,
            payment: TransactionRecord {
                code_for_hash: self.code_for_hash,
                payment_url: self.payment_url,
                payment_response: self.payment_response,
                trx_code: self.trx_code,
                payment_status,
                payment_created_at: self.payment_created_at,
                callback_received_at: self.callback_received_at,
                callback_payload: self.callback_payload,
                last_verdict,
            },
            notes: notes
                .into_iter()
                .map(|n| OrderNote {
                    note: n.note,
                    created_at: n.created_at,
                })
                .collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
