//! Redis implementation of PendingPaymentStore. Sessions survive restarts and
//! are shared between instances.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::ports::{PendingPayment, PendingPaymentStore, RepositoryResult};

const PENDING_PREFIX: &str = "unitedpay:sandbox:";

#[derive(Clone)]
pub struct RedisPendingStore {
    redis_client: redis::Client,
}

impl RedisPendingStore {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        let redis_client = redis::Client::open(redis_url)?;
        Ok(Self { redis_client })
    }

    fn key(code: &str) -> String {
        format!("{}{}", PENDING_PREFIX, code)
    }
}

#[async_trait]
impl PendingPaymentStore for RedisPendingStore {
    async fn put(
        &self,
        code: &str,
        payment: &PendingPayment,
        ttl: Duration,
    ) -> RepositoryResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(payment)?;
        let _: () = conn
            .set_ex(Self::key(code), serialized, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn get(&self, code: &str) -> RepositoryResult<Option<PendingPayment>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let existing: Option<String> = conn.get(Self::key(code)).await?;
        existing
            .map(|value| serde_json::from_str(&value))
            .transpose()
            .map_err(Into::into)
    }

    async fn take(&self, code: &str) -> RepositoryResult<Option<PendingPayment>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        // GETDEL reads and deletes in one round trip.
        let existing: Option<String> = redis::cmd("GETDEL")
            .arg(Self::key(code))
            .query_async(&mut conn)
            .await?;
        existing
            .map(|value| serde_json::from_str(&value))
            .transpose()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced() {
        assert_eq!(RedisPendingStore::key("abc"), "unitedpay:sandbox:abc");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(RedisPendingStore::new("not a url").is_err());
    }
}
