pub mod memory;
pub mod postgres_order_store;
pub mod redis_pending_store;

pub use memory::{MemoryOrderStore, MemoryPendingStore, MemoryStorefront};
pub use postgres_order_store::PostgresOrderStore;
pub use redis_pending_store::RedisPendingStore;
