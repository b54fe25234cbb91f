pub mod order;

pub use order::{
    CallbackAudit, Customer, Order, OrderId, OrderNote, OrderStatus, PaymentInit, PaymentStatus,
    Settlement, TransactionRecord,
};
