pub mod callback;
pub mod checkout;
pub mod locks;

pub use callback::{CallbackError, CallbackHandler, CallbackOutcome, CallbackParams};
pub use checkout::{CheckoutError, CheckoutResponse, CheckoutService};
pub use locks::KeyedLocks;
