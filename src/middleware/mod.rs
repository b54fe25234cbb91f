pub mod ip_filter;
pub mod request_logger;

pub use ip_filter::{ClientIpResolver, IpFilterLayer};
pub use request_logger::{request_logger_middleware, RequestLogging};
