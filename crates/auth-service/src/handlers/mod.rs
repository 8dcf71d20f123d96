//! HTTP request handlers for the auth service.

pub mod access;
pub mod health;
pub mod metrics;
pub mod user;

pub use access::check_write_access;
pub use health::health_check;
pub use metrics::metrics_handler;
pub use user::get_user;
