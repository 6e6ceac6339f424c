pub mod config;
pub mod dispatch;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod mapping;
pub mod metrics;
pub mod rate_limit;
pub mod routing;
pub mod wire;
