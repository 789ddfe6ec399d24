//! Request middleware wrapped around every route.

pub mod logging;
pub mod metrics;

pub use logging::RequestLogging;
pub use metrics::MetricsMiddleware;
