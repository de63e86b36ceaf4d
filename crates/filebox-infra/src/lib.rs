//! Cross-cutting infrastructure for the filebox service: tracing setup and
//! HTTP middleware.

pub mod middleware;
pub mod telemetry;

pub use middleware::request_id::{request_id_middleware, RequestId};
pub use telemetry::init_telemetry;
