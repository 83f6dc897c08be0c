//! Payment-channel resource server.
//!
//! Thin actix-web layer over [`paychan`]: reads the `X-Signature` header,
//! runs the admission check, and maps the outcome onto HTTP.
//!
//! # Modules
//!
//! - [`config`]: environment configuration ([`ServerConfig`](config::ServerConfig))
//! - [`middleware`]: payment gate ([`require_channel_payment`])
//! - [`error`]: outcome to response mapping ([`GateError`](error::GateError))
//! - [`routes`]: the paid demo route, health, metrics and channel administration
//! - [`metrics`]: Prometheus counters for admissions and requests

pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use error::GateError;
pub use middleware::{claim_header, require_channel_payment};
pub use state::AppState;
