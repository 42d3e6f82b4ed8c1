//! Axum HTTP API server.
//!
//! This crate provides:
//! - `POST /download`, `GET /status/:id` and `GET /downloads/:id/:filename`
//! - Health and readiness probes
//! - Per-IP rate limiting on submissions and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
