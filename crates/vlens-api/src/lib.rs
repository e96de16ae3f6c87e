//! Axum HTTP API server.
//!
//! This crate provides:
//! - Raw-body uploads into the ingestion queue
//! - Submission status, cancellation and a status event stream
//! - Read and delete access to stored videos, with subtitle export
//! - Liveness, readiness and Prometheus endpoints

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
pub use state::{AppState, Services};
