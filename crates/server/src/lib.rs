//! HTTP server for depot package repositories.
//!
//! This crate provides:
//! - The repository registry built from configuration
//! - The mutation engine that keeps indexes in step with uploads
//! - Authenticated upload/remove endpoints and static repository serving
//! - Prometheus metrics

pub mod auth;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod registry;
pub mod routes;
pub mod state;

pub use engine::MutationEngine;
pub use error::{ApiError, MutationError};
pub use registry::{RepositoryDescriptor, RepositoryRegistry};
pub use routes::create_router;
pub use state::AppState;
