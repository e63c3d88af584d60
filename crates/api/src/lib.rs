//! Courier HTTP API
//!
//! The REST surface over the messaging services. Built on Axum; routes live
//! under `/v1/projects/{project}` and every request authenticates with an
//! opaque `?key=<token>` credential.
//!
//! # Middleware order
//!
//! Every protected route runs, in order: path-variable validation (400),
//! authentication (401), route-policy authorization (403), then the
//! handler. Publish and pull additionally check the per-resource ACL when
//! enforcement is enabled.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use courier_api::{AppState, build_router};
//!
//! let state = AppState::new(store, broker, manager);
//! let app = build_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod guard;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, Result};
pub use routes::build_router;
pub use state::AppState;
