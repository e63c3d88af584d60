//! API routes
//!
//! One nested router per project scope; resource segments may carry an
//! `:action` suffix (`orders:publish`, `orders-sub:pull`), which Axum
//! captures as part of the segment and the handlers dispatch on.

pub mod subscriptions;
pub mod topics;

use std::any::Any;

use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, middleware};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::guard;
use crate::state::AppState;

/// Build the complete API router.
pub fn build_router(state: AppState) -> Router {
    let project_routes = Router::new()
        .route("/topics", get(topics::list))
        .route(
            "/topics/{topic}",
            get(topics::get_dispatch)
                .put(topics::put_dispatch)
                .post(topics::post_dispatch)
                .delete(topics::delete_dispatch),
        )
        .route("/subscriptions", get(subscriptions::list))
        .route(
            "/subscriptions/{subscription}",
            get(subscriptions::get_dispatch)
                .put(subscriptions::put_dispatch)
                .post(subscriptions::post_dispatch)
                .delete(subscriptions::delete_dispatch),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::context,
        ));

    Router::new()
        .nest("/v1/projects/{project}", project_routes)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A panicking handler degrades to the same 500 envelope as every other
/// error; the panic never reaches other request tasks.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<&str>()
        .copied()
        .map(str::to_owned)
        .or_else(|| err.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "opaque panic payload".to_string());
    tracing::error!(panic = %detail, "request handler panicked");

    ApiError::internal("internal server error").into_response()
}

/// Split a captured resource segment into its name and optional action.
pub(crate) fn split_resource(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once(':') {
        Some((name, action)) => (name, Some(action)),
        None => (raw, None),
    }
}
