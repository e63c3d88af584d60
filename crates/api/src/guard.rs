//! Request gates
//!
//! The middleware half of the authorization chain: path-variable validation
//! and token authentication run here, before any handler; the route-policy
//! check runs at the top of each handler once the route name is known.

use axum::extract::{RawPathParams, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use courier_auth::Identity;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct AuthQuery {
    key: Option<String>,
}

/// Path variables (and the name half of `name:action` segments) must be
/// non-empty and drawn from `[A-Za-z0-9_-]`.
pub fn valid_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn token_from_query(query: Option<&str>) -> String {
    query
        .and_then(|q| serde_urlencoded::from_str::<AuthQuery>(q).ok())
        .and_then(|q| q.key)
        .unwrap_or_default()
}

/// Validate every path variable, authenticate the `?key=` token against the
/// project, and stash the resulting [`Identity`] in request extensions.
pub async fn context(
    State(state): State<AppState>,
    params: RawPathParams,
    mut request: Request,
    next: Next,
) -> Response {
    // sorted so the first offending variable is deterministic
    let mut vars: Vec<(&str, &str)> = params.iter().collect();
    vars.sort();

    let mut project = "";
    for &(key, value) in &vars {
        // a resource segment may carry a `:action` suffix; the action
        // keyword is matched during dispatch, only the name is validated
        let name = value.split(':').next().unwrap_or_default();
        if !valid_name(name) {
            return ApiError::invalid(format!("Invalid {key} name")).into_response();
        }
        if key == "project" {
            project = value;
        }
    }

    let token = token_from_query(request.uri().query());
    let Some(identity) =
        courier_auth::authenticate(state.store.as_ref(), project, &token).await
    else {
        return ApiError::Unauthorized.into_response();
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Route-policy authorization. 403 when none of the caller's roles is
/// allowed on the route.
pub async fn authorize(
    state: &AppState,
    identity: &Identity,
    route: &str,
) -> Result<(), ApiError> {
    if courier_auth::authorize(state.store.as_ref(), route, &identity.roles).await {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
