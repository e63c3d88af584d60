//! Courier authorization pipeline
//!
//! Three gates run in a fixed order on every protected request:
//!
//! 1. [`authenticate`]: opaque bearer token to user identity plus the roles
//!    that user holds within the target project. No roles means 401.
//! 2. [`authorize`]: the user's roles against the route-policy table kept
//!    in the store. No intersection means 403.
//! 3. [`per_resource`]: for publish and pull, the optional per-resource ACL
//!    membership check. Denial is 403, never 404: existence leaks only to
//!    roles that already passed gate 2.
//!
//! The gates are plain functions over `&dyn Store` so the HTTP middleware,
//! the handlers, and the tests call the exact same code.

mod error;

pub use error::{AuthError, Result};

use courier_store::{AclResource, Store};

/// The publisher role name. A user whose only role this is must also clear
/// the topic ACL when per-resource enforcement is on.
pub const ROLE_PUBLISHER: &str = "publisher";

/// The consumer role name, the subscription-side counterpart.
pub const ROLE_CONSUMER: &str = "consumer";

/// An authenticated caller: who they are and what they may do in the
/// project the request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub roles: Vec<String>,
    pub project_uuid: String,
}

/// Resolve a project name and bearer token to an [`Identity`].
///
/// Returns `None` when the project is unknown, the token is unknown, or the
/// user holds no roles in the project; the surface maps all three to 401
/// without distinguishing them.
pub async fn authenticate(
    store: &dyn Store,
    project_name: &str,
    token: &str,
) -> Option<Identity> {
    let project = store
        .query_projects("", project_name)
        .await
        .ok()?
        .into_iter()
        .next()?;

    let (roles, user) = store.get_user_roles(&project.uuid, token).await;
    if roles.is_empty() {
        return None;
    }

    Some(Identity {
        user,
        roles,
        project_uuid: project.uuid,
    })
}

/// Whether any of `roles` is allowed to invoke the named route.
pub async fn authorize(store: &dyn Store, route: &str, roles: &[String]) -> bool {
    store.has_resource_roles(route, roles).await
}

/// Whether `user` appears in the resource's ACL.
pub async fn per_resource(
    store: &dyn Store,
    project_uuid: &str,
    resource: AclResource,
    name: &str,
    user: &str,
) -> bool {
    match store.query_acl(project_uuid, resource, name).await {
        Ok(acl) => acl.users.iter().any(|u| u == user),
        Err(_) => false,
    }
}

/// Validate that every name in `users` is a member of the project. Fails
/// with [`AuthError::UsersNotFound`] listing the absent names, so ACL writes
/// can report exactly what was wrong.
pub async fn are_valid_users(
    store: &dyn Store,
    project_uuid: &str,
    users: &[String],
) -> Result<()> {
    let (ok, missing) = store.has_users(project_uuid, users).await;
    if !ok {
        return Err(AuthError::UsersNotFound(missing));
    }
    Ok(())
}

/// True iff the role set is exactly the single publisher role. Users with
/// broader roles (admins) bypass the per-resource topic ACL.
pub fn is_publisher(roles: &[String]) -> bool {
    matches!(roles, [only] if only == ROLE_PUBLISHER)
}

/// True iff the role set is exactly the single consumer role.
pub fn is_consumer(roles: &[String]) -> bool {
    matches!(roles, [only] if only == ROLE_CONSUMER)
}
