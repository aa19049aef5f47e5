//! API key authentication and per-route permissions
//!
//! Every guarded route requires an `X-API-Key` header naming a stored key
//! that holds the route's permission. The resolved [`Caller`] is attached to
//! the request as an extension for the handler.

use crate::error::Error;
use crate::keys::KeyRegistry;
use crate::types::Caller;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Header carrying the credential
pub const API_KEY_HEADER: &str = "x-api-key";

/// Middleware state: where keys live and what the route requires
#[derive(Clone, Debug)]
pub struct PermissionGuard {
    keys: KeyRegistry,
    permission: &'static str,
}

impl PermissionGuard {
    /// Guard requiring `permission`
    pub fn new(keys: KeyRegistry, permission: &'static str) -> Self {
        Self { keys, permission }
    }
}

/// Authentication middleware enforcing a [`PermissionGuard`]
///
/// # Returns
///
/// - 401 if the header is missing or the key is unknown
/// - 403 if the key lacks the permission
/// - the handler's response otherwise
///
/// # Examples
///
/// ```no_run
/// use axum::{Router, middleware, routing::get};
/// use media_dl::api::auth::{PermissionGuard, require_permission};
/// use media_dl::keys::KeyRegistry;
/// use media_dl::store::DocumentStore;
///
/// let keys = KeyRegistry::new(DocumentStore::new("tasks.json", "keys.json"));
/// let router: Router = Router::new().route(
///     "/get_keys",
///     get(|| async { "ok" }).layer(middleware::from_fn_with_state(
///         PermissionGuard::new(keys, "get_keys"),
///         require_permission,
///     )),
/// );
/// ```
pub async fn require_permission(
    State(guard): State<PermissionGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let caller = match authenticate(&guard.keys, request.headers()).await {
        Ok(caller) => caller,
        Err(e) => return e.into_response(),
    };

    match guard.keys.has_permissions(&caller.name, &[guard.permission]).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(
                key_name = %caller.name,
                permission = guard.permission,
                "permission denied"
            );
            return Error::Forbidden("Insufficient permissions".into()).into_response();
        }
        Err(e) => return e.into_response(),
    }

    request.extensions_mut().insert(caller);
    next.run(request).await
}

/// Resolve the `X-API-Key` header to a caller
///
/// # Errors
///
/// [`Error::Unauthorized`] with "Missing X-API-Key header" or
/// "Invalid API key".
pub async fn authenticate(keys: &KeyRegistry, headers: &HeaderMap) -> crate::Result<Caller> {
    let Some(api_key) = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return Err(Error::Unauthorized("Missing X-API-Key header".into()));
    };

    match keys.resolve(api_key).await? {
        Some(name) => Ok(Caller {
            name,
            api_key: api_key.to_string(),
        }),
        None => Err(Error::Unauthorized("Invalid API key".into())),
    }
}
