use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::{
    AppState,
    auth::VerifierState,
    error::{ApiError, AuthError, AuthErrorKind},
};

/// PermissionGuard
///
/// Route-layer state naming the permission a protected endpoint requires, together
/// with the verifier that checks the caller's token.
#[derive(Clone)]
pub struct PermissionGuard {
    pub verifier: VerifierState,
    pub permission: &'static str,
}

impl PermissionGuard {
    pub fn new(verifier: VerifierState, permission: &'static str) -> Self {
        Self {
            verifier,
            permission,
        }
    }
}

/// require_permission
///
/// Runs the token verifier on the incoming request, then checks that the verified
/// permission set contains the guard's permission. On success the `VerifiedToken`
/// is inserted into the request extensions for the handler to extract.
///
/// Rejection: `AuthError` (401 for token failures, 403 `insufficient_scope`).
pub async fn require_permission(
    State(guard): State<PermissionGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = guard.verifier.verify_headers(request.headers())?;

    if !token.has_permission(guard.permission) {
        tracing::debug!(
            required = guard.permission,
            sub = ?token.payload.sub,
            "permission missing from token"
        );
        return Err(AuthError::new(AuthErrorKind::InsufficientScope, "Permission not found.").into());
    }

    request.extensions_mut().insert(token);
    Ok(next.run(request).await)
}

/// require
///
/// Wraps `endpoint` so it only runs for callers whose token grants `permission`.
pub fn require(
    endpoint: MethodRouter<AppState>,
    verifier: VerifierState,
    permission: &'static str,
) -> MethodRouter<AppState> {
    endpoint.route_layer(middleware::from_fn_with_state(
        PermissionGuard::new(verifier, permission),
        require_permission,
    ))
}
