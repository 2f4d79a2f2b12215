use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use ts_rs::TS;
use utoipa::ToSchema;

/// AuthErrorKind
///
/// The closed set of reasons a request can fail authorization. Every kind maps to a
/// stable machine-readable code so clients can tell, for example, an expired token
/// apart from one signed by an unknown key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    MissingHeader,
    InvalidHeader,
    InvalidToken,
    TokenExpired,
    InvalidClaims,
    InvalidPermissions,
    InsufficientScope,
}

impl AuthErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            AuthErrorKind::MissingHeader => "missing_header",
            AuthErrorKind::InvalidHeader => "invalid_header",
            AuthErrorKind::InvalidToken => "invalid_token",
            AuthErrorKind::TokenExpired => "token_expired",
            AuthErrorKind::InvalidClaims => "invalid_claims",
            AuthErrorKind::InvalidPermissions => "invalid_permissions",
            AuthErrorKind::InsufficientScope => "insufficient_scope",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthErrorKind::InsufficientScope => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// AuthError
///
/// Structured authorization failure raised by the token verifier or the permission
/// guard. Handlers never catch it; it is rendered by `ApiError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{description} ({})", .kind.code())]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub description: String,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

/// ApiError
///
/// The uniform failure type returned by every handler. Store and query failures are
/// classified into one of these variants at the handler boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,
    #[error("unprocessable")]
    Unprocessable,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Auth(e) => e.status(),
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (message, code) = match self {
            ApiError::Auth(e) => (e.description.clone(), Some(e.kind.code().to_string())),
            other => (other.to_string(), None),
        };
        ErrorBody {
            success: false,
            error: self.status().as_u16(),
            message,
            code,
        }
    }
}

/// ErrorBody
///
/// Wire shape of every error response: `{success: false, error, message}`.
/// Authorization failures also carry their short `code`.
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub success: bool,
    pub error: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub code: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Auth(e) = &self {
            tracing::debug!(code = e.kind.code(), "request rejected: {}", e.description);
        }
        (self.status(), Json(self.body())).into_response()
    }
}
