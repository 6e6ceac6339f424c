use axum::http::StatusCode;

/// Failure surfaced to the client as an `Error{Code, Message}` payload.
/// `message` is what the client sees; anything sensitive belongs in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "ERR_NOT_FOUND",
            format!("{} not found", what),
        )
    }

    pub fn no_route() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "ERR_NOT_FOUND",
            "no resource matches the request",
        )
    }

    pub fn access_denied() -> Self {
        Self::new(StatusCode::FORBIDDEN, "ERR_ACCESS_DENIED", "access denied")
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "ERR_INVALID_PARAMS", message)
    }

    pub fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "ERR_RATE_LIMITED",
            "too many requests",
        )
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_INTERNAL",
            "an unexpected error occurred",
        )
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.status.as_u16(), self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Store failures never leak their detail to the client.
impl From<arena_store::StoreError> for ApiError {
    fn from(err: arena_store::StoreError) -> Self {
        tracing::error!(error = %err, "gateway.store_failed");
        ApiError::internal()
    }
}

impl From<arena_auth::AuthError> for ApiError {
    fn from(err: arena_auth::AuthError) -> Self {
        match err.code {
            "ERR_AUTH_UNAVAILABLE" => {
                tracing::warn!(error = %err, "gateway.auth_unavailable");
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    err.code,
                    "authentication is temporarily unavailable",
                )
            }
            "ERR_AUTH_REQUIRED" => ApiError::new(StatusCode::UNAUTHORIZED, err.code, err.message),
            _ => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "ERR_AUTH_INVALID",
                "invalid credentials",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_become_generic_internal_errors() {
        let err: ApiError =
            arena_store::StoreError::Unavailable("connection refused to 10.0.0.5".to_string())
                .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "ERR_INTERNAL");
        assert!(!err.message.contains("10.0.0.5"));
    }

    #[test]
    fn auth_errors_map_to_401_or_503() {
        let required: ApiError = arena_auth::AuthError {
            code: "ERR_AUTH_REQUIRED",
            message: "missing Authorization header".to_string(),
        }
        .into();
        assert_eq!(required.status, StatusCode::UNAUTHORIZED);

        let invalid: ApiError = arena_auth::AuthError {
            code: "ERR_AUTH_INVALID",
            message: "JWT kid not found in JWKS".to_string(),
        }
        .into();
        assert_eq!(invalid.code, "ERR_AUTH_INVALID");
        assert_eq!(invalid.message, "invalid credentials");

        let unavailable: ApiError = arena_auth::AuthError {
            code: "ERR_AUTH_UNAVAILABLE",
            message: "failed to fetch JWKS".to_string(),
        }
        .into();
        assert_eq!(unavailable.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
