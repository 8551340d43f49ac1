use copydesk_content::ContentError;
use copydesk_revisions::RevisionError;
use copydesk_sessions::AuthError;
use copydesk_store::StoreError;

/// Error taxonomy at the request boundary.
///
/// Every failure is surfaced synchronously to the caller; there is no
/// automatic retry anywhere in the service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input; always user-correctable.
    #[error("{0}")]
    Validation(String),
    /// Missing, invalid, or expired session (or failed login).
    #[error("{0}")]
    Unauthenticated(String),
    /// Valid session, insufficient role.
    #[error("insufficient privileges")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Intentionally unimplemented in this local substitute.
    #[error("{0}")]
    Unsupported(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP-equivalent status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthenticated(_) => 401,
            Self::Unauthorized => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Unsupported(_) => 501,
            Self::Internal(_) => 500,
        }
    }

    pub fn missing_field(name: &str) -> Self {
        Self::Validation(format!("missing field: {name}"))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthenticated("invalid credentials".into()),
            AuthError::Unauthenticated => Self::Unauthenticated("missing or expired session".into()),
            AuthError::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::Conflict(_) => Self::Conflict(err.to_string()),
            ContentError::NotFound => Self::NotFound(err.to_string()),
            ContentError::Revision(RevisionError::NotFound { .. }) => {
                Self::NotFound(err.to_string())
            }
            ContentError::InvalidContent | ContentError::Page(_) => {
                Self::Validation(err.to_string())
            }
            ContentError::Revision(e) => Self::Internal(e.to_string()),
            ContentError::Store(e) => Self::Internal(e.to_string()),
            ContentError::Io(e) => Self::Internal(e.to_string()),
            ContentError::Json(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(ApiError::Validation("x".into()).status(), 400);
        assert_eq!(ApiError::Unauthenticated("x".into()).status(), 401);
        assert_eq!(ApiError::Unauthorized.status(), 403);
        assert_eq!(ApiError::NotFound("x".into()).status(), 404);
        assert_eq!(ApiError::Conflict("x".into()).status(), 409);
        assert_eq!(ApiError::Unsupported("x".into()).status(), 501);
        assert_eq!(ApiError::Internal("x".into()).status(), 500);
    }

    #[test]
    fn content_not_found_maps_to_404_with_message() {
        let err: ApiError = ContentError::NotFound.into();
        assert_eq!(err.status(), 404);
        assert_eq!(err.to_string(), "Content not found");
    }

    #[test]
    fn invalid_credentials_map_to_401() {
        let err: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(err.status(), 401);
    }
}
