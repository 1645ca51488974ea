//! Authentication Errors
//! Mission: One taxonomy for every way a caller can fail to get in

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Why a presented token was refused. Logged, never sent to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    BadSignature,
    Expired,
    WrongIssuer,
    UnknownAccount,
}

impl std::fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenRejection::Malformed => write!(f, "malformed"),
            TokenRejection::BadSignature => write!(f, "bad signature"),
            TokenRejection::Expired => write!(f, "expired"),
            TokenRejection::WrongIssuer => write!(f, "wrong issuer"),
            TokenRejection::UnknownAccount => write!(f, "unknown account"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown login or wrong secret; the two are deliberately the same variant.
    #[error("authentication failed")]
    InvalidCredentials,

    #[error("missing bearer credential")]
    MissingCredential,

    #[error("invalid token: {0}")]
    InvalidToken(TokenRejection),

    /// Fatal configuration fault: the signing primitive cannot run.
    #[error("token signing failed: {0}")]
    TokenSigning(String),

    #[error("credential store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// True for failures caused by what the caller presented, as opposed to
    /// faults on our side.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::MissingCredential
                | AuthError::InvalidToken(_)
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid login or password").into_response()
            }
            AuthError::MissingCredential | AuthError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                "Unauthorized",
            )
                .into_response(),
            AuthError::TokenSigning(_) | AuthError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AuthError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_gate_rejections_are_indistinguishable() {
        let missing = body_of(AuthError::MissingCredential).await;
        let expired = body_of(AuthError::InvalidToken(TokenRejection::Expired)).await;
        let forged = body_of(AuthError::InvalidToken(TokenRejection::BadSignature)).await;

        assert_eq!(missing.0, StatusCode::UNAUTHORIZED);
        assert_eq!(missing, expired);
        assert_eq!(expired, forged);
    }

    #[test]
    fn test_gate_rejection_carries_challenge() {
        let response = AuthError::MissingCredential.into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[tokio::test]
    async fn test_internal_faults_hide_details() {
        let (status, body) =
            body_of(AuthError::Store(anyhow::anyhow!("disk on fire at /var/db"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("/var/db"));

        let (status, _) = body_of(AuthError::TokenSigning("bad key".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unauthorized_classification() {
        assert!(AuthError::InvalidCredentials.is_unauthorized());
        assert!(AuthError::MissingCredential.is_unauthorized());
        assert!(AuthError::InvalidToken(TokenRejection::Malformed).is_unauthorized());
        assert!(!AuthError::TokenSigning("x".into()).is_unauthorized());
    }
}
