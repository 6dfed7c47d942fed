//! Custom Axum extractors for request authentication.
//!
//! Provides `AdminAuth`, which verifies the `Hookrelay-Admin-Authorization`
//! header against the argon2 hash of the admin secret. Every admin route
//! takes it as an argument; a handler without it cannot be reached with
//! elevated privileges by construction.

use argon2::password_hash::PasswordHash;
use argon2::{Argon2, PasswordVerifier};
use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use hookrelay_sdk::signature::ADMIN_AUTH_HEADER;

use crate::state::AppState;

/// An Axum extractor that authenticates admin API requests.
///
/// # Header format
///
/// ```text
/// Hookrelay-Admin-Authorization: {plaintext_admin_secret}
/// ```
///
/// The plaintext value is verified against the argon2 hash loaded from
/// the config file.
pub struct AdminAuth;

/// Errors returned by the [`AdminAuth`] extractor.
#[derive(Debug, thiserror::Error)]
pub enum AdminAuthError {
    #[error("missing Hookrelay-Admin-Authorization header")]
    MissingHeader,
    #[error("invalid Hookrelay-Admin-Authorization header")]
    InvalidHeader,
    #[error("admin secret verification failed")]
    VerificationFailed,
    #[error("admin secret hash is malformed")]
    Misconfigured,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminAuthError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                "missing Hookrelay-Admin-Authorization header",
            ),
            AdminAuthError::InvalidHeader => (
                StatusCode::BAD_REQUEST,
                "invalid Hookrelay-Admin-Authorization header",
            ),
            AdminAuthError::VerificationFailed => {
                (StatusCode::UNAUTHORIZED, "admin secret verification failed")
            }
            AdminAuthError::Misconfigured => {
                tracing::error!("Admin secret hash in state is not a valid PHC string");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };
        (status, message).into_response()
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let candidate = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(AdminAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AdminAuthError::InvalidHeader)?;

        let hash = PasswordHash::new(&state.admin_secret_hash)
            .map_err(|_| AdminAuthError::Misconfigured)?;
        Argon2::default()
            .verify_password(candidate.as_bytes(), &hash)
            .map_err(|_| AdminAuthError::VerificationFailed)?;

        Ok(AdminAuth)
    }
}
