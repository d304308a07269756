//! Identity extraction.
//!
//! Authentication itself happens upstream (session provider / auth proxy);
//! by the time a request reaches this service the proxy has stamped it with
//! the verified user id and role headers. This extractor only reads them.

use crate::errors::AppError;
use axum::{extract::FromRequestParts, http::StatusCode, http::request::Parts};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller of the current request.
#[derive(Clone, Copy, Debug)]
pub struct ActingUser {
    pub id: Uuid,

    /// True when the caller holds the admin role; privileged operations
    /// drop the owner-match filter and may name an explicit owner.
    pub privileged: bool,
}

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::new(StatusCode::UNAUTHORIZED, "missing x-user-id header")
            })?;
        let id = Uuid::parse_str(raw)
            .map_err(|_| AppError::new(StatusCode::UNAUTHORIZED, "x-user-id must be a UUID"))?;

        let privileged = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|role| role.eq_ignore_ascii_case("admin"));

        Ok(Self { id, privileged })
    }
}
