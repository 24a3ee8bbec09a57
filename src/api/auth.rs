//! Caller identity as asserted by the authenticating proxy.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;

use super::error::ApiError;
use crate::domain::Role;
use crate::error::ServiceError;
use crate::roles::Identity;

/// Verified uid of the caller.
pub const UID_HEADER: &str = "x-auth-uid";
/// Role claim carried by the caller's token, if any.
pub const ROLE_HEADER: &str = "x-auth-role";

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uid = parts
            .headers
            .get(UID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| {
                debug!(uri = %parts.uri, "Request without identity");
                ApiError(ServiceError::Unauthenticated)
            })?;

        let mut identity = Identity::new(uid);
        // An unrecognised claim counts as no claim.
        if let Some(role) = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Role::parse(value.trim()))
        {
            identity = identity.with_role_claim(role);
        }
        Ok(identity)
    }
}
