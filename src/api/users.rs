//! The caller's own profile record.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::error::ApiResult;
use super::AppState;
use crate::domain::{UserCreate, UserPatch, UserProfile};
use crate::error::ServiceError;
use crate::roles::Identity;

/// POST /users/me
///
/// Registration hook: creates the profile for a freshly authenticated uid.
pub async fn create_profile(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<Json<UserCreate>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let Json(profile) = payload?;
    state.users.create_user(identity.uid.clone(), profile).await?;
    Ok((StatusCode::CREATED, Json(own_profile(&state, &identity).await?)))
}

/// GET /users/me
pub async fn get_profile(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<UserProfile>> {
    Ok(Json(own_profile(&state, &identity).await?))
}

/// PATCH /users/me
pub async fn update_profile(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> ApiResult<Json<UserProfile>> {
    let Json(patch) = payload?;
    Ok(Json(state.users.update_user(identity.uid, patch).await?))
}

async fn own_profile(state: &AppState, identity: &Identity) -> Result<UserProfile, ServiceError> {
    state
        .users
        .get_user(identity.uid.clone())
        .await?
        .ok_or_else(|| ServiceError::user_not_found(&identity.uid))
}
