// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::middleware::bearer_token;
use crate::auth::{Auth, Identity, TokenUse};
use crate::error::ApiError;
use crate::providers::UserProfile;
use crate::state::AppState;

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// User's canonical ID (Cognito username)
    pub user_id: String,
    /// Stable user UUID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_use: Option<TokenUse>,
}

impl From<Identity> for UserMeResponse {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.user_id,
            subject: identity.subject,
            groups: identity.groups,
            token_use: identity.token_use,
        }
    }
}

/// Get the current authenticated user's information.
///
/// Answered from the validated token alone; no provider call is made.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 503, description = "Signing keys temporarily unavailable"),
    )
)]
pub async fn get_current_user(Auth(identity): Auth) -> Json<UserMeResponse> {
    Json(identity.into())
}

/// Get the profile attributes of the current user.
///
/// Requires an access token, which is forwarded to the identity provider.
#[utoipa::path(
    get,
    path = "/v1/users/me/profile",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Profile attributes", body = UserProfile),
        (status = 401, description = "Unauthorized or not an access token"),
    )
)]
pub async fn get_profile(
    Auth(identity): Auth,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, ApiError> {
    if identity.token_use == Some(TokenUse::Id) {
        return Err(ApiError::unauthorized("An access token is required"));
    }

    let access_token = bearer_token(&headers).map_err(|e| ApiError::unauthorized(e.public_message()))?;
    let profile = state.provider.get_user(access_token).await?;

    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_me_response_from_identity() {
        let identity = Identity {
            user_id: "alice".to_string(),
            subject: Some("5d1e8a3c".to_string()),
            groups: vec!["members".to_string()],
            token_use: Some(TokenUse::Access),
            expires_at: 0,
        };

        let response: UserMeResponse = identity.into();
        assert_eq!(response.user_id, "alice");
        assert_eq!(response.subject.as_deref(), Some("5d1e8a3c"));
        assert_eq!(response.groups, vec!["members"]);
    }
}
