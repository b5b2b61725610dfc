// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated callers.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(identity): Auth) -> impl IntoResponse {
//!     // identity.user_id is the validated username
//! }
//! ```

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use super::middleware::authenticate;
use super::{AuthError, Identity};
use crate::state::AuthConfig;

/// Extractor for the authenticated identity.
///
/// Reads the [`Identity`] stored by [`require_auth`](super::middleware::require_auth).
/// On routes the middleware does not cover, the bearer token is validated
/// here instead. Either way a handler taking `Auth` only runs for a request
/// whose token passed every check; there is no anonymous fallback.
///
/// # Example
///
/// ```rust,ignore
/// async fn get_current_user(Auth(identity): Auth) -> Json<UserMeResponse> {
///     Json(identity.into())
/// }
/// ```
pub struct Auth(pub Identity);

impl<S> FromRequestParts<S> for Auth
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // First check if middleware already set the identity
        if let Some(identity) = parts.extensions.get::<Identity>().cloned() {
            return Ok(Auth(identity));
        }

        let config = AuthConfig::from_ref(state);
        let validated = authenticate(&parts.headers, &config).await?;
        parts.extensions.insert(validated.identity.clone());
        Ok(Auth(validated.identity))
    }
}
