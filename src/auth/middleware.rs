// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Applied to a router subtree, [`require_auth`] validates the bearer token
//! before the handler runs and stores the resulting [`Identity`] and
//! [`Claims`] in the request extensions. Extensions live and die with the
//! request, so nothing leaks between requests.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/v1/users/me", get(users::get_current_user))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, warn};

use super::validator::ValidatedToken;
use super::{AuthError, Claims, Identity};
use crate::state::AuthConfig;

/// Authentication middleware function.
pub async fn require_auth(
    State(config): State<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(request.headers(), &config).await {
        Ok(ValidatedToken { identity, claims }) => {
            debug!(user_id = %identity.user_id, "Request authenticated");
            request.extensions_mut().insert(identity);
            request.extensions_mut().insert(Arc::new(claims));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Validate the bearer token carried by `headers`.
///
/// A missing or non-Bearer header is rejected before any token parsing or
/// key lookup happens.
pub async fn authenticate(
    headers: &HeaderMap,
    config: &AuthConfig,
) -> Result<ValidatedToken, AuthError> {
    let token = bearer_token(headers)?;
    let now = Utc::now().timestamp();

    config
        .validator
        .validate(token, &config.pool, now)
        .await
        .map_err(|e| {
            if e.is_transient() {
                warn!(pool = %config.pool, error = %e, "Token rejected: key set unavailable");
            } else {
                debug!(pool = %config.pool, error = %e, "Token rejected");
            }
            AuthError::Token(e)
        })
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidAuthHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Claims of the authenticated request, if the middleware ran.
pub fn request_claims(request: &Request) -> Option<Arc<Claims>> {
    request.extensions().get::<Arc<Claims>>().cloned()
}

/// Identity of the authenticated request, if the middleware ran.
pub fn request_identity(request: &Request) -> Option<&Identity> {
    request.extensions().get::<Identity>()
}
