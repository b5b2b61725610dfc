// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway rejections.
//!
//! The response body never says which check failed beyond a coarse code;
//! the detailed reason is only logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::validator::ValidationError;

/// Why the gateway refused to authenticate a request.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Authorization header is not `Bearer <token>`
    InvalidAuthHeader,
    /// Token failed validation
    Token(ValidationError),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
    error_code: &'static str,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::Token(ValidationError::Expired) => "token_expired",
            AuthError::Token(e) if e.is_transient() => "auth_unavailable",
            AuthError::Token(_) => "invalid_token",
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// Everything is 401 except a key set outage, which is 503 so clients
    /// know a retry may help.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Token(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "Authentication required",
            AuthError::InvalidAuthHeader => "Expected 'Authorization: Bearer <token>'",
            AuthError::Token(ValidationError::Expired) => "Access token has expired",
            AuthError::Token(e) if e.is_transient() => {
                "Authentication is temporarily unavailable, try again later"
            }
            AuthError::Token(_) => "Invalid access token",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::Token(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Token(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        AuthError::Token(err)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(AuthErrorBody {
            error: self.public_message(),
            error_code: self.error_code(),
        });
        (self.status_code(), body).into_response()
    }
}
