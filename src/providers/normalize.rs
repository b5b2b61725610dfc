// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provider error normalization.
//!
//! Every provider error code is mapped through one static table to a
//! [`DomainError`] carrying a pre-authored message. Raw provider text is kept
//! as a diagnostic for logs and never reaches a response body.
//!
//! | Provider code | Kind | Status |
//! |---------------|------|--------|
//! | `UsernameExistsException`, `AliasExistsException` | Conflict | 409 |
//! | `InvalidPasswordException`, `InvalidParameterException` | BadRequest | 400 |
//! | `NotAuthorizedException`, `UserNotConfirmedException`, `PasswordResetRequiredException` | Unauthorized | 401 |
//! | `CodeMismatchException`, `ExpiredCodeException` | Unauthorized | 401 |
//! | `UserNotFoundException` | NotFound | 404 |
//! | `LimitExceededException`, `TooManyRequestsException`, `TooManyFailedAttemptsException` | RateLimited | 429 |
//! | anything else | ProviderError | 500 |

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::ProviderError;

/// Known provider error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    UsernameExists,
    AliasExists,
    InvalidPassword,
    InvalidParameter,
    NotAuthorized,
    UserNotConfirmed,
    PasswordResetRequired,
    CodeMismatch,
    ExpiredCode,
    UserNotFound,
    LimitExceeded,
    TooManyRequests,
    TooManyFailedAttempts,
    CodeDeliveryFailure,
    InternalError,
    ResourceNotFound,
    /// A code this service has no entry for.
    Unrecognized,
}

impl ProviderErrorCode {
    /// Parse a wire error type.
    ///
    /// Accepts the bare name (`UsernameExistsException`), the namespaced
    /// `__type` form (`com.amazonaws...#UsernameExistsException`) and the
    /// `x-amzn-ErrorType` header form (`UsernameExistsException:http://...`).
    pub fn from_type(raw: &str) -> Self {
        let name = raw.rsplit('#').next().unwrap_or(raw);
        let name = name.split(':').next().unwrap_or(name).trim();

        match name {
            "UsernameExistsException" => Self::UsernameExists,
            "AliasExistsException" => Self::AliasExists,
            "InvalidPasswordException" => Self::InvalidPassword,
            "InvalidParameterException" => Self::InvalidParameter,
            "NotAuthorizedException" => Self::NotAuthorized,
            "UserNotConfirmedException" => Self::UserNotConfirmed,
            "PasswordResetRequiredException" => Self::PasswordResetRequired,
            "CodeMismatchException" => Self::CodeMismatch,
            "ExpiredCodeException" => Self::ExpiredCode,
            "UserNotFoundException" => Self::UserNotFound,
            "LimitExceededException" => Self::LimitExceeded,
            "TooManyRequestsException" => Self::TooManyRequests,
            "TooManyFailedAttemptsException" => Self::TooManyFailedAttempts,
            "CodeDeliveryFailureException" => Self::CodeDeliveryFailure,
            "InternalErrorException" => Self::InternalError,
            "ResourceNotFoundException" => Self::ResourceNotFound,
            _ => Self::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsernameExists => "UsernameExistsException",
            Self::AliasExists => "AliasExistsException",
            Self::InvalidPassword => "InvalidPasswordException",
            Self::InvalidParameter => "InvalidParameterException",
            Self::NotAuthorized => "NotAuthorizedException",
            Self::UserNotConfirmed => "UserNotConfirmedException",
            Self::PasswordResetRequired => "PasswordResetRequiredException",
            Self::CodeMismatch => "CodeMismatchException",
            Self::ExpiredCode => "ExpiredCodeException",
            Self::UserNotFound => "UserNotFoundException",
            Self::LimitExceeded => "LimitExceededException",
            Self::TooManyRequests => "TooManyRequestsException",
            Self::TooManyFailedAttempts => "TooManyFailedAttemptsException",
            Self::CodeDeliveryFailure => "CodeDeliveryFailureException",
            Self::InternalError => "InternalErrorException",
            Self::ResourceNotFound => "ResourceNotFoundException",
            Self::Unrecognized => "Unrecognized",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainErrorKind {
    Conflict,
    BadRequest,
    Unauthorized,
    NotFound,
    RateLimited,
    ProviderError,
}

impl DomainErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Conflict => StatusCode::CONFLICT,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::ProviderError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::ProviderError => "provider_error",
        }
    }
}

/// A lifecycle failure safe to show to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainError {
    pub kind: DomainErrorKind,
    pub message: &'static str,
    /// Original provider detail, for logs only.
    pub diagnostic: Option<String>,
}

impl DomainError {
    pub fn new(kind: DomainErrorKind, message: &'static str) -> Self {
        Self {
            kind,
            message,
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.diagnostic {
            Some(diagnostic) => write!(f, "{} ({diagnostic})", self.message),
            None => f.write_str(self.message),
        }
    }
}

impl std::error::Error for DomainError {}

#[derive(Serialize)]
struct DomainErrorBody {
    error: &'static str,
    error_code: &'static str,
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let body = Json(DomainErrorBody {
            error: self.message,
            error_code: self.kind.error_code(),
        });
        (self.status(), body).into_response()
    }
}

const GENERIC_PROVIDER_MESSAGE: &str = "The request could not be completed, try again later";

/// Map a provider error code to its domain error.
pub fn normalize(code: ProviderErrorCode) -> DomainError {
    use DomainErrorKind as K;
    use ProviderErrorCode as C;

    let (kind, message) = match code {
        C::UsernameExists => (K::Conflict, "An account with the given username already exists"),
        C::AliasExists => (K::Conflict, "An account with the given email or phone number already exists"),
        C::InvalidPassword => (
            K::BadRequest,
            "Password must be at least 8 characters and include uppercase, lowercase, number and special characters",
        ),
        C::InvalidParameter => (K::BadRequest, "One or more request fields are invalid"),
        C::NotAuthorized => (K::Unauthorized, "The supplied credentials are not valid"),
        C::UserNotConfirmed => (K::Unauthorized, "Account is not confirmed"),
        C::PasswordResetRequired => (K::Unauthorized, "A password reset is required before signing in"),
        C::CodeMismatch => (K::Unauthorized, "Invalid verification code provided, please try again"),
        C::ExpiredCode => (K::Unauthorized, "Verification code has expired, please request a new one"),
        C::UserNotFound => (K::NotFound, "User not found"),
        C::LimitExceeded | C::TooManyRequests | C::TooManyFailedAttempts => {
            (K::RateLimited, "Too many attempts, try again later")
        }
        C::CodeDeliveryFailure
        | C::InternalError
        | C::ResourceNotFound
        | C::Unrecognized => (K::ProviderError, GENERIC_PROVIDER_MESSAGE),
    };

    DomainError::new(kind, message)
}

/// Normalize a failed provider call, keeping the raw detail as diagnostic.
pub fn normalize_error(error: &ProviderError) -> DomainError {
    match error {
        ProviderError::Service { code, .. } => normalize(*code).with_diagnostic(error.to_string()),
        ProviderError::Challenge(name) => DomainError::new(
            DomainErrorKind::Unauthorized,
            "Additional sign-in steps are required for this account",
        )
        .with_diagnostic(format!("challenge {name}")),
        ProviderError::Transport(_) | ProviderError::InvalidResponse(_) => {
            DomainError::new(DomainErrorKind::ProviderError, GENERIC_PROVIDER_MESSAGE)
                .with_diagnostic(error.to_string())
        }
    }
}
