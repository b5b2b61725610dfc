// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity provider integration.
//!
//! The account lifecycle (sign-up, sign-in, confirmation, password reset,
//! token refresh) is delegated to a remote identity provider behind the
//! [`IdentityProvider`] trait. Failures come back as [`ProviderError`] and
//! are turned into client-safe [`DomainError`]s by [`normalize_error`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

pub mod cognito;
pub mod normalize;

pub use cognito::CognitoClient;
pub use normalize::{normalize, normalize_error, DomainError, DomainErrorKind, ProviderErrorCode};

/// A single user attribute (`email`, `given_name`, `custom:*`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAttribute {
    pub name: String,
    pub value: String,
}

impl UserAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub username: String,
    pub password: String,
    pub attributes: Vec<UserAttribute>,
}

/// Where a confirmation or reset code was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CodeDelivery {
    /// Masked destination (e.g. `a***@e***.com`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// `EMAIL` or `SMS`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    /// Attribute the code was sent to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    /// Whether the account is usable without a confirmation code
    pub user_confirmed: bool,
    /// Stable user UUID assigned by the provider
    pub user_sub: Option<String>,
    pub delivery: Option<CodeDelivery>,
}

/// Tokens issued on sign-in or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AuthTokens {
    pub id_token: String,
    pub access_token: String,
    /// Only issued on sign-in; refresh keeps the existing refresh token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
    pub token_type: String,
}

/// Profile attributes of the token owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserProfile {
    pub username: String,
    pub attributes: BTreeMap<String, String>,
}

/// Failure of a provider call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The provider rejected the call with an error code.
    #[error("identity provider returned {code}: {message}")]
    Service {
        code: ProviderErrorCode,
        message: String,
    },

    /// Sign-in needs another step (MFA, new password) that this service does not drive.
    #[error("identity provider requires the {0} challenge")]
    Challenge(String),

    #[error("identity provider request failed: {0}")]
    Transport(String),

    #[error("identity provider response was invalid: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Report an unknown user as rejected credentials, so sign-in and refresh
    /// answers do not reveal whether an account exists.
    pub fn mask_unknown_user(self) -> Self {
        match self {
            ProviderError::Service {
                code: ProviderErrorCode::UserNotFound,
                message,
            } => ProviderError::Service {
                code: ProviderErrorCode::NotAuthorized,
                message,
            },
            other => other,
        }
    }
}

/// Remote identity provider operations.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome, ProviderError>;

    /// Username/password sign-in.
    async fn initiate_auth(&self, username: &str, password: &str)
        -> Result<AuthTokens, ProviderError>;

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), ProviderError>;

    async fn forgot_password(&self, username: &str) -> Result<Option<CodeDelivery>, ProviderError>;

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), ProviderError>;

    /// Exchange a refresh token for new tokens. `username` is needed when
    /// the app client has a secret.
    async fn refresh(
        &self,
        refresh_token: &str,
        username: Option<&str>,
    ) -> Result<AuthTokens, ProviderError>;

    /// Profile of the owner of `access_token`.
    async fn get_user(&self, access_token: &str) -> Result<UserProfile, ProviderError>;

    /// Whether [`refresh`](Self::refresh) must be given the username.
    fn refresh_needs_username(&self) -> bool {
        false
    }
}
