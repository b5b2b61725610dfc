// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the account lifecycle endpoints. All types
//! derive `ToSchema` for the OpenAPI document.
//!
//! ## Model Categories
//!
//! - **Registration**: sign-up and email confirmation
//! - **Sessions**: sign-in and token refresh
//! - **Password reset**: forgot-password and its confirmation

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::providers::{AuthTokens, CodeDelivery};

/// Reject an empty or whitespace-only required field.
pub fn require<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(value)
}

// =============================================================================
// Registration
// =============================================================================

/// Request to create an account.
///
/// The username doubles as the account email address.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    /// Whether the account can sign in without confirming first
    pub user_confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_delivery: Option<CodeDelivery>,
}

/// Request to confirm an account with the emailed code.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConfirmRequest {
    pub username: String,
    pub code: String,
}

// =============================================================================
// Sessions
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
    /// Needed when the app client has a secret
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenResponse {
    pub message: String,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

// =============================================================================
// Password reset
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ForgotPasswordResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_delivery: Option<CodeDelivery>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConfirmForgotPasswordRequest {
    pub username: String,
    pub code: String,
    pub new_password: String,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
