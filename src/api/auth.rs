// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account lifecycle endpoints.
//!
//! Each handler checks its required fields, forwards the call to the
//! identity provider and maps provider failures through the normalizer.
//! Passwords, codes and tokens are never logged.

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::error::ApiError;
use crate::models::{
    require, ConfirmForgotPasswordRequest, ConfirmRequest, ForgotPasswordRequest,
    ForgotPasswordResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest,
    RegisterResponse, TokenResponse,
};
use crate::providers::{ProviderError, SignUpRequest, UserAttribute};
use crate::state::AppState;

/// Create an account.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    tag = "Auth",
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Missing fields or password policy violation"),
        (status = 409, description = "Account already exists"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let username = require(&request.username, "username")?;
    require(&request.password, "password")?;

    let mut attributes = vec![UserAttribute::new("email", username)];
    if let Some(first_name) = request.first_name.as_deref().filter(|s| !s.trim().is_empty()) {
        attributes.push(UserAttribute::new("given_name", first_name));
    }
    if let Some(last_name) = request.last_name.as_deref().filter(|s| !s.trim().is_empty()) {
        attributes.push(UserAttribute::new("family_name", last_name));
    }

    let outcome = state
        .provider
        .sign_up(SignUpRequest {
            username: username.to_string(),
            password: request.password.clone(),
            attributes,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "You have successfully signed up".to_string(),
            user_confirmed: outcome.user_confirmed,
            user_sub: outcome.user_sub,
            code_delivery: outcome.delivery,
        }),
    ))
}

/// Confirm an account with the code sent at registration.
#[utoipa::path(
    post,
    path = "/v1/auth/confirm",
    request_body = ConfirmRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Account confirmed", body = MessageResponse),
        (status = 401, description = "Invalid or expired code"),
    )
)]
pub async fn confirm(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let username = require(&request.username, "username")?;
    let code = require(&request.code, "code")?;

    state.provider.confirm_sign_up(username, code).await?;
    info!("Account confirmed");

    Ok(Json(MessageResponse::new("Email verification successful")))
}

/// Sign in with username and password.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Signed in", body = TokenResponse),
        (status = 401, description = "Invalid credentials or unconfirmed account"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let username = require(&request.username, "username")?;
    let password = require(&request.password, "password")?;

    let tokens = state
        .provider
        .initiate_auth(username, password)
        .await
        .map_err(ProviderError::mask_unknown_user)?;

    Ok(Json(TokenResponse {
        message: "You have successfully signed in".to_string(),
        tokens,
    }))
}

/// Exchange a refresh token for new tokens.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Tokens refreshed", body = TokenResponse),
        (status = 400, description = "Missing refresh token, or username when the client has a secret"),
        (status = 401, description = "Refresh token invalid or expired"),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let refresh_token = require(&request.refresh_token, "refresh_token")?;
    let username = request.username.as_deref().filter(|s| !s.trim().is_empty());
    if username.is_none() && state.provider.refresh_needs_username() {
        return Err(ApiError::bad_request("username is required"));
    }

    let tokens = state
        .provider
        .refresh(refresh_token, username)
        .await
        .map_err(ProviderError::mask_unknown_user)?;

    Ok(Json(TokenResponse {
        message: "Token refreshed successfully".to_string(),
        tokens,
    }))
}

/// Start a password reset; a code is sent to the account.
#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Reset code sent", body = ForgotPasswordResponse),
        (status = 404, description = "User not found"),
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, ApiError> {
    let username = require(&request.username, "username")?;

    let delivery = state.provider.forgot_password(username).await?;

    Ok(Json(ForgotPasswordResponse {
        message: "Forgot password process initiated".to_string(),
        code_delivery: delivery,
    }))
}

/// Finish a password reset with the emailed code.
#[utoipa::path(
    post,
    path = "/v1/auth/confirm-forgot-password",
    request_body = ConfirmForgotPasswordRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Password policy violation"),
        (status = 401, description = "Invalid or expired code"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn confirm_forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ConfirmForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let username = require(&request.username, "username")?;
    let code = require(&request.code, "code")?;
    let new_password = require(&request.new_password, "new_password")?;

    state
        .provider
        .confirm_forgot_password(username, code, new_password)
        .await?;

    Ok(Json(MessageResponse::new("Password reset successfully")))
}
