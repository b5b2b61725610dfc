// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{require_auth, Identity, TokenUse},
    models::{
        ConfirmForgotPasswordRequest, ConfirmRequest, ForgotPasswordRequest,
        ForgotPasswordResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest,
        RegisterResponse, TokenResponse,
    },
    providers::{AuthTokens, CodeDelivery, UserProfile},
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod users;

/// Build the application router.
///
/// `/v1/users/*` sits behind [`require_auth`]; lifecycle and health routes
/// are public. Swagger UI is only mounted when `dev` is set.
pub fn router(state: AppState, dev: bool) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/confirm", post(auth::confirm))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/forgot-password", post(auth::forgot_password))
        .route(
            "/confirm-forgot-password",
            post(auth::confirm_forgot_password),
        );

    let user_routes = Router::new()
        .route("/me", get(users::get_current_user))
        .route("/me/profile", get(users::get_profile))
        .route_layer(from_fn_with_state(
            state.auth_config.clone(),
            require_auth,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes);

    let mut app = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state);

    if dev {
        app = app.merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()));
    }

    app.layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::register,
        auth::confirm,
        auth::login,
        auth::refresh,
        auth::forgot_password,
        auth::confirm_forgot_password,
        users::get_current_user,
        users::get_profile
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            RegisterRequest,
            RegisterResponse,
            ConfirmRequest,
            LoginRequest,
            RefreshRequest,
            TokenResponse,
            AuthTokens,
            ForgotPasswordRequest,
            ForgotPasswordResponse,
            ConfirmForgotPasswordRequest,
            MessageResponse,
            CodeDelivery,
            UserProfile,
            Identity,
            TokenUse,
            users::UserMeResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Account lifecycle"),
        (name = "Users", description = "Authenticated user information")
    )
)]
pub struct ApiDoc;
