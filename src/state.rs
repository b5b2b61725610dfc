// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::{TokenValidator, UserPool};
use crate::providers::IdentityProvider;

/// What the auth middleware and extractor need.
#[derive(Clone)]
pub struct AuthConfig {
    /// Validator sharing the process-wide key set cache
    pub validator: Arc<TokenValidator>,
    /// Pool whose tokens are accepted
    pub pool: UserPool,
}

#[derive(Clone)]
pub struct AppState {
    pub auth_config: AuthConfig,
    pub provider: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(auth_config: AuthConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            auth_config,
            provider,
        }
    }
}

impl FromRef<AppState> for AuthConfig {
    fn from_ref(state: &AppState) -> Self {
        state.auth_config.clone()
    }
}
