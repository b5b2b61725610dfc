// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! This module turns a Cognito-issued bearer token into a request-scoped
//! [`Identity`].
//!
//! ## Auth Flow
//!
//! 1. Client signs in through `/v1/auth/login` and receives Cognito tokens
//! 2. Client sends `Authorization: Bearer <token>`
//! 3. Gateway:
//!    - Resolves the signing key from the pool's cached JWKS
//!    - Verifies the signature with the key's own algorithm
//!    - Checks expiry, not-before, issuer, token use and client
//!    - Extracts:
//!      - `cognito:username` → canonical `user_id`
//!      - `cognito:groups` → group memberships
//!
//! ## Security
//!
//! - Every failure is terminal; there is no anonymous fallback
//! - JWKS is only fetched over HTTPS
//! - JWKS is cached per pool with a TTL and a refresh cooldown, so
//!   unknown key IDs cannot cause a fetch storm
//! - Rejections carry a generic message; details go to the log only

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod validator;

pub use claims::{Claims, Identity, TokenUse};
pub use error::AuthError;
pub use extractor::Auth;
pub use jwks::{KeySetCache, UserPool};
pub use middleware::require_auth;
pub use validator::{TokenValidator, ValidatedToken, ValidationError};
