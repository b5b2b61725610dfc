// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Auth Gateway - Bearer Token Authentication Service
//!
//! This crate verifies Cognito-issued bearer tokens against the user pool's
//! published signing keys and exposes the account lifecycle (sign-up,
//! sign-in, confirmation, password reset, refresh) over HTTP with a stable
//! error taxonomy.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Key set cache, token validation and identity propagation
//! - `providers` - Identity provider client and error normalization
//! - `config` - Environment configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
