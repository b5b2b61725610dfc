// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token validation.
//!
//! A token moves from unvalidated to exactly one terminal state:
//!
//! ```text
//! parse ──► resolve key ──► verify signature ──► exp / nbf ──► claims ──► Validated
//!   │            │                 │                  │           │
//! Malformed  KeyUnresolvable   BadSignature   Expired/NotYetValid  MissingClaim/InvalidClaim
//! ```
//!
//! The verification algorithm comes from the resolved key, never from the
//! token header alone. No step is retried here; a transient key set outage is
//! reported as such so the caller can decide.

use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Header, Validation};
use serde_json::{Map, Value};

use super::claims::{integer_claim, ClaimError, Claims, Identity, TokenUse};
use super::jwks::{KeySetCache, ResolveError, SigningKey, UserPool};

/// Why a token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Not a structurally valid JWT.
    #[error("token is malformed")]
    Malformed,

    /// No key able to verify the token (unknown `kid` or key set outage).
    #[error("token signing key could not be resolved: {0}")]
    KeyUnresolvable(#[from] ResolveError),

    #[error("token signature is invalid")]
    BadSignature,

    /// `exp` absent, or not after the current time.
    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token is missing required claim `{0}`")]
    MissingClaim(&'static str),

    #[error("token claim `{0}` is invalid")]
    InvalidClaim(&'static str),
}

impl ValidationError {
    /// Only a key set outage may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, ValidationError::KeyUnresolvable(e) if e.is_transient())
    }
}

impl From<ClaimError> for ValidationError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::Malformed(_) => ValidationError::Malformed,
            ClaimError::Missing("exp") => ValidationError::Expired,
            ClaimError::Missing(claim) => ValidationError::MissingClaim(claim),
            ClaimError::Invalid(claim) => ValidationError::InvalidClaim(claim),
        }
    }
}

/// A token that passed every check.
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    pub identity: Identity,
    pub claims: Claims,
}

/// Validates Cognito-issued JWTs against the pool's key set.
pub struct TokenValidator {
    keys: Arc<KeySetCache>,
    client_id: Option<String>,
    leeway: i64,
}

impl TokenValidator {
    pub fn new(keys: Arc<KeySetCache>) -> Self {
        Self {
            keys,
            client_id: None,
            leeway: 0,
        }
    }

    /// Require tokens to be issued for this app client.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Clock skew tolerance applied to `exp` and `nbf`.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway = i64::from(seconds);
        self
    }

    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        &self.keys
    }

    /// Validate `token` for `pool` at Unix time `now`.
    pub async fn validate(
        &self,
        token: &str,
        pool: &UserPool,
        now: i64,
    ) -> Result<ValidatedToken, ValidationError> {
        let header = parse_unverified(token)?;

        let kid = header
            .kid
            .as_deref()
            .ok_or(ValidationError::KeyUnresolvable(ResolveError::MissingKeyId))?;
        let key = self.keys.resolve(pool, kid).await?;

        let payload = verify_signature(token, &key)?;

        let exp = integer_claim(&payload, "exp")?.ok_or(ValidationError::Expired)?;
        if exp.saturating_add(self.leeway) <= now {
            return Err(ValidationError::Expired);
        }
        if let Some(nbf) = integer_claim(&payload, "nbf")? {
            if now.saturating_add(self.leeway) < nbf {
                return Err(ValidationError::NotYetValid);
            }
        }

        let claims = Claims::from_payload(payload)?;
        self.check_issuer(&claims, pool)?;
        self.check_client(&claims)?;

        Ok(ValidatedToken {
            identity: Identity::from_claims(&claims),
            claims,
        })
    }

    fn check_issuer(&self, claims: &Claims, pool: &UserPool) -> Result<(), ValidationError> {
        match claims.iss.as_deref() {
            None => Err(ValidationError::MissingClaim("iss")),
            Some(iss) if iss == pool.issuer() => Ok(()),
            Some(_) => Err(ValidationError::InvalidClaim("iss")),
        }
    }

    fn check_client(&self, claims: &Claims) -> Result<(), ValidationError> {
        let Some(expected) = self.client_id.as_deref() else {
            return Ok(());
        };

        let by_client_id = claims.client_id.as_deref() == Some(expected);
        let by_audience = claims.aud.iter().any(|aud| aud == expected);
        let matches = match claims.token_use {
            Some(TokenUse::Access) => by_client_id,
            Some(TokenUse::Id) => by_audience,
            None => by_client_id || by_audience,
        };

        if matches {
            Ok(())
        } else {
            Err(ValidationError::InvalidClaim("client_id"))
        }
    }
}

/// Check the three-segment structure and decode the header and payload
/// without trusting either.
fn parse_unverified(token: &str) -> Result<Header, ValidationError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, signature] = segments.as_slice() else {
        return Err(ValidationError::Malformed);
    };
    if signature.is_empty() {
        return Err(ValidationError::Malformed);
    }

    let header = decode_header(token).map_err(|_| ValidationError::Malformed)?;

    let payload = Base64UrlUnpadded::decode_vec(payload).map_err(|_| ValidationError::Malformed)?;
    serde_json::from_slice::<Map<String, Value>>(&payload)
        .map_err(|_| ValidationError::Malformed)?;

    Ok(header)
}

/// Verify the signature with the key's own algorithm and return the payload.
fn verify_signature(token: &str, key: &SigningKey) -> Result<Map<String, Value>, ValidationError> {
    let mut validation = Validation::new(key.algorithm());
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Map<String, Value>>(token, key.decoding_key(), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => ValidationError::Malformed,
            _ => ValidationError::BadSignature,
        })
}
