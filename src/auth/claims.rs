// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and the authenticated identity derived from them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Claims consumed by the gateway itself; everything else lands in `extra`.
const EXP: &str = "exp";
const NBF: &str = "nbf";
const IAT: &str = "iat";
const ISS: &str = "iss";
const SUB: &str = "sub";
const AUD: &str = "aud";
const CLIENT_ID: &str = "client_id";
const TOKEN_USE: &str = "token_use";
const COGNITO_USERNAME: &str = "cognito:username";
const USERNAME: &str = "username";
const COGNITO_GROUPS: &str = "cognito:groups";

/// Cognito token kind (`token_use` claim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    /// Access token (carries `client_id` and `username`)
    Access,
    /// ID token (carries `aud` and `cognito:username`)
    Id,
}

/// Why a payload could not be turned into [`Claims`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    /// Claim present with the wrong JSON type.
    Malformed(&'static str),
    /// Required claim absent or empty.
    Missing(&'static str),
    /// Claim has a value the gateway does not accept.
    Invalid(&'static str),
}

/// Validated token claims.
///
/// The claims the gateway relies on are typed; provider-specific claims are
/// kept verbatim in `extra`.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    /// Username (`cognito:username`, `username`, or `sub`, in that order)
    pub username: String,

    /// Expiration timestamp
    pub exp: i64,

    /// Subject (stable user UUID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issuer (user pool URL)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Not before timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issued at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_use: Option<TokenUse>,

    /// App client ID (access tokens)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Audience (ID tokens)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aud: Vec<String>,

    /// Cognito group memberships
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    /// All other claims, untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Build claims from a decoded token payload.
    ///
    /// Only checks shape and presence; time-based checks belong to the
    /// validator.
    pub fn from_payload(mut payload: Map<String, Value>) -> Result<Self, ClaimError> {
        let exp = integer_claim(&payload, EXP)?.ok_or(ClaimError::Missing(EXP))?;
        let nbf = integer_claim(&payload, NBF)?;
        let iat = integer_claim(&payload, IAT)?;

        let username = [COGNITO_USERNAME, USERNAME, SUB]
            .into_iter()
            .find_map(|name| payload.get(name).and_then(Value::as_str))
            .filter(|name| !name.trim().is_empty())
            .map(str::to_string)
            .ok_or(ClaimError::Missing(USERNAME))?;

        let token_use = match string_claim(&payload, TOKEN_USE)? {
            None => None,
            Some("access") => Some(TokenUse::Access),
            Some("id") => Some(TokenUse::Id),
            Some(_) => return Err(ClaimError::Invalid(TOKEN_USE)),
        };

        let sub = string_claim(&payload, SUB)?.map(str::to_string);
        let iss = string_claim(&payload, ISS)?.map(str::to_string);
        let client_id = string_claim(&payload, CLIENT_ID)?.map(str::to_string);
        let aud = string_list_claim(&payload, AUD)?;
        let groups = string_list_claim(&payload, COGNITO_GROUPS)?;

        for name in [
            EXP,
            NBF,
            IAT,
            ISS,
            SUB,
            AUD,
            CLIENT_ID,
            TOKEN_USE,
            COGNITO_USERNAME,
            USERNAME,
            COGNITO_GROUPS,
        ] {
            payload.remove(name);
        }

        Ok(Self {
            username,
            exp,
            sub,
            iss,
            nbf,
            iat,
            token_use,
            client_id,
            aud,
            groups,
            extra: payload,
        })
    }

    /// A provider-specific claim by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// Read an integer (epoch seconds) claim; absent is `Ok(None)`.
pub(crate) fn integer_claim(
    payload: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<i64>, ClaimError> {
    match payload.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or(ClaimError::Malformed(name)),
    }
}

fn string_claim<'a>(
    payload: &'a Map<String, Value>,
    name: &'static str,
) -> Result<Option<&'a str>, ClaimError> {
    match payload.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ClaimError::Malformed(name)),
    }
}

/// A claim that may be a single string or an array of strings.
fn string_list_claim(
    payload: &Map<String, Value>,
    name: &'static str,
) -> Result<Vec<String>, ClaimError> {
    match payload.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or(ClaimError::Malformed(name))
            })
            .collect(),
        Some(_) => Err(ClaimError::Malformed(name)),
    }
}

/// Authenticated identity of the caller.
///
/// This is the value the gateway attaches to a request once its token has
/// been fully validated. Handlers read it through the
/// [`Auth`](super::extractor::Auth) extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    /// Canonical user ID (Cognito username)
    pub user_id: String,

    /// Stable user UUID (`sub`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Group memberships
    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_use: Option<TokenUse>,

    /// Token expiration (Unix timestamp, not serialized)
    #[serde(skip)]
    pub expires_at: i64,
}

impl Identity {
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            user_id: claims.username.clone(),
            subject: claims.sub.clone(),
            groups: claims.groups.clone(),
            token_use: claims.token_use,
            expires_at: claims.exp,
        }
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}
