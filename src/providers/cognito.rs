// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Amazon Cognito user pool client.
//!
//! Talks the Cognito Identity Provider JSON 1.1 protocol directly: every
//! operation is a `POST /` with an `X-Amz-Target` header naming it. All the
//! operations used here are public app-client calls, so no SigV4 signing is
//! needed; the client secret (if any) goes into `SECRET_HASH`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use sha2::Sha256;
use tracing::{debug, info};

use super::{
    AuthTokens, CodeDelivery, IdentityProvider, ProviderError, ProviderErrorCode, SignUpOutcome,
    SignUpRequest, UserProfile,
};

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const ERROR_TYPE_HEADER: &str = "x-amzn-ErrorType";

#[derive(Debug, Clone)]
pub struct CognitoClient {
    endpoint: String,
    client_id: String,
    client_secret: Option<String>,
    http: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CodeDeliveryDetails {
    destination: Option<String>,
    delivery_medium: Option<String>,
    attribute_name: Option<String>,
}

impl From<CodeDeliveryDetails> for CodeDelivery {
    fn from(details: CodeDeliveryDetails) -> Self {
        Self {
            destination: details.destination,
            medium: details.delivery_medium,
            attribute: details.attribute_name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResponse {
    #[serde(default)]
    user_confirmed: bool,
    user_sub: Option<String>,
    code_delivery_details: Option<CodeDeliveryDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: i64,
    token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ForgotPasswordResponse {
    code_delivery_details: Option<CodeDeliveryDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserResponse {
    username: String,
    #[serde(default)]
    user_attributes: Vec<AttributeType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeType {
    name: String,
    #[serde(default)]
    value: Option<String>,
}

/// Error body of a failed call. Cognito is inconsistent about the case of
/// the message field.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

impl CognitoClient {
    /// Client for the public Cognito endpoint of `region`.
    pub fn new(region: &str, client_id: impl Into<String>, http: Client) -> Self {
        Self {
            endpoint: format!("https://cognito-idp.{region}.amazonaws.com/"),
            client_id: client_id.into(),
            client_secret: None,
            http,
        }
    }

    /// Send requests to another endpoint (cognito-local, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.endpoint = format!("{}/", endpoint.trim_end_matches('/'));
        self
    }

    /// App client secret, required when the app client was created with one.
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// `Base64(HMAC-SHA256(client_secret, username + client_id))`, when a secret is set.
    fn secret_hash(&self, username: &str) -> Result<Option<String>, ProviderError> {
        let Some(secret) = &self.client_secret else {
            return Ok(None);
        };

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| ProviderError::Transport(format!("invalid client secret: {e}")))?;
        mac.update(username.as_bytes());
        mac.update(self.client_id.as_bytes());
        Ok(Some(Base64::encode_string(&mac.finalize().into_bytes())))
    }

    /// Base request body: client id plus secret hash for `username`.
    fn request_body(&self, username: &str) -> Result<Map<String, Value>, ProviderError> {
        let mut body = Map::new();
        body.insert("ClientId".to_string(), json!(self.client_id));
        body.insert("Username".to_string(), json!(username));
        if let Some(hash) = self.secret_hash(username)? {
            body.insert("SecretHash".to_string(), json!(hash));
        }
        Ok(body)
    }

    /// Invoke `operation` and decode its response.
    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        body: &Value,
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{operation} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let header_type = response
                .headers()
                .get(ERROR_TYPE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let text = response.text().await.unwrap_or_default();
            let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();

            let Some(error_type) = body.error_type.or(header_type) else {
                return Err(ProviderError::InvalidResponse(format!(
                    "{operation} returned {status} without an error type"
                )));
            };

            let code = ProviderErrorCode::from_type(&error_type);
            debug!(%operation, %status, %code, "Identity provider rejected call");
            return Err(ProviderError::Service {
                code,
                message: body.message.unwrap_or(error_type),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("{operation} invalid JSON: {e}")))
    }

    /// Run an `InitiateAuth` flow and insist on tokens coming back.
    async fn initiate(
        &self,
        flow: &str,
        parameters: Map<String, Value>,
    ) -> Result<AuthTokens, ProviderError> {
        let body = json!({
            "AuthFlow": flow,
            "ClientId": self.client_id,
            "AuthParameters": parameters,
        });
        let response: InitiateAuthResponse = self.call("InitiateAuth", &body).await?;

        let Some(result) = response.authentication_result else {
            let challenge = response
                .challenge_name
                .unwrap_or_else(|| "UNKNOWN".to_string());
            return Err(ProviderError::Challenge(challenge));
        };

        let (Some(id_token), Some(access_token)) = (result.id_token, result.access_token) else {
            return Err(ProviderError::InvalidResponse(
                "authentication result is missing tokens".to_string(),
            ));
        };

        Ok(AuthTokens {
            id_token,
            access_token,
            refresh_token: result.refresh_token,
            expires_in: result.expires_in,
            token_type: result.token_type.unwrap_or_else(|| "Bearer".to_string()),
        })
    }
}

#[async_trait]
impl IdentityProvider for CognitoClient {
    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome, ProviderError> {
        let mut body = self.request_body(&request.username)?;
        body.insert("Password".to_string(), json!(request.password));
        let attributes: Vec<Value> = request
            .attributes
            .iter()
            .map(|a| json!({ "Name": a.name, "Value": a.value }))
            .collect();
        body.insert("UserAttributes".to_string(), Value::Array(attributes));

        let response: SignUpResponse = self.call("SignUp", &Value::Object(body)).await?;
        info!(confirmed = response.user_confirmed, "User signed up");

        Ok(SignUpOutcome {
            user_confirmed: response.user_confirmed,
            user_sub: response.user_sub,
            delivery: response.code_delivery_details.map(Into::into),
        })
    }

    async fn initiate_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthTokens, ProviderError> {
        let mut parameters = Map::new();
        parameters.insert("USERNAME".to_string(), json!(username));
        parameters.insert("PASSWORD".to_string(), json!(password));
        if let Some(hash) = self.secret_hash(username)? {
            parameters.insert("SECRET_HASH".to_string(), json!(hash));
        }
        self.initiate("USER_PASSWORD_AUTH", parameters).await
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), ProviderError> {
        let mut body = self.request_body(username)?;
        body.insert("ConfirmationCode".to_string(), json!(code));
        let _: Value = self.call("ConfirmSignUp", &Value::Object(body)).await?;
        Ok(())
    }

    async fn forgot_password(&self, username: &str) -> Result<Option<CodeDelivery>, ProviderError> {
        let body = self.request_body(username)?;
        let response: ForgotPasswordResponse =
            self.call("ForgotPassword", &Value::Object(body)).await?;
        Ok(response.code_delivery_details.map(Into::into))
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), ProviderError> {
        let mut body = self.request_body(username)?;
        body.insert("ConfirmationCode".to_string(), json!(code));
        body.insert("Password".to_string(), json!(new_password));
        let _: Value = self
            .call("ConfirmForgotPassword", &Value::Object(body))
            .await?;
        Ok(())
    }

    async fn refresh(
        &self,
        refresh_token: &str,
        username: Option<&str>,
    ) -> Result<AuthTokens, ProviderError> {
        let mut parameters = Map::new();
        parameters.insert("REFRESH_TOKEN".to_string(), json!(refresh_token));
        if let Some(username) = username {
            if let Some(hash) = self.secret_hash(username)? {
                parameters.insert("SECRET_HASH".to_string(), json!(hash));
            }
        }
        self.initiate("REFRESH_TOKEN_AUTH", parameters).await
    }

    fn refresh_needs_username(&self) -> bool {
        self.client_secret.is_some()
    }

    async fn get_user(&self, access_token: &str) -> Result<UserProfile, ProviderError> {
        let body = json!({ "AccessToken": access_token });
        let response: GetUserResponse = self.call("GetUser", &body).await?;

        let attributes: BTreeMap<String, String> = response
            .user_attributes
            .into_iter()
            .filter_map(|a| a.value.map(|value| (a.name, value)))
            .collect();

        Ok(UserProfile {
            username: response.username,
            attributes,
        })
    }
}
