//! Network verbs for the BaseBuild API.
//!
//! Request shaping and envelope unwrapping only. The retry/refresh
//! protocol lives in the request pipeline; session state transitions live
//! in the session store.

use serde_json::{Value, json};

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::transport::Method;
use crate::types::{LoginData, TokenPair, UserRecord, decode_data};

pub(crate) const LOGIN_PATH: &str = "/api/auth/login";
pub(crate) const REFRESH_PATH: &str = "/api/auth/refresh";
pub(crate) const ME_PATH: &str = "/api/users/me";
pub(crate) const SIGN_UP_PATH: &str = "/api/auth/sign-up";
pub(crate) const VERIFY_PATH: &str = "/api/auth/verify";
pub(crate) const PASSWORD_RESET_PATH: &str = "/api/auth/password/reset";
pub(crate) const PASSWORD_RESET_CONFIRM_PATH: &str = "/api/auth/password/reset/confirm";

// =============================================================================
// SESSION VERBS
// =============================================================================

/// POST credentials, returning the token pair with flattened user fields.
pub(crate) async fn login(client: &ApiClient, username: &str, password: &str) -> Result<LoginData, ApiError> {
    let envelope = client
        .send(Method::Post, LOGIN_PATH, Some(json!({ "username": username, "password": password })))
        .await?;
    decode_data(envelope)
}

/// POST the refresh token, unwrapping the new pair. Sent outside the retry
/// protocol: a 401 here must surface to the refresh driver, not recurse.
pub(crate) async fn refresh(client: &ApiClient, refresh_token: &str) -> Result<TokenPair, ApiError> {
    let envelope = client
        .send_plain(Method::Post, REFRESH_PATH, Some(json!({ "refresh": refresh_token })))
        .await?;
    decode_data(envelope)
}

/// GET the authenticated principal.
pub(crate) async fn fetch_self(client: &ApiClient) -> Result<UserRecord, ApiError> {
    let envelope = client.send(Method::Get, ME_PATH, None).await?;
    decode_data(envelope)
}

/// PATCH changed fields only. Returns the raw `data` object so the caller
/// can merge server-returned fields into its cached record.
pub(crate) async fn update_self(client: &ApiClient, patch: &Value) -> Result<Value, ApiError> {
    let envelope = client.send(Method::Patch, ME_PATH, Some(patch.clone())).await?;
    Ok(envelope.data)
}

// =============================================================================
// ACCOUNT VERBS (unauthenticated one-shots)
// =============================================================================

/// Fields accepted by `POST /api/auth/sign-up`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Register a new account. Returns the server's confirmation message.
pub async fn sign_up(client: &ApiClient, request: &SignUpRequest) -> Result<String, ApiError> {
    let body = serde_json::to_value(request).map_err(|e| ApiError::Parse(e.to_string()))?;
    let envelope = client.send(Method::Post, SIGN_UP_PATH, Some(body)).await?;
    Ok(envelope.message)
}

/// Confirm an email address with the one-time token from the mail.
pub async fn verify_email(client: &ApiClient, token: &str) -> Result<String, ApiError> {
    let envelope = client.send(Method::Post, VERIFY_PATH, Some(json!({ "token": token }))).await?;
    Ok(envelope.message)
}

/// Start a password reset for the given email.
pub async fn request_password_reset(client: &ApiClient, email: &str) -> Result<String, ApiError> {
    let envelope = client
        .send(Method::Post, PASSWORD_RESET_PATH, Some(json!({ "email": email })))
        .await?;
    Ok(envelope.message)
}

/// Complete a password reset with the emailed token and the new password.
pub async fn confirm_password_reset(client: &ApiClient, token: &str, password: &str) -> Result<String, ApiError> {
    let envelope = client
        .send(Method::Post, PASSWORD_RESET_CONFIRM_PATH, Some(json!({ "token": token, "password": password })))
        .await?;
    Ok(envelope.message)
}

#[cfg(test)]
#[path = "ops_test.rs"]
mod tests;
