//! Wire types for the BaseBuild API.
//!
//! Every response rides in a standard envelope `{data, message, error,
//! error_code}`; absent fields are tolerated so older server builds keep
//! working. Pure decode helpers live here for testability.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

// =============================================================================
// USER
// =============================================================================

/// The authenticated principal as served by `/api/users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique user identifier (opaque string on this wire).
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Display-name override; empty and absent are both "unset".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_name: Option<String>,
}

impl UserRecord {
    /// `true` when the three identity fields required for cache hits are set.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.username.is_empty() && !self.email.is_empty()
    }
}

/// Partial update for `PATCH /api/users/me`. Only set fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_name: Option<String>,
}

impl UserPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.preferred_name.is_none()
    }
}

// =============================================================================
// TOKENS
// =============================================================================

/// Access/refresh pair returned by the refresh endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Login payload: token pair with the user's fields flattened alongside.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub access: String,
    pub refresh: String,
    #[serde(flatten)]
    pub user: UserRecord,
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// Standard response envelope. `error` is empty on success.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_code: Option<String>,
}

/// Decode a response body into the standard envelope.
///
/// # Errors
///
/// Returns [`ApiError::Parse`] when the body is not a JSON envelope.
pub fn decode_envelope(body: &str) -> Result<Envelope, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Decode the envelope's `data` into a concrete type.
///
/// # Errors
///
/// Returns [`ApiError::Parse`] when `data` does not match `T`.
pub fn decode_data<T: serde::de::DeserializeOwned>(envelope: Envelope) -> Result<T, ApiError> {
    serde_json::from_value(envelope.data).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Merge `overlay`'s object fields onto `base`, overlay winning per key.
/// Non-object inputs yield the overlay unchanged.
#[must_use]
pub fn merge_user_fields(base: &Value, overlay: &Value) -> Value {
    match (base.as_object(), overlay.as_object()) {
        (Some(base_map), Some(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => overlay.clone(),
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
