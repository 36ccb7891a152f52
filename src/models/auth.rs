//! Authentication-related models

use chrono::{DateTime, Utc};
use secrecy::Secret;
use serde::{Deserialize, Serialize};

/// Token refresh request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest<'a> {
    pub refresh_token: &'a str,
}

/// Access/refresh token pair returned by sign-in and refresh
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    pub access_token_expiry: DateTime<Utc>,
    pub refresh_token_expiry: DateTime<Utc>,
}
