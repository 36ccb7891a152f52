//! Standard backend response envelope

use serde::Deserialize;
use serde_json::Value;

/// `{ success, payload, error }` wrapper used by every endpoint
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

/// Error section of the envelope
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub code: Option<String>,
    pub details: Option<Value>,
}
