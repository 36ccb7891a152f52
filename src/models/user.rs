//! User profile model

use serde::{Deserialize, Serialize};

/// Profile of the authenticated user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
}

impl UserProfile {
    /// Usable user identifier (missing or non-positive ids are unusable)
    pub fn user_id(&self) -> Option<i64> {
        self.id.filter(|id| *id > 0)
    }

    /// "First Last", or `None` when both parts are blank
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}
