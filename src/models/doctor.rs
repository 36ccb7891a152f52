//! Doctor directory models and the doctor-identity cache entry

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Doctor directory search request
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[validate(range(min = 1))]
    pub page_number: u32,
    #[validate(range(min = 1, max = 500))]
    pub page_size: u32,
}

impl DoctorSearchRequest {
    /// First page filtered by full name
    pub fn by_name(full_name: impl Into<String>, page_size: u32) -> Self {
        Self {
            full_name: Some(full_name.into()),
            specialization: None,
            page_number: 1,
            page_size,
        }
    }

    /// First page without filters
    pub fn unfiltered(page_size: u32) -> Self {
        Self {
            full_name: None,
            specialization: None,
            page_number: 1,
            page_size,
        }
    }
}

/// Paged list payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub total_count: u64,
}

/// Row of the doctor directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorListItem {
    pub id: i64,
    #[serde(default)]
    pub full_name: String,
    pub specialization: Option<String>,
    pub user_id: Option<i64>,
}

/// Full doctor record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorDetail {
    pub id: i64,
    pub user_id: Option<i64>,
    #[serde(default)]
    pub full_name: String,
    pub specialization: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// Last resolved identity: single slot, JSON in session storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorCacheEntry {
    pub user_id: i64,
    pub doctor_id: i64,
    /// epoch millis
    pub timestamp: i64,
}

impl DoctorCacheEntry {
    pub fn new(user_id: i64, doctor_id: i64, timestamp: i64) -> Self {
        Self {
            user_id,
            doctor_id,
            timestamp,
        }
    }

    /// Whether the entry is still inside the freshness window at `now_ms`.
    ///
    /// Entries stamped in the future, or so far in the past that the age
    /// overflows, are never fresh.
    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms
            .checked_sub(self.timestamp)
            .is_some_and(|age| (0..ttl_ms).contains(&age))
    }
}
