//! 统一错误模型
//! 定义 HTTP 层与会话存储层的错误类型

use serde_json::Value;
use thiserror::Error;

use crate::storage::StoreError;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ApiError>;

/// API 调用错误类型
#[derive(Debug, Error)]
pub enum ApiError {
    /// 非 JSON 且非成功的响应，只携带状态码
    #[error("HTTP error! status: {status}")]
    Http { status: u16 },

    /// 后端信封返回 success=false，或状态码非成功
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        code: Option<String>,
        details: Option<Value>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Failed to serialize request body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Session storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ApiError {
    /// 获取 HTTP 状态码（仅服务端响应类错误才有）
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status } | ApiError::Api { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// 获取后端返回的机器可读错误码
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// 获取后端返回的结构化错误详情
    pub fn details(&self) -> Option<&Value> {
        match self {
            ApiError::Api { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// 是否为 401（令牌过期或无效）
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// 获取用户友好的错误消息（不包含内部细节）
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http { status } => format!("Request failed with status {}", status),
            ApiError::Api { message, .. } => message.clone(),
            ApiError::Network(_) => "Unable to reach the server".to_string(),
            ApiError::Decode(_) => "Unexpected response from the server".to_string(),
            ApiError::Serialization(_) => "Invalid request data".to_string(),
            ApiError::Validation(msg) => msg.clone(),
            ApiError::Storage(_) => "Local session storage is unavailable".to_string(),
        }
    }

    // 便捷方法
    pub fn validation(msg: &str) -> Self {
        ApiError::Validation(msg.to_string())
    }

    pub fn decode(msg: &str) -> Self {
        ApiError::Decode(msg.to_string())
    }
}
