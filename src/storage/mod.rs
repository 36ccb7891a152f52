//! 会话存储层
//! 同步键值存储：访问令牌、刷新令牌、过期时间与医生身份缓存

pub mod file;
pub mod memory;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

use secrecy::Secret;
use thiserror::Error;

use crate::models::auth::TokenPair;

/// 存储键
pub mod keys {
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const ACCESS_TOKEN_EXPIRY: &str = "accessTokenExpiry";
    pub const REFRESH_TOKEN_EXPIRY: &str = "refreshTokenExpiry";
    pub const DOCTOR_ID_CACHE: &str = "doctorIdCache";

    /// 登出时需要清除的全部键
    pub const SESSION_KEYS: [&str; 5] = [
        ACCESS_TOKEN,
        REFRESH_TOKEN,
        ACCESS_TOKEN_EXPIRY,
        REFRESH_TOKEN_EXPIRY,
        DOCTOR_ID_CACHE,
    ];
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// 持久化键值存储
///
/// 所有调用方共享同一个实例，读写均为同步操作。
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// 会话令牌相关的便捷操作
pub trait SessionStoreExt: SessionStore {
    /// 当前访问令牌
    fn access_token(&self) -> Result<Option<Secret<String>>, StoreError> {
        Ok(self.get(keys::ACCESS_TOKEN)?.map(Secret::new))
    }

    /// 当前刷新令牌
    fn refresh_token(&self) -> Result<Option<Secret<String>>, StoreError> {
        Ok(self.get(keys::REFRESH_TOKEN)?.map(Secret::new))
    }

    /// 整体替换令牌对
    fn save_tokens(&self, tokens: &TokenPair) -> Result<(), StoreError> {
        use secrecy::ExposeSecret;

        self.set(keys::ACCESS_TOKEN, tokens.access_token.expose_secret())?;
        self.set(keys::REFRESH_TOKEN, tokens.refresh_token.expose_secret())?;
        self.set(
            keys::ACCESS_TOKEN_EXPIRY,
            &tokens.access_token_expiry.to_rfc3339(),
        )?;
        self.set(
            keys::REFRESH_TOKEN_EXPIRY,
            &tokens.refresh_token_expiry.to_rfc3339(),
        )?;
        Ok(())
    }

    /// 清除所有会话数据（登出契约）
    ///
    /// 某个键删除失败时仍继续删除其余键，最后返回第一个错误。
    fn clear_session(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        for key in keys::SESSION_KEYS {
            if let Err(e) = self.remove(key) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<S: SessionStore + ?Sized> SessionStoreExt for S {}
