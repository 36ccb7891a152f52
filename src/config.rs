//! 配置系统
//! 从环境变量加载所有配置（前缀 PORTAL_，嵌套分隔符 __）

use config::{Config, ConfigError, Environment};
use reqwest::Method;
use serde::Deserialize;

/// 401 时自动刷新令牌并重试的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthorizedRetry {
    /// 仅 GET 请求重试（默认，与历史行为一致）
    GetOnly,
    /// 所有带 JSON 请求体或无请求体的方法都重试
    AllMethods,
    /// 从不自动刷新
    Never,
}

impl UnauthorizedRetry {
    /// 判断该方法在 401 后是否允许刷新重试
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            UnauthorizedRetry::GetOnly => *method == Method::GET,
            UnauthorizedRetry::AllMethods => true,
            UnauthorizedRetry::Never => false,
        }
    }
}

impl Default for UnauthorizedRetry {
    fn default() -> Self {
        Self::GetOnly
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// 后端地址，例如 "https://clinic.example.com"
    pub base_url: String,
    /// 版本前缀，例如 "/api/v1"
    pub api_prefix: String,
    /// 单次请求超时时间（秒）
    pub timeout_secs: u64,
    /// 刷新令牌端点（相对 api_prefix）
    pub refresh_endpoint: String,
    /// 401 重试策略
    pub unauthorized_retry: UnauthorizedRetry,
}

impl ApiConfig {
    /// 拼接完整请求地址
    pub fn url_for(&self, endpoint: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_end_matches('/');
        if endpoint.starts_with('/') {
            format!("{}{}{}", base, prefix, endpoint)
        } else {
            format!("{}{}/{}", base, prefix, endpoint)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 会话文件路径（CLI 使用的持久化存储）
    pub store_path: String,
    /// 会话失效后应跳转的登录入口
    pub login_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// 医生身份缓存的新鲜度窗口（秒）
    pub cache_ttl_secs: u64,
    /// 按姓名搜索时的分页大小
    pub name_search_page_size: u32,
    /// 无过滤回退搜索时的分页大小
    pub fallback_page_size: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 24 * 60 * 60,
            name_search_page_size: 10,
            fallback_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub resolver: ResolverConfig,
    pub logging: LoggingConfig,
}

/// 分页大小上限
const MAX_PAGE_SIZE: u32 = 500;

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("api.base_url", "http://localhost:5000")?
            .set_default("api.api_prefix", "/api/v1")?
            .set_default("api.timeout_secs", 30)?
            .set_default("api.refresh_endpoint", "/Auth/RefreshToken")?
            .set_default("api.unauthorized_retry", "get_only")?
            .set_default("session.store_path", ".portal-session.json")?
            .set_default("session.login_path", "/login")?
            .set_default("resolver.cache_ttl_secs", 86400)?
            .set_default("resolver.name_search_page_size", 10)?
            .set_default("resolver.fallback_page_size", 100)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?;

        // 从环境变量加载配置（前缀为 PORTAL_）
        settings = settings.add_source(
            Environment::with_prefix("PORTAL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return Err(ConfigError::Message(format!(
                "Invalid api.base_url: {}. Must start with http:// or https://",
                self.api.base_url
            )));
        }

        if !self.api.api_prefix.is_empty() && !self.api.api_prefix.starts_with('/') {
            return Err(ConfigError::Message(
                "api.api_prefix must be empty or start with '/'".to_string(),
            ));
        }

        if self.api.timeout_secs == 0 || self.api.timeout_secs > 300 {
            return Err(ConfigError::Message(
                "api.timeout_secs must be between 1 and 300".to_string(),
            ));
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        if self.resolver.cache_ttl_secs == 0 {
            return Err(ConfigError::Message(
                "resolver.cache_ttl_secs must be greater than 0".to_string(),
            ));
        }

        for (name, size) in [
            ("name_search_page_size", self.resolver.name_search_page_size),
            ("fallback_page_size", self.resolver.fallback_page_size),
        ] {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(ConfigError::Message(format!(
                    "resolver.{} must be between 1 and {}",
                    name, MAX_PAGE_SIZE
                )));
            }
        }

        Ok(())
    }
}
