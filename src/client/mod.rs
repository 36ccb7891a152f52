//! 后端 API 客户端
//! 附加 Bearer 令牌、解包响应信封；401 时单飞刷新令牌并重试一次

mod refresh;

pub use refresh::RefreshOutcome;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ApiConfig, AppConfig};
use crate::error::{ApiError, Result};
use crate::events::{SessionEvent, SessionEvents};
use crate::models::envelope::Envelope;
use crate::storage::{SessionStore, SessionStoreExt};

const JSON_CONTENT_TYPE: &str = "application/json";

/// 单次调用的覆盖选项
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// 显式令牌，优先于存储中的访问令牌
    pub token: Option<Secret<String>>,
    /// 额外请求头
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Secret::new(token.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// 请求体
enum RequestBody<'a> {
    Empty,
    Json(&'a Value),
    Multipart(Form),
}

type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct ClientInner {
    http: Client,
    config: ApiConfig,
    login_path: String,
    store: Arc<dyn SessionStore>,
    events: SessionEvents,
    /// 进行中的刷新（单飞）
    refresh_slot: Mutex<Option<PendingRefresh>>,
}

/// 后端 API 客户端
///
/// 克隆开销很小，所有克隆共享同一个会话存储与刷新状态。
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// 创建新的客户端
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn SessionStore>,
        events: SessionEvents,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config: config.api.clone(),
                login_path: config.session.login_path.clone(),
                store,
                events,
                refresh_slot: Mutex::new(None),
            }),
        })
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.inner.store
    }

    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str, options: RequestOptions) -> Result<T> {
        self.request(Method::GET, endpoint, None, options).await
    }

    pub async fn post<T, B>(&self, endpoint: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, endpoint, Some(body), options).await
    }

    pub async fn put<T, B>(&self, endpoint: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, endpoint, Some(body), options).await
    }

    pub async fn patch<T, B>(&self, endpoint: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::PATCH, endpoint, Some(body), options).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str, options: RequestOptions) -> Result<T> {
        self.request(Method::DELETE, endpoint, None, options).await
    }

    /// 上传 multipart 表单
    ///
    /// 不设置 Content-Type，由 reqwest 生成带 boundary 的头。表单在发送时被消费，
    /// 因此上传在 401 后不会自动重试。
    pub async fn upload<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: Form,
        options: RequestOptions,
    ) -> Result<T> {
        self.execute(&Method::POST, endpoint, RequestBody::Multipart(form), &options)
            .await
    }

    /// 登出：清除本地会话与医生身份缓存
    pub fn logout(&self) -> Result<()> {
        self.inner.store.clear_session()?;
        info!("Session cleared on logout");
        self.inner.events.publish(SessionEvent::LoggedOut);
        Ok(())
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<T> {
        let first = self
            .execute(&method, endpoint, json_body(body.as_ref()), &options)
            .await;

        match first {
            Err(err)
                if err.is_unauthorized()
                    && self.inner.config.unauthorized_retry.allows(&method) =>
            {
                debug!(method = %method, endpoint, "Unauthorized response, attempting token refresh");

                if self.refresh_session().await != RefreshOutcome::Refreshed {
                    return Err(err);
                }

                // 重试使用刚写入存储的新令牌，而不是调用方传入的旧令牌
                let retry_options = RequestOptions {
                    token: None,
                    headers: options.headers,
                };
                info!(method = %method, endpoint, "Retrying request with refreshed token");
                self.execute(&method, endpoint, json_body(body.as_ref()), &retry_options)
                    .await
            }
            other => other,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: &Method,
        endpoint: &str,
        body: RequestBody<'_>,
        options: &RequestOptions,
    ) -> Result<T> {
        let request_id = Uuid::new_v4().to_string();
        let builder = self.build_request(method, endpoint, body, options, &request_id)?;

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status().as_u16();

        metrics::counter!(
            "api_requests_total",
            "method" => method.as_str().to_string(),
            "status" => status.to_string()
        )
        .increment(1);

        debug!(
            method = %method,
            endpoint,
            status,
            request_id = %request_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "API request completed"
        );

        parse_response(response).await
    }

    fn build_request(
        &self,
        method: &Method,
        endpoint: &str,
        body: RequestBody<'_>,
        options: &RequestOptions,
        request_id: &str,
    ) -> Result<RequestBuilder> {
        let url = self.inner.config.url_for(endpoint);
        let mut builder = self
            .inner
            .http
            .request(method.clone(), url)
            .headers(options.headers.clone())
            .header("x-request-id", request_id);

        let token = match &options.token {
            Some(token) => Some(token.clone()),
            None => self.inner.store.access_token()?,
        };
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }

        builder = match body {
            RequestBody::Empty => builder
                .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                .header(ACCEPT, JSON_CONTENT_TYPE),
            RequestBody::Json(value) => builder
                .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                .header(ACCEPT, JSON_CONTENT_TYPE)
                .json(value),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        Ok(builder)
    }
}

fn json_body(body: Option<&Value>) -> RequestBody<'_> {
    match body {
        Some(value) => RequestBody::Json(value),
        None => RequestBody::Empty,
    }
}

/// 解析响应：HTTP 状态码与信封 success 标志必须同时成功
async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains(JSON_CONTENT_TYPE))
        .unwrap_or(false);

    if !is_json && !status.is_success() {
        return Err(ApiError::Http {
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await?;
    let envelope: Envelope = match serde_json::from_slice(&bytes) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(ApiError::Http {
                status: status.as_u16(),
            })
        }
        Err(e) => return Err(ApiError::decode(&format!("invalid response envelope: {}", e))),
    };

    if !status.is_success() || !envelope.success {
        let error = envelope.error.unwrap_or_default();
        return Err(ApiError::Api {
            status: status.as_u16(),
            message: error
                .message
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16())),
            code: error.code,
            details: error.details,
        });
    }

    serde_json::from_value(envelope.payload.unwrap_or(Value::Null))
        .map_err(|e| ApiError::decode(&format!("unexpected payload: {}", e)))
}
