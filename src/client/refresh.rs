//! 令牌刷新（单飞）
//!
//! 同一时刻最多只有一个刷新请求在途：并发的 401 调用共享同一个刷新 future，
//! 避免刷新令牌被重复兑换而互相失效。刷新完成（无论成败）后清空在途状态，
//! 之后的 401 可以重新触发刷新。

use std::sync::Arc;

use futures::FutureExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::{ExposeSecret, Secret};
use tracing::{debug, info, warn};

use super::{parse_response, ApiClient, ClientInner, JSON_CONTENT_TYPE};
use crate::error::Result;
use crate::events::SessionEvent;
use crate::models::auth::{RefreshTokenRequest, TokenPair};
use crate::storage::SessionStoreExt;

/// 刷新结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// 新令牌已写入存储
    Refreshed,
    /// 没有刷新令牌，未发起请求
    Skipped,
    /// 刷新失败，会话已清除并发布了失效事件
    Failed,
}

impl ApiClient {
    /// 刷新访问令牌；已有刷新在途时等待它的结果
    pub async fn refresh_session(&self) -> RefreshOutcome {
        let pending = {
            let mut slot = self.inner.refresh_slot.lock().await;
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Token refresh already in flight, awaiting it");
                    pending.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let pending = async move {
                        let outcome = inner.perform_refresh().await;
                        inner.refresh_slot.lock().await.take();
                        outcome
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }
}

impl ClientInner {
    async fn perform_refresh(&self) -> RefreshOutcome {
        let refresh_token = match self.store.refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No refresh token stored, skipping refresh");
                metrics::counter!("session_refresh_total", "outcome" => "skipped").increment(1);
                return RefreshOutcome::Skipped;
            }
            Err(e) => return self.expire_session(format!("failed to read refresh token: {}", e)),
        };

        let tokens = match self.request_new_tokens(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => return self.expire_session(format!("refresh request failed: {}", e)),
        };

        if let Err(e) = self.store.save_tokens(&tokens) {
            return self.expire_session(format!("failed to persist refreshed tokens: {}", e));
        }

        info!(
            access_token_expiry = %tokens.access_token_expiry,
            "Access token refreshed"
        );
        metrics::counter!("session_refresh_total", "outcome" => "success").increment(1);
        self.events.publish(SessionEvent::Refreshed);
        RefreshOutcome::Refreshed
    }

    /// 直接调用刷新端点，不经过带重试的通用请求路径
    async fn request_new_tokens(&self, refresh_token: &Secret<String>) -> Result<TokenPair> {
        let response = self
            .http
            .post(self.config.url_for(&self.config.refresh_endpoint))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .json(&RefreshTokenRequest {
                refresh_token: refresh_token.expose_secret(),
            })
            .send()
            .await?;

        parse_response(response).await
    }

    /// 会话不可恢复：清空存储并通知宿主跳转登录
    fn expire_session(&self, reason: String) -> RefreshOutcome {
        warn!(reason = %reason, "Token refresh failed, ending session");
        metrics::counter!("session_refresh_total", "outcome" => "failure").increment(1);

        if let Err(e) = self.store.clear_session() {
            warn!(error = %e, "Failed to clear session storage");
        }

        self.events.publish(SessionEvent::Expired {
            reason,
            redirect_to: self.login_path.clone(),
        });
        RefreshOutcome::Failed
    }
}
