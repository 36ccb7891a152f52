//! 医生身份解析
//!
//! 为当前登录用户找到对应的医生 ID。优先使用单槽缓存（按用户校验且有 24 小时
//! 新鲜度窗口），缓存缺失或失效时扫描医生目录。所有外部失败都降级为"尝试下一个
//! 回退"，`resolve` 永远不返回错误：找不到就是 `None`。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::error::Result;
use crate::models::doctor::{DoctorCacheEntry, DoctorSearchRequest};
use crate::models::user::UserProfile;
use crate::services::doctor_api::DoctorDirectory;
use crate::storage::{keys, SessionStore, StoreError};

pub struct DoctorResolver {
    directory: Arc<dyn DoctorDirectory>,
    store: Arc<dyn SessionStore>,
    config: ResolverConfig,
}

impl DoctorResolver {
    pub fn new(
        directory: Arc<dyn DoctorDirectory>,
        store: Arc<dyn SessionStore>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            directory,
            store,
            config,
        }
    }

    /// 解析当前用户的医生 ID
    pub async fn resolve(&self) -> Option<i64> {
        let cached = self.fresh_entry();

        let profile = match self.directory.current_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "Failed to fetch current profile");
                return self.degrade(cached);
            }
        };

        let user_id = match profile.user_id() {
            Some(id) => id,
            None => {
                warn!("Current profile has no usable user id");
                return self.degrade(cached);
            }
        };

        // 用户身份已确认，之后只接受属于该用户的缓存
        if let Some(entry) = cached {
            if entry.user_id == user_id {
                debug!(user_id, doctor_id = entry.doctor_id, "Doctor identity cache hit");
                metrics::counter!("doctor_resolve_total", "outcome" => "cache_hit").increment(1);
                return Some(entry.doctor_id);
            }

            info!(
                cached_user_id = entry.user_id,
                user_id, "Cached doctor identity belongs to another user, invalidating"
            );
            self.clear();
        }

        match self.scan_directory(&profile, user_id).await {
            Ok(Some(doctor_id)) => {
                self.write_cache(user_id, doctor_id);
                info!(user_id, doctor_id, "Doctor identity resolved from directory");
                metrics::counter!("doctor_resolve_total", "outcome" => "scan_hit").increment(1);
                Some(doctor_id)
            }
            Ok(None) => {
                info!(user_id, "No doctor record matches the current user");
                metrics::counter!("doctor_resolve_total", "outcome" => "miss").increment(1);
                None
            }
            Err(e) => {
                warn!(user_id, error = %e, "Doctor directory scan failed");
                metrics::counter!("doctor_resolve_total", "outcome" => "error").increment(1);
                None
            }
        }
    }

    /// 同步读取缓存中的医生 ID（不访问网络，不校验用户）
    pub fn cached_doctor_id(&self) -> Option<i64> {
        self.fresh_entry().map(|entry| entry.doctor_id)
    }

    /// 删除缓存（登出时必须调用）
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(keys::DOCTOR_ID_CACHE) {
            warn!(error = %e, "Failed to clear doctor identity cache");
        }
    }

    /// 顺序扫描候选，第一个 userId 匹配者胜出
    async fn scan_directory(&self, profile: &UserProfile, user_id: i64) -> Result<Option<i64>> {
        let mut candidates = Vec::new();

        if let Some(name) = profile.display_name() {
            let request = DoctorSearchRequest::by_name(name, self.config.name_search_page_size);
            match self.directory.search_doctors(&request).await {
                Ok(page) => candidates = page.data,
                Err(e) => warn!(error = %e, "Doctor search by name failed"),
            }
        }

        if candidates.is_empty() {
            debug!(user_id, "Falling back to unfiltered doctor directory scan");
            let request = DoctorSearchRequest::unfiltered(self.config.fallback_page_size);
            candidates = self.directory.search_doctors(&request).await?.data;
        }

        debug!(user_id, candidates = candidates.len(), "Scanning doctor candidates");

        for candidate in candidates {
            match self.directory.doctor_detail(candidate.id).await {
                Ok(detail) if detail.user_id == Some(user_id) => return Ok(Some(candidate.id)),
                Ok(_) => {}
                Err(e) => {
                    warn!(doctor_id = candidate.id, error = %e, "Failed to fetch doctor detail, skipping candidate");
                }
            }
        }

        Ok(None)
    }

    fn degrade(&self, cached: Option<DoctorCacheEntry>) -> Option<i64> {
        let entry = cached?;
        warn!(
            doctor_id = entry.doctor_id,
            "Using cached doctor identity without verifying the current user"
        );
        metrics::counter!("doctor_resolve_total", "outcome" => "degraded").increment(1);
        Some(entry.doctor_id)
    }

    /// 存储不可读时视为没有缓存
    fn fresh_entry(&self) -> Option<DoctorCacheEntry> {
        match self.read_cache() {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Failed to read doctor identity cache");
                None
            }
        }
    }

    /// 读取缓存；过期或无法解析的条目会被删除并视为不存在
    fn read_cache(&self) -> std::result::Result<Option<DoctorCacheEntry>, StoreError> {
        let raw = match self.store.get(keys::DOCTOR_ID_CACHE)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let entry: DoctorCacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable doctor identity cache entry");
                self.store.remove(keys::DOCTOR_ID_CACHE)?;
                return Ok(None);
            }
        };

        if !entry.is_fresh(Utc::now().timestamp_millis(), self.ttl_ms()) {
            debug!(user_id = entry.user_id, "Doctor identity cache expired");
            self.store.remove(keys::DOCTOR_ID_CACHE)?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// 写缓存失败只记录日志，不影响已解析出的结果
    fn write_cache(&self, user_id: i64, doctor_id: i64) {
        let entry = DoctorCacheEntry::new(user_id, doctor_id, Utc::now().timestamp_millis());
        let result = serde_json::to_string(&entry)
            .map_err(StoreError::from)
            .and_then(|raw| self.store.set(keys::DOCTOR_ID_CACHE, &raw));

        if let Err(e) = result {
            warn!(error = %e, "Failed to write doctor identity cache");
        }
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.config.cache_ttl_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000)
    }
}
