//! 医生目录访问
//! `DoctorDirectory` 是解析器依赖的接缝，`DoctorApi` 通过 `ApiClient` 实现它

use async_trait::async_trait;
use validator::Validate;

use crate::client::{ApiClient, RequestOptions};
use crate::error::{ApiError, Result};
use crate::models::doctor::{DoctorDetail, DoctorListItem, DoctorSearchRequest, PagedResult};
use crate::models::user::UserProfile;

/// 后端端点
pub mod endpoints {
    pub const PROFILE: &str = "/User/GetProfile";
    pub const DOCTOR_SEARCH: &str = "/Doctor/Search";
    pub const DOCTOR_DETAIL: &str = "/Doctor/GetById";
}

/// 解析医生身份所需的外部调用
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    /// 当前登录用户的资料
    async fn current_profile(&self) -> Result<UserProfile>;

    /// 分页搜索医生目录
    async fn search_doctors(&self, request: &DoctorSearchRequest) -> Result<PagedResult<DoctorListItem>>;

    /// 单个医生的完整记录
    async fn doctor_detail(&self, doctor_id: i64) -> Result<DoctorDetail>;
}

#[derive(Clone)]
pub struct DoctorApi {
    client: ApiClient,
}

impl DoctorApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DoctorDirectory for DoctorApi {
    async fn current_profile(&self) -> Result<UserProfile> {
        self.client
            .get(endpoints::PROFILE, RequestOptions::default())
            .await
    }

    async fn search_doctors(&self, request: &DoctorSearchRequest) -> Result<PagedResult<DoctorListItem>> {
        request
            .validate()
            .map_err(|e| ApiError::validation(&e.to_string()))?;

        self.client
            .post(endpoints::DOCTOR_SEARCH, request, RequestOptions::default())
            .await
    }

    async fn doctor_detail(&self, doctor_id: i64) -> Result<DoctorDetail> {
        self.client
            .get(
                &format!("{}/{}", endpoints::DOCTOR_DETAIL, doctor_id),
                RequestOptions::default(),
            )
            .await
    }
}
