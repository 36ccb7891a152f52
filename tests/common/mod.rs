//! 测试公共模块
//! 提供测试配置与进程内模拟后端（axum）

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use doctor_portal::{
    client::ApiClient,
    config::{
        ApiConfig, AppConfig, LoggingConfig, ResolverConfig, SessionConfig, UnauthorizedRetry,
    },
    events::SessionEvents,
    storage::{keys, MemorySessionStore, SessionStore},
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// 创建测试配置
pub fn create_test_config(base_url: &str) -> AppConfig {
    AppConfig {
        api: ApiConfig {
            base_url: base_url.to_string(),
            api_prefix: "/api/v1".to_string(),
            timeout_secs: 5,
            refresh_endpoint: "/Auth/RefreshToken".to_string(),
            unauthorized_retry: UnauthorizedRetry::GetOnly,
        },
        session: SessionConfig {
            store_path: ".portal-session-test.json".to_string(),
            login_path: "/login".to_string(),
        },
        resolver: ResolverConfig::default(),
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// 模拟后端状态
pub struct MockBackend {
    pub access_token: Mutex<String>,
    pub refresh_token: Mutex<String>,
    /// 刷新端点的人为延迟，让并发的 401 能在刷新完成前汇合
    pub refresh_delay: Duration,
    pub refresh_calls: AtomicUsize,
    pub appointment_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub profile: Mutex<Value>,
    pub doctors: Mutex<Vec<Value>>,
    pub search_requests: Mutex<Vec<Value>>,
    pub detail_requests: Mutex<Vec<i64>>,
}

impl MockBackend {
    pub fn new(access_token: &str, refresh_token: &str) -> Arc<Self> {
        Arc::new(Self {
            access_token: Mutex::new(access_token.to_string()),
            refresh_token: Mutex::new(refresh_token.to_string()),
            refresh_delay: Duration::from_millis(200),
            refresh_calls: AtomicUsize::new(0),
            appointment_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            profile: Mutex::new(Value::Null),
            doctors: Mutex::new(Vec::new()),
            search_requests: Mutex::new(Vec::new()),
            detail_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn appointment_calls(&self) -> usize {
        self.appointment_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.access_token.lock().unwrap());
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == expected)
            .unwrap_or(false)
    }
}

/// 启动模拟后端，返回 base_url
pub async fn spawn_backend(backend: Arc<MockBackend>) -> String {
    let app = Router::new()
        .route("/api/v1/Auth/RefreshToken", post(refresh))
        .route("/api/v1/Appointment/GetAppointments", get(appointments))
        .route("/api/v1/Appointment/Create", post(create_appointment))
        .route("/api/v1/Echo/Headers", get(echo_headers))
        .route("/api/v1/Files/Upload", post(upload))
        .route("/api/v1/Errors/Conflict", get(conflict))
        .route("/api/v1/Errors/Gateway", get(bad_gateway))
        .route("/api/v1/Errors/SoftFailure", get(soft_failure))
        .route("/api/v1/User/GetProfile", get(profile))
        .route("/api/v1/Doctor/Search", post(search_doctors))
        .route("/api/v1/Doctor/GetById/{id}", get(doctor_detail))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock backend");
    let addr = listener.local_addr().expect("Mock backend has no address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock backend crashed");
    });

    format!("http://{}", addr)
}

/// 创建连接到模拟后端的客户端与内存存储
pub async fn create_test_client(
    backend: Arc<MockBackend>,
    retry: UnauthorizedRetry,
) -> (ApiClient, Arc<MemorySessionStore>, SessionEvents) {
    let base_url = spawn_backend(backend).await;
    let mut config = create_test_config(&base_url);
    config.api.unauthorized_retry = retry;

    let store = Arc::new(MemorySessionStore::new());
    let events = SessionEvents::default();
    let client = ApiClient::new(&config, store.clone(), events.clone())
        .expect("Failed to create API client");

    (client, store, events)
}

/// 写入一对会话令牌
pub fn seed_tokens(store: &MemorySessionStore, access_token: &str, refresh_token: &str) {
    store.set(keys::ACCESS_TOKEN, access_token).unwrap();
    store.set(keys::REFRESH_TOKEN, refresh_token).unwrap();
    store
        .set(keys::ACCESS_TOKEN_EXPIRY, "2026-10-16T08:15:00+00:00")
        .unwrap();
    store
        .set(keys::REFRESH_TOKEN_EXPIRY, "2026-10-23T08:00:00+00:00")
        .unwrap();
}

// ==================== 响应辅助 ====================

fn ok(payload: Value) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "payload": payload, "error": null })),
    )
        .into_response()
}

fn fail(status: StatusCode, message: &str, code: &str, details: Value) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "payload": null,
            "error": { "message": message, "code": code, "details": details }
        })),
    )
        .into_response()
}

fn unauthorized() -> Response {
    fail(
        StatusCode::UNAUTHORIZED,
        "Token expired",
        "TOKEN_EXPIRED",
        Value::Null,
    )
}

// ==================== 处理器 ====================

async fn refresh(State(backend): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Response {
    let call = backend.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    tokio::time::sleep(backend.refresh_delay).await;

    let presented = body["refreshToken"].as_str().unwrap_or_default().to_string();
    let accepted = {
        let current = backend.refresh_token.lock().unwrap();
        !current.is_empty() && *current == presented
    };
    if !accepted {
        return fail(
            StatusCode::UNAUTHORIZED,
            "Refresh token revoked",
            "TOKEN_REVOKED",
            Value::Null,
        );
    }

    let access = format!("fresh-access-{}", call);
    let refresh = format!("fresh-refresh-{}", call);
    *backend.access_token.lock().unwrap() = access.clone();
    *backend.refresh_token.lock().unwrap() = refresh.clone();

    ok(json!({
        "accessToken": access,
        "refreshToken": refresh,
        "accessTokenExpiry": "2030-01-01T00:15:00Z",
        "refreshTokenExpiry": "2030-01-08T00:00:00Z"
    }))
}

async fn appointments(State(backend): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    backend.appointment_calls.fetch_add(1, Ordering::SeqCst);
    if !backend.is_authorized(&headers) {
        return unauthorized();
    }
    ok(json!([{ "id": 1, "patientName": "Dilnoza", "status": "Scheduled" }]))
}

async fn create_appointment(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.create_calls.fetch_add(1, Ordering::SeqCst);
    if !backend.is_authorized(&headers) {
        return unauthorized();
    }
    ok(json!({ "id": 10, "patientName": body["patientName"] }))
}

async fn echo_headers(headers: HeaderMap) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    };
    ok(json!({
        "authorization": header("authorization"),
        "contentType": header("content-type"),
        "accept": header("accept"),
        "requestId": header("x-request-id"),
        "clinic": header("x-clinic-id"),
    }))
}

async fn upload(headers: HeaderMap) -> Response {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    ok(json!({ "contentType": content_type }))
}

async fn conflict() -> Response {
    fail(
        StatusCode::CONFLICT,
        "Doctor already exists",
        "ALREADY_EXISTS",
        json!({ "field": "email" }),
    )
}

async fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response()
}

async fn soft_failure() -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": false,
            "payload": null,
            "error": { "message": "Slot is already taken", "code": "SLOT_TAKEN" }
        })),
    )
        .into_response()
}

async fn profile(State(backend): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    if !backend.is_authorized(&headers) {
        return unauthorized();
    }
    let profile = backend.profile.lock().unwrap().clone();
    ok(profile)
}

async fn search_doctors(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !backend.is_authorized(&headers) {
        return unauthorized();
    }
    backend.search_requests.lock().unwrap().push(body.clone());

    let page_size = body["pageSize"].as_u64().unwrap_or(10) as usize;
    let full_name = body["fullName"].as_str().map(str::to_string);

    let rows: Vec<Value> = backend
        .doctors
        .lock()
        .unwrap()
        .iter()
        .filter(|row| match &full_name {
            Some(name) => row["fullName"].as_str() == Some(name.as_str()),
            None => true,
        })
        .cloned()
        .collect();
    let total = rows.len();
    let data: Vec<Value> = rows.into_iter().take(page_size).collect();

    ok(json!({ "data": data, "totalCount": total }))
}

async fn doctor_detail(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if !backend.is_authorized(&headers) {
        return unauthorized();
    }
    backend.detail_requests.lock().unwrap().push(id);

    let row = backend
        .doctors
        .lock()
        .unwrap()
        .iter()
        .find(|row| row["id"].as_i64() == Some(id))
        .cloned();

    match row {
        Some(row) => ok(row),
        None => fail(
            StatusCode::NOT_FOUND,
            "Doctor not found",
            "NOT_FOUND",
            Value::Null,
        ),
    }
}
