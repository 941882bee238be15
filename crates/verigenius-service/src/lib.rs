//! REST surface for the VeriGenius validation engine and the admin record
//! CRUD, plus the audit-log listing consumed by the dashboard.

#![deny(unsafe_code)]

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use verigenius_adapters::{demo_records, postgres, MemoryAuditSink, MemoryStudentStore, StoreConfig};
use verigenius_core::{
    canonical_first_name, canonical_last_name, AuditEntry, AuditSink, ClassAssignment,
    EnrollmentStatus, ExternalId, FieldOfStudy, Level, MatchPolicy, StudentRecord, StudentStore,
    ValidationEngine, VerigeniusError,
};

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub store: StoreConfig,
    pub match_policy: MatchPolicy,
    /// Seed deterministic demo records; memory backend only.
    pub seed_demo: bool,
}

#[derive(Clone)]
pub struct ServiceState {
    pub engine: Arc<ValidationEngine>,
    pub store: Arc<dyn StudentStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl ServiceState {
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, VerigeniusError> {
        let (store, audit): (Arc<dyn StudentStore>, Arc<dyn AuditSink>) = match &config.store {
            StoreConfig::Memory => {
                let records = if config.seed_demo {
                    demo_records()
                } else {
                    Vec::new()
                };
                (
                    Arc::new(MemoryStudentStore::with_records(records)),
                    Arc::new(MemoryAuditSink::new()),
                )
            }
            StoreConfig::Postgres {
                database_url,
                max_connections,
            } => {
                let (store, sink) = postgres::connect(database_url, *max_connections).await?;
                (Arc::new(store), Arc::new(sink))
            }
        };

        Ok(Self::with_collaborators(store, audit, config.match_policy))
    }

    /// Wire the engine over explicit collaborators. Lifecycle of the store
    /// and sink belongs to the surrounding process, not to the engine.
    pub fn with_collaborators(
        store: Arc<dyn StudentStore>,
        audit: Arc<dyn AuditSink>,
        match_policy: MatchPolicy,
    ) -> Self {
        let engine = Arc::new(ValidationEngine::new(
            store.clone(),
            audit.clone(),
            match_policy,
        ));
        Self {
            engine,
            store,
            audit,
        }
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/validate-student", post(validate_student))
        .route("/api/students", get(list_students).post(create_student))
        .route(
            "/api/students/:record_id",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/api/logs", get(list_logs))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Core(#[from] VerigeniusError),
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Http { status, message } => (status, message),
            ApiError::Core(err) => {
                let status = match &err {
                    VerigeniusError::DuplicateExternalId(_) => StatusCode::CONFLICT,
                    VerigeniusError::RecordNotFound(_) => StatusCode::NOT_FOUND,
                    VerigeniusError::InvalidExternalId(_)
                    | VerigeniusError::UnknownLevel(_)
                    | VerigeniusError::UnknownFieldOfStudy(_)
                    | VerigeniusError::InvalidClassAssignment(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(%err, "admin request failed");
                    (status, "Internal server error.".to_string())
                } else {
                    (status, err.to_string())
                }
            }
        };

        (
            status,
            Json(serde_json::json!({ "success": false, "message": message })),
        )
            .into_response()
    }
}

/// Prefer the first `X-Forwarded-For` hop, then the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// The decision route. Takes the raw body so malformed payloads reach the
/// engine and its audit discipline; the outcome-to-response mapping is fixed
/// in core.
async fn validate_student(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: String,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let outcome = state
        .engine
        .validate(&body, &client_ip(&headers, peer))
        .await;

    let status = StatusCode::from_u16(outcome.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(outcome.response_body())).into_response()
}

/// Admin create/update payload. Names are canonicalized here, at write time;
/// the validation path never rewrites stored names.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPayload {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub level: Level,
    pub field_of_study: FieldOfStudy,
    pub status: EnrollmentStatus,
    pub class_id: ClassAssignment,
}

impl StudentPayload {
    fn into_record(self, record_id: String) -> Result<StudentRecord, ApiError> {
        let external_id = ExternalId::new(self.student_id.trim())?;
        if !self.status.is_known() {
            return Err(ApiError::bad_request(format!(
                "unknown status '{}'",
                self.status
            )));
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(ApiError::bad_request("first and last name are required"));
        }

        Ok(StudentRecord {
            record_id,
            external_id,
            first_name: canonical_first_name(&self.first_name),
            last_name: canonical_last_name(&self.last_name),
            level: self.level,
            field_of_study: self.field_of_study,
            status: self.status,
            class_assignment: self.class_id,
        })
    }
}

async fn list_students(
    State(state): State<ServiceState>,
) -> Result<Json<Vec<StudentRecord>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

async fn create_student(
    State(state): State<ServiceState>,
    Json(payload): Json<StudentPayload>,
) -> Result<(StatusCode, Json<StudentRecord>), ApiError> {
    let record = payload.into_record(Uuid::new_v4().to_string())?;
    let stored = state.store.insert(record).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn get_student(
    State(state): State<ServiceState>,
    Path(record_id): Path<String>,
) -> Result<Json<StudentRecord>, ApiError> {
    state
        .store
        .get(&record_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("student '{record_id}' not found")))
}

async fn update_student(
    State(state): State<ServiceState>,
    Path(record_id): Path<String>,
    Json(payload): Json<StudentPayload>,
) -> Result<Json<StudentRecord>, ApiError> {
    let existing = state
        .store
        .get(&record_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("student '{record_id}' not found")))?;

    let record = payload.into_record(record_id)?;
    if record.external_id != existing.external_id {
        return Err(ApiError::bad_request("the matricule is immutable once assigned"));
    }

    Ok(Json(state.store.update(record).await?))
}

async fn delete_student(
    State(state): State<ServiceState>,
    Path(record_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete(&record_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("student '{record_id}' not found")))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
struct LogsResponse {
    backend: String,
    returned: usize,
    items: Vec<AuditEntry>,
}

async fn list_logs(
    State(state): State<ServiceState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(100).min(1000);
    let items = state.audit.tail(limit).await?;
    Ok(Json(LogsResponse {
        backend: state.audit.backend().to_string(),
        returned: items.len(),
        items,
    }))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    store_backend: &'static str,
    audit_backend: &'static str,
    match_policy: &'static str,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "verigenius-service",
        store_backend: state.store.backend(),
        audit_backend: state.audit.backend(),
        match_policy: state.engine.match_policy().label(),
    })
}
