//! API request handlers.
//!
//! Every handler follows the same cycle the app has always had: one full
//! load, one piece of work, one response. Failures surface once in the
//! response envelope; there is no retry.

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Session;
use crate::error::OpsResult;
use crate::schema::{SheetTable, NormalizerConfig};
use crate::sheets::{self, SheetWriter, WriteOutcome};
use crate::status::{reconcile_percent, TaskStatus};
use crate::tasks::{self, person_matches};
use crate::types::{AccessScope, Kpis, ProjectKpis, QuarantinedRow, Role, TaskRecord};

use super::server::{AppState, SharedState};

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }
}

//==============================================================================
// Shared helpers
//==============================================================================

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Session, String> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| "missing bearer token".to_string())?;
    let mut inner = state.inner.lock().expect("state lock poisoned");
    inner
        .sessions
        .get(token)
        .ok_or_else(|| "invalid or expired session".to_string())
}

fn can_view_all(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Manager)
}

/// Cached read of the active worksheet.
///
/// The remote backend is a blocking HTTP client; `block_in_place` keeps it
/// off the async worker's back.
fn load_cached(state: &AppState) -> OpsResult<SheetTable> {
    tokio::task::block_in_place(|| {
        let mut inner = state.inner.lock().expect("state lock poisoned");
        let SharedState { store, cache, .. } = &mut *inner;
        let worksheet = state.config.sheet.worksheet.clone();
        let normalizer = state.config.normalizer.clone();
        cache.get_or_refresh(|| sheets::load_table(store.as_ref(), &worksheet, &normalizer))
    })
}

/// Fresh read, bypassing the cache. Used before writes so edits never apply
/// on top of stale rows.
fn load_fresh(state: &AppState) -> OpsResult<SheetTable> {
    tokio::task::block_in_place(|| {
        let inner = state.inner.lock().expect("state lock poisoned");
        sheets::load_table(
            inner.store.as_ref(),
            &state.config.sheet.worksheet,
            &state.config.normalizer,
        )
    })
}

fn save_and_invalidate(state: &AppState, table: &SheetTable) -> OpsResult<WriteOutcome> {
    tokio::task::block_in_place(|| {
        let mut inner = state.inner.lock().expect("state lock poisoned");
        let SharedState { store, cache, .. } = &mut *inner;
        let mut writer = SheetWriter::new(
            &mut **store,
            &state.config.sheet.worksheet,
            &state.config.sheet.archive_worksheet,
        );
        let outcome = writer.save(table)?;
        cache.invalidate();
        Ok(outcome)
    })
}

//==============================================================================
// Health and info endpoints
//==============================================================================

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let endpoint = |path: &str, method: &str, description: &str| EndpointInfo {
        path: path.to_string(),
        method: method.to_string(),
        description: description.to_string(),
    };
    let response = RootResponse {
        name: "MetaFlex Ops API".to_string(),
        version: state.version.clone(),
        description: "Task tracking over the shared operations sheet".to_string(),
        endpoints: vec![
            endpoint("/health", "GET", "Health check endpoint"),
            endpoint("/version", "GET", "Get server version"),
            endpoint("/api/v1/login", "POST", "Log in, returns a session token"),
            endpoint("/api/v1/overview", "GET", "KPIs for the caller's scope"),
            endpoint("/api/v1/tasks", "GET", "List tasks (view=my|all)"),
            endpoint("/api/v1/tasks", "POST", "Add a task"),
            endpoint("/api/v1/tasks/update", "POST", "Update one task's status/due date"),
            endpoint("/api/v1/tasks/save", "POST", "Save an edited grid (guarded)"),
            endpoint("/api/v1/grid", "GET", "Editable grid with physical column ids"),
            endpoint("/api/v1/archive", "GET", "Archived tasks"),
            endpoint("/api/v1/quarantine", "GET", "Rows rejected at load"),
        ],
    };
    Json(ApiResponse::ok(response))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /health - Health check
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: vec![
            "overview".to_string(),
            "tasks".to_string(),
            "save".to_string(),
            "archive".to_string(),
        ],
    }))
}

//==============================================================================
// Auth
//==============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Default)]
pub struct LoginResponse {
    pub token: String,
    pub name: String,
    pub scope_description: String,
    pub expires_at: String,
}

/// POST /api/v1/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let user = match state.credentials.verify(&req.username, &req.password) {
        Ok(user) => user.clone(),
        Err(e) => return Json(ApiResponse::<LoginResponse>::err(e.to_string())),
    };
    let expiry_days = state.credentials.cookie.expiry_days;
    let mut inner = state.inner.lock().expect("state lock poisoned");
    let session = inner.sessions.login(&req.username, &user, expiry_days);
    Json(ApiResponse::ok(LoginResponse {
        token: session.token,
        name: session.name,
        scope_description: session.scope.describe(),
        expires_at: session.expires_at.to_rfc3339(),
    }))
}

#[derive(Serialize, Default)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// POST /api/v1/logout
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        let mut inner = state.inner.lock().expect("state lock poisoned");
        inner.sessions.logout(token);
    }
    Json(ApiResponse::ok(LogoutResponse { logged_out: true }))
}

//==============================================================================
// Overview
//==============================================================================

#[derive(Serialize, Default)]
pub struct OverviewResponse {
    pub user: String,
    pub scope_description: String,
    pub kpis: Kpis,
    pub projects: Vec<ProjectKpis>,
    pub quarantined_rows: usize,
}

/// GET /api/v1/overview - KPIs for the caller's scope
pub async fn overview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let session = match authenticate(&state, &headers) {
        Ok(s) => s,
        Err(e) => return Json(ApiResponse::<OverviewResponse>::err(e)),
    };
    let table = match load_cached(&state) {
        Ok(t) => t,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };
    if table.is_empty() {
        // Empty sheet is information, not an error.
        return Json(ApiResponse::ok(OverviewResponse {
            user: session.name,
            scope_description: session.scope.describe(),
            ..Default::default()
        }));
    }
    let outcome = match tasks::coerce_records(&table) {
        Ok(o) => o,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };
    let visible = tasks::filter_by_scope(&outcome.records, &session.scope, &session.name);
    let kpis = tasks::calculate_kpis(&visible, &session.name);
    let projects = tasks::project_breakdown(&visible);
    Json(ApiResponse::ok(OverviewResponse {
        user: session.name,
        scope_description: session.scope.describe(),
        kpis,
        projects,
        quarantined_rows: outcome.quarantined.len(),
    }))
}

//==============================================================================
// Task lists
//==============================================================================

#[derive(Deserialize, Default)]
pub struct ListParams {
    /// "my" (default) or "all".
    pub view: Option<String>,
    pub project: Option<String>,
    pub person: Option<String>,
    pub search: Option<String>,
}

#[derive(Serialize, Default)]
pub struct TasksResponse {
    pub view: String,
    pub total: usize,
    pub records: Vec<TaskRecord>,
}

/// GET /api/v1/tasks - typed task records, role-gated
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let session = match authenticate(&state, &headers) {
        Ok(s) => s,
        Err(e) => return Json(ApiResponse::<TasksResponse>::err(e)),
    };

    let view = params.view.unwrap_or_else(|| "my".to_string());
    let scope = match view.as_str() {
        "all" if can_view_all(session.role) => session.scope.clone(),
        "all" => {
            return Json(ApiResponse::err(
                "view=all requires an admin or manager account",
            ))
        }
        _ => AccessScope::Own,
    };

    let table = match load_cached(&state) {
        Ok(t) => t,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };
    if table.is_empty() {
        return Json(ApiResponse::ok(TasksResponse {
            view,
            ..Default::default()
        }));
    }
    let outcome = match tasks::coerce_records(&table) {
        Ok(o) => o,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };

    let mut visible = tasks::filter_by_scope(&outcome.records, &scope, &session.name);
    if let Some(project) = &params.project {
        let needle = project.trim().to_lowercase();
        visible.retain(|r| r.project.trim().to_lowercase() == needle);
    }
    if let Some(person) = &params.person {
        visible.retain(|r| person_matches(&r.person, person));
    }
    if let Some(term) = &params.search {
        visible = tasks::search(&visible, term);
    }

    Json(ApiResponse::ok(TasksResponse {
        view,
        total: visible.len(),
        records: visible.into_iter().cloned().collect(),
    }))
}

//==============================================================================
// Add / update / save
//==============================================================================

#[derive(Deserialize)]
pub struct AddTaskRequest {
    pub person: String,
    pub task: String,
    pub project: String,
    #[serde(default)]
    pub transcript_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub date_assigned: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub progress_percent: Option<u8>,
}

#[derive(Serialize, Default)]
pub struct AddTaskResponse {
    pub added: bool,
    pub message: String,
}

/// POST /api/v1/tasks - append one task row
pub async fn add_task(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AddTaskRequest>,
) -> impl IntoResponse {
    if let Err(e) = authenticate(&state, &headers) {
        return Json(ApiResponse::<AddTaskResponse>::err(e));
    }
    for (field, value) in [
        ("person", &req.person),
        ("task", &req.task),
        ("project", &req.project),
    ] {
        if value.trim().is_empty() {
            return Json(ApiResponse::err(format!("{} is required", field)));
        }
    }

    let status_raw = req.status.unwrap_or_else(|| "Open".to_string());
    let status = TaskStatus::parse(&status_raw);
    let progress_percent = reconcile_percent(&status_raw, req.progress_percent);
    let record = TaskRecord {
        transcript_id: req.transcript_id.filter(|t| !t.trim().is_empty()),
        date_assigned: req.date_assigned.as_deref().and_then(tasks::parse_date),
        person: req.person.trim().to_string(),
        task: req.task.trim().to_string(),
        project: req.project.trim().to_string(),
        status,
        due_date: req.due_date.as_deref().and_then(tasks::parse_date),
        notes: req.notes.unwrap_or_default(),
        progress_percent,
    };

    let result = tokio::task::block_in_place(|| {
        let mut inner = state.inner.lock().expect("state lock poisoned");
        let SharedState { store, cache, .. } = &mut *inner;
        let mut writer = SheetWriter::new(
            &mut **store,
            &state.config.sheet.worksheet,
            &state.config.sheet.archive_worksheet,
        );
        let result = writer.append_task(&record);
        if result.is_ok() {
            cache.invalidate();
        }
        result
    });
    match result {
        Ok(()) => Json(ApiResponse::ok(AddTaskResponse {
            added: true,
            message: format!("Task added, assigned to {}", record.person),
        })),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    pub transcript_id: String,
    pub status: String,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Serialize, Default)]
pub struct UpdateTaskResponse {
    pub updated: bool,
    pub archived: usize,
    pub message: String,
}

/// POST /api/v1/tasks/update - one row's status (and optionally due date)
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<UpdateTaskRequest>,
) -> impl IntoResponse {
    let session = match authenticate(&state, &headers) {
        Ok(s) => s,
        Err(e) => return Json(ApiResponse::<UpdateTaskResponse>::err(e)),
    };

    let mut table = match load_fresh(&state) {
        Ok(t) => t,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };
    let row_idx = match tasks::find_by_transcript(&table, &req.transcript_id) {
        Ok(idx) => idx,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };

    // Contributors may only touch their own rows.
    if !can_view_all(session.role) {
        let owner = table
            .column_index("Person")
            .and_then(|idx| table.rows()[row_idx].get(idx))
            .cloned()
            .unwrap_or_default();
        if !person_matches(&owner, &session.name) {
            return Json(ApiResponse::err("task is assigned to someone else"));
        }
    }

    let due_date = req.due_date.as_deref().and_then(tasks::parse_date);
    if let Err(e) = tasks::apply_status_update(&mut table, row_idx, &req.status, due_date) {
        return Json(ApiResponse::err(e.to_string()));
    }

    match save_and_invalidate(&state, &table) {
        Ok(outcome) => Json(ApiResponse::ok(UpdateTaskResponse {
            updated: true,
            archived: outcome.archived,
            message: if outcome.archived > 0 {
                "Task updated and archived".to_string()
            } else {
                "Task updated".to_string()
            },
        })),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

#[derive(Deserialize)]
pub struct SaveGridRequest {
    /// Physical column ids from GET /api/v1/grid.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Serialize, Default)]
pub struct SaveGridResponse {
    pub rows_written: usize,
    pub archived: usize,
}

/// POST /api/v1/tasks/save - full-grid save through the guarded writer
pub async fn save_grid(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SaveGridRequest>,
) -> impl IntoResponse {
    let session = match authenticate(&state, &headers) {
        Ok(s) => s,
        Err(e) => return Json(ApiResponse::<SaveGridResponse>::err(e)),
    };
    if !can_view_all(session.role) {
        return Json(ApiResponse::err(
            "full-grid save requires an admin or manager account",
        ));
    }

    let table = SheetTable::from_parts(req.columns, req.rows);
    match save_and_invalidate(&state, &table) {
        Ok(outcome) => Json(ApiResponse::ok(SaveGridResponse {
            rows_written: outcome.rows_written,
            archived: outcome.archived,
        })),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

//==============================================================================
// Grid / archive / quarantine
//==============================================================================

#[derive(Serialize, Default)]
pub struct GridResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// GET /api/v1/grid - the normalized table with physical column ids
pub async fn grid(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let session = match authenticate(&state, &headers) {
        Ok(s) => s,
        Err(e) => return Json(ApiResponse::<GridResponse>::err(e)),
    };
    if !can_view_all(session.role) {
        return Json(ApiResponse::err(
            "the editable grid requires an admin or manager account",
        ));
    }
    match load_cached(&state) {
        Ok(table) => Json(ApiResponse::ok(GridResponse {
            columns: table.columns().to_vec(),
            rows: table.rows().to_vec(),
        })),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

#[derive(Serialize, Default)]
pub struct ArchiveResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total: usize,
}

/// GET /api/v1/archive - archived tasks
pub async fn archive(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(e) = authenticate(&state, &headers) {
        return Json(ApiResponse::<ArchiveResponse>::err(e));
    }
    // The archive carries one extra declared column (Archived Date); widen
    // the cap so it survives normalization.
    let normalizer = NormalizerConfig {
        max_columns: state.config.normalizer.max_columns + 1,
        ..state.config.normalizer.clone()
    };
    let table = tokio::task::block_in_place(|| {
        let inner = state.inner.lock().expect("state lock poisoned");
        sheets::load_table(
            inner.store.as_ref(),
            &state.config.sheet.archive_worksheet,
            &normalizer,
        )
    });
    match table {
        Ok(table) => Json(ApiResponse::ok(ArchiveResponse {
            columns: table.clean_headers(),
            total: table.row_count(),
            rows: table.rows().to_vec(),
        })),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}

#[derive(Serialize, Default)]
pub struct QuarantineResponse {
    pub rows: Vec<QuarantinedRow>,
}

/// GET /api/v1/quarantine - rows the coercion step refused
pub async fn quarantine(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let session = match authenticate(&state, &headers) {
        Ok(s) => s,
        Err(e) => return Json(ApiResponse::<QuarantineResponse>::err(e)),
    };
    if !can_view_all(session.role) {
        return Json(ApiResponse::err(
            "quarantine inspection requires an admin or manager account",
        ));
    }
    let table = match load_cached(&state) {
        Ok(t) => t,
        Err(e) => return Json(ApiResponse::err(e.to_string())),
    };
    if table.is_empty() {
        return Json(ApiResponse::ok(QuarantineResponse::default()));
    }
    match tasks::coerce_records(&table) {
        Ok(outcome) => Json(ApiResponse::ok(QuarantineResponse {
            rows: outcome.quarantined,
        })),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}
