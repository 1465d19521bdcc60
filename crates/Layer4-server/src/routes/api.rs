//! REST handlers

use super::{ApiResult, AppState};
use axum::extract::{Path, Query, State};
use axum::Json;
use ralph_foundation::LogLevel;
use ralph_task::{LaunchOptions, ProcessStatus};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_LOG_COUNT: usize = 100;
const DEFAULT_FILE_LINES: usize = 500;
const DEFAULT_HISTORY_SECONDS: u64 = 300;

// ============================================================================
// Projects
// ============================================================================

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let projects: Vec<ProcessStatus> = state
        .engine
        .projects()?
        .iter()
        .map(|name| state.engine.status(name))
        .collect();
    Ok(Json(json!({ "projects": projects })))
}

pub async fn status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ProcessStatus>> {
    state.engine.registry().resolve(&name)?;
    Ok(Json(state.engine.status(&name)))
}

pub async fn launch(
    State(state): State<AppState>,
    Path(name): Path<String>,
    options: Option<Json<LaunchOptions>>,
) -> ApiResult<Json<Value>> {
    let options = options.map(|Json(o)| o).unwrap_or_default();
    let status = state.engine.launch(&name, options).await?;
    Ok(control_response(format!("Launched {}", name), status))
}

pub async fn stop(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let status = state.engine.stop(&name).await?;
    Ok(control_response(format!("Stopped {}", name), status))
}

pub async fn pause(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let status = state.engine.pause(&name).await?;
    Ok(control_response(format!("Paused {}", name), status))
}

pub async fn resume(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let status = state.engine.resume(&name).await?;
    Ok(control_response(format!("Resumed {}", name), status))
}

fn control_response(message: String, status: ProcessStatus) -> Json<Value> {
    Json(json!({ "success": true, "message": message, "status": status }))
}

// ============================================================================
// Logs
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub count: Option<usize>,
    pub keyword: Option<String>,
    pub level: Option<String>,
}

pub async fn logs(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<LogQuery>,
) -> ApiResult<Json<Value>> {
    let level = query
        .level
        .as_deref()
        .filter(|l| !l.is_empty())
        .map(str::parse::<LogLevel>)
        .transpose()?;
    let lines = state.engine.get_lines(
        &name,
        query.count.unwrap_or(DEFAULT_LOG_COUNT),
        query.keyword.as_deref(),
        level,
    );
    Ok(Json(json!({ "project": name, "lines": lines })))
}

pub async fn clear_logs(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let cleared = state.engine.clear_logs(&name);
    Ok(Json(json!({ "success": true, "cleared": cleared })))
}

pub async fn log_files(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let files = state.engine.log_files(&name)?;
    Ok(Json(json!({ "project": name, "files": files })))
}

#[derive(Debug, Deserialize)]
pub struct ReadFileQuery {
    pub path: String,
    pub max_lines: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn read_log_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ReadFileQuery>,
) -> ApiResult<Json<Value>> {
    let lines = state
        .engine
        .read_log_file(
            &name,
            std::path::Path::new(&query.path),
            query.max_lines.unwrap_or(DEFAULT_FILE_LINES),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(json!({ "project": name, "path": query.path, "lines": lines })))
}

// ============================================================================
// System metrics
// ============================================================================

pub async fn metrics(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "metrics": state.engine.latest_metrics() }))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub seconds: Option<u64>,
}

pub async fn metrics_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Value> {
    let window = Duration::from_secs(query.seconds.unwrap_or(DEFAULT_HISTORY_SECONDS));
    Json(json!({ "history": state.engine.metrics_history(window) }))
}
