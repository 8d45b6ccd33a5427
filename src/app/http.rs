// ==========================================
// 产能同步引擎 - HTTP 路由
// ==========================================
// 路由:
//   POST /api/sync              受理同步（202 + job_id）
//   GET  /api/sync              接口元数据（不触发）
//   GET  /api/sync/jobs         最近任务
//   GET  /api/sync/jobs/:job_id 任务状态
//   GET  /api/capacity          周产能报表
//   GET  /api/actuals           实绩工时
//   GET  /health
// 约束: 服务端错误统一返回通用 500，细节只写日志
// ==========================================

use crate::api::{ApiError, ApiResult};
use crate::app::state::AppState;
use crate::domain::sync_job::{SyncRequest, SyncTriggerSource};
use crate::i18n::{t, t_with_args};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

/// 最近任务默认条数
const DEFAULT_JOB_LIMIT: usize = 20;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            _ => {
                error!(error = %self, "请求处理失败");
                (StatusCode::INTERNAL_SERVER_ERROR, t("common.internal_error"))
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// 数据库访问放到阻塞线程池，避免占用异步工作线程
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?
}

// ===== 同步 =====

async fn trigger_sync(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request = if body.iter().all(|b| b.is_ascii_whitespace()) {
        SyncRequest::default()
    } else {
        serde_json::from_slice::<SyncRequest>(&body).map_err(|e| {
            let reason = e.to_string();
            ApiError::InvalidInput(t_with_args("common.invalid_input", &[("reason", reason.as_str())]))
        })?
    };

    let response = blocking(move || state.sync_api.trigger(request, SyncTriggerSource::Http)).await?;
    Ok((StatusCode::ACCEPTED, Json(response)).into_response())
}

async fn sync_info(State(state): State<AppState>) -> Response {
    Json(state.sync_api.endpoint_info()).into_response()
}

#[derive(Debug, Deserialize)]
struct JobListQuery {
    limit: Option<usize>,
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> ApiResult<Response> {
    let limit = query.limit.unwrap_or(DEFAULT_JOB_LIMIT);
    let jobs = blocking(move || state.sync_api.recent_jobs(limit)).await?;
    Ok(Json(jobs).into_response())
}

async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job = blocking(move || state.sync_api.job(&job_id)).await?;
    Ok(Json(job).into_response())
}

// ===== 读接口 =====

#[derive(Debug, Deserialize)]
struct CapacityQuery {
    week: Option<u32>,
    year: Option<i32>,
}

async fn capacity_report(
    State(state): State<AppState>,
    Query(query): Query<CapacityQuery>,
) -> ApiResult<Response> {
    let report =
        blocking(move || state.capacity_api.capacity_report(query.week, query.year)).await?;
    Ok(Json(report).into_response())
}

#[derive(Debug, Deserialize)]
struct ActualsQuery {
    from: NaiveDate,
    to: NaiveDate,
}

async fn category_actuals(
    State(state): State<AppState>,
    Query(query): Query<ActualsQuery>,
) -> ApiResult<Response> {
    let rows = blocking(move || state.capacity_api.category_actuals(query.from, query.to)).await?;
    Ok(Json(rows).into_response())
}

async fn health() -> &'static str {
    "healthy"
}

/// 构建路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sync", post(trigger_sync).get(sync_info))
        .route("/api/sync/jobs", get(list_jobs))
        .route("/api/sync/jobs/:job_id", get(get_job))
        .route("/api/capacity", get(capacity_report))
        .route("/api/actuals", get(category_actuals))
        .with_state(state)
        .route("/health", get(health))
}

/// 启动 HTTP 服务（阻塞直到服务退出）
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(addr = %listener.local_addr()?, "HTTP 服务已启动");
    axum::serve(listener, router(state)).await
}
