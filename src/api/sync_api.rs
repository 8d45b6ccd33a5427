// ==========================================
// 产能同步引擎 - 同步触发 API
// ==========================================
// 职责: 受理同步请求、查询任务状态、输出接口元数据
// 说明: 受理即返回，流程由 SyncJobRunner 在后台执行
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::sync_job::{SyncJob, SyncJobStatus, SyncRequest, SyncTriggerSource};
use crate::engine::resolve_week;
use crate::i18n::{t, t_with_args};
use crate::services::SyncJobRunner;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 触发结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTriggerResponse {
    pub job_id: String,
    pub status: SyncJobStatus,
    pub message: String,
}

/// 任务状态视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJobView {
    pub job_id: String,
    pub status: SyncJobStatus,
    pub status_label: String,
    pub trigger_source: SyncTriggerSource,
    pub week: Option<u32>,
    pub year: Option<i32>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
    /// 成功时的同步摘要
    pub summary: Option<serde_json::Value>,
}

impl From<SyncJob> for SyncJobView {
    fn from(job: SyncJob) -> Self {
        let status_label = t(&format!("sync.status.{}", job.status.as_str().to_lowercase()));
        let summary = job
            .summary_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        Self {
            job_id: job.job_id,
            status: job.status,
            status_label,
            trigger_source: job.trigger_source,
            week: job.week,
            year: job.year,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error_message: job.error_message,
            summary,
        }
    }
}

/// GET /api/sync 返回的静态元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEndpointInfo {
    pub endpoint: String,
    pub method: String,
    pub description: String,
    pub body: serde_json::Value,
    pub jobs_endpoint: String,
}

// ==========================================
// SyncApi
// ==========================================
pub struct SyncApi {
    runner: Arc<SyncJobRunner>,
}

impl SyncApi {
    pub fn new(runner: Arc<SyncJobRunner>) -> Self {
        Self { runner }
    }

    /// 受理同步请求
    ///
    /// # 返回
    /// - Ok(SyncTriggerResponse): 已持久化为 PENDING 的任务
    /// - Err(ApiError::InvalidInput): 周号无效（不建任务）
    pub fn trigger(&self, request: SyncRequest, source: SyncTriggerSource) -> ApiResult<SyncTriggerResponse> {
        if request.week.is_some() || request.year.is_some() {
            resolve_week(&request, Local::now().date_naive())?;
        }
        let job_id = self.runner.submit(request, source)?;
        Ok(SyncTriggerResponse {
            job_id,
            status: SyncJobStatus::Pending,
            message: t("sync.triggered"),
        })
    }

    /// 查询任务状态
    pub fn job(&self, job_id: &str) -> ApiResult<SyncJobView> {
        self.runner
            .get_job(job_id)?
            .map(SyncJobView::from)
            .ok_or_else(|| ApiError::NotFound(t_with_args("sync.job_not_found", &[("job_id", job_id)])))
    }

    /// 最近任务
    pub fn recent_jobs(&self, limit: usize) -> ApiResult<Vec<SyncJobView>> {
        Ok(self
            .runner
            .recent_jobs(limit)?
            .into_iter()
            .map(SyncJobView::from)
            .collect())
    }

    /// 接口元数据（不触发同步）
    pub fn endpoint_info(&self) -> SyncEndpointInfo {
        SyncEndpointInfo {
            endpoint: "/api/sync".to_string(),
            method: "POST".to_string(),
            description: t("sync.endpoint_description"),
            body: serde_json::json!({ "week": "number?", "year": "number?" }),
            jobs_endpoint: "/api/sync/jobs/{job_id}".to_string(),
        }
    }
}
