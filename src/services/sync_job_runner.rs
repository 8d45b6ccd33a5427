// ==========================================
// 产能同步引擎 - 同步任务执行器
// ==========================================
// 职责: 受理同步请求 → 持久化任务状态 → 串行执行同步流程
// 状态: PENDING → RUNNING → SUCCEEDED | FAILED
// 约束: 同一时刻最多一个同步流程在跑；失败不自动重试
// ==========================================

use crate::config::SyncConfigReader;
use crate::domain::sync_job::{SyncJob, SyncJobStatus, SyncRequest, SyncTriggerSource};
use crate::engine::sync_pipeline::{SyncPipeline, SyncReport};
use crate::repository::{RepositoryResult, SyncJobRepository};
use chrono::Local;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// 进程重启时遗留任务的失败原因
pub const INTERRUPTED_REASON: &str = "进程重启，任务中断";

/// 已结束任务的保留条数
pub const JOB_RETENTION: usize = 500;

fn now_text() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

// ==========================================
// SyncJobRunner
// ==========================================
pub struct SyncJobRunner {
    pipeline: Arc<SyncPipeline>,
    config: Arc<dyn SyncConfigReader>,
    job_repo: SyncJobRepository,
    run_lock: AsyncMutex<()>,
    completions: Mutex<HashMap<String, watch::Receiver<SyncJobStatus>>>,
}

impl SyncJobRunner {
    /// 创建执行器
    ///
    /// 启动时把上一进程遗留的 PENDING/RUNNING 任务置为 FAILED
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        config: Arc<dyn SyncConfigReader>,
    ) -> RepositoryResult<Arc<Self>> {
        let job_repo = SyncJobRepository::from_connection(conn.clone());
        let stale = job_repo.fail_unfinished(&now_text(), INTERRUPTED_REASON)?;
        if stale > 0 {
            warn!(stale, "遗留同步任务已标记为失败");
        }
        let pruned = job_repo.prune_finished(JOB_RETENTION)?;
        if pruned > 0 {
            info!(pruned, keep = JOB_RETENTION, "历史同步任务已清理");
        }

        Ok(Arc::new(Self {
            pipeline: Arc::new(SyncPipeline::new(conn)),
            config,
            job_repo,
            run_lock: AsyncMutex::new(()),
            completions: Mutex::new(HashMap::new()),
        }))
    }

    /// 提交同步任务（立即返回任务 ID，流程在后台执行）
    ///
    /// # 参数
    /// - request: 目标周（可缺省）
    /// - source: 触发来源
    ///
    /// # 返回
    /// - Ok(job_id): 任务已持久化为 PENDING
    pub fn submit(
        self: &Arc<Self>,
        request: SyncRequest,
        source: SyncTriggerSource,
    ) -> RepositoryResult<String> {
        let job = SyncJob {
            job_id: Uuid::new_v4().to_string(),
            week: request.week,
            year: request.year,
            trigger_source: source,
            status: SyncJobStatus::Pending,
            created_at: now_text(),
            started_at: None,
            completed_at: None,
            error_message: None,
            summary_json: None,
        };
        self.job_repo.insert(&job)?;

        let (tx, rx) = watch::channel(SyncJobStatus::Pending);
        if let Ok(mut completions) = self.completions.lock() {
            completions.insert(job.job_id.clone(), rx);
        }

        info!(
            job_id = %job.job_id,
            source = source.as_str(),
            week = ?request.week,
            year = ?request.year,
            "同步任务已受理"
        );

        let runner = Arc::clone(self);
        let job_id = job.job_id.clone();
        tokio::spawn(async move {
            runner.execute(job_id, request, tx).await;
        });

        Ok(job.job_id)
    }

    /// 提交并等待任务结束（CLI 使用）
    pub async fn submit_and_wait(
        self: &Arc<Self>,
        request: SyncRequest,
        source: SyncTriggerSource,
    ) -> RepositoryResult<Option<SyncJob>> {
        let job_id = self.submit(request, source)?;
        self.wait(&job_id).await
    }

    /// 等待任务进入终态，返回最终任务记录
    pub async fn wait(&self, job_id: &str) -> RepositoryResult<Option<SyncJob>> {
        let receiver = self
            .completions
            .lock()
            .ok()
            .and_then(|completions| completions.get(job_id).cloned());

        if let Some(mut rx) = receiver {
            // 发送端已关闭时以库中状态为准
            let _ = rx.wait_for(|status| status.is_terminal()).await;
        }
        self.job_repo.find_by_id(job_id)
    }

    /// 查询任务
    pub fn get_job(&self, job_id: &str) -> RepositoryResult<Option<SyncJob>> {
        self.job_repo.find_by_id(job_id)
    }

    /// 最近任务列表
    pub fn recent_jobs(&self, limit: usize) -> RepositoryResult<Vec<SyncJob>> {
        self.job_repo.list_recent(limit)
    }

    async fn execute(
        &self,
        job_id: String,
        request: SyncRequest,
        done: watch::Sender<SyncJobStatus>,
    ) {
        let _guard = self.run_lock.lock().await;

        let status = match self.run_job(&job_id, request).await {
            Ok(report) => self.finish_succeeded(&job_id, &report),
            Err(message) => self.finish_failed(&job_id, &message),
        };

        let _ = done.send(status);
        if let Ok(mut completions) = self.completions.lock() {
            completions.remove(&job_id);
        }

        if let Err(e) = self.job_repo.prune_finished(JOB_RETENTION) {
            warn!(error = %e, "历史同步任务清理失败");
        }
    }

    async fn run_job(&self, job_id: &str, request: SyncRequest) -> Result<SyncReport, String> {
        self.job_repo
            .mark_running(job_id, &now_text())
            .map_err(|e| e.to_string())?;

        let settings = self
            .config
            .get_sync_settings()
            .await
            .map_err(|e| e.to_string())?;

        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || pipeline.run(&settings, &request))
            .await
            .map_err(|e| format!("同步线程异常退出: {}", e))?
            .map_err(|e| e.to_string())
    }

    fn finish_succeeded(&self, job_id: &str, report: &SyncReport) -> SyncJobStatus {
        let summary = match serde_json::to_string(report) {
            Ok(summary) => summary,
            Err(e) => return self.finish_failed(job_id, &format!("摘要序列化失败: {}", e)),
        };

        match self.job_repo.mark_succeeded(job_id, &now_text(), &summary) {
            Ok(()) => {
                info!(job_id, elapsed_ms = report.elapsed_ms, "同步任务成功");
                SyncJobStatus::Succeeded
            }
            Err(e) => {
                error!(job_id, error = %e, "同步任务状态写入失败");
                SyncJobStatus::Failed
            }
        }
    }

    fn finish_failed(&self, job_id: &str, message: &str) -> SyncJobStatus {
        error!(job_id, error = message, "同步任务失败");
        if let Err(e) = self.job_repo.mark_failed(job_id, &now_text(), message) {
            error!(job_id, error = %e, "同步任务状态写入失败");
        }
        SyncJobStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::db::ensure_schema;

    fn shared_conn() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[tokio::test]
    async fn test_job_without_workbook_fails_with_message() {
        let conn = shared_conn();
        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
        let runner = SyncJobRunner::new(conn, config).unwrap();

        let job = runner
            .submit_and_wait(
                SyncRequest { week: Some(12), year: Some(2026) },
                SyncTriggerSource::Cli,
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(job.status, SyncJobStatus::Failed);
        assert_eq!(job.trigger_source, SyncTriggerSource::Cli);
        assert!(job.started_at.is_some());
        assert!(job.error_message.unwrap().contains("workbook_path"));
    }

    #[tokio::test]
    async fn test_stale_jobs_failed_on_startup() {
        let conn = shared_conn();
        let repo = SyncJobRepository::from_connection(conn.clone());
        repo.insert(&SyncJob {
            job_id: "stale".to_string(),
            week: None,
            year: None,
            trigger_source: SyncTriggerSource::Scheduler,
            status: SyncJobStatus::Pending,
            created_at: "2026-03-16 08:00:00".to_string(),
            started_at: None,
            completed_at: None,
            error_message: None,
            summary_json: None,
        })
        .unwrap();

        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
        let runner = SyncJobRunner::new(conn, config).unwrap();
        let job = runner.get_job("stale").unwrap().unwrap();
        assert_eq!(job.status, SyncJobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some(INTERRUPTED_REASON));
    }

    #[tokio::test]
    async fn test_old_jobs_pruned_on_startup() {
        let conn = shared_conn();
        let repo = SyncJobRepository::from_connection(conn.clone());
        for i in 0..JOB_RETENTION + 3 {
            repo.insert(&SyncJob {
                job_id: format!("old-{}", i),
                week: None,
                year: None,
                trigger_source: SyncTriggerSource::Scheduler,
                status: SyncJobStatus::Pending,
                created_at: "2026-03-16 08:00:00".to_string(),
                started_at: None,
                completed_at: None,
                error_message: None,
                summary_json: None,
            })
            .unwrap();
        }

        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
        let runner = SyncJobRunner::new(conn, config).unwrap();

        assert_eq!(runner.recent_jobs(JOB_RETENTION + 10).unwrap().len(), JOB_RETENTION);
        assert!(runner.get_job("old-0").unwrap().is_none());
        assert!(runner.get_job("old-3").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_job_is_none() {
        let conn = shared_conn();
        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
        let runner = SyncJobRunner::new(conn, config).unwrap();
        assert!(runner.wait("missing").await.unwrap().is_none());
    }
}
