// ==========================================
// 产能同步引擎 - 同步任务仓储
// ==========================================
// 表: sync_job
// 状态流转: PENDING → RUNNING → SUCCEEDED | FAILED
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::sync_job::{SyncJob, SyncJobStatus, SyncTriggerSource};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    job_id, week, year, trigger_source, status, created_at,
    started_at, completed_at, error_message, summary_json
"#;

pub struct SyncJobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SyncJobRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, job: &SyncJob) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO sync_job (
              job_id, week, year, trigger_source, status, created_at,
              started_at, completed_at, error_message, summary_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                job.job_id,
                job.week,
                job.year,
                job.trigger_source.as_str(),
                job.status.as_str(),
                job.created_at,
                job.started_at,
                job.completed_at,
                job.error_message,
                job.summary_json,
            ],
        )?;
        Ok(())
    }

    /// PENDING → RUNNING
    pub fn mark_running(&self, job_id: &str, started_at: &str) -> RepositoryResult<()> {
        self.transition(
            job_id,
            SyncJobStatus::Pending,
            SyncJobStatus::Running,
            "UPDATE sync_job SET status = 'RUNNING', started_at = ?2 WHERE job_id = ?1 AND status = 'PENDING'",
            params![job_id, started_at],
        )
    }

    /// RUNNING → SUCCEEDED
    pub fn mark_succeeded(
        &self,
        job_id: &str,
        completed_at: &str,
        summary_json: &str,
    ) -> RepositoryResult<()> {
        self.transition(
            job_id,
            SyncJobStatus::Running,
            SyncJobStatus::Succeeded,
            "UPDATE sync_job SET status = 'SUCCEEDED', completed_at = ?2, summary_json = ?3
             WHERE job_id = ?1 AND status = 'RUNNING'",
            params![job_id, completed_at, summary_json],
        )
    }

    /// PENDING/RUNNING → FAILED
    pub fn mark_failed(
        &self,
        job_id: &str,
        completed_at: &str,
        error_message: &str,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE sync_job SET status = 'FAILED', completed_at = ?2, error_message = ?3
             WHERE job_id = ?1 AND status IN ('PENDING', 'RUNNING')",
            params![job_id, completed_at, error_message],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "sync_job(active)".to_string(),
                id: job_id.to_string(),
            });
        }
        Ok(())
    }

    fn transition(
        &self,
        job_id: &str,
        from: SyncJobStatus,
        to: SyncJobStatus,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(sql, params)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: format!("sync_job({}→{})", from, to),
                id: job_id.to_string(),
            });
        }
        Ok(())
    }

    /// 进程重启后遗留的未结束任务统一置为 FAILED
    ///
    /// # 返回
    /// 受影响的任务数
    pub fn fail_unfinished(&self, completed_at: &str, reason: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE sync_job SET status = 'FAILED', completed_at = ?1, error_message = ?2
             WHERE status IN ('PENDING', 'RUNNING')",
            params![completed_at, reason],
        )?;
        Ok(affected)
    }

    /// 清理已结束的历史任务，仅保留最近 keep 条（未结束任务不删除）
    ///
    /// # 返回
    /// 删除的任务数
    pub fn prune_finished(&self, keep: usize) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM sync_job
             WHERE status IN ('SUCCEEDED', 'FAILED')
               AND job_id NOT IN (
                 SELECT job_id FROM sync_job
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?1
               )",
            params![keep as i64],
        )?;
        Ok(deleted)
    }

    pub fn find_by_id(&self, job_id: &str) -> RepositoryResult<Option<SyncJob>> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("SELECT {} FROM sync_job WHERE job_id = ?1", SELECT_COLUMNS),
            params![job_id],
            map_job_row,
        )
        .optional()
        .map_err(|e| e.into())
    }

    /// 最近的任务（按创建时间倒序）
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<SyncJob>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sync_job ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            SELECT_COLUMNS
        ))?;
        let jobs = stmt
            .query_map(params![limit as i64], map_job_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }
}

fn map_job_row(row: &Row) -> rusqlite::Result<SyncJob> {
    Ok(SyncJob {
        job_id: row.get(0)?,
        week: row.get(1)?,
        year: row.get(2)?,
        trigger_source: SyncTriggerSource::parse(&row.get::<_, String>(3)?),
        status: SyncJobStatus::parse(&row.get::<_, String>(4)?),
        created_at: row.get(5)?,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
        error_message: row.get(8)?,
        summary_json: row.get(9)?,
    })
}
