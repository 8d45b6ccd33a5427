// ==========================================
// 产能同步引擎 - 定时同步
// ==========================================
// 职责: 按固定间隔向执行器提交同步任务（目标周 = 当前 ISO 周）
// 说明: 间隔为 0 时不启动；启动后第一次提交在一个完整间隔之后
// ==========================================

use crate::domain::sync_job::{SyncRequest, SyncTriggerSource};
use crate::services::sync_job_runner::SyncJobRunner;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

/// 启动定时同步
///
/// # 返回
/// - None: 间隔为 0（已关闭）
/// - Some(handle): 后台任务句柄
pub fn spawn_scheduler(runner: Arc<SyncJobRunner>, interval_minutes: u64) -> Option<JoinHandle<()>> {
    if interval_minutes == 0 {
        info!("定时同步已关闭");
        return None;
    }

    let period = Duration::from_secs(interval_minutes * 60);
    info!(interval_minutes, "定时同步已启动");

    Some(tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match runner.submit(SyncRequest::default(), SyncTriggerSource::Scheduler) {
                Ok(job_id) => info!(job_id = %job_id, "定时同步已提交"),
                Err(e) => error!(error = %e, "定时同步提交失败"),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::db::ensure_schema;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn runner() -> Arc<SyncJobRunner> {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
        SyncJobRunner::new(conn, config).unwrap()
    }

    #[tokio::test]
    async fn test_zero_interval_disables_scheduler() {
        assert!(spawn_scheduler(runner(), 0).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_submits_after_one_period() {
        let runner = runner();
        let handle = spawn_scheduler(runner.clone(), 1).unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(runner.recent_jobs(10).unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        let jobs = runner.recent_jobs(10).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].trigger_source, SyncTriggerSource::Scheduler);

        handle.abort();
    }
}
