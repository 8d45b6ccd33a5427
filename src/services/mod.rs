// ==========================================
// 产能同步引擎 - 服务层
// ==========================================
// 职责: 同步任务受理、串行执行与定时触发
// ==========================================

pub mod scheduler;
pub mod sync_job_runner;

pub use scheduler::spawn_scheduler;
pub use sync_job_runner::{SyncJobRunner, INTERRUPTED_REASON, JOB_RETENTION};
