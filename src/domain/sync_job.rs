// ==========================================
// 产能同步引擎 - 同步任务领域模型
// ==========================================
// 职责: 同步任务 ID / 状态 / 触发来源
// 状态流转: PENDING → RUNNING → SUCCEEDED | FAILED
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 同步任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncJobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl SyncJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncJobStatus::Pending => "PENDING",
            SyncJobStatus::Running => "RUNNING",
            SyncJobStatus::Succeeded => "SUCCEEDED",
            SyncJobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "PENDING" => SyncJobStatus::Pending,
            "RUNNING" => SyncJobStatus::Running,
            "SUCCEEDED" => SyncJobStatus::Succeeded,
            _ => SyncJobStatus::Failed,
        }
    }

    /// 是否已结束
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncJobStatus::Succeeded | SyncJobStatus::Failed)
    }
}

impl fmt::Display for SyncJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 同步请求（周/年缺省时取当前 ISO 周）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub week: Option<u32>,
    pub year: Option<i32>,
}

/// 触发来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncTriggerSource {
    Http,
    Scheduler,
    Cli,
}

impl SyncTriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTriggerSource::Http => "HTTP",
            SyncTriggerSource::Scheduler => "SCHEDULER",
            SyncTriggerSource::Cli => "CLI",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "SCHEDULER" => SyncTriggerSource::Scheduler,
            "CLI" => SyncTriggerSource::Cli,
            _ => SyncTriggerSource::Http,
        }
    }
}

/// 同步任务记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    pub job_id: String,
    pub week: Option<u32>,
    pub year: Option<i32>,
    pub trigger_source: SyncTriggerSource,
    pub status: SyncJobStatus,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
    /// 成功时的 SyncReport（JSON）
    pub summary_json: Option<String>,
}
