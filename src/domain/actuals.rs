// ==========================================
// 产能同步引擎 - 实绩工时领域模型
// ==========================================
// 职责: 原始工时日志 → 每日每类别交付分钟数
// 唯一键: (log_date, category_code)
// ==========================================

use crate::domain::types::CategoryCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 原始工时日志行（工位代码, 工序名, 日期, 分钟）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTimeLogEntry {
    pub workplace_code: String,
    pub operation_name: String,
    pub log_date: NaiveDate,
    pub minutes: f64,
    pub row_number: usize,
}

/// 每日每类别汇总（leadott_perc = 交付分钟数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPercLog {
    pub log_date: NaiveDate,
    pub category_code: CategoryCode,
    pub leadott_perc: f64,
}

/// 已落库的汇总行（带更新时间）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCategoryPercLog {
    pub log_date: NaiveDate,
    pub category_code: CategoryCode,
    pub leadott_perc: f64,
    pub updated_at: String,
}

/// upsert 结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl UpsertOutcome {
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}
