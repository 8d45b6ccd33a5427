// ==========================================
// 产能同步引擎 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("人均日产能无效: {capacity}（班时 {shift_minutes} × 班次 {shift_count} × 效率 {efficiency_percent}%）")]
    InvalidCapacity {
        capacity: f64,
        shift_minutes: f64,
        shift_count: u32,
        efficiency_percent: f64,
    },

    #[error("无效的 ISO 周: {year} 年第 {week} 周")]
    InvalidWeek { year: i32, week: u32 },
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
