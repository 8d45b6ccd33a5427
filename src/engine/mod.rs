// ==========================================
// 产能同步引擎 - 引擎层
// ==========================================
// 职责: 周计划拆日、工时/人力计算、同步流程编排
// 红线: Engine 不拼 SQL，数据访问统一走 Repository
// ==========================================

pub mod capacity_calculator;
pub mod error;
pub mod plan_builder;
pub mod sync_pipeline;

// 重导出核心引擎
pub use capacity_calculator::{ceil_headcount, CapacityCalculator, CEIL_TOLERANCE};
pub use error::{EngineError, EngineResult};
pub use plan_builder::{split_weekly_demand, PlanBuilder};
pub use sync_pipeline::{resolve_week, ActualsSource, SyncError, SyncPipeline, SyncReport, SyncResult};
