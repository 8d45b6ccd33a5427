// ==========================================
// 产能同步引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、值对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod actuals;
pub mod capacity;
pub mod plan;
pub mod product;
pub mod sync_job;
pub mod types;

// 重导出核心类型
pub use actuals::{CategoryPercLog, RawTimeLogEntry, StoredCategoryPercLog, UpsertOutcome};
pub use capacity::{
    CapacityParams, CapacityReport, CapacitySummary, DailyTotal, DayCapacity, TypeDemand,
    WeeklyCapacity,
};
pub use plan::{
    BlockEnd, CoilPlanRow, CoilSplitPolicy, DailyPlanEntry, ExtractedPlan, FixPlanRow, WeeklyPlan,
};
pub use product::{NormCatalog, ProductType};
pub use sync_job::{SyncJob, SyncJobStatus, SyncRequest, SyncTriggerSource};
pub use types::{normalize_type_code, CategoryCode, IsoWeek, ProductFamily, WORKDAYS_PER_WEEK};
