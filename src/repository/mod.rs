// ==========================================
// 产能同步引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod category_perc_repo;
pub mod daily_plan_repo;
pub mod error;
pub mod product_norm_repo;
pub mod sync_job_repo;

// 重导出核心仓储
pub use category_perc_repo::CategoryPercRepository;
pub use daily_plan_repo::DailyPlanRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use product_norm_repo::ProductNormRepository;
pub use sync_job_repo::SyncJobRepository;
