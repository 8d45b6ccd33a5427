// ==========================================
// 产能同步引擎 - 核心库
// ==========================================
// 系统定位: 周计划工作簿 → 逐日计划/型号定额/实绩工时落库 → 按工序类别的人力需求
// 技术栈: Rust + SQLite + axum
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 导入层 - 工作簿/CSV 解析
pub mod importer;

// 引擎层 - 拆日、产能计算、同步编排
pub mod engine;

// 数据仓储层 - 数据访问
pub mod repository;

// 配置层 - 系统配置
pub mod config;

// 服务层 - 同步任务执行与定时触发
pub mod services;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - HTTP 集成
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    CapacityParams, CapacityReport, CategoryCode, CategoryPercLog, DailyPlanEntry, IsoWeek,
    NormCatalog, ProductFamily, ProductType, SyncJob, SyncJobStatus, SyncRequest,
};
pub use engine::{CapacityCalculator, SyncPipeline, SyncReport};
pub use importer::{CategoryMapper, NormTimeAggregator, PlanExtractor, SpreadsheetLocator};
pub use services::SyncJobRunner;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "产能同步引擎";
