// ==========================================
// 产能同步引擎 - 配置层
// ==========================================
// 职责: 同步参数管理（数据源、锚点、人均产能、工位过滤、定时）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod sync_config_trait;

// 重导出核心配置管理器
pub use config_manager::{
    config_keys, defaults, ConfigError, ConfigManager, ConfigResult, SyncSettings,
};
pub use sync_config_trait::{FixedSyncConfig, SyncConfigReader};
