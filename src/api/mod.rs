// ==========================================
// 产能同步引擎 - API 层
// ==========================================
// 职责: 提供业务 API 接口，供 HTTP 路由与 CLI 调用
// ==========================================

pub mod capacity_api;
pub mod config_api;
pub mod error;
pub mod sync_api;

// 重导出核心类型
pub use capacity_api::CapacityApi;
pub use config_api::{ConfigApi, ConfigItem};
pub use error::{ApiError, ApiResult};
pub use sync_api::{SyncApi, SyncEndpointInfo, SyncJobView, SyncTriggerResponse};
