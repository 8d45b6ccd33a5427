// ==========================================
// 产能同步引擎 - 同步配置读取 Trait
// ==========================================
// 职责: 定义同步流程所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::config_manager::{ConfigResult, SyncSettings};
use crate::domain::capacity::CapacityParams;
use async_trait::async_trait;

// ==========================================
// SyncConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait SyncConfigReader: Send + Sync {
    /// 获取完整同步配置
    ///
    /// # 默认值
    /// - 未配置的键取 `config_manager::defaults`
    async fn get_sync_settings(&self) -> ConfigResult<SyncSettings>;

    /// 获取人均产能参数
    ///
    /// # 默认值
    /// - 480 分钟 × 1 班 × 100%
    async fn get_capacity_params(&self) -> ConfigResult<CapacityParams>;

    /// 获取定时同步间隔（分钟）
    ///
    /// # 默认值
    /// - 120（0 表示关闭）
    async fn get_sync_interval_minutes(&self) -> ConfigResult<u64>;
}

// ==========================================
// FixedSyncConfig - 固定配置快照
// ==========================================
// 用途: CLI 单次同步（命令行参数覆盖库中配置）与测试
pub struct FixedSyncConfig {
    settings: SyncSettings,
}

impl FixedSyncConfig {
    pub fn new(settings: SyncSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SyncConfigReader for FixedSyncConfig {
    async fn get_sync_settings(&self) -> ConfigResult<SyncSettings> {
        Ok(self.settings.clone())
    }

    async fn get_capacity_params(&self) -> ConfigResult<CapacityParams> {
        Ok(self.settings.capacity)
    }

    async fn get_sync_interval_minutes(&self) -> ConfigResult<u64> {
        Ok(self.settings.sync_interval_minutes)
    }
}
