// ==========================================
// 产能同步引擎 - 配置管理 API
// ==========================================
// 职责: 配置查询与更新（CLI `config` 子命令使用）
// 约束: 写入后整体校验一次，无法解析的值回滚为旧值
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{config_keys, ConfigManager, SyncSettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// 配置项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: Option<String>,
}

// ==========================================
// ConfigApi - 配置管理 API
// ==========================================
pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    /// 查询所有已知配置键（未设置的键 value 为 None）
    pub fn list_configs(&self) -> ApiResult<Vec<ConfigItem>> {
        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&self.config_manager.get_config_snapshot()?)
                .map_err(|e| ApiError::InternalError(e.to_string()))?;

        Ok(config_keys::ALL
            .iter()
            .map(|key| ConfigItem {
                key: key.to_string(),
                value: snapshot.get(*key).cloned(),
            })
            .collect())
    }

    /// 当前生效的同步配置（含默认值）
    pub fn effective_settings(&self) -> ApiResult<SyncSettings> {
        Ok(self.config_manager.load_settings()?)
    }

    /// 更新配置
    ///
    /// # 返回
    /// - Ok(()): 成功
    /// - Err(ApiError::InvalidInput): 未知键或值无法解析（已回滚）
    pub fn update_config(&self, key: &str, value: &str) -> ApiResult<()> {
        if key.trim().is_empty() {
            return Err(ApiError::InvalidInput("配置键不能为空".to_string()));
        }

        let previous = self.config_manager.get_global_config_value(key)?;
        self.config_manager.set_global_config_value(key, value)?;

        if let Err(e) = self.config_manager.load_settings() {
            match previous.as_deref() {
                Some(old) => self.config_manager.set_global_config_value(key, old)?,
                None => {
                    self.config_manager.remove_global_config_value(key)?;
                }
            }
            return Err(e.into());
        }

        info!(key, value, "配置已更新");
        Ok(())
    }
}
