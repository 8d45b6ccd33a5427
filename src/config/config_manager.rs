// ==========================================
// 产能同步引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope，当前仅使用 global)
// ==========================================

use crate::config::sync_config_trait::SyncConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::capacity::CapacityParams;
use crate::domain::plan::CoilSplitPolicy;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置读取失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("配置锁获取失败: {0}")]
    LockError(String),

    #[error("配置值无效 (key={key}): {value}")]
    InvalidValue { key: String, value: String },

    #[error("未知配置键: {0}")]
    UnknownKey(String),
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// SyncSettings - 同步配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    pub workbook_path: Option<String>,
    pub time_log_csv_path: Option<String>,
    pub plan_sheet_template: String,
    pub norm_sheet_name: String,
    pub time_log_sheet_name: String,
    pub fix_anchor_label: String,
    pub coil_anchor_label: String,
    pub capacity: CapacityParams,
    pub workplace_prefix: String,
    pub workplace_allow_list: Vec<String>,
    pub coil_split_policy: CoilSplitPolicy,
    /// 0 表示关闭定时同步
    pub sync_interval_minutes: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            workbook_path: None,
            time_log_csv_path: None,
            plan_sheet_template: defaults::PLAN_SHEET_TEMPLATE.to_string(),
            norm_sheet_name: defaults::NORM_SHEET_NAME.to_string(),
            time_log_sheet_name: defaults::TIME_LOG_SHEET_NAME.to_string(),
            fix_anchor_label: defaults::FIX_ANCHOR_LABEL.to_string(),
            coil_anchor_label: defaults::COIL_ANCHOR_LABEL.to_string(),
            capacity: CapacityParams::default(),
            workplace_prefix: defaults::WORKPLACE_PREFIX.to_string(),
            workplace_allow_list: Vec::new(),
            coil_split_policy: CoilSplitPolicy::default(),
            sync_interval_minutes: defaults::SYNC_INTERVAL_MINUTES,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ConfigError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> ConfigResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（仅允许已知键）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        if !config_keys::ALL.contains(&key) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 删除 global scope 的配置值（恢复默认）
    pub fn remove_global_config_value(&self, key: &str) -> ConfigResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
        )?;
        Ok(affected > 0)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    fn get_optional(&self, key: &str) -> ConfigResult<Option<String>> {
        Ok(self
            .get_global_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> ConfigResult<T> {
        match self.get_optional(key)? {
            Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
            None => Ok(default),
        }
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(json!(rows).to_string())
    }

    /// 读取完整同步配置（缺省项取默认值）
    pub fn load_settings(&self) -> ConfigResult<SyncSettings> {
        let policy_raw =
            self.get_config_or_default(config_keys::COIL_SPLIT_POLICY, CoilSplitPolicy::default().as_str())?;
        let coil_split_policy =
            CoilSplitPolicy::parse(&policy_raw).ok_or_else(|| ConfigError::InvalidValue {
                key: config_keys::COIL_SPLIT_POLICY.to_string(),
                value: policy_raw.clone(),
            })?;

        let capacity = CapacityParams {
            shift_minutes: self.get_parsed(config_keys::SHIFT_MINUTES, defaults::SHIFT_MINUTES)?,
            shift_count: self.get_parsed(config_keys::SHIFT_COUNT, defaults::SHIFT_COUNT)?,
            efficiency_percent: self
                .get_parsed(config_keys::EFFICIENCY_PERCENT, defaults::EFFICIENCY_PERCENT)?,
        };

        Ok(SyncSettings {
            workbook_path: self.get_optional(config_keys::WORKBOOK_PATH)?,
            time_log_csv_path: self.get_optional(config_keys::TIME_LOG_CSV_PATH)?,
            plan_sheet_template: self
                .get_config_or_default(config_keys::PLAN_SHEET_TEMPLATE, defaults::PLAN_SHEET_TEMPLATE)?,
            norm_sheet_name: self
                .get_config_or_default(config_keys::NORM_SHEET_NAME, defaults::NORM_SHEET_NAME)?,
            time_log_sheet_name: self
                .get_config_or_default(config_keys::TIME_LOG_SHEET_NAME, defaults::TIME_LOG_SHEET_NAME)?,
            fix_anchor_label: self
                .get_config_or_default(config_keys::FIX_ANCHOR_LABEL, defaults::FIX_ANCHOR_LABEL)?,
            coil_anchor_label: self
                .get_config_or_default(config_keys::COIL_ANCHOR_LABEL, defaults::COIL_ANCHOR_LABEL)?,
            capacity,
            workplace_prefix: self
                .get_config_or_default(config_keys::WORKPLACE_PREFIX, defaults::WORKPLACE_PREFIX)?,
            workplace_allow_list: self.get_allow_list()?,
            coil_split_policy,
            sync_interval_minutes: self
                .get_parsed(config_keys::SYNC_INTERVAL_MINUTES, defaults::SYNC_INTERVAL_MINUTES)?,
        })
    }

    /// 白名单工位：JSON 数组，兼容逗号分隔
    fn get_allow_list(&self) -> ConfigResult<Vec<String>> {
        let raw = match self.get_optional(config_keys::WORKPLACE_ALLOW_LIST)? {
            Some(v) => v,
            None => return Ok(Vec::new()),
        };
        if raw.starts_with('[') {
            return serde_json::from_str::<Vec<String>>(&raw).map_err(|_| {
                ConfigError::InvalidValue {
                    key: config_keys::WORKPLACE_ALLOW_LIST.to_string(),
                    value: raw.clone(),
                }
            });
        }
        Ok(raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}

#[async_trait]
impl SyncConfigReader for ConfigManager {
    async fn get_sync_settings(&self) -> ConfigResult<SyncSettings> {
        self.load_settings()
    }

    async fn get_capacity_params(&self) -> ConfigResult<CapacityParams> {
        Ok(self.load_settings()?.capacity)
    }

    async fn get_sync_interval_minutes(&self) -> ConfigResult<u64> {
        self.get_parsed(config_keys::SYNC_INTERVAL_MINUTES, defaults::SYNC_INTERVAL_MINUTES)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 数据源
    pub const WORKBOOK_PATH: &str = "workbook_path";
    pub const TIME_LOG_CSV_PATH: &str = "time_log_csv_path";
    pub const PLAN_SHEET_TEMPLATE: &str = "plan_sheet_template";
    pub const NORM_SHEET_NAME: &str = "norm_sheet_name";
    pub const TIME_LOG_SHEET_NAME: &str = "time_log_sheet_name";

    // 计划块锚点
    pub const FIX_ANCHOR_LABEL: &str = "fix_anchor_label";
    pub const COIL_ANCHOR_LABEL: &str = "coil_anchor_label";
    pub const COIL_SPLIT_POLICY: &str = "coil_split_policy";

    // 人均产能
    pub const SHIFT_MINUTES: &str = "shift_minutes";
    pub const SHIFT_COUNT: &str = "shift_count";
    pub const EFFICIENCY_PERCENT: &str = "efficiency_percent";

    // 工位过滤
    pub const WORKPLACE_PREFIX: &str = "workplace_prefix";
    pub const WORKPLACE_ALLOW_LIST: &str = "workplace_allow_list"; // JSON 数组

    // 定时同步
    pub const SYNC_INTERVAL_MINUTES: &str = "sync_interval_minutes";

    pub const ALL: [&str; 14] = [
        WORKBOOK_PATH,
        TIME_LOG_CSV_PATH,
        PLAN_SHEET_TEMPLATE,
        NORM_SHEET_NAME,
        TIME_LOG_SHEET_NAME,
        FIX_ANCHOR_LABEL,
        COIL_ANCHOR_LABEL,
        COIL_SPLIT_POLICY,
        SHIFT_MINUTES,
        SHIFT_COUNT,
        EFFICIENCY_PERCENT,
        WORKPLACE_PREFIX,
        WORKPLACE_ALLOW_LIST,
        SYNC_INTERVAL_MINUTES,
    ];
}

/// 默认值
pub mod defaults {
    use crate::importer::{plan_extractor, workbook};

    pub const PLAN_SHEET_TEMPLATE: &str = workbook::DEFAULT_PLAN_SHEET_TEMPLATE;
    pub const NORM_SHEET_NAME: &str = workbook::DEFAULT_NORM_SHEET;
    pub const TIME_LOG_SHEET_NAME: &str = workbook::DEFAULT_TIME_LOG_SHEET;
    pub const FIX_ANCHOR_LABEL: &str = plan_extractor::DEFAULT_FIX_ANCHOR;
    pub const COIL_ANCHOR_LABEL: &str = plan_extractor::DEFAULT_COIL_ANCHOR;
    pub const SHIFT_MINUTES: f64 = 480.0;
    pub const SHIFT_COUNT: u32 = 1;
    pub const EFFICIENCY_PERCENT: f64 = 100.0;
    pub const WORKPLACE_PREFIX: &str = "64L";
    pub const SYNC_INTERVAL_MINUTES: u64 = 120;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_empty() {
        let settings = manager().load_settings().unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.capacity.capacity_per_person_per_day(), 480.0);
        assert_eq!(settings.sync_interval_minutes, 120);
        assert_eq!(settings.plan_sheet_template, "CW{week} ütemterv");
    }

    #[test]
    fn test_overrides_are_applied() {
        let manager = manager();
        manager.set_global_config_value(config_keys::SHIFT_COUNT, "2").unwrap();
        manager.set_global_config_value(config_keys::EFFICIENCY_PERCENT, "85").unwrap();
        manager
            .set_global_config_value(config_keys::WORKPLACE_ALLOW_LIST, r#"["71A03", "KARB1"]"#)
            .unwrap();
        manager
            .set_global_config_value(config_keys::COIL_SPLIT_POLICY, "remainder_last")
            .unwrap();
        manager.set_global_config_value(config_keys::SYNC_INTERVAL_MINUTES, "0").unwrap();

        let settings = manager.load_settings().unwrap();
        assert!((settings.capacity.capacity_per_person_per_day() - 816.0).abs() < 1e-9);
        assert_eq!(settings.workplace_allow_list, vec!["71A03", "KARB1"]);
        assert_eq!(settings.coil_split_policy, CoilSplitPolicy::RemainderLast);
        assert_eq!(settings.sync_interval_minutes, 0);

        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&manager.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.len(), 5);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let manager = manager();
        manager.set_global_config_value(config_keys::SHIFT_MINUTES, "nyolc óra").unwrap();
        assert!(matches!(
            manager.load_settings(),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            manager.set_global_config_value("season_mode", "AUTO"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_allow_list_accepts_comma_separated() {
        let manager = manager();
        manager
            .set_global_config_value(config_keys::WORKPLACE_ALLOW_LIST, "71A03, KARB1,")
            .unwrap();
        assert_eq!(manager.load_settings().unwrap().workplace_allow_list, vec!["71A03", "KARB1"]);
    }

    #[tokio::test]
    async fn test_reader_trait() {
        let manager = manager();
        manager.set_global_config_value(config_keys::SYNC_INTERVAL_MINUTES, "30").unwrap();
        let reader: &dyn SyncConfigReader = &manager;
        assert_eq!(reader.get_sync_interval_minutes().await.unwrap(), 30);
        assert_eq!(reader.get_capacity_params().await.unwrap(), CapacityParams::default());
    }
}
