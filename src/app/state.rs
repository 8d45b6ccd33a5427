// ==========================================
// 产能同步引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储共享同一 SQLite 连接；HTTP 路由以 Clone 的方式持有
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{CapacityApi, ConfigApi, SyncApi};
use crate::config::config_manager::ConfigManager;
use crate::config::SyncConfigReader;
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::services::SyncJobRunner;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 同步任务执行器
    pub runner: Arc<SyncJobRunner>,

    /// 产能查询API
    pub capacity_api: Arc<CapacityApi>,

    /// 同步触发API
    pub sync_api: Arc<SyncApi>,

    /// 配置管理API
    pub config_api: Arc<ConfigApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（不存在时自动创建并建表）
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;

        Self::from_connection(db_path, Arc::new(Mutex::new(conn)))
    }

    /// 基于已建表的连接创建（测试使用内存库）
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        let config_reader: Arc<dyn SyncConfigReader> = config_manager.clone();
        let runner = SyncJobRunner::new(conn.clone(), config_reader)
            .map_err(|e| format!("无法创建SyncJobRunner: {}", e))?;

        let capacity_api = Arc::new(CapacityApi::new(conn, config_manager.clone()));
        let sync_api = Arc::new(SyncApi::new(runner.clone()));
        let config_api = Arc::new(ConfigApi::new(config_manager.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            config_manager,
            runner,
            capacity_api,
            sync_api,
            config_api,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 CAPACITY_SYNC_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("CAPACITY_SYNC_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./capacity_sync.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("capacity-sync");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("capacity_sync.db");
        }
    }

    path.to_string_lossy().to_string()
}
