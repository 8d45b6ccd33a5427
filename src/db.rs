// ==========================================
// 产能同步引擎 - SQLite 连接与建表
// ==========================================
// 目标:
// - 统一所有连接的 PRAGMA（外键、busy_timeout、WAL）
// - 建表幂等，启动时与测试共用同一份 DDL
// ==========================================

use crate::domain::types::CategoryCode;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;
use tracing::{info, warn};

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys / busy_timeout 需要"每个连接"单独配置
/// - WAL 让看板只读查询不被同步写事务阻塞
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    // 内存库不支持 WAL，返回值忽略
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// product_type_norm 建表语句（类别列由 CategoryCode 生成）
fn product_type_norm_ddl() -> String {
    let category_columns: Vec<String> = CategoryCode::CANONICAL
        .iter()
        .map(|c| format!("    {} REAL NOT NULL DEFAULT 0 CHECK ({} >= 0),", c.norm_column(), c.norm_column()))
        .collect();

    format!(
        r#"
CREATE TABLE IF NOT EXISTS product_type_norm (
    type_code TEXT PRIMARY KEY,
    family TEXT NOT NULL CHECK (family IN ('FIX', 'COIL')),
{}
    overall_norm REAL NOT NULL DEFAULT 0 CHECK (overall_norm >= 0),
    updated_at TEXT NOT NULL
);
"#,
        category_columns.join("\n")
    )
}

const BASE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS daily_plan (
    week INTEGER NOT NULL,
    year INTEGER NOT NULL,
    type_code TEXT NOT NULL,
    family TEXT NOT NULL CHECK (family IN ('FIX', 'COIL')),
    plan_date TEXT NOT NULL,
    demand_units INTEGER NOT NULL CHECK (demand_units >= 0),
    delivered_units INTEGER NOT NULL CHECK (delivered_units >= 0),
    PRIMARY KEY (year, week, family, type_code, plan_date)
);
CREATE INDEX IF NOT EXISTS idx_daily_plan_date ON daily_plan(plan_date);

CREATE TABLE IF NOT EXISTS category_perc_log (
    log_date TEXT NOT NULL,
    category_code TEXT NOT NULL,
    leadott_perc REAL NOT NULL CHECK (leadott_perc >= 0),
    updated_at TEXT NOT NULL,
    PRIMARY KEY (log_date, category_code)
);

CREATE TABLE IF NOT EXISTS sync_job (
    job_id TEXT PRIMARY KEY,
    week INTEGER,
    year INTEGER,
    trigger_source TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    error_message TEXT,
    summary_json TEXT
);
CREATE INDEX IF NOT EXISTS idx_sync_job_created ON sync_job(created_at);
"#;

/// 幂等建表并登记 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(BASE_SCHEMA)?;
    conn.execute_batch(&product_type_norm_ddl())?;

    match read_schema_version(conn)? {
        None => {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [CURRENT_SCHEMA_VERSION],
            )?;
            info!(version = CURRENT_SCHEMA_VERSION, "数据库 schema 已初始化");
        }
        Some(v) if v != CURRENT_SCHEMA_VERSION => {
            warn!(
                found = v,
                expected = CURRENT_SCHEMA_VERSION,
                "数据库 schema_version 与程序不一致"
            );
        }
        Some(_) => {}
    }
    Ok(())
}

/// 读取 schema_version（若表不存在或为空则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_norm_table_has_category_columns() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let mut stmt = conn.prepare("PRAGMA table_info(product_type_norm)").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        for category in CategoryCode::CANONICAL {
            assert!(columns.contains(&category.norm_column()));
        }
        assert!(!columns.contains(&CategoryCode::Egyeb.norm_column()));
        assert!(columns.contains(&"overall_norm".to_string()));
    }
}
