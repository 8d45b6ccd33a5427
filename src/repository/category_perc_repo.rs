// ==========================================
// 产能同步引擎 - 实绩工时仓储
// ==========================================
// 表: category_perc_log
// 唯一键: (log_date, category_code)
// 红线: 只做 upsert，不整体替换；值未变化的行不更新（保证重跑收敛）
// 红线: 单行失败只影响该行，已写入的行保留
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::actuals::{CategoryPercLog, StoredCategoryPercLog, UpsertOutcome};
use crate::domain::types::CategoryCode;
use crate::repository::error::{parse_date_column, RepositoryError, RepositoryResult, DATE_FORMAT};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 数值相等判定容差
const VALUE_EPSILON: f64 = 1e-9;

/// 单行 upsert 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpsertAction {
    Inserted,
    Updated,
    Unchanged,
}

/// 实绩工时仓储
pub struct CategoryPercRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CategoryPercRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 逐行 upsert
    ///
    /// # 返回
    /// 插入/更新/未变化/失败 的行数
    pub fn upsert_all(
        &self,
        logs: &[CategoryPercLog],
        updated_at: &str,
    ) -> RepositoryResult<UpsertOutcome> {
        let conn = self.get_conn()?;
        let mut outcome = UpsertOutcome::default();

        for log in logs {
            match Self::upsert_one(&conn, log, updated_at) {
                Ok(UpsertAction::Inserted) => outcome.inserted += 1,
                Ok(UpsertAction::Updated) => outcome.updated += 1,
                Ok(UpsertAction::Unchanged) => outcome.unchanged += 1,
                Err(e) => {
                    warn!(
                        log_date = %log.log_date,
                        category = %log.category_code,
                        error = %e,
                        "category_perc_log 行写入失败"
                    );
                    outcome.failed += 1;
                }
            }
        }

        info!(
            inserted = outcome.inserted,
            updated = outcome.updated,
            unchanged = outcome.unchanged,
            failed = outcome.failed,
            "category_perc_log upsert 完成"
        );
        Ok(outcome)
    }

    fn upsert_one(
        conn: &Connection,
        log: &CategoryPercLog,
        updated_at: &str,
    ) -> RepositoryResult<UpsertAction> {
        let date = log.log_date.format(DATE_FORMAT).to_string();
        let code = log.category_code.as_str();

        let existing: Option<f64> = conn
            .query_row(
                "SELECT leadott_perc FROM category_perc_log WHERE log_date = ?1 AND category_code = ?2",
                params![date, code],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(value) if (value - log.leadott_perc).abs() <= VALUE_EPSILON => {
                Ok(UpsertAction::Unchanged)
            }
            Some(_) => {
                conn.execute(
                    "UPDATE category_perc_log SET leadott_perc = ?3, updated_at = ?4
                     WHERE log_date = ?1 AND category_code = ?2",
                    params![date, code, log.leadott_perc, updated_at],
                )?;
                Ok(UpsertAction::Updated)
            }
            None => {
                conn.execute(
                    "INSERT INTO category_perc_log (log_date, category_code, leadott_perc, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![date, code, log.leadott_perc, updated_at],
                )?;
                Ok(UpsertAction::Inserted)
            }
        }
    }

    /// 按日期区间查询（含两端），按日期、类别排序
    pub fn list_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<StoredCategoryPercLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT log_date, category_code, leadott_perc, updated_at
            FROM category_perc_log
            WHERE log_date BETWEEN ?1 AND ?2
            ORDER BY log_date, category_code
            "#,
        )?;

        let rows = stmt
            .query_map(
                params![
                    from.format(DATE_FORMAT).to_string(),
                    to.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(log_date, category_code, leadott_perc, updated_at)| {
                let category_code = CategoryCode::parse(&category_code).ok_or_else(|| {
                    RepositoryError::FieldValueError {
                        field: "category_code".to_string(),
                        message: category_code.clone(),
                    }
                })?;
                Ok(StoredCategoryPercLog {
                    log_date: parse_date_column("log_date", &log_date)?,
                    category_code,
                    leadott_perc,
                    updated_at,
                })
            })
            .collect()
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM category_perc_log", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
