// ==========================================
// 产能同步引擎 - 逐日计划仓储
// ==========================================
// 表: daily_plan
// 红线: (week, year, family) 维度整体替换，删除与插入在同一事务内
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::plan::{DailyPlanEntry, WeeklyPlan};
use crate::domain::types::{IsoWeek, ProductFamily};
use crate::repository::error::{parse_date_column, RepositoryError, RepositoryResult, DATE_FORMAT};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// 逐日计划仓储
/// 职责: 管理 daily_plan 表的整体替换与按周查询
pub struct DailyPlanRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DailyPlanRepository {
    /// 创建新的仓储实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 替换单个产品族的整周计划
    ///
    /// # 返回
    /// 写入的行数
    pub fn replace_family(
        &self,
        week: IsoWeek,
        family: ProductFamily,
        entries: &[DailyPlanEntry],
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let written = Self::replace_in_tx(&tx, week, family, entries)?;
        tx.commit()?;
        Ok(written)
    }

    /// 替换整周计划（FIX 与 COIL 在同一事务内替换）
    ///
    /// # 返回
    /// (FIX 行数, COIL 行数)
    pub fn replace_week(&self, week: IsoWeek, plan: &WeeklyPlan) -> RepositoryResult<(usize, usize)> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let fix = Self::replace_in_tx(&tx, week, ProductFamily::Fix, &plan.fix_entries)?;
        let coil = Self::replace_in_tx(&tx, week, ProductFamily::Coil, &plan.coil_entries)?;
        tx.commit()?;
        Ok((fix, coil))
    }

    fn replace_in_tx(
        tx: &Transaction<'_>,
        week: IsoWeek,
        family: ProductFamily,
        entries: &[DailyPlanEntry],
    ) -> RepositoryResult<usize> {
        let deleted = tx.execute(
            "DELETE FROM daily_plan WHERE year = ?1 AND week = ?2 AND family = ?3",
            params![week.year, week.week, family.as_str()],
        )?;

        let mut stmt = tx.prepare(
            r#"
            INSERT INTO daily_plan (
                week, year, type_code, family, plan_date, demand_units, delivered_units
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )?;

        for entry in entries {
            if entry.family != family || !week.contains(entry.plan_date) {
                return Err(RepositoryError::FieldValueError {
                    field: "plan_date".to_string(),
                    message: format!(
                        "{} {} {} 不属于 {} {}",
                        entry.family, entry.type_code, entry.plan_date, family, week
                    ),
                });
            }
            stmt.execute(params![
                week.week,
                week.year,
                entry.type_code,
                family.as_str(),
                entry.plan_date.format(DATE_FORMAT).to_string(),
                entry.demand_units,
                entry.delivered_units,
            ])?;
        }

        debug!(
            week = %week,
            family = %family,
            deleted = deleted,
            inserted = entries.len(),
            "daily_plan 已替换"
        );
        Ok(entries.len())
    }

    /// 按周查询（按产品族、型号、日期排序）
    pub fn list_by_week(&self, week: IsoWeek) -> RepositoryResult<Vec<DailyPlanEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT type_code, family, plan_date, demand_units, delivered_units
            FROM daily_plan
            WHERE year = ?1 AND week = ?2
            ORDER BY family DESC, type_code, plan_date
            "#,
        )?;

        let rows = stmt
            .query_map(params![week.year, week.week], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(type_code, family, plan_date, demand_units, delivered_units)| {
                let family = ProductFamily::parse(&family).ok_or_else(|| {
                    RepositoryError::FieldValueError {
                        field: "family".to_string(),
                        message: family.clone(),
                    }
                })?;
                Ok(DailyPlanEntry {
                    week,
                    family,
                    type_code,
                    plan_date: parse_date_column("plan_date", &plan_date)?,
                    demand_units,
                    delivered_units,
                })
            })
            .collect()
    }

    /// 按周统计行数
    pub fn count_by_week(&self, week: IsoWeek) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM daily_plan WHERE year = ?1 AND week = ?2",
            params![week.year, week.week],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
