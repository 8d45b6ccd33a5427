// ==========================================
// 产能同步引擎 - 产能查询 API
// ==========================================
// 职责: 从库中已同步的计划与定额重算产能报表；查询实绩工时
// 说明: 只读，不触发同步
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::actuals::StoredCategoryPercLog;
use crate::domain::capacity::CapacityReport;
use crate::domain::sync_job::SyncRequest;
use crate::engine::{resolve_week, CapacityCalculator};
use crate::repository::{CategoryPercRepository, DailyPlanRepository, ProductNormRepository};
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

// ==========================================
// CapacityApi
// ==========================================
pub struct CapacityApi {
    plan_repo: DailyPlanRepository,
    norm_repo: ProductNormRepository,
    perc_repo: CategoryPercRepository,
    config_manager: Arc<ConfigManager>,
}

impl CapacityApi {
    pub fn new(conn: Arc<Mutex<Connection>>, config_manager: Arc<ConfigManager>) -> Self {
        Self {
            plan_repo: DailyPlanRepository::from_connection(conn.clone()),
            norm_repo: ProductNormRepository::from_connection(conn.clone()),
            perc_repo: CategoryPercRepository::from_connection(conn),
            config_manager,
        }
    }

    /// 周产能报表
    ///
    /// # 参数
    /// - week/year: 目标周（缺省为当前 ISO 周）
    ///
    /// # 返回
    /// - Ok(CapacityReport): 日期、型号需求、逐日汇总、类别人力、周汇总
    /// - Err(ApiError::InvalidInput): 周号无效
    #[instrument(skip(self))]
    pub fn capacity_report(&self, week: Option<u32>, year: Option<i32>) -> ApiResult<CapacityReport> {
        let week = resolve_week(&SyncRequest { week, year }, Local::now().date_naive())?;
        let params = self.config_manager.load_settings()?.capacity;
        let calculator = CapacityCalculator::new(params)?;

        let entries = self.plan_repo.list_by_week(week)?;
        let catalog = self.norm_repo.load_catalog()?;
        debug!(entries = entries.len(), norms = catalog.len(), "产能报表数据已加载");

        Ok(calculator.build_report(week, &entries, &catalog))
    }

    /// 实绩工时查询（含两端）
    pub fn category_actuals(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ApiResult<Vec<StoredCategoryPercLog>> {
        if from > to {
            return Err(ApiError::InvalidInput(format!(
                "起始日期晚于结束日期: {} > {}",
                from, to
            )));
        }
        Ok(self.perc_repo.list_range(from, to)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_schema;
    use crate::domain::actuals::CategoryPercLog;
    use crate::domain::plan::{DailyPlanEntry, WeeklyPlan};
    use crate::domain::product::ProductType;
    use crate::domain::types::{CategoryCode, IsoWeek, ProductFamily};

    fn setup() -> (Arc<Mutex<Connection>>, CapacityApi) {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
        (conn.clone(), CapacityApi::new(conn, config))
    }

    #[test]
    fn test_capacity_report_from_stored_rows() {
        let (conn, api) = setup();
        let week = IsoWeek::new(2026, 12).unwrap();

        let mut product = ProductType::new("C100", ProductFamily::Coil);
        product.set_category_norm(CategoryCode::Szereles, 3.5);
        product.overall_norm = 4.0;
        ProductNormRepository::from_connection(conn.clone())
            .replace_all(&[product], "t1")
            .unwrap();

        let coil_entries = week
            .workdays()
            .iter()
            .map(|date| DailyPlanEntry {
                week,
                family: ProductFamily::Coil,
                type_code: "C100".to_string(),
                plan_date: *date,
                demand_units: 200,
                delivered_units: 0,
            })
            .collect();
        DailyPlanRepository::from_connection(conn)
            .replace_week(week, &WeeklyPlan { fix_entries: vec![], coil_entries })
            .unwrap();

        let report = api.capacity_report(Some(12), Some(2026)).unwrap();
        assert_eq!(report.dates.len(), 5);
        assert_eq!(report.summary.total_demand_units, 1000);
        let monday = report
            .day_capacity(CategoryCode::Szereles, week.monday())
            .unwrap();
        assert_eq!(monday.headcount, 2);
        assert!(report.summary.unmatched_types.is_empty());
    }

    #[test]
    fn test_capacity_report_rejects_invalid_week() {
        let (_, api) = setup();
        let err = api.capacity_report(Some(54), Some(2026)).unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_category_actuals_range() {
        let (conn, api) = setup();
        let d = |day| NaiveDate::from_ymd_opt(2026, 3, day).unwrap();
        CategoryPercRepository::from_connection(conn)
            .upsert_all(
                &[
                    CategoryPercLog {
                        log_date: d(16),
                        category_code: CategoryCode::Meres,
                        leadott_perc: 120.0,
                    },
                    CategoryPercLog {
                        log_date: d(20),
                        category_code: CategoryCode::Meres,
                        leadott_perc: 60.0,
                    },
                ],
                "t1",
            )
            .unwrap();

        let rows = api.category_actuals(d(16), d(17)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].leadott_perc, 120.0);

        assert!(api.category_actuals(d(20), d(16)).is_err());
    }
}
