// ==========================================
// 产能同步引擎 - 逐日计划构建
// ==========================================
// 职责: FIX/COIL 块行 → 周一至周五的 DailyPlanEntry
// FIX: 需求/交付逐日直接读取
// COIL: 周需求按 CoilSplitPolicy 分摊，交付逐日直接读取（不分摊）
// ==========================================

use crate::domain::plan::{CoilSplitPolicy, DailyPlanEntry, ExtractedPlan, WeeklyPlan};
use crate::domain::types::{IsoWeek, ProductFamily, WORKDAYS_PER_WEEK};
use tracing::{info, warn};

/// 周需求分摊到 5 个工作日
///
/// ROUND 策略下每日取 round(total / 5)，合计可能与周需求不一致
pub fn split_weekly_demand(total: i64, policy: CoilSplitPolicy) -> [i64; WORKDAYS_PER_WEEK] {
    let days = WORKDAYS_PER_WEEK as i64;
    match policy {
        CoilSplitPolicy::Round => {
            let per_day = (total as f64 / days as f64).round() as i64;
            [per_day; WORKDAYS_PER_WEEK]
        }
        CoilSplitPolicy::RemainderLast => {
            let mut split = [total / days; WORKDAYS_PER_WEEK];
            split[WORKDAYS_PER_WEEK - 1] += total % days;
            split
        }
        CoilSplitPolicy::RemainderFirst => {
            let mut split = [total / days; WORKDAYS_PER_WEEK];
            split[0] += total % days;
            split
        }
    }
}

// ==========================================
// PlanBuilder - 逐日计划构建器
// ==========================================
pub struct PlanBuilder {
    policy: CoilSplitPolicy,
}

impl PlanBuilder {
    pub fn new(policy: CoilSplitPolicy) -> Self {
        Self { policy }
    }

    /// 构建整周逐日计划
    ///
    /// # 返回
    /// 按产品族拆分的条目，每个型号 5 条（周一至周五）
    pub fn build(&self, week: IsoWeek, plan: &ExtractedPlan) -> WeeklyPlan {
        let days = week.workdays();
        let mut weekly = WeeklyPlan::default();

        for row in &plan.fix_rows {
            for (idx, date) in days.iter().enumerate() {
                weekly.fix_entries.push(DailyPlanEntry {
                    week,
                    family: ProductFamily::Fix,
                    type_code: row.type_code.clone(),
                    plan_date: *date,
                    demand_units: row.demand[idx],
                    delivered_units: row.delivered[idx],
                });
            }
        }

        let mut non_conserving = 0;
        for row in &plan.coil_rows {
            let split = split_weekly_demand(row.weekly_demand, self.policy);
            let split_total: i64 = split.iter().sum();
            if split_total != row.weekly_demand {
                non_conserving += 1;
                warn!(
                    type_code = %row.type_code,
                    weekly_demand = row.weekly_demand,
                    split_total = split_total,
                    policy = self.policy.as_str(),
                    "COIL 周需求分摊后合计不一致"
                );
            }
            for (idx, date) in days.iter().enumerate() {
                weekly.coil_entries.push(DailyPlanEntry {
                    week,
                    family: ProductFamily::Coil,
                    type_code: row.type_code.clone(),
                    plan_date: *date,
                    demand_units: split[idx],
                    delivered_units: row.delivered[idx],
                });
            }
        }

        info!(
            week = %week,
            fix_entries = weekly.fix_entries.len(),
            coil_entries = weekly.coil_entries.len(),
            non_conserving = non_conserving,
            "逐日计划构建完成"
        );
        weekly
    }
}
