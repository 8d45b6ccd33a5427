// ==========================================
// 产能同步引擎 - 产能需求计算
// ==========================================
// 公式:
//   人均日产能 = 班时 × 班次 × 效率%
//   分钟需求(日, 类) = Σ_型号 需求件数 × 单件工时(型号, 类)
//   需求人数(日, 类) = ceil(分钟需求 / 人均日产能)
// 红线: 汇总行先合计分钟再取整，禁止对已取整人数求和
// 红线: 未匹配定额的型号贡献 0 分钟，不拒收
// ==========================================

use crate::domain::capacity::{
    CapacityParams, CapacityReport, CapacitySummary, DailyTotal, DayCapacity, TypeDemand,
    WeeklyCapacity,
};
use crate::domain::plan::DailyPlanEntry;
use crate::domain::product::NormCatalog;
use crate::domain::types::{CategoryCode, IsoWeek, ProductFamily, WORKDAYS_PER_WEEK};
use crate::engine::error::{EngineError, EngineResult};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{instrument, warn};

/// 取整容差：浮点噪声下整数倍仍得到 N
pub const CEIL_TOLERANCE: f64 = 1e-9;

/// ceil(minutes / capacity)；minutes ≤ 0 返回 0
pub fn ceil_headcount(minutes: f64, capacity: f64) -> u32 {
    if minutes <= 0.0 || capacity <= 0.0 {
        return 0;
    }
    let quotient = minutes / capacity;
    let rounded = (quotient - CEIL_TOLERANCE).ceil();
    if rounded <= 0.0 {
        0
    } else {
        rounded as u32
    }
}

fn saturating_total(values: &[i64]) -> i64 {
    values.iter().fold(0_i64, |acc, v| acc.saturating_add(*v))
}

// ==========================================
// CapacityCalculator - 产能需求计算器
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct CapacityCalculator {
    params: CapacityParams,
    capacity: f64,
}

impl CapacityCalculator {
    /// 构造计算器
    ///
    /// # 返回
    /// - Err(InvalidCapacity): 人均日产能不是正数
    pub fn new(params: CapacityParams) -> EngineResult<Self> {
        let capacity = params.capacity_per_person_per_day();
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(EngineError::InvalidCapacity {
                capacity,
                shift_minutes: params.shift_minutes,
                shift_count: params.shift_count,
                efficiency_percent: params.efficiency_percent,
            });
        }
        Ok(Self { params, capacity })
    }

    pub fn params(&self) -> CapacityParams {
        self.params
    }

    pub fn capacity_per_person(&self) -> f64 {
        self.capacity
    }

    pub fn required_headcount(&self, minutes: f64) -> u32 {
        ceil_headcount(minutes, self.capacity)
    }

    /// 计算整周产能需求报表
    ///
    /// # 参数
    /// - week: 目标 ISO 周
    /// - entries: 逐日计划（周外日期忽略）
    /// - catalog: 型号定额
    #[instrument(skip(self, entries, catalog), fields(week = %week, entries = entries.len()))]
    pub fn build_report(
        &self,
        week: IsoWeek,
        entries: &[DailyPlanEntry],
        catalog: &NormCatalog,
    ) -> CapacityReport {
        let dates = week.workdays().to_vec();

        // (日下标, 类别) → 分钟
        let mut minutes = [[0.0_f64; 11]; WORKDAYS_PER_WEEK];
        let mut overall_minutes = [0.0_f64; WORKDAYS_PER_WEEK];
        let mut demand_units = [0_i64; WORKDAYS_PER_WEEK];
        let mut delivered_units = [0_i64; WORKDAYS_PER_WEEK];
        let mut types: BTreeMap<(ProductFamily, String), TypeDemand> = BTreeMap::new();
        let mut unmatched: BTreeSet<String> = BTreeSet::new();

        for entry in entries {
            let day = match dates.iter().position(|d| *d == entry.plan_date) {
                Some(day) => day,
                None => {
                    warn!(
                        type_code = %entry.type_code,
                        plan_date = %entry.plan_date,
                        "计划日期不在目标周工作日内，忽略"
                    );
                    continue;
                }
            };

            let product = catalog.get(&entry.type_code);
            if product.is_none() {
                unmatched.insert(entry.type_code.clone());
            }

            let units = entry.demand_units.max(0);
            let delivered = entry.delivered_units.max(0);
            demand_units[day] = demand_units[day].saturating_add(units);
            delivered_units[day] = delivered_units[day].saturating_add(delivered);

            if let Some(product) = product {
                for (idx, norm) in product.category_norms.iter().enumerate() {
                    minutes[day][idx] += units as f64 * norm;
                }
                overall_minutes[day] += units as f64 * product.overall_norm;
            }

            let demand = types
                .entry((entry.family, entry.type_code.clone()))
                .or_insert_with(|| TypeDemand {
                    type_code: entry.type_code.clone(),
                    family: entry.family.as_str().to_string(),
                    matched: product.is_some(),
                    daily_demand: vec![0; WORKDAYS_PER_WEEK],
                    daily_delivered: vec![0; WORKDAYS_PER_WEEK],
                    weekly_demand: 0,
                    weekly_delivered: 0,
                });
            demand.daily_demand[day] = demand.daily_demand[day].saturating_add(units);
            demand.daily_delivered[day] = demand.daily_delivered[day].saturating_add(delivered);
            demand.weekly_demand = demand.weekly_demand.saturating_add(units);
            demand.weekly_delivered = demand.weekly_delivered.saturating_add(delivered);
        }

        // 类别 × 日
        let mut capacity_by_category_by_day = BTreeMap::new();
        let mut weekly_capacity_by_category = BTreeMap::new();
        for (idx, category) in CategoryCode::CANONICAL.iter().enumerate() {
            let days: Vec<DayCapacity> = dates
                .iter()
                .enumerate()
                .map(|(day, date)| DayCapacity {
                    date: *date,
                    minutes: minutes[day][idx],
                    headcount: self.required_headcount(minutes[day][idx]),
                })
                .collect();

            let week_minutes: f64 = days.iter().map(|d| d.minutes).sum();
            let peak_daily_headcount = days.iter().map(|d| d.headcount).max().unwrap_or(0);
            weekly_capacity_by_category.insert(
                *category,
                WeeklyCapacity {
                    minutes: week_minutes,
                    headcount: ceil_headcount(
                        week_minutes,
                        self.capacity * WORKDAYS_PER_WEEK as f64,
                    ),
                    peak_daily_headcount,
                },
            );
            capacity_by_category_by_day.insert(*category, days);
        }

        // 日汇总：先合计分钟再取整
        let daily_totals: Vec<DailyTotal> = dates
            .iter()
            .enumerate()
            .map(|(day, date)| {
                let category_minutes: f64 = minutes[day].iter().sum();
                DailyTotal {
                    date: *date,
                    demand_units: demand_units[day],
                    delivered_units: delivered_units[day],
                    category_minutes,
                    required_headcount: self.required_headcount(category_minutes),
                    overall_minutes: overall_minutes[day],
                    overall_headcount: self.required_headcount(overall_minutes[day]),
                }
            })
            .collect();

        let (peak_headcount, peak_date) = daily_totals
            .iter()
            .filter(|t| t.required_headcount > 0)
            .fold((0, None), |(best, best_date), t| {
                if t.required_headcount > best {
                    (t.required_headcount, Some(t.date))
                } else {
                    (best, best_date)
                }
            });

        if !unmatched.is_empty() {
            warn!(count = unmatched.len(), "部分型号无定额，按 0 分钟计");
        }

        let summary = CapacitySummary {
            week: week.week,
            year: week.year,
            capacity_per_person: self.capacity,
            total_demand_units: saturating_total(&demand_units),
            total_delivered_units: saturating_total(&delivered_units),
            total_minutes: daily_totals.iter().map(|t| t.category_minutes).sum(),
            total_overall_minutes: overall_minutes.iter().sum(),
            peak_headcount,
            peak_date,
            unmatched_types: unmatched.into_iter().collect(),
        };

        CapacityReport {
            dates,
            types: types.into_values().collect(),
            daily_totals,
            capacity_by_category_by_day,
            weekly_capacity_by_category,
            summary,
        }
    }
}
