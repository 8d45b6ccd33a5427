// ==========================================
// 产能同步引擎 - 产能需求领域模型
// ==========================================
// 职责: 人均日产能参数 + 产能需求报表（派生数据，不落库）
// 红线: 人数 = ceil(分钟 / 人均产能)，汇总行先合计分钟再取整
// ==========================================

use crate::domain::types::{CategoryCode, IsoWeek};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// CapacityParams - 人均日产能参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityParams {
    pub shift_minutes: f64,      // 单班分钟数
    pub shift_count: u32,        // 班次数
    pub efficiency_percent: f64, // 效率（百分比）
}

impl Default for CapacityParams {
    fn default() -> Self {
        Self {
            shift_minutes: 480.0,
            shift_count: 1,
            efficiency_percent: 100.0,
        }
    }
}

impl CapacityParams {
    /// 人均日产能（分钟）
    pub fn capacity_per_person_per_day(&self) -> f64 {
        self.shift_minutes * f64::from(self.shift_count) * (self.efficiency_percent / 100.0)
    }
}

// ==========================================
// 报表 DTO（读接口原样输出）
// ==========================================

/// 单型号整周需求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDemand {
    pub type_code: String,
    pub family: String,
    pub matched: bool,
    pub daily_demand: Vec<i64>,
    pub daily_delivered: Vec<i64>,
    pub weekly_demand: i64,
    pub weekly_delivered: i64,
}

/// 单日汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub demand_units: i64,
    pub delivered_units: i64,
    pub category_minutes: f64,
    pub required_headcount: u32,
    /// 按总定额计算的分钟数，与 category_minutes 独立
    pub overall_minutes: f64,
    pub overall_headcount: u32,
}

/// 单日单类别产能需求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCapacity {
    pub date: NaiveDate,
    pub minutes: f64,
    pub headcount: u32,
}

/// 单类别整周产能需求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyCapacity {
    pub minutes: f64,
    /// ceil(周分钟 / (人均日产能 × 工作日数))
    pub headcount: u32,
    pub peak_daily_headcount: u32,
}

/// 报表摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacitySummary {
    pub week: u32,
    pub year: i32,
    pub capacity_per_person: f64,
    pub total_demand_units: i64,
    pub total_delivered_units: i64,
    pub total_minutes: f64,
    pub total_overall_minutes: f64,
    pub peak_headcount: u32,
    pub peak_date: Option<NaiveDate>,
    pub unmatched_types: Vec<String>,
}

/// 产能需求报表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityReport {
    pub dates: Vec<NaiveDate>,
    pub types: Vec<TypeDemand>,
    pub daily_totals: Vec<DailyTotal>,
    pub capacity_by_category_by_day: BTreeMap<CategoryCode, Vec<DayCapacity>>,
    pub weekly_capacity_by_category: BTreeMap<CategoryCode, WeeklyCapacity>,
    pub summary: CapacitySummary,
}

impl CapacityReport {
    pub fn week(&self) -> IsoWeek {
        IsoWeek {
            year: self.summary.year,
            week: self.summary.week,
        }
    }

    /// 查询某日某类别的需求
    pub fn day_capacity(&self, category: CategoryCode, date: NaiveDate) -> Option<&DayCapacity> {
        self.capacity_by_category_by_day
            .get(&category)?
            .iter()
            .find(|d| d.date == date)
    }
}
