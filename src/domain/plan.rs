// ==========================================
// 产能同步引擎 - 周计划领域模型
// ==========================================
// 职责: 计划表抽取结果（FIX/COIL 行）与逐日计划条目
// ==========================================

use crate::domain::types::{IsoWeek, ProductFamily, WORKDAYS_PER_WEEK};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// FixPlanRow - FIX 块单行（逐日录入）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixPlanRow {
    pub type_code: String,
    pub demand: [i64; WORKDAYS_PER_WEEK],
    pub delivered: [i64; WORKDAYS_PER_WEEK],
}

// ==========================================
// CoilPlanRow - COIL 块单行（周总量 + 逐日交付）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoilPlanRow {
    pub type_code: String,
    pub weekly_demand: i64,
    pub weekly_delivered: i64,
    pub delivered: [i64; WORKDAYS_PER_WEEK],
}

// ==========================================
// 块结束原因
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockEnd {
    Blank,      // 型号单元格为空
    Mismatch,   // 型号不符合本块前缀
    SumMarker,  // SUM 汇总行（不计入数据）
    EndOfSheet, // 扫描到表尾
}

impl fmt::Display for BlockEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockEnd::Blank => write!(f, "BLANK"),
            BlockEnd::Mismatch => write!(f, "MISMATCH"),
            BlockEnd::SumMarker => write!(f, "SUM_MARKER"),
            BlockEnd::EndOfSheet => write!(f, "END_OF_SHEET"),
        }
    }
}

// ==========================================
// COIL 周需求分摊策略
// ==========================================
// ROUND: 每天 round(周总量 / 5)，与现行表格口径一致（可能不守恒）
// REMAINDER_LAST / REMAINDER_FIRST: 每天取整除，余数并入周五 / 周一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoilSplitPolicy {
    #[default]
    Round,
    RemainderLast,
    RemainderFirst,
}

impl CoilSplitPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoilSplitPolicy::Round => "ROUND",
            CoilSplitPolicy::RemainderLast => "REMAINDER_LAST",
            CoilSplitPolicy::RemainderFirst => "REMAINDER_FIRST",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "ROUND" => Some(CoilSplitPolicy::Round),
            "REMAINDER_LAST" => Some(CoilSplitPolicy::RemainderLast),
            "REMAINDER_FIRST" => Some(CoilSplitPolicy::RemainderFirst),
            _ => None,
        }
    }
}

/// 周计划表抽取结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPlan {
    pub sheet_name: String,
    pub fix_rows: Vec<FixPlanRow>,
    pub coil_rows: Vec<CoilPlanRow>,
    pub fix_end: BlockEnd,
    pub coil_end: BlockEnd,
}

// ==========================================
// DailyPlanEntry - 逐日计划条目
// ==========================================
// 生命周期: (week, year, family) 维度整体替换
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPlanEntry {
    pub week: IsoWeek,
    pub family: ProductFamily,
    pub type_code: String,
    pub plan_date: NaiveDate,
    pub demand_units: i64,
    pub delivered_units: i64,
}

/// 按产品族拆分后的整周计划
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklyPlan {
    pub fix_entries: Vec<DailyPlanEntry>,
    pub coil_entries: Vec<DailyPlanEntry>,
}

impl WeeklyPlan {
    pub fn entries(&self, family: ProductFamily) -> &[DailyPlanEntry] {
        match family {
            ProductFamily::Fix => &self.fix_entries,
            ProductFamily::Coil => &self.coil_entries,
        }
    }

    pub fn all_entries(&self) -> impl Iterator<Item = &DailyPlanEntry> {
        self.fix_entries.iter().chain(self.coil_entries.iter())
    }

    pub fn len(&self) -> usize {
        self.fix_entries.len() + self.coil_entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
