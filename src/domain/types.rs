// ==========================================
// 产能同步引擎 - 领域类型定义
// ==========================================
// 职责: 工序类别、产品族、ISO 周等基础值对象
// 红线: 类别代码为持久化键，不得改名
// ==========================================

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工序类别 (Category Code)
// ==========================================
// 11 个标准类别 + EGYEB（其他）兜底
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryCode {
    Elokeszites, // Előkészítés - 备料/预处理
    Tekercseles, // Tekercselés - 绕线
    Szigeteles,  // Szigetelés - 绝缘
    Forrasztas,  // Forrasztás - 焊接
    Szereles,    // Szerelés - 装配
    Vezetekeles, // Vezetékelés - 布线
    Impregnalas, // Impregnálás - 浸漆
    Ontes,       // Öntés - 灌封
    Meres,       // Mérés - 测量
    Jeloles,     // Jelölés - 标识
    Csomagolas,  // Csomagolás - 包装
    Egyeb,       // Egyéb - 其他（兜底）
}

impl CategoryCode {
    /// 11 个标准类别（不含 EGYEB），顺序即报表列顺序
    pub const CANONICAL: [CategoryCode; 11] = [
        CategoryCode::Elokeszites,
        CategoryCode::Tekercseles,
        CategoryCode::Szigeteles,
        CategoryCode::Forrasztas,
        CategoryCode::Szereles,
        CategoryCode::Vezetekeles,
        CategoryCode::Impregnalas,
        CategoryCode::Ontes,
        CategoryCode::Meres,
        CategoryCode::Jeloles,
        CategoryCode::Csomagolas,
    ];

    /// 全部类别（含 EGYEB）
    pub const ALL: [CategoryCode; 12] = [
        CategoryCode::Elokeszites,
        CategoryCode::Tekercseles,
        CategoryCode::Szigeteles,
        CategoryCode::Forrasztas,
        CategoryCode::Szereles,
        CategoryCode::Vezetekeles,
        CategoryCode::Impregnalas,
        CategoryCode::Ontes,
        CategoryCode::Meres,
        CategoryCode::Jeloles,
        CategoryCode::Csomagolas,
        CategoryCode::Egyeb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryCode::Elokeszites => "ELOKESZITES",
            CategoryCode::Tekercseles => "TEKERCSELES",
            CategoryCode::Szigeteles => "SZIGETELES",
            CategoryCode::Forrasztas => "FORRASZTAS",
            CategoryCode::Szereles => "SZERELES",
            CategoryCode::Vezetekeles => "VEZETEKELES",
            CategoryCode::Impregnalas => "IMPREGNALAS",
            CategoryCode::Ontes => "ONTES",
            CategoryCode::Meres => "MERES",
            CategoryCode::Jeloles => "JELOLES",
            CategoryCode::Csomagolas => "CSOMAGOLAS",
            CategoryCode::Egyeb => "EGYEB",
        }
    }

    /// 解析持久化代码（大小写不敏感）
    pub fn parse(code: &str) -> Option<Self> {
        let upper = code.trim().to_uppercase();
        CategoryCode::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == upper)
    }

    /// 车间显示名称（匈牙利语）
    pub fn display_name(&self) -> &'static str {
        match self {
            CategoryCode::Elokeszites => "Előkészítés",
            CategoryCode::Tekercseles => "Tekercselés",
            CategoryCode::Szigeteles => "Szigetelés",
            CategoryCode::Forrasztas => "Forrasztás",
            CategoryCode::Szereles => "Szerelés",
            CategoryCode::Vezetekeles => "Vezetékelés",
            CategoryCode::Impregnalas => "Impregnálás",
            CategoryCode::Ontes => "Öntés",
            CategoryCode::Meres => "Mérés",
            CategoryCode::Jeloles => "Jelölés",
            CategoryCode::Csomagolas => "Csomagolás",
            CategoryCode::Egyeb => "Egyéb",
        }
    }

    /// product_type_norm 表中的列名
    pub fn norm_column(&self) -> String {
        format!("norm_{}", self.as_str().to_lowercase())
    }

    /// 在 CANONICAL 数组中的下标（EGYEB 无下标）
    pub fn canonical_index(&self) -> Option<usize> {
        CategoryCode::CANONICAL.iter().position(|c| c == self)
    }
}

impl fmt::Display for CategoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 产品族 (Product Family)
// ==========================================
// FIX: B 型号，按工作日逐日录入
// COIL: C 型号（TEKERCS），按周录入后分摊到工作日
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductFamily {
    Fix,
    Coil,
}

impl ProductFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductFamily::Fix => "FIX",
            ProductFamily::Coil => "COIL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "FIX" => Some(ProductFamily::Fix),
            "COIL" | "TEKERCS" => Some(ProductFamily::Coil),
            _ => None,
        }
    }

    /// 型号首字母
    pub fn code_prefix(&self) -> char {
        match self {
            ProductFamily::Fix => 'B',
            ProductFamily::Coil => 'C',
        }
    }

    /// 按型号判断产品族（要求 `^[BC]\d`）
    pub fn from_type_code(code: &str) -> Option<Self> {
        let mut chars = code.chars();
        let family = match chars.next()? {
            'B' => ProductFamily::Fix,
            'C' => ProductFamily::Coil,
            _ => return None,
        };
        match chars.next() {
            Some(c) if c.is_ascii_digit() => Some(family),
            _ => None,
        }
    }

    /// 型号是否属于本产品族（`^B\d` / `^C\d`）
    pub fn matches_code(&self, code: &str) -> bool {
        ProductFamily::from_type_code(code) == Some(*self)
    }
}

impl fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 型号规范化：去除所有空白（源表常夹带空格）
pub fn normalize_type_code(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

// ==========================================
// ISO 周 (ISO Week)
// ==========================================
pub const WORKDAYS_PER_WEEK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IsoWeek {
    pub year: i32,
    pub week: u32,
}

impl IsoWeek {
    /// 构造 ISO 周；周号在该年不存在时返回 None（如非长年的第 53 周）
    pub fn new(year: i32, week: u32) -> Option<Self> {
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
        Some(Self { year, week })
    }

    /// 日期所在的 ISO 周
    pub fn containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// 当前 ISO 周（本地时间）
    pub fn current() -> Self {
        Self::containing(chrono::Local::now().date_naive())
    }

    pub fn monday(&self) -> NaiveDate {
        // new() 已校验，周一必然存在
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
            .unwrap_or(NaiveDate::MIN)
    }

    /// 周一至周五
    pub fn workdays(&self) -> [NaiveDate; WORKDAYS_PER_WEEK] {
        let monday = self.monday();
        let mut days = [monday; WORKDAYS_PER_WEEK];
        for (offset, day) in days.iter_mut().enumerate() {
            *day = monday + chrono::Duration::days(offset as i64);
        }
        days
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        IsoWeek::containing(date) == *self
    }

    /// 计划表工作表名，如 `CW12 ütemterv`
    pub fn plan_sheet_name(&self, template: &str) -> String {
        template.replace("{week}", &self.week.to_string())
    }
}

impl fmt::Display for IsoWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}
