// ==========================================
// 产能同步引擎 - 工作表网格
// ==========================================
// 职责: calamine Range → 绝对坐标的单元格网格
// 说明: calamine 的 Range 从首个非空单元格开始，这里补齐偏移，
//       使定额表等固定列号的读取与 Excel 列号一致（A 列 = 0）
// ==========================================

use calamine::{Data, Range};
use std::fmt;

// ==========================================
// CellValue - 单元格值
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// 空单元格或纯空白文本
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 单元格的文本表示（整数值不带小数点）
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            CellValue::Bool(b) => b.to_string(),
        }
    }

    /// 解析为数值；空白或非数值文本返回 None
    ///
    /// 文本支持逗号小数与千分位空格（含不换行空格）
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => {
                let cleaned: String = s
                    .chars()
                    .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
                    .map(|c| if c == ',' { '.' } else { c })
                    .collect();
                if cleaned.is_empty() {
                    None
                } else {
                    cleaned.parse::<f64>().ok()
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            // 日期按 Excel 序列号保留，由使用方解释
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) => CellValue::Text(s.clone()),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(_) => CellValue::Empty,
        }
    }
}

// ==========================================
// SheetGrid - 工作表网格
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetGrid {
    pub name: String,
    rows: Vec<Vec<CellValue>>,
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl SheetGrid {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// 从 calamine Range 构建（补齐起始偏移）
    pub fn from_range(name: impl Into<String>, range: &Range<Data>) -> Self {
        let (start_row, start_col) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); start_row];
        for data_row in range.rows() {
            let mut row = vec![CellValue::Empty; start_col];
            row.extend(data_row.iter().map(CellValue::from));
            rows.push(row);
        }

        Self::new(name, rows)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// 最宽一行的列数
    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    /// 读取单元格；越界返回空单元格
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map(|r| r.as_slice()).unwrap_or(&[])
    }

    /// 按行优先顺序查找首个满足条件的单元格
    pub fn find_first<F>(&self, mut predicate: F) -> Option<(usize, usize)>
    where
        F: FnMut(usize, usize, &CellValue) -> bool,
    {
        for (r, row) in self.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if predicate(r, c, cell) {
                    return Some((r, c));
                }
            }
        }
        None
    }
}
