// ==========================================
// 产能同步引擎 - 实绩工时汇总器
// ==========================================
// 职责: 工时日志（工位, 工序名, 日期, 分钟）→ 每日每类别分钟数
// 来源: 工作簿中的日志表（首行为表头）或同列序的 CSV 导出
// 红线: 未命中词典的工序归入 EGYEB，分钟数照常计入
// ==========================================

use crate::domain::actuals::{CategoryPercLog, RawTimeLogEntry};
use crate::domain::types::CategoryCode;
use crate::importer::category_mapper::{CategoryMapper, WorkplaceFilter};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::grid::{CellValue, SheetGrid};
use chrono::{Duration, NaiveDate};
use csv::ReaderBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, instrument, warn};

// 固定列序
const COL_WORKPLACE: usize = 0;
const COL_OPERATION: usize = 1;
const COL_DATE: usize = 2;
const COL_MINUTES: usize = 3;
const LOG_COLUMNS: usize = 4;

/// 日志读取结果
#[derive(Debug, Clone, Default)]
pub struct TimeLogRows {
    pub entries: Vec<RawTimeLogEntry>,
    pub skipped_rows: usize,
}

/// 汇总结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActualsReduction {
    pub logs: Vec<CategoryPercLog>,
    pub unmapped_names: Vec<String>,
    pub rows_read: usize,
    pub filtered_out: usize,
    pub skipped_rows: usize,
}

// ===== 日期解析 =====

/// Excel 序列号 → 日期（1900 日期系统）
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// 文本日期：YYYY-MM-DD / YYYY.MM.DD / YYYY.MM.DD. / YYYYMMDD（可带时间部分）
pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    let value = value
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or("")
        .trim_end_matches('.');
    if value.is_empty() {
        return None;
    }

    if value.len() == 8 && value.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(value, "%Y%m%d").ok();
    }

    ["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// 单元格日期：数值按序列号（8 位整数按 YYYYMMDD），文本按格式解析
pub fn parse_log_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Number(n) if n.fract() == 0.0 && (19_000_101.0..=99_991_231.0).contains(n) => {
            parse_date_text(&format!("{}", *n as i64))
        }
        CellValue::Number(n) => excel_serial_to_date(*n),
        CellValue::Text(s) => {
            parse_date_text(s).or_else(|| cell.as_number().and_then(excel_serial_to_date))
        }
        _ => None,
    }
}

// ===== 行解析 =====

/// 解析一行；空行返回 Ok(None)，无法解析返回 Err(原因)
fn parse_log_row(
    cells: &[CellValue],
    row_number: usize,
) -> Result<Option<RawTimeLogEntry>, &'static str> {
    let cell = |idx: usize| cells.get(idx).cloned().unwrap_or_default();
    if cells.iter().all(|c| c.is_blank()) {
        return Ok(None);
    }

    let workplace_code = cell(COL_WORKPLACE).as_text();
    let operation_name = cell(COL_OPERATION).as_text();
    let log_date = parse_log_date(&cell(COL_DATE)).ok_or("日期无法解析")?;
    let minutes = cell(COL_MINUTES).as_number().ok_or("分钟数无法解析")?;
    if minutes < 0.0 {
        return Err("分钟数为负数");
    }

    Ok(Some(RawTimeLogEntry {
        workplace_code,
        operation_name,
        log_date,
        minutes,
        row_number,
    }))
}

fn collect_rows<I>(source: &str, rows: I) -> TimeLogRows
where
    I: IntoIterator<Item = (usize, Vec<CellValue>)>,
{
    let mut result = TimeLogRows::default();
    for (row_number, cells) in rows {
        match parse_log_row(&cells, row_number) {
            Ok(Some(entry)) => result.entries.push(entry),
            Ok(None) => {}
            Err(reason) => {
                warn!(source = %source, row = row_number, reason = reason, "工时日志行跳过");
                result.skipped_rows += 1;
            }
        }
    }
    result
}

/// 读取工作簿中的工时日志表
///
/// # 返回
/// - Err(LogHeaderMissing): 首个非空行不是表头，或列数不足
pub fn read_time_log_sheet(grid: &SheetGrid) -> ImportResult<TimeLogRows> {
    let header_row = (0..grid.height())
        .find(|&r| grid.row(r).iter().any(|c| !c.is_blank()))
        .ok_or_else(|| ImportError::LogHeaderMissing {
            sheet: grid.name.clone(),
            message: "工作表为空".to_string(),
        })?;

    validate_header(&grid.name, grid.row(header_row))?;

    let rows = ((header_row + 1)..grid.height()).map(|r| (r + 1, grid.row(r).to_vec()));
    Ok(collect_rows(&grid.name, rows))
}

/// 读取 CSV 工时日志（自动识别 `,` / `;` 分隔符）
pub fn read_time_log_csv(path: &Path) -> ImportResult<TimeLogRows> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }

    let delimiter = sniff_delimiter(path)?;
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(file);

    let source = path.display().to_string();
    let header: Vec<CellValue> = reader.headers()?.iter().map(CellValue::text).collect();
    validate_header(&source, &header)?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        // 第 1 行为表头
        rows.push((idx + 2, record.iter().map(CellValue::text).collect()));
    }
    Ok(collect_rows(&source, rows))
}

fn sniff_delimiter(path: &Path) -> ImportResult<u8> {
    let mut first_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first_line)?;
    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    Ok(if semicolons > commas { b';' } else { b',' })
}

fn validate_header(source: &str, header: &[CellValue]) -> ImportResult<()> {
    let filled = header.iter().take(LOG_COLUMNS).filter(|c| !c.is_blank()).count();
    if filled < LOG_COLUMNS {
        return Err(ImportError::LogHeaderMissing {
            sheet: source.to_string(),
            message: format!("需要 {} 列表头，实际 {} 列", LOG_COLUMNS, filled),
        });
    }
    if header.get(COL_DATE).and_then(parse_log_date).is_some() {
        return Err(ImportError::LogHeaderMissing {
            sheet: source.to_string(),
            message: "首行为数据行".to_string(),
        });
    }
    Ok(())
}

// ==========================================
// ActualsReducer - 实绩汇总器
// ==========================================
pub struct ActualsReducer {
    filter: WorkplaceFilter,
}

impl ActualsReducer {
    pub fn new(filter: WorkplaceFilter) -> Self {
        Self { filter }
    }

    /// 过滤工位、映射类别、按 (日期, 类别) 求和
    #[instrument(skip(self, rows), fields(entries = rows.entries.len()))]
    pub fn reduce(&self, rows: &TimeLogRows) -> ActualsReduction {
        let mut mapper = CategoryMapper::new();
        let mut sums: BTreeMap<(NaiveDate, CategoryCode), f64> = BTreeMap::new();
        let mut filtered_out = 0;

        for entry in &rows.entries {
            match mapper.map_record(&self.filter, &entry.workplace_code, &entry.operation_name) {
                Some(category) => {
                    *sums.entry((entry.log_date, category)).or_insert(0.0) += entry.minutes;
                }
                None => filtered_out += 1,
            }
        }

        let logs: Vec<CategoryPercLog> = sums
            .into_iter()
            .map(|((log_date, category_code), leadott_perc)| CategoryPercLog {
                log_date,
                category_code,
                leadott_perc,
            })
            .collect();
        let unmapped_names: Vec<String> = mapper.into_unmapped().into_iter().collect();

        info!(
            rows_read = rows.entries.len(),
            filtered_out = filtered_out,
            skipped = rows.skipped_rows,
            aggregated = logs.len(),
            unmapped = unmapped_names.len(),
            "实绩工时汇总完成"
        );

        ActualsReduction {
            logs,
            unmapped_names,
            rows_read: rows.entries.len(),
            filtered_out,
            skipped_rows: rows.skipped_rows,
        }
    }
}
