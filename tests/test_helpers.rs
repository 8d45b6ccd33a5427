// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、共享连接、真实 xlsx 工作簿生成
// 标准场景: 2026-W12（周一 2026-03-16）
//   FIX : B100 每日需求 10，B200 周二/周四需求 20（定额表无 B200）
//   COIL: C200 周需求 1000 → 每日 200
//   定额: B100 装配 3.0 / 测量 1.0 / 总定额 4.5；C200 装配 3.5 / 测量 2.0 / 总定额 6.0
//   日志: 2026-03-16 测量 180，2026-03-17 装配 240、EGYEB 30
// ==========================================
#![allow(dead_code)]

use capacity_sync::db::{ensure_schema, open_sqlite_connection};
use capacity_sync::importer::norm_aggregator::{NORM_COLUMNS, OVERALL_NORM_COLUMN};
use rusqlite::Connection;
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::{NamedTempFile, TempDir};

pub const WEEK: u32 = 12;
pub const YEAR: i32 = 2026;
pub const PLAN_SHEET: &str = "CW12 ütemterv";
pub const NORM_SHEET: &str = "Normaidők";
pub const TIME_LOG_SHEET: &str = "Időnapló";

/// 定额表列号
pub const COL_SZERELES: u16 = 38; // Végszerelés
pub const COL_MERES: u16 = 67; // Végmérés

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_string_lossy().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 内存库共享连接
pub fn shared_memory_conn() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    ensure_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

// ==========================================
// 工作簿生成
// ==========================================

/// 单元格值
#[derive(Debug, Clone)]
pub enum Cell {
    S(&'static str),
    N(f64),
}

fn write_cell(ws: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<(), XlsxError> {
    match cell {
        Cell::S(text) => ws.write_string(row, col, *text).map(|_| ()),
        Cell::N(value) => ws.write_number(row, col, *value).map(|_| ()),
    }
}

/// 工作簿构建器
pub struct WorkbookBuilder {
    plan_sheet: Option<(String, Vec<(u32, u16, Cell)>)>,
    norm_rows: Option<Vec<(&'static str, Vec<(u16, f64)>)>>,
    time_log_rows: Option<Vec<[Cell; 4]>>,
}

impl WorkbookBuilder {
    pub fn empty() -> Self {
        Self {
            plan_sheet: None,
            norm_rows: None,
            time_log_rows: None,
        }
    }

    /// 标准场景（三张表齐全）
    pub fn standard() -> Self {
        Self::empty()
            .plan_sheet(PLAN_SHEET, standard_plan_cells())
            .norm_sheet(standard_norm_rows())
            .time_log_sheet(standard_time_log_rows())
    }

    pub fn plan_sheet(mut self, name: &str, cells: Vec<(u32, u16, Cell)>) -> Self {
        self.plan_sheet = Some((name.to_string(), cells));
        self
    }

    pub fn norm_sheet(mut self, rows: Vec<(&'static str, Vec<(u16, f64)>)>) -> Self {
        self.norm_rows = Some(rows);
        self
    }

    pub fn time_log_sheet(mut self, rows: Vec<[Cell; 4]>) -> Self {
        self.time_log_rows = Some(rows);
        self
    }

    pub fn without_time_log(mut self) -> Self {
        self.time_log_rows = None;
        self
    }

    /// 写入 xlsx 文件
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        let mut workbook = Workbook::new();

        if let Some((name, cells)) = &self.plan_sheet {
            let ws = workbook.add_worksheet();
            ws.set_name(name.as_str())?;
            for (row, col, cell) in cells {
                write_cell(ws, *row, *col, cell)?;
            }
        }

        if let Some(rows) = &self.norm_rows {
            let ws = workbook.add_worksheet();
            ws.set_name(NORM_SHEET)?;
            ws.write_string(0, 0, "Típuskód")?;
            for (col, header) in NORM_COLUMNS.iter() {
                ws.write_string(0, *col as u16, *header)?;
            }
            ws.write_string(0, OVERALL_NORM_COLUMN as u16, "Összes normaidő")?;
            for (idx, (code, values)) in rows.iter().enumerate() {
                let row = idx as u32 + 1;
                ws.write_string(row, 0, *code)?;
                for (col, value) in values {
                    ws.write_number(row, *col, *value)?;
                }
            }
        }

        if let Some(rows) = &self.time_log_rows {
            let ws = workbook.add_worksheet();
            ws.set_name(TIME_LOG_SHEET)?;
            for (col, header) in ["Munkahely", "Művelet", "Dátum", "Perc"].iter().enumerate() {
                ws.write_string(0, col as u16, *header)?;
            }
            for (idx, cells) in rows.iter().enumerate() {
                for (col, cell) in cells.iter().enumerate() {
                    write_cell(ws, idx as u32 + 1, col as u16, cell)?;
                }
            }
        }

        workbook.save(path)?;
        Ok(())
    }

    /// 写入临时目录，返回 (目录守卫, 文件路径)
    pub fn save_temp(&self) -> Result<(TempDir, PathBuf), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("terv.xlsx");
        self.save(&path)?;
        Ok((dir, path))
    }
}

/// 标准周计划：FIX 锚点 (0,0)，TEKERCS 锚点 (0,12)
pub fn standard_plan_cells() -> Vec<(u32, u16, Cell)> {
    let mut cells = vec![(0, 0, Cell::S("FIX")), (0, 12, Cell::S("TEKERCS"))];

    // FIX: 型号, (需求, 交付) × 5
    cells.push((1, 0, Cell::S("B100")));
    for day in 0..5u16 {
        cells.push((1, 1 + 2 * day, Cell::N(10.0)));
        cells.push((1, 2 + 2 * day, Cell::N(5.0)));
    }
    cells.push((2, 0, Cell::S("B200")));
    cells.push((2, 3, Cell::N(20.0)));
    cells.push((2, 7, Cell::N(20.0)));

    // COIL: 型号, 周需求, 周交付, 逐日交付 × 5
    cells.push((1, 12, Cell::S("C200")));
    cells.push((1, 13, Cell::N(1000.0)));
    cells.push((1, 14, Cell::N(150.0)));
    cells.push((1, 15, Cell::N(150.0)));
    cells.push((2, 12, Cell::S("SUM")));

    cells
}

/// 标准定额
pub fn standard_norm_rows() -> Vec<(&'static str, Vec<(u16, f64)>)> {
    vec![
        (
            "B100",
            vec![(COL_SZERELES, 3.0), (COL_MERES, 1.0), (OVERALL_NORM_COLUMN as u16, 4.5)],
        ),
        (
            "C200",
            vec![(COL_SZERELES, 3.5), (COL_MERES, 2.0), (OVERALL_NORM_COLUMN as u16, 6.0)],
        ),
    ]
}

/// 标准工时日志（含一条外部工位、一条未知工序、一条坏日期）
pub fn standard_time_log_rows() -> Vec<[Cell; 4]> {
    vec![
        [Cell::S("64L01"), Cell::S("Végmérés"), Cell::N(46097.0), Cell::N(120.0)],
        [Cell::S("64L02"), Cell::S("VÉGMÉRÉS"), Cell::S("2026-03-16"), Cell::N(60.0)],
        [Cell::S("64L01"), Cell::S("Végszerelés"), Cell::S("2026.03.17."), Cell::N(240.0)],
        [Cell::S("99X01"), Cell::S("Végmérés"), Cell::S("2026-03-16"), Cell::N(999.0)],
        [Cell::S("64L03"), Cell::S("Ismeretlen művelet"), Cell::S("20260317"), Cell::N(30.0)],
        [Cell::S("64L01"), Cell::S("Végmérés"), Cell::S("nem dátum"), Cell::N(10.0)],
    ]
}
