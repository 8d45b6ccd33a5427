// ==========================================
// 产能同步引擎 - 工作簿定位器
// ==========================================
// 职责: 打开工作簿，按 ISO 周解析计划表名，读取定额表与工时日志表
// 工具: calamine（自动识别 xlsx/xlsm/xls/xlsb/ods）
// ==========================================

use crate::domain::types::IsoWeek;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::grid::SheetGrid;
use crate::importer::text::fold_header;
use calamine::{open_workbook_auto, Reader, Sheets};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 默认计划表名模板
pub const DEFAULT_PLAN_SHEET_TEMPLATE: &str = "CW{week} ütemterv";

/// 默认定额表名
pub const DEFAULT_NORM_SHEET: &str = "Normaidők";

/// 默认工时日志表名
pub const DEFAULT_TIME_LOG_SHEET: &str = "Időnapló";

const SUPPORTED_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "xlsb", "ods"];

// ==========================================
// SpreadsheetLocator - 工作簿定位器
// ==========================================
pub struct SpreadsheetLocator {
    path: PathBuf,
    workbook: Sheets<BufReader<File>>,
    sheet_names: Vec<String>,
}

impl SpreadsheetLocator {
    /// 打开工作簿
    ///
    /// # 返回
    /// - Err(FileNotFound): 文件不存在
    /// - Err(UnsupportedFormat): 扩展名不在支持列表内
    pub fn open(path: impl AsRef<Path>) -> ImportResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let workbook = open_workbook_auto(path)?;
        let sheet_names = workbook.sheet_names();
        info!(path = %path.display(), sheets = sheet_names.len(), "工作簿已打开");

        Ok(Self {
            path: path.to_path_buf(),
            workbook,
            sheet_names,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// 解析实际工作表名：先精确匹配，再按去重音/大小写/空白折叠匹配
    pub fn resolve_sheet_name(&self, requested: &str) -> ImportResult<String> {
        if let Some(name) = self.sheet_names.iter().find(|n| n.as_str() == requested) {
            return Ok(name.clone());
        }

        let folded = fold_header(requested);
        self.sheet_names
            .iter()
            .find(|n| fold_header(n) == folded)
            .cloned()
            .ok_or_else(|| ImportError::SheetNotFound {
                sheet: requested.to_string(),
            })
    }

    pub fn has_sheet(&self, requested: &str) -> bool {
        self.resolve_sheet_name(requested).is_ok()
    }

    /// 读取工作表为网格
    pub fn load_sheet(&mut self, requested: &str) -> ImportResult<SheetGrid> {
        let name = self.resolve_sheet_name(requested)?;
        let range = self.workbook.worksheet_range(&name)?;
        let grid = SheetGrid::from_range(name.clone(), &range);
        debug!(sheet = %name, rows = grid.height(), cols = grid.width(), "工作表已读取");
        Ok(grid)
    }

    /// 按 ISO 周读取计划表
    ///
    /// # 参数
    /// - week: 目标 ISO 周
    /// - template: 表名模板，`{week}` 替换为周号
    pub fn load_plan_sheet(&mut self, week: IsoWeek, template: &str) -> ImportResult<SheetGrid> {
        let name = week.plan_sheet_name(template);
        self.load_sheet(&name)
    }
}
