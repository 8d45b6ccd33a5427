// ==========================================
// 产能同步引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 结构性错误（缺表/缺锚点/表宽不足）整轮中止
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xlsm/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 结构错误（整轮中止） =====
    #[error("工作表不存在: {sheet}")]
    SheetNotFound { sheet: String },

    #[error("表头锚点未找到 (工作表 {sheet}): {label}")]
    AnchorNotFound { sheet: String, label: String },

    #[error("定额表列数不足 (工作表 {sheet}): 需要 {expected} 列，实际 {actual} 列")]
    NormTableTooNarrow {
        sheet: String,
        expected: usize,
        actual: usize,
    },

    #[error("数量单元格无法解析 (工作表 {sheet}, 行 {row}, 列 {col}): {value}")]
    InvalidQuantity {
        sheet: String,
        row: usize,
        col: usize,
        value: String,
    },

    #[error("工时日志表头缺失 (工作表 {sheet}): {message}")]
    LogHeaderMissing { sheet: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为结构性错误（源表格式不符，重试无意义）
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ImportError::SheetNotFound { .. }
                | ImportError::AnchorNotFound { .. }
                | ImportError::NormTableTooNarrow { .. }
                | ImportError::InvalidQuantity { .. }
                | ImportError::LogHeaderMissing { .. }
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
