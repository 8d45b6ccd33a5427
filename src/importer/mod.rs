// ==========================================
// 产能同步引擎 - 导入层
// ==========================================
// 职责: 工作簿/CSV → 领域数据（计划块、型号定额、实绩工时）
// 红线: 只读源文件，不触碰数据库
// ==========================================

// 模块声明
pub mod actuals_reducer;
pub mod category_mapper;
pub mod error;
pub mod grid;
pub mod norm_aggregator;
pub mod plan_extractor;
pub mod text;
pub mod workbook;

// 重导出核心类型
pub use actuals_reducer::{
    read_time_log_csv, read_time_log_sheet, ActualsReducer, ActualsReduction, TimeLogRows,
};
pub use category_mapper::{CategoryMapper, WorkplaceFilter, DICTIONARY_VERSION};
pub use error::{ImportError, ImportResult};
pub use grid::{CellValue, SheetGrid};
pub use norm_aggregator::{NormAggregation, NormTimeAggregator};
pub use plan_extractor::PlanExtractor;
pub use text::normalize_operation_name;
pub use workbook::SpreadsheetLocator;
