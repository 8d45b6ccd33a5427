// ==========================================
// 产能同步引擎 - 同步流程编排
// ==========================================
// 用途: 串联 读表 → 抽取 → 定额汇总 → 实绩汇总 → 落库 → 产能报表
// 红线: 所有结构错误在任何写入之前抛出（整轮中止，不写半截数据）
// ==========================================

use crate::config::SyncSettings;
use crate::domain::actuals::UpsertOutcome;
use crate::domain::plan::BlockEnd;
use crate::domain::sync_job::SyncRequest;
use crate::domain::types::IsoWeek;
use crate::engine::capacity_calculator::CapacityCalculator;
use crate::engine::error::EngineError;
use crate::engine::plan_builder::PlanBuilder;
use crate::importer::{
    read_time_log_csv, read_time_log_sheet, ActualsReducer, ImportError, NormTimeAggregator,
    PlanExtractor, SpreadsheetLocator, TimeLogRows, WorkplaceFilter,
};
use crate::repository::{
    CategoryPercRepository, DailyPlanRepository, ProductNormRepository, RepositoryError,
};
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// 同步流程错误类型
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{week} 源表结构错误: {source}")]
    Import { week: IsoWeek, source: ImportError },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("未配置工作簿路径 (workbook_path)")]
    WorkbookNotConfigured,
}

impl SyncError {
    /// 源表格式问题（重试无意义，需人工修表）
    pub fn is_structural(&self) -> bool {
        match self {
            SyncError::Import { source, .. } => source.is_structural(),
            _ => false,
        }
    }
}

/// Result 类型别名
pub type SyncResult<T> = Result<T, SyncError>;

/// 实绩来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActualsSource {
    Sheet,
    Csv,
    None,
}

// ==========================================
// SyncReport - 单轮同步结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub week: u32,
    pub year: i32,
    pub sheet_name: String,
    pub synced_at: String,

    // 计划
    pub fix_types: usize,
    pub coil_types: usize,
    pub fix_end: BlockEnd,
    pub coil_end: BlockEnd,
    pub fix_rows_written: usize,
    pub coil_rows_written: usize,

    // 定额
    pub norms_written: usize,
    pub norm_rows_skipped: usize,
    pub norm_duplicates: Vec<String>,

    // 实绩
    pub actuals_source: ActualsSource,
    pub actuals_rows_read: usize,
    pub actuals_filtered_out: usize,
    pub actuals_rows_skipped: usize,
    pub actuals: UpsertOutcome,
    pub unmapped_names: Vec<String>,

    // 产能
    pub unmatched_types: Vec<String>,
    pub total_minutes: f64,
    pub peak_headcount: u32,

    pub elapsed_ms: u64,
}

/// 解析目标周：缺省取当前 ISO 周，只给周号时取当前 ISO 年
pub fn resolve_week(request: &SyncRequest, today: NaiveDate) -> SyncResult<IsoWeek> {
    let current = IsoWeek::containing(today);
    let year = request.year.unwrap_or(current.year);
    let week = request.week.unwrap_or(current.week);
    IsoWeek::new(year, week).ok_or(SyncError::Engine(EngineError::InvalidWeek { year, week }))
}

// ==========================================
// SyncPipeline - 同步流程
// ==========================================
pub struct SyncPipeline {
    plan_repo: DailyPlanRepository,
    norm_repo: ProductNormRepository,
    perc_repo: CategoryPercRepository,
}

impl SyncPipeline {
    /// 创建同步流程（所有仓储共享同一连接）
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            plan_repo: DailyPlanRepository::from_connection(conn.clone()),
            norm_repo: ProductNormRepository::from_connection(conn.clone()),
            perc_repo: CategoryPercRepository::from_connection(conn),
        }
    }

    /// 执行一轮同步（阻塞，调用方负责放到阻塞线程池）
    ///
    /// # 参数
    /// - settings: 本轮使用的配置快照
    /// - request: 目标周（可缺省）
    ///
    /// # 返回
    /// - Ok(SyncReport): 同步结果
    /// - Err(SyncError): 结构错误或落库失败
    pub fn run(&self, settings: &SyncSettings, request: &SyncRequest) -> SyncResult<SyncReport> {
        let week = resolve_week(request, Local::now().date_naive())?;
        self.run_for_week(settings, week).map_err(|e| {
            error!(
                week = week.week,
                year = week.year,
                structural = e.is_structural(),
                error = %e,
                "同步中止"
            );
            e
        })
    }

    #[instrument(skip(self, settings, week), fields(week = %week))]
    fn run_for_week(&self, settings: &SyncSettings, week: IsoWeek) -> SyncResult<SyncReport> {
        let started = Instant::now();
        let import_err = |source: ImportError| SyncError::Import { week, source };

        let workbook_path = settings
            .workbook_path
            .as_deref()
            .ok_or(SyncError::WorkbookNotConfigured)?;
        let calculator = CapacityCalculator::new(settings.capacity)?;

        info!(workbook = %workbook_path, "开始同步");

        // ==========================================
        // 步骤1: 读取周计划表并抽取 FIX/COIL 块
        // ==========================================
        let mut locator = SpreadsheetLocator::open(workbook_path).map_err(import_err)?;
        let plan_grid = locator
            .load_plan_sheet(week, &settings.plan_sheet_template)
            .map_err(import_err)?;
        let extractor = PlanExtractor::new(&settings.fix_anchor_label, &settings.coil_anchor_label);
        let extracted = extractor.extract(&plan_grid).map_err(import_err)?;
        let weekly_plan = PlanBuilder::new(settings.coil_split_policy).build(week, &extracted);
        debug!("步骤1 完成: 周计划已抽取");

        // ==========================================
        // 步骤2: 定额表汇总
        // ==========================================
        let norm_grid = locator
            .load_sheet(&settings.norm_sheet_name)
            .map_err(import_err)?;
        let norms = NormTimeAggregator.aggregate(&norm_grid).map_err(import_err)?;
        debug!("步骤2 完成: 定额已汇总");

        // ==========================================
        // 步骤3: 实绩工时汇总
        // ==========================================
        let (actuals_source, log_rows) = self.read_actuals(&mut locator, settings, week)?;
        let filter = WorkplaceFilter::new(&settings.workplace_prefix, &settings.workplace_allow_list);
        let actuals = ActualsReducer::new(filter).reduce(&log_rows);
        debug!("步骤3 完成: 实绩已汇总");

        // ==========================================
        // 步骤4: 落库（定额 → 计划 → 实绩）
        // ==========================================
        let synced_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let norms_written = self.norm_repo.replace_all(&norms.products, &synced_at)?;
        let (fix_rows_written, coil_rows_written) =
            self.plan_repo.replace_week(week, &weekly_plan)?;
        let upsert = self.perc_repo.upsert_all(&actuals.logs, &synced_at)?;
        debug!("步骤4 完成: 数据已落库");

        // ==========================================
        // 步骤5: 产能需求报表（摘要）
        // ==========================================
        let catalog = norms.catalog();
        let entries: Vec<_> = weekly_plan.all_entries().cloned().collect();
        let capacity = calculator.build_report(week, &entries, &catalog);

        let report = SyncReport {
            week: week.week,
            year: week.year,
            sheet_name: extracted.sheet_name.clone(),
            synced_at,
            fix_types: extracted.fix_rows.len(),
            coil_types: extracted.coil_rows.len(),
            fix_end: extracted.fix_end,
            coil_end: extracted.coil_end,
            fix_rows_written,
            coil_rows_written,
            norms_written,
            norm_rows_skipped: norms.skipped_rows,
            norm_duplicates: norms.duplicate_codes.clone(),
            actuals_source,
            actuals_rows_read: actuals.rows_read,
            actuals_filtered_out: actuals.filtered_out,
            actuals_rows_skipped: actuals.skipped_rows,
            actuals: upsert,
            unmapped_names: actuals.unmapped_names,
            unmatched_types: capacity.summary.unmatched_types.clone(),
            total_minutes: capacity.summary.total_minutes,
            peak_headcount: capacity.summary.peak_headcount,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            fix_types = report.fix_types,
            coil_types = report.coil_types,
            norms = report.norms_written,
            actuals_written = report.actuals.written(),
            unmapped = report.unmapped_names.len(),
            unmatched = report.unmatched_types.len(),
            elapsed_ms = report.elapsed_ms,
            "同步完成"
        );
        Ok(report)
    }

    /// 实绩来源：配置了 CSV 时优先 CSV，否则读工作簿日志表；日志表缺失时跳过
    fn read_actuals(
        &self,
        locator: &mut SpreadsheetLocator,
        settings: &SyncSettings,
        week: IsoWeek,
    ) -> SyncResult<(ActualsSource, TimeLogRows)> {
        let import_err = |source: ImportError| SyncError::Import { week, source };

        if let Some(csv_path) = settings.time_log_csv_path.as_deref() {
            let rows = read_time_log_csv(Path::new(csv_path)).map_err(import_err)?;
            return Ok((ActualsSource::Csv, rows));
        }

        if !locator.has_sheet(&settings.time_log_sheet_name) {
            warn!(sheet = %settings.time_log_sheet_name, "工时日志表不存在，跳过实绩同步");
            return Ok((ActualsSource::None, TimeLogRows::default()));
        }

        let grid = locator
            .load_sheet(&settings.time_log_sheet_name)
            .map_err(import_err)?;
        let rows = read_time_log_sheet(&grid).map_err(import_err)?;
        Ok((ActualsSource::Sheet, rows))
    }
}
