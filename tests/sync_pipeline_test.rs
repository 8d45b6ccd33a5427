// ==========================================
// SyncPipeline 集成测试
// ==========================================
// 测试范围:
// 1. 标准工作簿全流程：计划/定额/实绩落库与摘要
// 2. 幂等：同一工作簿同步两次，daily_plan 与 category_perc_log 完全一致
// 3. 结构错误整轮中止，库中数据保持上一轮结果
// 4. 实绩来源：日志表缺失时跳过；配置 CSV 时优先 CSV
// ==========================================

mod test_helpers;

use capacity_sync::config::SyncSettings;
use capacity_sync::domain::plan::BlockEnd;
use capacity_sync::domain::{CategoryCode, IsoWeek, ProductFamily, SyncRequest};
use capacity_sync::engine::{ActualsSource, SyncError, SyncPipeline};
use capacity_sync::importer::ImportError;
use capacity_sync::repository::{CategoryPercRepository, DailyPlanRepository, ProductNormRepository};
use chrono::NaiveDate;
use std::io::Write;
use std::path::Path;
use test_helpers::*;

fn settings_for(path: &Path) -> SyncSettings {
    SyncSettings {
        workbook_path: Some(path.to_string_lossy().to_string()),
        ..SyncSettings::default()
    }
}

fn request() -> SyncRequest {
    SyncRequest {
        week: Some(WEEK),
        year: Some(YEAR),
    }
}

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
}

// ==========================================
// 全流程
// ==========================================

#[test]
fn test_standard_workbook_full_sync() {
    let (_dir, path) = WorkbookBuilder::standard().save_temp().unwrap();
    let conn = shared_memory_conn();
    let pipeline = SyncPipeline::new(conn.clone());

    let report = pipeline.run(&settings_for(&path), &request()).unwrap();

    // 计划
    assert_eq!(report.sheet_name, PLAN_SHEET);
    assert_eq!(report.fix_types, 2);
    assert_eq!(report.coil_types, 1);
    assert_eq!(report.fix_end, BlockEnd::EndOfSheet);
    assert_eq!(report.coil_end, BlockEnd::SumMarker);
    assert_eq!(report.fix_rows_written, 10);
    assert_eq!(report.coil_rows_written, 5);

    // 定额（表头行计为跳过）
    assert_eq!(report.norms_written, 2);
    assert_eq!(report.norm_rows_skipped, 1);

    // 实绩
    assert_eq!(report.actuals_source, ActualsSource::Sheet);
    assert_eq!(report.actuals_rows_read, 5);
    assert_eq!(report.actuals_filtered_out, 1);
    assert_eq!(report.actuals_rows_skipped, 1);
    assert_eq!(report.actuals.inserted, 3);
    assert_eq!(report.unmapped_names, vec!["Ismeretlen művelet".to_string()]);

    // 产能摘要：每日 10×4 + 200×5.5 = 1140 分钟 → 3 人
    assert_eq!(report.unmatched_types, vec!["B200".to_string()]);
    assert!((report.total_minutes - 5700.0).abs() < 1e-9);
    assert_eq!(report.peak_headcount, 3);

    let week = IsoWeek::new(YEAR, WEEK).unwrap();
    let plan = DailyPlanRepository::from_connection(conn.clone())
        .list_by_week(week)
        .unwrap();
    assert_eq!(plan.len(), 15);
    let coil: Vec<_> = plan.iter().filter(|e| e.family == ProductFamily::Coil).collect();
    assert!(coil.iter().all(|e| e.demand_units == 200));
    assert_eq!(coil.iter().map(|e| e.delivered_units).sum::<i64>(), 150);

    let norms = ProductNormRepository::from_connection(conn.clone())
        .load_catalog()
        .unwrap();
    let c200 = norms.get("C200").unwrap();
    assert_eq!(c200.category_norm(CategoryCode::Szereles), 3.5);
    assert_eq!(c200.overall_norm, 6.0);

    let logs = CategoryPercRepository::from_connection(conn)
        .list_range(d(16), d(20))
        .unwrap();
    let summary: Vec<_> = logs
        .iter()
        .map(|l| (l.log_date, l.category_code, l.leadott_perc))
        .collect();
    assert_eq!(
        summary,
        vec![
            (d(16), CategoryCode::Meres, 180.0),
            (d(17), CategoryCode::Szereles, 240.0),
            (d(17), CategoryCode::Egyeb, 30.0),
        ]
    );
}

#[test]
fn test_sync_is_idempotent() {
    let (_dir, path) = WorkbookBuilder::standard().save_temp().unwrap();
    let conn = shared_memory_conn();
    let pipeline = SyncPipeline::new(conn.clone());
    let settings = settings_for(&path);
    let week = IsoWeek::new(YEAR, WEEK).unwrap();
    let plan_repo = DailyPlanRepository::from_connection(conn.clone());
    let perc_repo = CategoryPercRepository::from_connection(conn);

    pipeline.run(&settings, &request()).unwrap();
    let plan_first = plan_repo.list_by_week(week).unwrap();
    let logs_first = perc_repo.list_range(d(1), d(31)).unwrap();

    let second = pipeline.run(&settings, &request()).unwrap();
    let plan_second = plan_repo.list_by_week(week).unwrap();
    let logs_second = perc_repo.list_range(d(1), d(31)).unwrap();

    assert_eq!(plan_first, plan_second);
    // 值未变的实绩行不改写 updated_at
    assert_eq!(logs_first, logs_second);
    assert_eq!(second.actuals.unchanged, 3);
    assert_eq!(second.actuals.written(), 0);
}

// ==========================================
// 结构错误
// ==========================================

#[test]
fn test_missing_coil_anchor_aborts_before_writes() {
    let conn = shared_memory_conn();
    let pipeline = SyncPipeline::new(conn.clone());
    let week = IsoWeek::new(YEAR, WEEK).unwrap();

    let (_good_dir, good) = WorkbookBuilder::standard().save_temp().unwrap();
    pipeline.run(&settings_for(&good), &request()).unwrap();

    // 去掉 TEKERCS 锚点，同时改动 FIX 数量
    let broken_cells: Vec<_> = standard_plan_cells()
        .into_iter()
        .filter(|(row, col, _)| !(*row == 0 && *col == 12))
        .map(|(row, col, cell)| match (row, col) {
            (1, 1) => (row, col, Cell::N(99.0)),
            _ => (row, col, cell),
        })
        .collect();
    let (_bad_dir, bad) = WorkbookBuilder::standard()
        .plan_sheet(PLAN_SHEET, broken_cells)
        .save_temp()
        .unwrap();

    let err = pipeline.run(&settings_for(&bad), &request()).unwrap_err();
    assert!(matches!(
        err,
        SyncError::Import {
            source: ImportError::AnchorNotFound { .. },
            ..
        }
    ));
    assert!(err.is_structural());

    let plan = DailyPlanRepository::from_connection(conn)
        .list_by_week(week)
        .unwrap();
    let monday_b100 = plan
        .iter()
        .find(|e| e.type_code == "B100" && e.plan_date == d(16))
        .unwrap();
    assert_eq!(monday_b100.demand_units, 10);
}

#[test]
fn test_missing_plan_sheet_is_structural() {
    let (_dir, path) = WorkbookBuilder::standard()
        .plan_sheet("CW13 ütemterv", standard_plan_cells())
        .save_temp()
        .unwrap();
    let conn = shared_memory_conn();

    let err = SyncPipeline::new(conn.clone())
        .run(&settings_for(&path), &request())
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Import {
            source: ImportError::SheetNotFound { .. },
            ..
        }
    ));
    assert_eq!(
        ProductNormRepository::from_connection(conn).count().unwrap(),
        0
    );
}

#[test]
fn test_non_numeric_quantity_aborts() {
    let mut cells = standard_plan_cells();
    cells.push((1, 5, Cell::S("sok")));
    let (_dir, path) = WorkbookBuilder::standard()
        .plan_sheet(PLAN_SHEET, cells)
        .save_temp()
        .unwrap();

    let err = SyncPipeline::new(shared_memory_conn())
        .run(&settings_for(&path), &request())
        .unwrap_err();
    match err {
        SyncError::Import {
            source: ImportError::InvalidQuantity { row, col, .. },
            ..
        } => {
            assert_eq!((row, col), (2, 6));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ==========================================
// 实绩来源
// ==========================================

#[test]
fn test_missing_time_log_sheet_skips_actuals() {
    let (_dir, path) = WorkbookBuilder::standard()
        .without_time_log()
        .save_temp()
        .unwrap();

    let report = SyncPipeline::new(shared_memory_conn())
        .run(&settings_for(&path), &request())
        .unwrap();
    assert_eq!(report.actuals_source, ActualsSource::None);
    assert_eq!(report.actuals.written(), 0);
    assert_eq!(report.fix_rows_written, 10);
}

#[test]
fn test_csv_time_log_takes_precedence() {
    let (dir, path) = WorkbookBuilder::standard().save_temp().unwrap();
    let csv_path = dir.path().join("idonaplo.csv");
    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "Munkahely;Művelet;Dátum;Perc").unwrap();
    writeln!(file, "64L01;Dobozolás;2026-03-18;45").unwrap();
    writeln!(file, "64L01;Dobozolás;2026-03-18;15").unwrap();
    drop(file);

    let conn = shared_memory_conn();
    let settings = SyncSettings {
        time_log_csv_path: Some(csv_path.to_string_lossy().to_string()),
        ..settings_for(&path)
    };
    let report = SyncPipeline::new(conn.clone()).run(&settings, &request()).unwrap();
    assert_eq!(report.actuals_source, ActualsSource::Csv);
    assert_eq!(report.actuals.inserted, 1);

    let logs = CategoryPercRepository::from_connection(conn)
        .list_range(d(16), d(20))
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].category_code, CategoryCode::Csomagolas);
    assert_eq!(logs[0].leadott_perc, 60.0);
}
