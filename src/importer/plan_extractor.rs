// ==========================================
// 产能同步引擎 - 周计划抽取器
// ==========================================
// 职责: 从周计划工作表中识别 FIX / COIL 两个需求块
// 识别方式: 表头锚点定位 + 按内容判断块结束（空白 / 型号不符 / SUM 行）
// 红线: 任一锚点缺失整轮中止，不返回部分结果
// ==========================================

use crate::domain::plan::{BlockEnd, CoilPlanRow, ExtractedPlan, FixPlanRow};
use crate::domain::types::{normalize_type_code, ProductFamily, WORKDAYS_PER_WEEK};
use crate::importer::category_mapper::header_matches;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::grid::SheetGrid;
use crate::importer::text::fold_header;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// 默认 FIX 块锚点
pub const DEFAULT_FIX_ANCHOR: &str = "FIX";

/// 默认 COIL 块锚点
pub const DEFAULT_COIL_ANCHOR: &str = "TEKERCS";

/// 汇总行标记
const SUM_MARKER: &str = "SUM";

/// 单元格数量上限，超出视为结构错误
pub const MAX_QUANTITY: f64 = 1_000_000_000.0;

// ==========================================
// PlanExtractor - 周计划抽取器
// ==========================================
#[derive(Debug, Clone)]
pub struct PlanExtractor {
    fix_anchor: String,
    coil_anchor: String,
}

impl Default for PlanExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_FIX_ANCHOR, DEFAULT_COIL_ANCHOR)
    }
}

impl PlanExtractor {
    pub fn new(fix_anchor: impl Into<String>, coil_anchor: impl Into<String>) -> Self {
        Self {
            fix_anchor: fix_anchor.into(),
            coil_anchor: coil_anchor.into(),
        }
    }

    /// 抽取 FIX / COIL 两个块
    ///
    /// # 参数
    /// - grid: 周计划工作表
    ///
    /// # 返回
    /// - Ok(ExtractedPlan): 两个块的行（同块内重复型号已合并）
    /// - Err(AnchorNotFound / InvalidQuantity): 结构错误
    #[instrument(skip(self, grid), fields(sheet = %grid.name))]
    pub fn extract(&self, grid: &SheetGrid) -> ImportResult<ExtractedPlan> {
        let fix_anchor = self.find_anchor(grid, &self.fix_anchor, None)?;
        let coil_anchor = self.find_anchor(grid, &self.coil_anchor, Some(fix_anchor))?;

        let (fix_rows, fix_end) = self.scan_block(grid, fix_anchor, ProductFamily::Fix)?;
        let fix_rows = merge_fix_rows(fix_rows);

        let (coil_source, coil_end) = self.scan_block(grid, coil_anchor, ProductFamily::Coil)?;
        let coil_rows = merge_coil_rows(coil_source);

        info!(
            fix_rows = fix_rows.len(),
            fix_end = %fix_end,
            coil_rows = coil_rows.len(),
            coil_end = %coil_end,
            "周计划块抽取完成"
        );

        Ok(ExtractedPlan {
            sheet_name: grid.name.clone(),
            fix_rows,
            coil_rows,
            fix_end,
            coil_end,
        })
    }

    /// 按行优先查找锚点（可排除已被占用的单元格）
    fn find_anchor(
        &self,
        grid: &SheetGrid,
        label: &str,
        exclude: Option<(usize, usize)>,
    ) -> ImportResult<(usize, usize)> {
        grid.find_first(|r, c, cell| {
            Some((r, c)) != exclude && header_matches(&cell.as_text(), label)
        })
        .ok_or_else(|| ImportError::AnchorNotFound {
            sheet: grid.name.clone(),
            label: label.to_string(),
        })
    }

    /// 从锚点下一行开始扫描，直到块结束
    fn scan_block<R: BlockRow>(
        &self,
        grid: &SheetGrid,
        anchor: (usize, usize),
        family: ProductFamily,
    ) -> ImportResult<(Vec<R>, BlockEnd)> {
        let (anchor_row, col) = anchor;
        let mut rows = Vec::new();

        for row in (anchor_row + 1)..grid.height() {
            let cell = grid.cell(row, col);
            if cell.is_blank() {
                return Ok((rows, BlockEnd::Blank));
            }
            if fold_header(&cell.as_text()).starts_with(SUM_MARKER) {
                return Ok((rows, BlockEnd::SumMarker));
            }
            let code = normalize_type_code(&cell.as_text());
            if !family.matches_code(&code) {
                return Ok((rows, BlockEnd::Mismatch));
            }
            rows.push(R::read(&QuantityReader { grid, row, col }, code)?);
        }

        Ok((rows, BlockEnd::EndOfSheet))
    }
}

// ==========================================
// 数量单元格读取
// ==========================================
struct QuantityReader<'a> {
    grid: &'a SheetGrid,
    row: usize,
    col: usize,
}

impl QuantityReader<'_> {
    /// 读取锚点列右侧 offset 处的数量：空白为 0，四舍五入到整数，负数按 0
    fn at(&self, offset: usize) -> ImportResult<i64> {
        let col = self.col + offset;
        let cell = self.grid.cell(self.row, col);
        if cell.is_blank() {
            return Ok(0);
        }
        let value = cell.as_number().ok_or_else(|| ImportError::InvalidQuantity {
            sheet: self.grid.name.clone(),
            row: self.row + 1,
            col: col + 1,
            value: cell.as_text(),
        })?;
        if !value.is_finite() || value > MAX_QUANTITY {
            return Err(ImportError::InvalidQuantity {
                sheet: self.grid.name.clone(),
                row: self.row + 1,
                col: col + 1,
                value: cell.as_text(),
            });
        }
        if value < 0.0 {
            warn!(
                sheet = %self.grid.name,
                row = self.row + 1,
                col = col + 1,
                value = value,
                "数量为负数，按 0 处理"
            );
            return Ok(0);
        }
        Ok(value.round() as i64)
    }
}

trait BlockRow: Sized {
    fn read(reader: &QuantityReader<'_>, type_code: String) -> ImportResult<Self>;
}

impl BlockRow for FixPlanRow {
    // +1+2d 需求, +2+2d 交付
    fn read(reader: &QuantityReader<'_>, type_code: String) -> ImportResult<Self> {
        let mut demand = [0; WORKDAYS_PER_WEEK];
        let mut delivered = [0; WORKDAYS_PER_WEEK];
        for day in 0..WORKDAYS_PER_WEEK {
            demand[day] = reader.at(1 + 2 * day)?;
            delivered[day] = reader.at(2 + 2 * day)?;
        }
        Ok(FixPlanRow {
            type_code,
            demand,
            delivered,
        })
    }
}

impl BlockRow for CoilPlanRow {
    // +1 周需求, +2 周交付, +3..+7 逐日交付
    fn read(reader: &QuantityReader<'_>, type_code: String) -> ImportResult<Self> {
        let mut delivered = [0; WORKDAYS_PER_WEEK];
        for (day, slot) in delivered.iter_mut().enumerate() {
            *slot = reader.at(3 + day)?;
        }
        Ok(CoilPlanRow {
            type_code,
            weekly_demand: reader.at(1)?,
            weekly_delivered: reader.at(2)?,
            delivered,
        })
    }
}

// ===== 同块重复型号合并（求和） =====

fn merge_fix_rows(rows: Vec<FixPlanRow>) -> Vec<FixPlanRow> {
    let mut merged: Vec<FixPlanRow> = Vec::with_capacity(rows.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        match index.get(&row.type_code) {
            Some(&i) => {
                warn!(type_code = %row.type_code, "FIX 块型号重复，数量合并");
                let target = &mut merged[i];
                for day in 0..WORKDAYS_PER_WEEK {
                    target.demand[day] = target.demand[day].saturating_add(row.demand[day]);
                    target.delivered[day] = target.delivered[day].saturating_add(row.delivered[day]);
                }
            }
            None => {
                index.insert(row.type_code.clone(), merged.len());
                merged.push(row);
            }
        }
    }
    merged
}

fn merge_coil_rows(rows: Vec<CoilPlanRow>) -> Vec<CoilPlanRow> {
    let mut merged: Vec<CoilPlanRow> = Vec::with_capacity(rows.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        match index.get(&row.type_code) {
            Some(&i) => {
                warn!(type_code = %row.type_code, "COIL 块型号重复，数量合并");
                let target = &mut merged[i];
                target.weekly_demand = target.weekly_demand.saturating_add(row.weekly_demand);
                target.weekly_delivered = target.weekly_delivered.saturating_add(row.weekly_delivered);
                for day in 0..WORKDAYS_PER_WEEK {
                    target.delivered[day] = target.delivered[day].saturating_add(row.delivered[day]);
                }
            }
            None => {
                index.insert(row.type_code.clone(), merged.len());
                merged.push(row);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::grid::CellValue;

    fn t(s: &str) -> CellValue {
        CellValue::text(s)
    }

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    /// 锚点位于 B 列：FIX 块在上，TEKERCS 块在下
    fn sample_grid() -> SheetGrid {
        let e = CellValue::Empty;
        SheetGrid::new(
            "CW12 ütemterv",
            vec![
                vec![e.clone(), t("Heti ütemterv CW12")],
                vec![e.clone(), t("FIX típusok"), t("H igény"), t("H leadott")],
                vec![
                    e.clone(),
                    t("B86101"),
                    n(10.0),
                    n(8.0),
                    n(12.0),
                    n(12.0),
                    e.clone(),
                    e.clone(),
                    n(5.0),
                    n(5.0),
                    n(3.0),
                    n(0.0),
                ],
                vec![e.clone(), t(" B86 102 "), n(1.0), e.clone(), t("2,4")],
                vec![e.clone(), t("sum"), n(11.0)],
                vec![],
                vec![e.clone(), t("Tekercs"), t("Heti igény"), t("Heti leadott")],
                vec![
                    e.clone(),
                    t("C62330 A130B52S1"),
                    n(1000.0),
                    n(400.0),
                    n(100.0),
                    n(100.0),
                    n(100.0),
                    n(50.0),
                    n(50.0),
                ],
                vec![e.clone(), t("C1"), n(7.0)],
                vec![e.clone(), t("Megjegyzés")],
            ],
        )
    }

    #[test]
    fn test_extract_both_blocks() {
        let plan = PlanExtractor::default().extract(&sample_grid()).unwrap();

        assert_eq!(plan.sheet_name, "CW12 ütemterv");
        assert_eq!(plan.fix_end, BlockEnd::SumMarker);
        assert_eq!(plan.coil_end, BlockEnd::Mismatch);

        assert_eq!(plan.fix_rows.len(), 2);
        assert_eq!(plan.fix_rows[0].type_code, "B86101");
        assert_eq!(plan.fix_rows[0].demand, [10, 12, 0, 5, 3]);
        assert_eq!(plan.fix_rows[0].delivered, [8, 12, 0, 5, 0]);
        assert_eq!(plan.fix_rows[1].type_code, "B86102");
        assert_eq!(plan.fix_rows[1].demand, [1, 2, 0, 0, 0]);

        assert_eq!(plan.coil_rows.len(), 2);
        let coil = &plan.coil_rows[0];
        assert_eq!(coil.type_code, "C62330A130B52S1");
        assert_eq!(coil.weekly_demand, 1000);
        assert_eq!(coil.weekly_delivered, 400);
        assert_eq!(coil.delivered, [100, 100, 100, 50, 50]);
        assert_eq!(plan.coil_rows[1].weekly_demand, 7);
    }

    #[test]
    fn test_missing_coil_anchor_aborts() {
        let grid = SheetGrid::new(
            "CW12 ütemterv",
            vec![vec![t("FIX")], vec![t("B1"), n(1.0)]],
        );
        let err = PlanExtractor::default().extract(&grid).unwrap_err();
        match err {
            ImportError::AnchorNotFound { label, .. } => assert_eq!(label, "TEKERCS"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_anchor_cells_must_be_distinct() {
        // 同一标签配置给两个块时，第二个锚点必须是另一个单元格
        let grid = SheetGrid::new("S", vec![vec![t("FIX")], vec![t("B1")]]);
        let err = PlanExtractor::new("FIX", "FIX").extract(&grid).unwrap_err();
        assert!(matches!(err, ImportError::AnchorNotFound { .. }));
    }

    #[test]
    fn test_block_ends_on_blank_and_end_of_sheet() {
        // TEKERCS 块在 L 列，位于 FIX 块数量列之外
        let row = |fix: Option<CellValue>, coil: CellValue| {
            let mut cells = vec![CellValue::Empty; 13];
            if let Some(cell) = fix {
                cells[0] = cell;
                cells[1] = n(1.0);
            }
            cells[11] = coil;
            cells[12] = n(5.0);
            cells
        };
        let grid = SheetGrid::new(
            "S",
            vec![
                row(Some(t("FIX")), t("TEKERCS")),
                row(Some(t("B1")), t("C1")),
                row(None, t("C2")),
            ],
        );
        let plan = PlanExtractor::default().extract(&grid).unwrap();
        assert_eq!(plan.fix_end, BlockEnd::Blank);
        assert_eq!(plan.fix_rows.len(), 1);
        assert_eq!(plan.coil_end, BlockEnd::EndOfSheet);
        assert_eq!(plan.coil_rows.len(), 2);
    }

    #[test]
    fn test_non_numeric_quantity_is_structural() {
        let grid = SheetGrid::new(
            "S",
            vec![
                vec![t("FIX")],
                vec![t("B1"), t("sok")],
                vec![],
                vec![t("TEKERCS")],
            ],
        );
        let err = PlanExtractor::default().extract(&grid).unwrap_err();
        match err {
            ImportError::InvalidQuantity { row, col, value, .. } => {
                assert_eq!((row, col), (2, 2));
                assert_eq!(value, "sok");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_quantity_is_structural() {
        let grid = SheetGrid::new(
            "S",
            vec![
                vec![t("FIX")],
                vec![t("B1"), n(1e19)],
                vec![t("B1"), n(1.0)],
                vec![],
                vec![t("TEKERCS")],
            ],
        );
        let err = PlanExtractor::default().extract(&grid).unwrap_err();
        match err {
            ImportError::InvalidQuantity { row, col, .. } => assert_eq!((row, col), (2, 2)),
            other => panic!("unexpected error: {other:?}"),
        }

        let at_limit = SheetGrid::new(
            "S",
            vec![
                vec![t("FIX")],
                vec![t("B1"), n(MAX_QUANTITY)],
                vec![t("B1"), n(MAX_QUANTITY)],
                vec![],
                vec![t("TEKERCS")],
            ],
        );
        let plan = PlanExtractor::default().extract(&at_limit).unwrap();
        assert_eq!(plan.fix_rows[0].demand[0], 2 * MAX_QUANTITY as i64);
    }

    #[test]
    fn test_negative_clamped_and_duplicates_merged() {
        let grid = SheetGrid::new(
            "S",
            vec![
                vec![t("FIX")],
                vec![t("B1"), n(-4.0), n(1.0)],
                vec![t("B 1"), n(3.0), n(2.0)],
                vec![],
                vec![t("TEKERCS")],
                vec![t("C1"), n(10.0)],
                vec![t("C1"), n(5.0)],
            ],
        );
        let plan = PlanExtractor::default().extract(&grid).unwrap();
        assert_eq!(plan.fix_rows.len(), 1);
        assert_eq!(plan.fix_rows[0].demand[0], 3);
        assert_eq!(plan.fix_rows[0].delivered[0], 3);
        assert_eq!(plan.coil_rows.len(), 1);
        assert_eq!(plan.coil_rows[0].weekly_demand, 15);
    }
}
