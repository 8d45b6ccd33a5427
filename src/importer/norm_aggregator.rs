// ==========================================
// 产能同步引擎 - 工时定额汇总器
// ==========================================
// 职责: 宽表（每型号一行，92 个工序工时列）→ 11 类工时 + 独立总定额
// 表结构: A 列 = 型号, 第 1..=92 列 = 工序工时, 第 93 列 = 总定额
// 红线: 总定额单独读取，不与 11 类之和核对
// ==========================================

use crate::domain::product::{NormCatalog, ProductType};
use crate::domain::types::{normalize_type_code, CategoryCode, ProductFamily};
use crate::importer::category_mapper;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::grid::SheetGrid;
use crate::importer::text::fold_header;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::{info, instrument, warn};

/// 列表版本（列增删时递增）
pub const NORM_TABLE_VERSION: &str = "2025.1";

/// 型号列
pub const TYPE_CODE_COLUMN: usize = 0;

/// 总定额列
pub const OVERALL_NORM_COLUMN: usize = 93;

/// 定额表最少列数
pub const NORM_TABLE_WIDTH: usize = OVERALL_NORM_COLUMN + 1;

// ==========================================
// 列号 → 工序表头
// ==========================================
// 类别通过 CategoryMapper 词典解析，未命中的列计入 EGYEB（不进入 11 类）
pub static NORM_COLUMNS: [(usize, &str); 92] = [
    (1, "Anyag előkészítés"),
    (2, "Vezetékvágás"),
    (3, "Huzal vágás"),
    (4, "Csupaszítás"),
    (5, "Darabolás"),
    (6, "Sorjázás"),
    (7, "Kitting"),
    (8, "Lemezvágás"),
    (9, "Primer tekercselés"),
    (10, "Szekunder tekercselés"),
    (11, "Gépi tekercselés"),
    (12, "Kézi tekercselés"),
    (13, "Toroid tekercselés"),
    (14, "Rétegtekercselés"),
    (15, "Csévélés"),
    (16, "Tekercskészítés"),
    (17, "Szigetelőpapír behelyezés"),
    (18, "Szalagozás"),
    (19, "Zsugorcsövezés"),
    (20, "Közbenső szigetelés"),
    (21, "Rétegszigetelés"),
    (22, "Fóliázás"),
    (23, "Kézi forrasztás"),
    (24, "Hullámforrasztás"),
    (25, "Mártó forrasztás"),
    (26, "Ónozás"),
    (27, "Ponthegesztés"),
    (28, "Ultrahangos hegesztés"),
    (29, "Kivezetés forrasztás"),
    (30, "Előszerelés"),
    (31, "Vasmag szerelés"),
    (32, "Magrakás"),
    (33, "Lemezelés"),
    (34, "Ház szerelés"),
    (35, "Csavarozás"),
    (36, "Bilincselés"),
    (37, "Tartó szerelés"),
    (38, "Végszerelés"),
    (39, "Összeszerelés"),
    (40, "Krimpelés"),
    (41, "Saruzás"),
    (42, "Érvéghüvelyezés"),
    (43, "Csatlakozó szerelés"),
    (44, "Kötegelés"),
    (45, "Sorkapocs bekötés"),
    (46, "Vezeték bekötés"),
    (47, "Kábelezés"),
    (48, "Vákuum impregnálás"),
    (49, "Lakkozás"),
    (50, "Mártás"),
    (51, "Szárítás"),
    (52, "Kemencézés"),
    (53, "Beégetés"),
    (54, "Gyantázás"),
    (55, "Gyantaöntés"),
    (56, "Vákuumöntés"),
    (57, "Kiöntés"),
    (58, "Tokozás"),
    (59, "Betokozás"),
    (60, "Kitöltés"),
    (61, "Közbenső mérés"),
    (62, "Ellenállásmérés"),
    (63, "Induktivitás mérés"),
    (64, "Áttétel mérés"),
    (65, "Átütésvizsgálat"),
    (66, "Szigetelésmérés"),
    (67, "Végmérés"),
    (68, "Vizuális ellenőrzés"),
    (69, "Minőségellenőrzés"),
    (70, "Bevizsgálás"),
    (71, "Címkézés"),
    (72, "Címke nyomtatás"),
    (73, "Feliratozás"),
    (74, "Típustábla"),
    (75, "Lézeres jelölés"),
    (76, "Gravírozás"),
    (77, "Matricázás"),
    (78, "Dobozolás"),
    (79, "Becsomagolás"),
    (80, "Zacskózás"),
    (81, "Raklapozás"),
    (82, "Pakolás"),
    (83, "Szállítási csomagolás"),
    (84, "Göngyölegezés"),
    (85, "Anyagmozgatás"),
    (86, "Átállás"),
    (87, "Takarítás"),
    (88, "Raktári kiadás"),
    (89, "Javítás"),
    (90, "Selejt kezelés"),
    (91, "Adminisztráció"),
    (92, "Egyéb műveletek"),
];

/// 列号 → 类别（首次使用时解析一次）
pub fn column_categories() -> &'static [(usize, CategoryCode)] {
    static TABLE: OnceLock<Vec<(usize, CategoryCode)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        NORM_COLUMNS
            .iter()
            .map(|(col, header)| {
                let category = category_mapper::lookup(header).unwrap_or(CategoryCode::Egyeb);
                (*col, category)
            })
            .collect()
    })
}

/// 汇总结果
#[derive(Debug, Clone, Serialize)]
pub struct NormAggregation {
    pub products: Vec<ProductType>,
    pub skipped_rows: usize,
    pub duplicate_codes: Vec<String>,
    pub header_mismatches: usize,
}

impl NormAggregation {
    pub fn catalog(&self) -> NormCatalog {
        NormCatalog::from_types(self.products.iter().cloned())
    }
}

// ==========================================
// NormTimeAggregator - 定额汇总器
// ==========================================
pub struct NormTimeAggregator;

impl NormTimeAggregator {
    /// 汇总定额表
    ///
    /// # 返回
    /// - Ok(NormAggregation): 按型号排序的定额
    /// - Err(NormTableTooNarrow): 表宽不足（整轮中止）
    #[instrument(skip(self, grid), fields(sheet = %grid.name))]
    pub fn aggregate(&self, grid: &SheetGrid) -> ImportResult<NormAggregation> {
        let width = grid.width();
        if width < NORM_TABLE_WIDTH {
            return Err(ImportError::NormTableTooNarrow {
                sheet: grid.name.clone(),
                expected: NORM_TABLE_WIDTH,
                actual: width,
            });
        }

        let columns = column_categories();
        let mut catalog = NormCatalog::new();
        let mut skipped_rows = 0;
        let mut duplicate_codes = Vec::new();
        let mut header_mismatches = 0;
        let mut header_checked = false;

        for row in 0..grid.height() {
            let code = normalize_type_code(&grid.cell(row, TYPE_CODE_COLUMN).as_text());
            let family = match ProductFamily::from_type_code(&code) {
                Some(f) => f,
                None => {
                    if grid.row(row).iter().any(|c| !c.is_blank()) {
                        skipped_rows += 1;
                    }
                    continue;
                }
            };

            // 首个数据行的上一行视为表头，用于检测列漂移
            if !header_checked {
                header_checked = true;
                if row > 0 {
                    header_mismatches = self.count_header_mismatches(grid, row - 1);
                }
            }

            let mut product = ProductType::new(code.clone(), family);
            for (col, category) in columns {
                let minutes = self.read_minutes(grid, row, *col, &code);
                product.add_category_norm(*category, minutes);
            }
            product.overall_norm = self.read_minutes(grid, row, OVERALL_NORM_COLUMN, &code);

            if catalog.insert(product).is_some() {
                warn!(type_code = %code, row = row + 1, "定额表型号重复，以后出现的行为准");
                duplicate_codes.push(code);
            }
        }

        if header_mismatches > 0 {
            warn!(
                mismatches = header_mismatches,
                version = NORM_TABLE_VERSION,
                "定额表表头与列表不一致，请核对列顺序"
            );
        }

        info!(
            products = catalog.len(),
            skipped_rows = skipped_rows,
            duplicates = duplicate_codes.len(),
            "定额表汇总完成"
        );

        Ok(NormAggregation {
            products: catalog.into_sorted_vec(),
            skipped_rows,
            duplicate_codes,
            header_mismatches,
        })
    }

    /// 读取工时单元格：空白为 0，负数/非数值文本按 0 处理并告警
    fn read_minutes(&self, grid: &SheetGrid, row: usize, col: usize, code: &str) -> f64 {
        let cell = grid.cell(row, col);
        if cell.is_blank() {
            return 0.0;
        }
        match cell.as_number() {
            Some(v) if v >= 0.0 => v,
            Some(v) => {
                warn!(type_code = %code, row = row + 1, col = col, value = v, "定额为负数，按 0 处理");
                0.0
            }
            None => {
                warn!(type_code = %code, row = row + 1, col = col, value = %cell, "定额单元格非数值，按 0 处理");
                0.0
            }
        }
    }

    fn count_header_mismatches(&self, grid: &SheetGrid, header_row: usize) -> usize {
        NORM_COLUMNS
            .iter()
            .filter(|(col, expected)| {
                let actual = grid.cell(header_row, *col).as_text();
                !actual.is_empty() && fold_header(&actual) != fold_header(expected)
            })
            .count()
    }
}
