// ==========================================
// 产能同步引擎 - 工序类别映射器
// ==========================================
// 职责: 自由文本工序名 → 11 个标准类别之一
// 红线: 未命中不报错，归入 EGYEB 并记录原始名称供人工复核
//       分钟数照常计入（总分钟守恒，仅类别粒度变粗）
// ==========================================

use crate::domain::types::CategoryCode;
use crate::importer::text::{fold_header, normalize_operation_name};
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::domain::types::CategoryCode::{
    Csomagolas, Elokeszites, Forrasztas, Impregnalas, Jeloles, Meres, Ontes, Szereles,
    Szigeteles, Tekercseles, Vezetekeles,
};

/// 词典版本（词条增删时递增）
pub const DICTIONARY_VERSION: &str = "2025.2";

// ==========================================
// 工序名词典（已知变体 → 类别）
// ==========================================
// 词条按原文书写，查找前统一经过 normalize_operation_name
pub static CATEGORY_DICTIONARY: &[(&str, CategoryCode)] = &[
    // ===== Előkészítés =====
    ("Előkészítés", Elokeszites),
    ("Anyag előkészítés", Elokeszites),
    ("Anyagelőkészítés", Elokeszites),
    ("Vezetékvágás", Elokeszites),
    ("Vezeték vágás", Elokeszites),
    ("Huzal vágás", Elokeszites),
    ("Huzalvágás", Elokeszites),
    ("Darabolás", Elokeszites),
    ("Csupaszítás", Elokeszites),
    ("Blankolás", Elokeszites),
    ("Lemezvágás", Elokeszites),
    ("Sorjázás", Elokeszites),
    ("Kitting", Elokeszites),
    ("Komissiózás", Elokeszites),
    ("Alkatrész kiosztás", Elokeszites),
    ("Alapanyag előkészítés", Elokeszites),
    ("Preparation", Elokeszites),
    // ===== Tekercselés =====
    ("Tekercselés", Tekercseles),
    ("Primer tekercselés", Tekercseles),
    ("Szekunder tekercselés", Tekercseles),
    ("Tekercselés primer", Tekercseles),
    ("Tekercselés szekunder", Tekercseles),
    ("Gépi tekercselés", Tekercseles),
    ("Kézi tekercselés", Tekercseles),
    ("Toroid tekercselés", Tekercseles),
    ("Rétegtekercselés", Tekercseles),
    ("Csévélés", Tekercseles),
    ("Tekercskészítés", Tekercseles),
    ("Tekercs készítés", Tekercseles),
    ("Tekercselő gép", Tekercseles),
    ("Winding", Tekercseles),
    ("Wickeln", Tekercseles),
    // ===== Szigetelés =====
    ("Szigetelés", Szigeteles),
    ("Szigetelőpapír behelyezés", Szigeteles),
    ("Szigetelő papír behelyezés", Szigeteles),
    ("Szigetelőpapír", Szigeteles),
    ("Szalagozás", Szigeteles),
    ("Szigetelő szalagozás", Szigeteles),
    ("Zsugorcsövezés", Szigeteles),
    ("Zsugorcső", Szigeteles),
    ("Közbenső szigetelés", Szigeteles),
    ("Rétegszigetelés", Szigeteles),
    ("Fóliázás", Szigeteles),
    ("Insulation", Szigeteles),
    // ===== Forrasztás =====
    ("Forrasztás", Forrasztas),
    ("Kézi forrasztás", Forrasztas),
    ("Hullámforrasztás", Forrasztas),
    ("Mártó forrasztás", Forrasztas),
    ("Mártóforrasztás", Forrasztas),
    ("Ónozás", Forrasztas),
    ("Ónfürdő", Forrasztas),
    ("Hegesztés", Forrasztas),
    ("Ponthegesztés", Forrasztas),
    ("Ultrahangos hegesztés", Forrasztas),
    ("Kivezetés forrasztás", Forrasztas),
    ("Soldering", Forrasztas),
    ("Löten", Forrasztas),
    // ===== Szerelés =====
    ("Szerelés", Szereles),
    ("Összeszerelés", Szereles),
    ("Végszerelés", Szereles),
    ("Előszerelés", Szereles),
    ("Vasmag szerelés", Szereles),
    ("Vasmagszerelés", Szereles),
    ("Vasmag rakás", Szereles),
    ("Magrakás", Szereles),
    ("Lemezelés", Szereles),
    ("Ház szerelés", Szereles),
    ("Házszerelés", Szereles),
    ("Csavarozás", Szereles),
    ("Rögzítés", Szereles),
    ("Bilincselés", Szereles),
    ("Tartó szerelés", Szereles),
    ("Szerelés II", Szereles),
    ("Assembly", Szereles),
    ("Montage", Szereles),
    // ===== Vezetékelés =====
    ("Vezetékelés", Vezetekeles),
    ("Bekötés", Vezetekeles),
    ("Kábelezés", Vezetekeles),
    ("Krimpelés", Vezetekeles),
    ("Saruzás", Vezetekeles),
    ("Érvéghüvelyezés", Vezetekeles),
    ("Csatlakozó szerelés", Vezetekeles),
    ("Csatlakozószerelés", Vezetekeles),
    ("Kötegelés", Vezetekeles),
    ("Vezeték bekötés", Vezetekeles),
    ("Sorkapocs bekötés", Vezetekeles),
    ("Kivezetés készítés", Vezetekeles),
    ("Kábelkötegelés", Vezetekeles),
    ("Wiring", Vezetekeles),
    // ===== Impregnálás =====
    ("Impregnálás", Impregnalas),
    ("Vákuum impregnálás", Impregnalas),
    ("Vákuumimpregnálás", Impregnalas),
    ("Lakkozás", Impregnalas),
    ("Mártás", Impregnalas),
    ("Szárítás", Impregnalas),
    ("Kemencézés", Impregnalas),
    ("Beégetés", Impregnalas),
    ("Gyantázás", Impregnalas),
    ("Impregnation", Impregnalas),
    ("Tränken", Impregnalas),
    // ===== Öntés =====
    ("Öntés", Ontes),
    ("Kiöntés", Ontes),
    ("Gyantaöntés", Ontes),
    ("Gyanta öntés", Ontes),
    ("Vákuumöntés", Ontes),
    ("Kitöltés", Ontes),
    ("Tokozás", Ontes),
    ("Betokozás", Ontes),
    ("Potting", Ontes),
    ("Vergießen", Ontes),
    // ===== Mérés =====
    ("Mérés", Meres),
    ("Végmérés", Meres),
    ("Végső mérés", Meres),
    ("Közbenső mérés", Meres),
    ("Átütésvizsgálat", Meres),
    ("Átütés mérés", Meres),
    ("Nagyfeszültségű vizsgálat", Meres),
    ("Ellenállásmérés", Meres),
    ("Ellenállás mérés", Meres),
    ("Induktivitás mérés", Meres),
    ("Áttétel mérés", Meres),
    ("Szigetelésmérés", Meres),
    ("Tesztelés", Meres),
    ("Bevizsgálás", Meres),
    ("Minőségellenőrzés", Meres),
    ("Vizuális ellenőrzés", Meres),
    ("Ellenőrzés", Meres),
    ("Measurement", Meres),
    ("Testing", Meres),
    ("Prüfung", Meres),
    // ===== Jelölés =====
    ("Jelölés", Jeloles),
    ("Címkézés", Jeloles),
    ("Címke nyomtatás", Jeloles),
    ("Címkenyomtatás", Jeloles),
    ("Feliratozás", Jeloles),
    ("Típustábla", Jeloles),
    ("Adattábla felhelyezés", Jeloles),
    ("Lézeres jelölés", Jeloles),
    ("Gravírozás", Jeloles),
    ("Matricázás", Jeloles),
    ("Labeling", Jeloles),
    // ===== Csomagolás =====
    ("Csomagolás", Csomagolas),
    ("Dobozolás", Csomagolas),
    ("Becsomagolás", Csomagolas),
    ("Raklapozás", Csomagolas),
    ("Zacskózás", Csomagolas),
    ("Pakolás", Csomagolas),
    ("Szállítási csomagolás", Csomagolas),
    ("Göngyölegezés", Csomagolas),
    ("Dobozba helyezés", Csomagolas),
    ("Packing", Csomagolas),
    ("Verpackung", Csomagolas),
];

/// 规范化后的查找表（首次使用时构建一次）
fn lookup_table() -> &'static HashMap<String, CategoryCode> {
    static TABLE: OnceLock<HashMap<String, CategoryCode>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::with_capacity(CATEGORY_DICTIONARY.len());
        for (name, category) in CATEGORY_DICTIONARY {
            table.insert(normalize_operation_name(name), *category);
        }
        debug!(
            version = DICTIONARY_VERSION,
            entries = table.len(),
            "工序类别词典已加载"
        );
        table
    })
}

/// 纯查找：命中返回类别，未命中返回 None
pub fn lookup(raw_name: &str) -> Option<CategoryCode> {
    let key = normalize_operation_name(raw_name);
    if key.is_empty() {
        return None;
    }
    lookup_table().get(&key).copied()
}

// ==========================================
// WorkplaceFilter - 工位代码过滤
// ==========================================
// 仅保留指定前缀（如 64L…）及少量显式白名单工位，其余在映射前丢弃
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkplaceFilter {
    prefix: String,
    allow_list: Vec<String>,
}

impl WorkplaceFilter {
    pub fn new(prefix: &str, allow_list: &[String]) -> Self {
        Self {
            prefix: Self::normalize_code(prefix),
            allow_list: allow_list
                .iter()
                .map(|c| Self::normalize_code(c))
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    fn normalize_code(code: &str) -> String {
        code.chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase()
    }

    pub fn accepts(&self, workplace_code: &str) -> bool {
        let code = Self::normalize_code(workplace_code);
        if code.is_empty() {
            return false;
        }
        (!self.prefix.is_empty() && code.starts_with(&self.prefix))
            || self.allow_list.iter().any(|allowed| *allowed == code)
    }
}

// ==========================================
// CategoryMapper - 带未命中记录的映射器
// ==========================================
#[derive(Debug, Default)]
pub struct CategoryMapper {
    unmapped: BTreeSet<String>,
}

impl CategoryMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// 映射工序名；未命中归入 EGYEB 并记录原始名称
    pub fn map(&mut self, raw_name: &str) -> CategoryCode {
        match lookup(raw_name) {
            Some(category) => category,
            None => {
                let trimmed = raw_name.trim().to_string();
                if self.unmapped.insert(trimmed.clone()) {
                    warn!(operation_name = %trimmed, "工序名未命中词典，归入 EGYEB");
                }
                CategoryCode::Egyeb
            }
        }
    }

    /// 先按工位过滤再映射；被过滤的记录返回 None
    pub fn map_record(
        &mut self,
        filter: &WorkplaceFilter,
        workplace_code: &str,
        raw_name: &str,
    ) -> Option<CategoryCode> {
        if !filter.accepts(workplace_code) {
            return None;
        }
        Some(self.map(raw_name))
    }

    /// 未命中的原始名称（去重、排序）
    pub fn unmapped_names(&self) -> &BTreeSet<String> {
        &self.unmapped
    }

    pub fn into_unmapped(self) -> BTreeSet<String> {
        self.unmapped
    }
}

/// 表头文本是否以锚点标签开头（大小写/重音不敏感）
pub fn header_matches(cell_text: &str, label: &str) -> bool {
    let label = fold_header(label);
    !label.is_empty() && fold_header(cell_text).starts_with(&label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::text::fold_diacritics;

    #[test]
    fn test_every_dictionary_entry_resolves_to_its_category() {
        for (name, category) in CATEGORY_DICTIONARY {
            // 原样、全大写、去重音三种写法都应命中
            let variants = [name.to_string(), name.to_uppercase(), fold_diacritics(name)];
            for variant in &variants {
                assert_eq!(lookup(variant), Some(*category), "词条映射错误: {}", variant);
            }
        }
    }

    #[test]
    fn test_dictionary_has_no_conflicting_keys() {
        let mut seen: HashMap<String, CategoryCode> = HashMap::new();
        for (name, category) in CATEGORY_DICTIONARY {
            let key = normalize_operation_name(name);
            if let Some(existing) = seen.insert(key.clone(), *category) {
                assert_eq!(existing, *category, "规范化后冲突: {}", key);
            }
        }
        assert!(CATEGORY_DICTIONARY.len() >= 150);
    }

    #[test]
    fn test_dictionary_covers_all_canonical_categories() {
        for category in CategoryCode::CANONICAL {
            assert!(
                CATEGORY_DICTIONARY.iter().any(|(_, c)| *c == category),
                "类别无词条: {}",
                category
            );
        }
        assert!(CATEGORY_DICTIONARY
            .iter()
            .all(|(_, c)| *c != CategoryCode::Egyeb));
    }

    #[test]
    fn test_lookup_is_case_and_diacritic_insensitive() {
        assert_eq!(lookup("MÉRÉS"), Some(CategoryCode::Meres));
        assert_eq!(lookup("meres"), Some(CategoryCode::Meres));
        assert_eq!(lookup("  Mérés  "), Some(CategoryCode::Meres));
        assert_eq!(lookup("SZERELES"), Some(CategoryCode::Szereles));
        assert_eq!(lookup("vegso   MERES."), Some(CategoryCode::Meres));
        assert_eq!(lookup("ONTES"), Some(CategoryCode::Ontes));
    }

    #[test]
    fn test_unknown_names_fall_back_to_egyeb_and_are_recorded() {
        let mut mapper = CategoryMapper::new();
        assert_eq!(mapper.map("Ismeretlen művelet"), CategoryCode::Egyeb);
        assert_eq!(mapper.map("  Ismeretlen művelet "), CategoryCode::Egyeb);
        assert_eq!(mapper.map(""), CategoryCode::Egyeb);
        assert_eq!(mapper.map("Mérés"), CategoryCode::Meres);

        let unmapped: Vec<&String> = mapper.unmapped_names().iter().collect();
        assert_eq!(unmapped, vec!["", "Ismeretlen művelet"]);
    }

    #[test]
    fn test_workplace_filter() {
        let filter = WorkplaceFilter::new("64L", &["64K21".to_string(), " 64k22 ".to_string()]);
        assert!(filter.accepts("64L105"));
        assert!(filter.accepts(" 64l 105 "));
        assert!(filter.accepts("64K21"));
        assert!(filter.accepts("64k22"));
        assert!(!filter.accepts("64K23"));
        assert!(!filter.accepts("65L100"));
        assert!(!filter.accepts(""));
    }

    #[test]
    fn test_map_record_discards_filtered_workplaces() {
        let filter = WorkplaceFilter::new("64L", &[]);
        let mut mapper = CategoryMapper::new();
        assert_eq!(mapper.map_record(&filter, "70A1", "Ismeretlen"), None);
        // 被过滤的记录不进入未命中集合
        assert!(mapper.unmapped_names().is_empty());
        assert_eq!(
            mapper.map_record(&filter, "64L1", "Csomagolás"),
            Some(CategoryCode::Csomagolas)
        );
    }

    #[test]
    fn test_header_matches() {
        assert!(header_matches("Tekercs típus", "TEKERCS"));
        assert!(header_matches(" fix  tipus", "Fix"));
        assert!(!header_matches("B86101", "FIX"));
        assert!(!header_matches("anything", ""));
    }
}
