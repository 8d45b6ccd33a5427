// ==========================================
// 产能同步引擎 - 文本规范化
// ==========================================
// 职责: 工序名/表头的统一规范化（大小写、重音、空白）
// 红线: 所有名称查找必须经过 normalize_operation_name
// ==========================================

/// 去除匈牙利语及常见拉丁字母的重音符号（ß 展开为 ss，与大写形式 SS 对齐）
pub fn fold_diacritics(value: &str) -> String {
    let mut folded = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            'ß' => folded.push_str("ss"),
            'ẞ' => folded.push_str("SS"),
            other => folded.push(fold_char(other)),
        }
    }
    folded
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'ö' | 'ő' | 'õ' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Ő' | 'Õ' => 'O',
        'ú' | 'ù' | 'û' | 'ü' | 'ű' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' | 'Ű' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}

/// 合并连续空白为单个空格并去除首尾空白
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 工序名规范化：小写 + 去重音 + 合并空白 + 去尾部 `.`/`:`
pub fn normalize_operation_name(raw: &str) -> String {
    let folded = fold_diacritics(&raw.to_lowercase());
    let collapsed = collapse_whitespace(&folded);
    collapsed
        .trim_end_matches(|c: char| c == '.' || c == ':')
        .trim_end()
        .to_string()
}

/// 表头锚点规范化：大写 + 去重音 + 合并空白
pub fn fold_header(raw: &str) -> String {
    collapse_whitespace(&fold_diacritics(raw).to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_diacritics_hungarian() {
        assert_eq!(fold_diacritics("Mérés"), "Meres");
        assert_eq!(fold_diacritics("ŐRÜLT ÍRÓ"), "ORULT IRO");
        assert_eq!(fold_diacritics("tűzőgép"), "tuzogep");
    }

    #[test]
    fn test_sharp_s_matches_uppercase_form() {
        assert_eq!(fold_diacritics("Vergießen"), "Vergiessen");
        assert_eq!(
            normalize_operation_name("Vergießen"),
            normalize_operation_name("VERGIESSEN")
        );
    }

    #[test]
    fn test_normalize_operation_name() {
        assert_eq!(normalize_operation_name("  MÉRÉS  "), "meres");
        assert_eq!(normalize_operation_name("Végső   mérés."), "vegso meres");
        assert_eq!(normalize_operation_name("Szerelés:"), "szereles");
        assert_eq!(normalize_operation_name(""), "");
    }

    #[test]
    fn test_fold_header() {
        assert_eq!(fold_header(" Tekercs  típus "), "TEKERCS TIPUS");
        assert_eq!(fold_header("fix"), "FIX");
    }
}
