// ==========================================
// 产能同步引擎 - 产品型号定额模型
// ==========================================
// 职责: 型号 → 11 类工时定额 + 独立的总定额
// 红线: 总定额单独读取，不由 11 类求和得出（两者允许不一致）
// ==========================================

use crate::domain::types::{CategoryCode, ProductFamily};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// ProductType - 产品型号
// ==========================================
// 每次定额同步整体刷新，同步之间不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductType {
    pub code: String,
    pub family: ProductFamily,

    /// 按 CategoryCode::CANONICAL 顺序排列的单件工时（分钟）
    pub category_norms: [f64; 11],

    /// 单件总工时（分钟），来自独立列
    pub overall_norm: f64,
}

impl ProductType {
    /// 创建全零定额的型号
    pub fn new(code: impl Into<String>, family: ProductFamily) -> Self {
        Self {
            code: code.into(),
            family,
            category_norms: [0.0; 11],
            overall_norm: 0.0,
        }
    }

    /// 读取某类别的单件工时；EGYEB 无定额，恒为 0
    pub fn category_norm(&self, category: CategoryCode) -> f64 {
        category
            .canonical_index()
            .map(|idx| self.category_norms[idx])
            .unwrap_or(0.0)
    }

    /// 累加某类别的单件工时（EGYEB 忽略）
    pub fn add_category_norm(&mut self, category: CategoryCode, minutes: f64) {
        if let Some(idx) = category.canonical_index() {
            self.category_norms[idx] += minutes;
        }
    }

    /// 设置某类别的单件工时（EGYEB 忽略）
    pub fn set_category_norm(&mut self, category: CategoryCode, minutes: f64) {
        if let Some(idx) = category.canonical_index() {
            self.category_norms[idx] = minutes;
        }
    }

    /// 11 类工时之和
    ///
    /// 仅用于展示对比，不得用来替代 overall_norm
    pub fn category_sum(&self) -> f64 {
        self.category_norms.iter().sum()
    }
}

/// 按型号索引的定额目录
#[derive(Debug, Clone, Default)]
pub struct NormCatalog {
    types: HashMap<String, ProductType>,
}

impl NormCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_types(types: impl IntoIterator<Item = ProductType>) -> Self {
        let mut catalog = Self::new();
        for product in types {
            catalog.insert(product);
        }
        catalog
    }

    /// 插入型号；同码覆盖，返回被覆盖的旧值
    pub fn insert(&mut self, product: ProductType) -> Option<ProductType> {
        self.types.insert(product.code.clone(), product)
    }

    pub fn get(&self, code: &str) -> Option<&ProductType> {
        self.types.get(code)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// 按型号排序后的列表
    pub fn sorted(&self) -> Vec<&ProductType> {
        let mut items: Vec<&ProductType> = self.types.values().collect();
        items.sort_by(|a, b| a.code.cmp(&b.code));
        items
    }

    pub fn into_sorted_vec(self) -> Vec<ProductType> {
        let mut items: Vec<ProductType> = self.types.into_values().collect();
        items.sort_by(|a, b| a.code.cmp(&b.code));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_norm_accessors() {
        let mut product = ProductType::new("C1", ProductFamily::Coil);
        product.add_category_norm(CategoryCode::Meres, 1.5);
        product.add_category_norm(CategoryCode::Meres, 0.5);
        product.set_category_norm(CategoryCode::Szereles, 3.5);
        product.add_category_norm(CategoryCode::Egyeb, 9.0);

        assert_eq!(product.category_norm(CategoryCode::Meres), 2.0);
        assert_eq!(product.category_norm(CategoryCode::Szereles), 3.5);
        assert_eq!(product.category_norm(CategoryCode::Egyeb), 0.0);
        assert_eq!(product.category_sum(), 5.5);
    }

    #[test]
    fn test_overall_norm_is_independent_of_category_sum() {
        let mut product = ProductType::new("B86101", ProductFamily::Fix);
        product.set_category_norm(CategoryCode::Szereles, 4.0);
        product.overall_norm = 6.25;

        // 两个数值来源不同，允许不一致
        assert_ne!(product.category_sum(), product.overall_norm);
        assert_eq!(product.overall_norm, 6.25);
    }

    #[test]
    fn test_catalog_insert_overrides() {
        let mut catalog = NormCatalog::new();
        assert!(catalog.insert(ProductType::new("B2", ProductFamily::Fix)).is_none());
        assert!(catalog.insert(ProductType::new("B1", ProductFamily::Fix)).is_none());
        assert!(catalog.insert(ProductType::new("B1", ProductFamily::Fix)).is_some());
        assert_eq!(catalog.len(), 2);
        let codes: Vec<&str> = catalog.sorted().iter().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, vec!["B1", "B2"]);
    }
}
