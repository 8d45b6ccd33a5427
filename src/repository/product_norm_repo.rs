// ==========================================
// 产能同步引擎 - 型号定额仓储
// ==========================================
// 表: product_type_norm
// 红线: 每次定额同步整体刷新（同一事务内清空并写入）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::product::{NormCatalog, ProductType};
use crate::domain::types::{CategoryCode, ProductFamily};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params_from_iter, types::Value, Connection};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// 型号定额仓储
pub struct ProductNormRepository {
    conn: Arc<Mutex<Connection>>,
}

/// 11 个类别列名（按 CANONICAL 顺序）
fn category_columns() -> Vec<String> {
    CategoryCode::CANONICAL.iter().map(|c| c.norm_column()).collect()
}

impl ProductNormRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 整体替换定额表
    ///
    /// # 参数
    /// - products: 全部型号定额
    /// - updated_at: 本轮同步时间戳
    ///
    /// # 返回
    /// 写入的行数
    pub fn replace_all(&self, products: &[ProductType], updated_at: &str) -> RepositoryResult<usize> {
        let columns = category_columns();
        // type_code, family, 11 类, overall_norm, updated_at
        let placeholders: Vec<String> = (1..=columns.len() + 4).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO product_type_norm (type_code, family, {}, overall_norm, updated_at) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM product_type_norm", [])?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for product in products {
                let mut values: Vec<Value> = Vec::with_capacity(columns.len() + 4);
                values.push(Value::Text(product.code.clone()));
                values.push(Value::Text(product.family.as_str().to_string()));
                values.extend(product.category_norms.iter().map(|n| Value::Real(*n)));
                values.push(Value::Real(product.overall_norm));
                values.push(Value::Text(updated_at.to_string()));
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        debug!(deleted = deleted, inserted = products.len(), "product_type_norm 已替换");
        Ok(products.len())
    }

    /// 读取全部定额（按型号排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<ProductType>> {
        let columns = category_columns();
        let sql = format!(
            "SELECT type_code, family, {}, overall_norm FROM product_type_norm ORDER BY type_code",
            columns.join(", ")
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                let mut norms = [0.0; 11];
                for (idx, slot) in norms.iter_mut().enumerate() {
                    *slot = row.get(2 + idx)?;
                }
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    norms,
                    row.get::<_, f64>(2 + norms.len())?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(code, family, category_norms, overall_norm)| {
                let family = ProductFamily::parse(&family).ok_or_else(|| {
                    RepositoryError::FieldValueError {
                        field: "family".to_string(),
                        message: family.clone(),
                    }
                })?;
                Ok(ProductType {
                    code,
                    family,
                    category_norms,
                    overall_norm,
                })
            })
            .collect()
    }

    /// 读取定额目录
    pub fn load_catalog(&self) -> RepositoryResult<NormCatalog> {
        Ok(NormCatalog::from_types(self.list_all()?))
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM product_type_norm", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_schema;

    fn repo() -> ProductNormRepository {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ProductNormRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_replace_all_round_trips_norms() {
        let repo = repo();
        let mut coil = ProductType::new("C62330A130B52S1", ProductFamily::Coil);
        coil.set_category_norm(CategoryCode::Meres, 2.0);
        coil.set_category_norm(CategoryCode::Csomagolas, 0.25);
        coil.overall_norm = 9.5;

        repo.replace_all(&[coil.clone(), ProductType::new("B1", ProductFamily::Fix)], "2026-03-16 06:00:00")
            .unwrap();

        let catalog = repo.load_catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("C62330A130B52S1"), Some(&coil));
    }

    #[test]
    fn test_replace_all_drops_stale_types() {
        let repo = repo();
        repo.replace_all(&[ProductType::new("B1", ProductFamily::Fix)], "t1").unwrap();
        repo.replace_all(&[ProductType::new("B2", ProductFamily::Fix)], "t2").unwrap();
        let all = repo.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].code, "B2");
    }

    #[test]
    fn test_negative_norm_violates_check_and_keeps_old_rows() {
        let repo = repo();
        repo.replace_all(&[ProductType::new("B1", ProductFamily::Fix)], "t1").unwrap();

        let mut bad = ProductType::new("B2", ProductFamily::Fix);
        bad.overall_norm = -1.0;
        let err = repo.replace_all(&[bad], "t2").unwrap_err();
        assert!(matches!(err, RepositoryError::CheckConstraintViolation(_)));
        assert_eq!(repo.count().unwrap(), 1);
    }
}
