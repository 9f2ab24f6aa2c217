// ==========================================
// 国际贸易订单流转系统 - 托书数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::shipping::ShippingDocument;
use crate::domain::types::ShippingDocStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ShippingDocRepository - 托书仓储
// ==========================================

pub struct ShippingDocRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ShippingDocRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<ShippingDocument> {
        Ok(ShippingDocument {
            doc_id: row.get(0)?,
            order_id: row.get(1)?,
            container_id: row.get(2)?,
            doc_no: row.get(3)?,
            status: ShippingDocStatus::parse(&row.get::<_, String>(4)?),
            issued_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    const SELECT_COLS: &'static str =
        "doc_id, order_id, container_id, doc_no, status, issued_at, created_at";

    /// 插入托书 (doc_no 唯一)
    pub fn create(&self, doc: &ShippingDocument) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO shipping_document (
                doc_id, order_id, container_id, doc_no, status, issued_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                doc.doc_id,
                doc.order_id,
                doc.container_id,
                doc.doc_no,
                doc.status.as_str(),
                doc.issued_at,
                doc.created_at,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询
    pub fn find_by_id(&self, doc_id: &str) -> RepositoryResult<Option<ShippingDocument>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM shipping_document WHERE doc_id = ?1",
            Self::SELECT_COLS
        );
        let doc = conn
            .query_row(&sql, params![doc_id], Self::map_row)
            .optional()?;
        Ok(doc)
    }

    /// 查询订单的全部托书
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<ShippingDocument>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM shipping_document WHERE order_id = ?1 ORDER BY created_at",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let docs = stmt
            .query_map(params![order_id], Self::map_row)?
            .collect::<SqliteResult<Vec<ShippingDocument>>>()?;
        Ok(docs)
    }

    /// 查询 (订单, 集装箱) 维度的托书
    ///
    /// container_id 为 None 时匹配未关联集装箱的托书
    pub fn find_by_order_and_container(
        &self,
        order_id: &str,
        container_id: Option<&str>,
    ) -> RepositoryResult<Option<ShippingDocument>> {
        let conn = self.get_conn()?;
        let doc = match container_id {
            Some(cid) => {
                let sql = format!(
                    "SELECT {} FROM shipping_document WHERE order_id = ?1 AND container_id = ?2",
                    Self::SELECT_COLS
                );
                conn.query_row(&sql, params![order_id, cid], Self::map_row)
                    .optional()?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM shipping_document WHERE order_id = ?1 AND container_id IS NULL",
                    Self::SELECT_COLS
                );
                conn.query_row(&sql, params![order_id], Self::map_row)
                    .optional()?
            }
        };
        Ok(doc)
    }

    /// 更新托书状态
    pub fn update_status(
        &self,
        doc_id: &str,
        status: ShippingDocStatus,
        issued_at: Option<NaiveDateTime>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE shipping_document SET status = ?1, issued_at = ?2 WHERE doc_id = ?3",
            params![status.as_str(), issued_at, doc_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ShippingDocument".to_string(),
                id: doc_id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除托书
    pub fn delete(&self, doc_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM shipping_document WHERE doc_id = ?1",
            params![doc_id],
        )?;
        Ok(rows > 0)
    }

    /// 删除订单的全部托书 (UNDO_SHIPPING_DOC 回退用)
    pub fn delete_by_order(&self, order_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM shipping_document WHERE order_id = ?1",
            params![order_id],
        )?;
        Ok(rows)
    }
}
