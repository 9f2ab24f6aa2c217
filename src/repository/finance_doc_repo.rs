// ==========================================
// 国际贸易订单流转系统 - 财务单据数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: status 列仅由对账引擎通过 update_status 写入;
//       summaries_for_order 供工作流引擎做存在性/状态推导
// ==========================================

use crate::domain::finance::{CommercialInvoice, FinanceDocSummary, LogisticsBill, VendorBill};
use crate::domain::types::{FinanceDocStatus, FinanceTargetType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// CommercialInvoiceRepository - 商业发票仓储 (AR)
// ==========================================

pub struct CommercialInvoiceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CommercialInvoiceRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<CommercialInvoice> {
        Ok(CommercialInvoice {
            invoice_id: row.get(0)?,
            order_id: row.get(1)?,
            doc_no: row.get(2)?,
            amount: row.get(3)?,
            currency: row.get(4)?,
            issue_date: row.get(5)?,
            due_date: row.get(6)?,
            status: FinanceDocStatus::parse(&row.get::<_, String>(7)?),
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    const SELECT_COLS: &'static str = r#"
        invoice_id, order_id, doc_no, amount, currency,
        issue_date, due_date, status, created_at, updated_at
    "#;

    /// 插入发票 (doc_no 唯一)
    pub fn create(&self, invoice: &CommercialInvoice) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO commercial_invoice (
                invoice_id, order_id, doc_no, amount, currency,
                issue_date, due_date, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                invoice.invoice_id,
                invoice.order_id,
                invoice.doc_no,
                invoice.amount,
                invoice.currency,
                invoice.issue_date,
                invoice.due_date,
                invoice.status.as_str(),
                invoice.created_at,
                invoice.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询
    pub fn find_by_id(&self, invoice_id: &str) -> RepositoryResult<Option<CommercialInvoice>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM commercial_invoice WHERE invoice_id = ?1",
            Self::SELECT_COLS
        );
        let inv = conn
            .query_row(&sql, params![invoice_id], Self::map_row)
            .optional()?;
        Ok(inv)
    }

    /// 查询订单的全部发票
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<CommercialInvoice>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM commercial_invoice WHERE order_id = ?1 ORDER BY created_at",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let invoices = stmt
            .query_map(params![order_id], Self::map_row)?
            .collect::<SqliteResult<Vec<CommercialInvoice>>>()?;
        Ok(invoices)
    }

    /// 更新状态 (仅对账引擎调用)
    pub fn update_status(&self, invoice_id: &str, status: FinanceDocStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE commercial_invoice SET status = ?1, updated_at = ?2 WHERE invoice_id = ?3",
            params![status.as_str(), Utc::now().naive_utc(), invoice_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "CommercialInvoice".to_string(),
                id: invoice_id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新金额与到期日 (调用方负责随后重新对账)
    pub fn update_amount_and_due(
        &self,
        invoice_id: &str,
        amount: f64,
        due_date: NaiveDate,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE commercial_invoice SET amount = ?1, due_date = ?2, updated_at = ?3 WHERE invoice_id = ?4",
            params![amount, due_date, Utc::now().naive_utc(), invoice_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "CommercialInvoice".to_string(),
                id: invoice_id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除发票 (支付保护在 API 层)
    pub fn delete(&self, invoice_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM commercial_invoice WHERE invoice_id = ?1",
            params![invoice_id],
        )?;
        Ok(rows > 0)
    }
}

// ==========================================
// VendorBillRepository - 供应商账单仓储 (AP)
// ==========================================

pub struct VendorBillRepository {
    conn: Arc<Mutex<Connection>>,
}

impl VendorBillRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<VendorBill> {
        Ok(VendorBill {
            bill_id: row.get(0)?,
            order_id: row.get(1)?,
            doc_no: row.get(2)?,
            amount: row.get(3)?,
            currency: row.get(4)?,
            issue_date: row.get(5)?,
            due_date: row.get(6)?,
            status: FinanceDocStatus::parse(&row.get::<_, String>(7)?),
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    const SELECT_COLS: &'static str = r#"
        bill_id, order_id, doc_no, amount, currency,
        issue_date, due_date, status, created_at, updated_at
    "#;

    /// 插入账单 (doc_no 唯一)
    pub fn create(&self, bill: &VendorBill) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO vendor_bill (
                bill_id, order_id, doc_no, amount, currency,
                issue_date, due_date, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                bill.bill_id,
                bill.order_id,
                bill.doc_no,
                bill.amount,
                bill.currency,
                bill.issue_date,
                bill.due_date,
                bill.status.as_str(),
                bill.created_at,
                bill.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询
    pub fn find_by_id(&self, bill_id: &str) -> RepositoryResult<Option<VendorBill>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM vendor_bill WHERE bill_id = ?1",
            Self::SELECT_COLS
        );
        let bill = conn
            .query_row(&sql, params![bill_id], Self::map_row)
            .optional()?;
        Ok(bill)
    }

    /// 查询订单的全部账单
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<VendorBill>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM vendor_bill WHERE order_id = ?1 ORDER BY created_at",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let bills = stmt
            .query_map(params![order_id], Self::map_row)?
            .collect::<SqliteResult<Vec<VendorBill>>>()?;
        Ok(bills)
    }

    /// 更新状态 (仅对账引擎调用)
    pub fn update_status(&self, bill_id: &str, status: FinanceDocStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE vendor_bill SET status = ?1, updated_at = ?2 WHERE bill_id = ?3",
            params![status.as_str(), Utc::now().naive_utc(), bill_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "VendorBill".to_string(),
                id: bill_id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新金额与到期日 (调用方负责随后重新对账)
    pub fn update_amount_and_due(
        &self,
        bill_id: &str,
        amount: f64,
        due_date: NaiveDate,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE vendor_bill SET amount = ?1, due_date = ?2, updated_at = ?3 WHERE bill_id = ?4",
            params![amount, due_date, Utc::now().naive_utc(), bill_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "VendorBill".to_string(),
                id: bill_id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除账单 (支付保护在 API 层)
    pub fn delete(&self, bill_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM vendor_bill WHERE bill_id = ?1",
            params![bill_id],
        )?;
        Ok(rows > 0)
    }
}

// ==========================================
// LogisticsBillRepository - 物流账单仓储 (AP, 按柜)
// ==========================================

pub struct LogisticsBillRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LogisticsBillRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<LogisticsBill> {
        Ok(LogisticsBill {
            bill_id: row.get(0)?,
            container_id: row.get(1)?,
            order_id: row.get(2)?,
            provider_name: row.get(3)?,
            amount: row.get(4)?,
            currency: row.get(5)?,
            issue_date: row.get(6)?,
            due_date: row.get(7)?,
            status: FinanceDocStatus::parse(&row.get::<_, String>(8)?),
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    const SELECT_COLS: &'static str = r#"
        bill_id, container_id, order_id, provider_name, amount, currency,
        issue_date, due_date, status, created_at, updated_at
    "#;

    /// 插入物流账单
    pub fn create(&self, bill: &LogisticsBill) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO logistics_bill (
                bill_id, container_id, order_id, provider_name, amount, currency,
                issue_date, due_date, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                bill.bill_id,
                bill.container_id,
                bill.order_id,
                bill.provider_name,
                bill.amount,
                bill.currency,
                bill.issue_date,
                bill.due_date,
                bill.status.as_str(),
                bill.created_at,
                bill.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询
    pub fn find_by_id(&self, bill_id: &str) -> RepositoryResult<Option<LogisticsBill>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM logistics_bill WHERE bill_id = ?1",
            Self::SELECT_COLS
        );
        let bill = conn
            .query_row(&sql, params![bill_id], Self::map_row)
            .optional()?;
        Ok(bill)
    }

    /// 查询订单的全部物流账单
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<LogisticsBill>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM logistics_bill WHERE order_id = ?1 ORDER BY created_at",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let bills = stmt
            .query_map(params![order_id], Self::map_row)?
            .collect::<SqliteResult<Vec<LogisticsBill>>>()?;
        Ok(bills)
    }

    /// 查询集装箱的全部物流账单
    pub fn find_by_container(&self, container_id: &str) -> RepositoryResult<Vec<LogisticsBill>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM logistics_bill WHERE container_id = ?1 ORDER BY created_at",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let bills = stmt
            .query_map(params![container_id], Self::map_row)?
            .collect::<SqliteResult<Vec<LogisticsBill>>>()?;
        Ok(bills)
    }

    /// 更新状态 (仅对账引擎调用)
    pub fn update_status(&self, bill_id: &str, status: FinanceDocStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE logistics_bill SET status = ?1, updated_at = ?2 WHERE bill_id = ?3",
            params![status.as_str(), Utc::now().naive_utc(), bill_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "LogisticsBill".to_string(),
                id: bill_id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新金额与到期日 (调用方负责随后重新对账)
    pub fn update_amount_and_due(
        &self,
        bill_id: &str,
        amount: f64,
        due_date: NaiveDate,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE logistics_bill SET amount = ?1, due_date = ?2, updated_at = ?3 WHERE bill_id = ?4",
            params![amount, due_date, Utc::now().naive_utc(), bill_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "LogisticsBill".to_string(),
                id: bill_id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除物流账单 (支付保护在 API 层)
    pub fn delete(&self, bill_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM logistics_bill WHERE bill_id = ?1",
            params![bill_id],
        )?;
        Ok(rows > 0)
    }
}

// ==========================================
// 财务单据快照查询 (跨三表)
// ==========================================

/// 财务单据快照仓储
///
/// 工作流引擎 Recompute 只关心订单名下单据的存在性与状态,
/// 这里把三类单据合并成统一的 FinanceDocSummary 视图
pub struct FinanceDocSummaryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FinanceDocSummaryRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询订单名下全部财务单据的快照 (发票 + 供应商账单 + 物流账单)
    pub fn summaries_for_order(&self, order_id: &str) -> RepositoryResult<Vec<FinanceDocSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT 'COMMERCIAL_INVOICE' AS target_type, invoice_id AS target_id, amount, status
            FROM commercial_invoice WHERE order_id = ?1
            UNION ALL
            SELECT 'VENDOR_BILL', bill_id, amount, status
            FROM vendor_bill WHERE order_id = ?1
            UNION ALL
            SELECT 'LOGISTICS_BILL', bill_id, amount, status
            FROM logistics_bill WHERE order_id = ?1
            "#,
        )?;
        let summaries = stmt
            .query_map(params![order_id], |row| {
                let type_str: String = row.get(0)?;
                Ok(FinanceDocSummary {
                    // UNION 的第一列只会是三个已知常量
                    target_type: FinanceTargetType::parse(&type_str)
                        .unwrap_or(FinanceTargetType::CommercialInvoice),
                    target_id: row.get(1)?,
                    amount: row.get(2)?,
                    status: FinanceDocStatus::parse(&row.get::<_, String>(3)?),
                })
            })?
            .collect::<SqliteResult<Vec<FinanceDocSummary>>>()?;
        Ok(summaries)
    }
}
