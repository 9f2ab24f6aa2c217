// ==========================================
// 国际贸易订单流转系统 - 支付数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: (target_type, target_id) 为多态引用, 无外键;
//       sum_for_target / count_for_target 供对账引擎与删除保护使用
// ==========================================

use crate::domain::payment::Payment;
use crate::domain::types::{FinanceTargetType, PaymentDirection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// PaymentRepository - 支付仓储
// ==========================================

pub struct PaymentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PaymentRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<Payment> {
        let type_str: String = row.get(1)?;
        let dir_str: String = row.get(3)?;
        Ok(Payment {
            payment_id: row.get(0)?,
            // 写入侧只接受枚举, 解析失败意味着库被外部改写, 回落到发票/收款
            target_type: FinanceTargetType::parse(&type_str)
                .unwrap_or(FinanceTargetType::CommercialInvoice),
            target_id: row.get(2)?,
            direction: PaymentDirection::parse(&dir_str).unwrap_or(PaymentDirection::In),
            amount: row.get(4)?,
            paid_date: row.get(5)?,
            note: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    const SELECT_COLS: &'static str =
        "payment_id, target_type, target_id, direction, amount, paid_date, note, created_at";

    /// 插入支付记录
    pub fn create(&self, payment: &Payment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO payment (
                payment_id, target_type, target_id, direction, amount, paid_date, note, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                payment.payment_id,
                payment.target_type.as_str(),
                payment.target_id,
                payment.direction.as_str(),
                payment.amount,
                payment.paid_date,
                payment.note,
                payment.created_at,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询
    pub fn find_by_id(&self, payment_id: &str) -> RepositoryResult<Option<Payment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM payment WHERE payment_id = ?1",
            Self::SELECT_COLS
        );
        let p = conn
            .query_row(&sql, params![payment_id], Self::map_row)
            .optional()?;
        Ok(p)
    }

    /// 查询某张单据的全部支付记录
    pub fn find_by_target(
        &self,
        target_type: FinanceTargetType,
        target_id: &str,
    ) -> RepositoryResult<Vec<Payment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM payment WHERE target_type = ?1 AND target_id = ?2 ORDER BY paid_date, created_at",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let payments = stmt
            .query_map(params![target_type.as_str(), target_id], Self::map_row)?
            .collect::<SqliteResult<Vec<Payment>>>()?;
        Ok(payments)
    }

    /// 汇总某张单据的已收/已付金额
    pub fn sum_for_target(
        &self,
        target_type: FinanceTargetType,
        target_id: &str,
    ) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        let sum: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM payment WHERE target_type = ?1 AND target_id = ?2",
            params![target_type.as_str(), target_id],
            |row| row.get(0),
        )?;
        Ok(sum)
    }

    /// 统计某张单据的支付笔数 (删除保护用)
    pub fn count_for_target(
        &self,
        target_type: FinanceTargetType,
        target_id: &str,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM payment WHERE target_type = ?1 AND target_id = ?2",
            params![target_type.as_str(), target_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 删除支付记录
    pub fn delete(&self, payment_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM payment WHERE payment_id = ?1",
            params![payment_id],
        )?;
        Ok(rows > 0)
    }
}
