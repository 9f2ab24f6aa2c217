// ==========================================
// 国际贸易订单流转系统 - 订单数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: workflow_status/delivered_at/closed_at 的写入走乐观锁
//       (revision 校验), 防止并发重算互相覆盖
// ==========================================

use crate::domain::order::{Order, OrderItem};
use crate::domain::types::WorkflowStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// OrderRepository - 订单仓储
// ==========================================

/// 订单仓储
/// 职责: 管理 orders 表的 CRUD 操作
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<Order> {
        Ok(Order {
            order_id: row.get(0)?,
            vpo_number: row.get(1)?,
            customer_name: row.get(2)?,
            customer_address: row.get(3)?,
            vendor_name: row.get(4)?,
            vendor_address: row.get(5)?,
            order_date: row.get(6)?,
            total_amount: row.get(7)?,
            estimated_margin: row.get(8)?,
            estimated_margin_rate: row.get(9)?,
            workflow_status: WorkflowStatus::parse(&row.get::<_, String>(10)?),
            delivered_at: row.get(11)?,
            closed_at: row.get(12)?,
            customer_term_days: row.get(13)?,
            vendor_term_days: row.get(14)?,
            logistics_term_days: row.get(15)?,
            revision: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        })
    }

    const SELECT_COLS: &'static str = r#"
        order_id, vpo_number, customer_name, customer_address,
        vendor_name, vendor_address, order_date, total_amount,
        estimated_margin, estimated_margin_rate, workflow_status,
        delivered_at, closed_at, customer_term_days, vendor_term_days,
        logistics_term_days, revision, created_at, updated_at
    "#;

    /// 插入订单
    pub fn create(&self, order: &Order) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO orders (
                order_id, vpo_number, customer_name, customer_address,
                vendor_name, vendor_address, order_date, total_amount,
                estimated_margin, estimated_margin_rate, workflow_status,
                delivered_at, closed_at, customer_term_days, vendor_term_days,
                logistics_term_days, revision, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
            params![
                order.order_id,
                order.vpo_number,
                order.customer_name,
                order.customer_address,
                order.vendor_name,
                order.vendor_address,
                order.order_date,
                order.total_amount,
                order.estimated_margin,
                order.estimated_margin_rate,
                order.workflow_status.as_str(),
                order.delivered_at,
                order.closed_at,
                order.customer_term_days,
                order.vendor_term_days,
                order.logistics_term_days,
                order.revision,
                order.created_at,
                order.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询订单
    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM orders WHERE order_id = ?1", Self::SELECT_COLS);
        let order = conn
            .query_row(&sql, params![order_id], Self::map_row)
            .optional()?;
        Ok(order)
    }

    /// 按VPO编号查询订单
    pub fn find_by_vpo(&self, vpo_number: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM orders WHERE vpo_number = ?1",
            Self::SELECT_COLS
        );
        let order = conn
            .query_row(&sql, params![vpo_number], Self::map_row)
            .optional()?;
        Ok(order)
    }

    /// 查询订单列表 (按创建时间倒序)
    pub fn list_all(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM orders ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let orders = stmt
            .query_map(params![limit, offset], Self::map_row)?
            .collect::<SqliteResult<Vec<Order>>>()?;
        Ok(orders)
    }

    /// 更新工作流推导字段 (乐观锁)
    ///
    /// 以 expected_revision 做 WHERE 校验并自增 revision;
    /// 并发重算互相覆盖时返回 OptimisticLockFailure, 不静默丢失更新
    pub fn update_workflow_fields(
        &self,
        order_id: &str,
        status: WorkflowStatus,
        delivered_at: Option<NaiveDateTime>,
        closed_at: Option<NaiveDateTime>,
        expected_revision: i32,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE orders
            SET workflow_status = ?1,
                delivered_at = ?2,
                closed_at = ?3,
                revision = revision + 1,
                updated_at = ?4
            WHERE order_id = ?5 AND revision = ?6
            "#,
            params![
                status.as_str(),
                delivered_at,
                closed_at,
                Utc::now().naive_utc(),
                order_id,
                expected_revision,
            ],
        )?;

        if rows == 0 {
            // 区分"订单不存在"与"revision 不匹配"
            let actual: Option<i32> = conn
                .query_row(
                    "SELECT revision FROM orders WHERE order_id = ?1",
                    params![order_id],
                    |row| row.get(0),
                )
                .optional()?;
            return match actual {
                Some(actual) => Err(RepositoryError::OptimisticLockFailure {
                    order_id: order_id.to_string(),
                    expected: expected_revision,
                    actual,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "Order".to_string(),
                    id: order_id.to_string(),
                }),
            };
        }
        Ok(())
    }

    /// 删除订单 (外键级联: 明细/发票/供应商账单/托书/配柜;
    /// 物流账单 order_id 置空)
    pub fn delete(&self, order_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM orders WHERE order_id = ?1", params![order_id])?;
        Ok(rows > 0)
    }
}

// ==========================================
// OrderItemRepository - 订单明细仓储
// ==========================================

/// 订单明细仓储
/// 职责: 管理 order_item 表; 明细随订单创建, 随订单级联删除
pub struct OrderItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderItemRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<OrderItem> {
        Ok(OrderItem {
            item_id: row.get(0)?,
            order_id: row.get(1)?,
            product_description: row.get(2)?,
            collection: row.get(3)?,
            material: row.get(4)?,
            tariff_key: row.get(5)?,
            origin_country: row.get(6)?,
            qty: row.get(7)?,
            customer_unit_price: row.get(8)?,
            vendor_unit_price: row.get(9)?,
            tariff_rate: row.get(10)?,
            duty_cost: row.get(11)?,
            estimated_3pl_cost: row.get(12)?,
            estimated_margin: row.get(13)?,
            created_at: row.get(14)?,
        })
    }

    /// 插入明细行
    pub fn create(&self, item: &OrderItem) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO order_item (
                item_id, order_id, product_description, collection, material,
                tariff_key, origin_country, qty, customer_unit_price,
                vendor_unit_price, tariff_rate, duty_cost, estimated_3pl_cost,
                estimated_margin, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                item.item_id,
                item.order_id,
                item.product_description,
                item.collection,
                item.material,
                item.tariff_key,
                item.origin_country,
                item.qty,
                item.customer_unit_price,
                item.vendor_unit_price,
                item.tariff_rate,
                item.duty_cost,
                item.estimated_3pl_cost,
                item.estimated_margin,
                item.created_at,
            ],
        )?;
        Ok(())
    }

    /// 查询订单的全部明细行
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<OrderItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                item_id, order_id, product_description, collection, material,
                tariff_key, origin_country, qty, customer_unit_price,
                vendor_unit_price, tariff_rate, duty_cost, estimated_3pl_cost,
                estimated_margin, created_at
            FROM order_item
            WHERE order_id = ?1
            ORDER BY created_at, item_id
            "#,
        )?;
        let items = stmt
            .query_map(params![order_id], Self::map_row)?
            .collect::<SqliteResult<Vec<OrderItem>>>()?;
        Ok(items)
    }
}
