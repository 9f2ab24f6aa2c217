// ==========================================
// 国际贸易订单流转系统 - 集装箱/配柜数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 集装箱变更会影响所有经由配柜/托书/物流账单
//       关联到它的订单, linked_order_ids 供工作流引擎做联动重算
// ==========================================

use crate::domain::container::{Container, ContainerAllocation};
use crate::domain::types::ContainerStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ContainerRepository - 集装箱仓储
// ==========================================

pub struct ContainerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ContainerRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<Container> {
        Ok(Container {
            container_id: row.get(0)?,
            container_no: row.get(1)?,
            vessel_name: row.get(2)?,
            status: ContainerStatus::parse(&row.get::<_, String>(3)?),
            etd: row.get(4)?,
            atd: row.get(5)?,
            eta: row.get(6)?,
            ata: row.get(7)?,
            arrival_at_warehouse: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    const SELECT_COLS: &'static str = r#"
        container_id, container_no, vessel_name, status,
        etd, atd, eta, ata, arrival_at_warehouse, created_at, updated_at
    "#;

    /// 插入集装箱 (箱号唯一, 冲突返回 UniqueConstraintViolation)
    pub fn create(&self, container: &Container) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO container (
                container_id, container_no, vessel_name, status,
                etd, atd, eta, ata, arrival_at_warehouse, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                container.container_id,
                container.container_no,
                container.vessel_name,
                container.status.as_str(),
                container.etd,
                container.atd,
                container.eta,
                container.ata,
                container.arrival_at_warehouse,
                container.created_at,
                container.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询
    pub fn find_by_id(&self, container_id: &str) -> RepositoryResult<Option<Container>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM container WHERE container_id = ?1",
            Self::SELECT_COLS
        );
        let c = conn
            .query_row(&sql, params![container_id], Self::map_row)
            .optional()?;
        Ok(c)
    }

    /// 按箱号查询
    pub fn find_by_no(&self, container_no: &str) -> RepositoryResult<Option<Container>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM container WHERE container_no = ?1",
            Self::SELECT_COLS
        );
        let c = conn
            .query_row(&sql, params![container_no], Self::map_row)
            .optional()?;
        Ok(c)
    }

    /// 查询全部集装箱
    pub fn list_all(&self) -> RepositoryResult<Vec<Container>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM container ORDER BY created_at DESC",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let containers = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<Container>>>()?;
        Ok(containers)
    }

    /// 更新集装箱状态与物流时间戳
    pub fn update_status_and_dates(
        &self,
        container_id: &str,
        status: ContainerStatus,
        atd: Option<NaiveDate>,
        ata: Option<NaiveDate>,
        arrival_at_warehouse: Option<NaiveDate>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE container
            SET status = ?1, atd = ?2, ata = ?3, arrival_at_warehouse = ?4, updated_at = ?5
            WHERE container_id = ?6
            "#,
            params![
                status.as_str(),
                atd,
                ata,
                arrival_at_warehouse,
                Utc::now().naive_utc(),
                container_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Container".to_string(),
                id: container_id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新船名/预计时间等基础字段
    pub fn update_basic_fields(
        &self,
        container_id: &str,
        vessel_name: Option<String>,
        etd: Option<NaiveDate>,
        eta: Option<NaiveDate>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE container
            SET vessel_name = ?1, etd = ?2, eta = ?3, updated_at = ?4
            WHERE container_id = ?5
            "#,
            params![vessel_name, etd, eta, Utc::now().naive_utc(), container_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Container".to_string(),
                id: container_id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除集装箱 (托书/物流账单外键置空, 配柜级联删除)
    pub fn delete(&self, container_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM container WHERE container_id = ?1",
            params![container_id],
        )?;
        Ok(rows > 0)
    }

    /// 查询经由配柜/托书/物流账单关联到该柜的全部订单ID (去重)
    ///
    /// 用途: 集装箱变更/删除后, 工作流引擎对每个关联订单联动重算
    pub fn linked_order_ids(&self, container_id: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT order_id FROM container_allocation WHERE container_id = ?1
            UNION
            SELECT order_id FROM shipping_document WHERE container_id = ?1
            UNION
            SELECT order_id FROM logistics_bill WHERE container_id = ?1 AND order_id IS NOT NULL
            "#,
        )?;
        let ids = stmt
            .query_map(params![container_id], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(ids)
    }
}

// ==========================================
// ContainerAllocationRepository - 配柜仓储
// ==========================================

pub struct ContainerAllocationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ContainerAllocationRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<ContainerAllocation> {
        Ok(ContainerAllocation {
            allocation_id: row.get(0)?,
            order_id: row.get(1)?,
            container_id: row.get(2)?,
            qty: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    /// 插入配柜记录 ((order, container) 唯一)
    pub fn create(&self, allocation: &ContainerAllocation) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO container_allocation (
                allocation_id, order_id, container_id, qty, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                allocation.allocation_id,
                allocation.order_id,
                allocation.container_id,
                allocation.qty,
                allocation.created_at,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询
    pub fn find_by_id(&self, allocation_id: &str) -> RepositoryResult<Option<ContainerAllocation>> {
        let conn = self.get_conn()?;
        let alloc = conn
            .query_row(
                r#"
                SELECT allocation_id, order_id, container_id, qty, created_at
                FROM container_allocation WHERE allocation_id = ?1
                "#,
                params![allocation_id],
                Self::map_row,
            )
            .optional()?;
        Ok(alloc)
    }

    /// 查询订单的全部配柜记录
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<ContainerAllocation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT allocation_id, order_id, container_id, qty, created_at
            FROM container_allocation
            WHERE order_id = ?1
            ORDER BY created_at
            "#,
        )?;
        let allocs = stmt
            .query_map(params![order_id], Self::map_row)?
            .collect::<SqliteResult<Vec<ContainerAllocation>>>()?;
        Ok(allocs)
    }

    /// 删除配柜记录
    pub fn delete(&self, allocation_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM container_allocation WHERE allocation_id = ?1",
            params![allocation_id],
        )?;
        Ok(rows > 0)
    }
}
