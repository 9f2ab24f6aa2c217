// ==========================================
// 国际贸易订单流转系统 - 物流 API
// ==========================================
// 职责: 集装箱/配柜/托书的增删改, 变更后联动工作流重算
// 红线: 集装箱变更必须重算所有经配柜/托书/物流账单
//       间接关联的订单
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::{validator, with_savepoint};
use crate::domain::container::{Container, ContainerAllocation};
use crate::domain::shipping::ShippingDocument;
use crate::domain::types::{ContainerStatus, ShippingDocStatus};
use crate::engine::workflow::WorkflowEngine;
use crate::repository::{
    ContainerAllocationRepository, ContainerRepository, OrderRepository, ShippingDocRepository,
};

// ==========================================
// 输入结构
// ==========================================

/// 集装箱创建输入
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContainerInput {
    pub container_no: String,
    pub vessel_name: Option<String>,
    pub etd: Option<NaiveDate>,
    pub eta: Option<NaiveDate>,
}

/// 托书手工创建输入
#[derive(Debug, Clone, Deserialize)]
pub struct CreateShippingDocInput {
    pub order_id: String,
    pub container_id: Option<String>,
    pub doc_no: String,
}

// ==========================================
// LogisticsApi
// ==========================================

pub struct LogisticsApi {
    conn: Arc<Mutex<Connection>>,
    container_repo: ContainerRepository,
    allocation_repo: ContainerAllocationRepository,
    shipping_repo: ShippingDocRepository,
    order_repo: OrderRepository,
    workflow_engine: WorkflowEngine,
}

impl LogisticsApi {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        LogisticsApi {
            container_repo: ContainerRepository::from_connection(conn.clone()),
            allocation_repo: ContainerAllocationRepository::from_connection(conn.clone()),
            shipping_repo: ShippingDocRepository::from_connection(conn.clone()),
            order_repo: OrderRepository::from_connection(conn.clone()),
            workflow_engine: WorkflowEngine::from_connection(conn.clone()),
            conn,
        }
    }

    // ==========================================
    // 集装箱
    // ==========================================

    /// 创建集装箱 (初始状态 PLANNED)
    pub fn create_container(&self, input: CreateContainerInput) -> ApiResult<Container> {
        validator::require_non_empty("container_no", &input.container_no)?;
        let now = Utc::now().naive_utc();
        let container = Container {
            container_id: Uuid::new_v4().to_string(),
            container_no: input.container_no.trim().to_string(),
            vessel_name: input.vessel_name,
            status: ContainerStatus::Planned,
            etd: input.etd,
            atd: None,
            eta: input.eta,
            ata: None,
            arrival_at_warehouse: None,
            created_at: now,
            updated_at: now,
        };
        with_savepoint(&self.conn, "sp_create_container", || {
            self.container_repo.create(&container)?;
            Ok(())
        })?;
        info!(container_no = %container.container_no, "集装箱创建完成");
        Ok(container)
    }

    pub fn get_container(&self, container_id: &str) -> ApiResult<Container> {
        self.container_repo
            .find_by_id(container_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Container (id={})", container_id)))
    }

    pub fn list_containers(&self) -> ApiResult<Vec<Container>> {
        Ok(self.container_repo.list_all()?)
    }

    /// 更新集装箱基础字段 (船名/预计时间), 联动重算关联订单
    pub fn update_container(
        &self,
        container_id: &str,
        vessel_name: Option<String>,
        etd: Option<NaiveDate>,
        eta: Option<NaiveDate>,
    ) -> ApiResult<Container> {
        with_savepoint(&self.conn, "sp_update_container", || {
            self.container_repo
                .update_basic_fields(container_id, vessel_name.clone(), etd, eta)?;
            self.recompute_linked_orders(container_id)?;
            Ok(())
        })?;
        self.get_container(container_id)
    }

    /// 删除集装箱
    ///
    /// 托书/物流账单解除关联 (置空), 配柜级联删除;
    /// 先收集关联订单, 删除后逐一重算
    pub fn delete_container(&self, container_id: &str) -> ApiResult<()> {
        if self.container_repo.find_by_id(container_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Container (id={})", container_id)));
        }
        let linked = self.container_repo.linked_order_ids(container_id)?;
        with_savepoint(&self.conn, "sp_delete_container", || {
            self.container_repo.delete(container_id)?;
            for order_id in &linked {
                self.workflow_engine.recompute(order_id)?;
            }
            Ok(())
        })?;
        info!(container_id, orders = linked.len(), "集装箱已删除");
        Ok(())
    }

    // ==========================================
    // 配柜
    // ==========================================

    /// 建立订单-集装箱配柜关联
    pub fn create_allocation(
        &self,
        order_id: &str,
        container_id: &str,
        qty: Option<f64>,
    ) -> ApiResult<ContainerAllocation> {
        if self.order_repo.find_by_id(order_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Order (id={})", order_id)));
        }
        if self.container_repo.find_by_id(container_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Container (id={})", container_id)));
        }
        if let Some(q) = qty {
            validator::require_positive("qty", q)?;
        }
        let allocation = ContainerAllocation {
            allocation_id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            container_id: container_id.to_string(),
            qty,
            created_at: Utc::now().naive_utc(),
        };
        with_savepoint(&self.conn, "sp_create_allocation", || {
            self.allocation_repo.create(&allocation)?;
            self.workflow_engine.recompute(order_id)?;
            Ok(())
        })?;
        Ok(allocation)
    }

    /// 解除配柜关联
    pub fn delete_allocation(&self, allocation_id: &str) -> ApiResult<()> {
        let allocation = self
            .allocation_repo
            .find_by_id(allocation_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("ContainerAllocation (id={})", allocation_id))
            })?;
        with_savepoint(&self.conn, "sp_delete_allocation", || {
            self.allocation_repo.delete(allocation_id)?;
            self.workflow_engine.recompute(&allocation.order_id)?;
            Ok(())
        })
    }

    // ==========================================
    // 托书
    // ==========================================

    /// 手工创建托书 (初始状态 DRAFT; 工作流触发生成的托书为 ISSUED)
    pub fn create_shipping_doc(
        &self,
        input: CreateShippingDocInput,
    ) -> ApiResult<ShippingDocument> {
        validator::require_non_empty("doc_no", &input.doc_no)?;
        if self.order_repo.find_by_id(&input.order_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Order (id={})", input.order_id)));
        }
        if let Some(cid) = &input.container_id {
            if self.container_repo.find_by_id(cid)?.is_none() {
                return Err(ApiError::NotFound(format!("Container (id={})", cid)));
            }
        }
        let doc = ShippingDocument {
            doc_id: Uuid::new_v4().to_string(),
            order_id: input.order_id.clone(),
            container_id: input.container_id,
            doc_no: input.doc_no.trim().to_string(),
            status: ShippingDocStatus::Draft,
            issued_at: None,
            created_at: Utc::now().naive_utc(),
        };
        with_savepoint(&self.conn, "sp_create_shipping_doc", || {
            self.shipping_repo.create(&doc)?;
            self.workflow_engine.recompute(&input.order_id)?;
            Ok(())
        })?;
        Ok(doc)
    }

    /// 更新托书状态 (DRAFT → ISSUED 时补发出时间)
    pub fn update_shipping_doc_status(
        &self,
        doc_id: &str,
        status: ShippingDocStatus,
        issued_at: Option<NaiveDateTime>,
    ) -> ApiResult<()> {
        let doc = self
            .shipping_repo
            .find_by_id(doc_id)?
            .ok_or_else(|| ApiError::NotFound(format!("ShippingDocument (id={})", doc_id)))?;
        let issued_at = match status {
            ShippingDocStatus::Issued => {
                issued_at.or(doc.issued_at).or_else(|| Some(Utc::now().naive_utc()))
            }
            ShippingDocStatus::Draft => None,
        };
        with_savepoint(&self.conn, "sp_update_shipping_doc", || {
            self.shipping_repo.update_status(doc_id, status, issued_at)?;
            self.workflow_engine.recompute(&doc.order_id)?;
            Ok(())
        })
    }

    /// 删除托书
    pub fn delete_shipping_doc(&self, doc_id: &str) -> ApiResult<()> {
        let doc = self
            .shipping_repo
            .find_by_id(doc_id)?
            .ok_or_else(|| ApiError::NotFound(format!("ShippingDocument (id={})", doc_id)))?;
        with_savepoint(&self.conn, "sp_delete_shipping_doc", || {
            self.shipping_repo.delete(doc_id)?;
            self.workflow_engine.recompute(&doc.order_id)?;
            Ok(())
        })
    }

    // ==========================================
    // 内部
    // ==========================================

    /// 重算集装箱关联的所有订单
    fn recompute_linked_orders(&self, container_id: &str) -> ApiResult<()> {
        for order_id in self.container_repo.linked_order_ids(container_id)? {
            self.workflow_engine.recompute(&order_id)?;
        }
        Ok(())
    }
}
