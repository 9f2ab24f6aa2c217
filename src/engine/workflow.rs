// ==========================================
// 国际贸易订单流转系统 - 工作流状态引擎
// ==========================================
// 职责: 订单工作流状态推导 + 显式动作触发
// 红线: workflow_status 永远可由单据存在性/状态重新推导,
//       不作为独立事实来源; 任何单据/支付变更后必须重算
// 红线: 触发动作幂等 —— 目标单据已存在时不重复生成
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::finance::{CommercialInvoice, FinanceDocSummary, VendorBill};
use crate::domain::order::Order;
use crate::domain::shipping::ShippingDocument;
use crate::domain::types::{
    ContainerStatus, FinanceDocStatus, ShippingDocStatus, WorkflowAction, WorkflowStatus,
};
use crate::engine::margin::round_money;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{
    CommercialInvoiceRepository, ContainerAllocationRepository, ContainerRepository,
    FinanceDocSummaryRepository, OrderItemRepository, OrderRepository, ShippingDocRepository,
    VendorBillRepository,
};

/// 自动生成单据的默认币种
const DEFAULT_CURRENCY: &str = "USD";

/// 托书编号前缀
const SHIPPING_DOC_PREFIX: &str = "SD-";
/// 商业发票编号前缀
const INVOICE_PREFIX: &str = "CI-";
/// 供应商账单编号前缀
const VENDOR_BILL_PREFIX: &str = "VB-";

// ==========================================
// 触发参数与结果
// ==========================================

/// 工作流触发的可选参数
#[derive(Debug, Clone, Default)]
pub struct TriggerParams {
    /// 指定集装箱; 缺省时从已有配柜记录解析
    pub container_id: Option<String>,
    /// MARK_DELIVERED 的送达时间; 缺省取当前时间
    pub delivered_at: Option<NaiveDateTime>,
}

/// 触发过程中涉及的单据 (已存在或新生成)
#[derive(Debug, Clone, Serialize)]
pub struct TriggerDocument {
    pub kind: String,   // SHIPPING_DOCUMENT / COMMERCIAL_INVOICE / VENDOR_BILL
    pub doc_id: String, // 单据ID
    pub doc_no: String, // 单据编号
    pub created: bool,  // 本次触发是否新建
}

/// 触发结果
#[derive(Debug, Clone, Serialize)]
pub struct TriggerOutcome {
    pub created: bool, // 是否有新单据生成 (重复触发为 false)
    pub updated: bool, // 订单工作流字段是否发生变化
    pub documents: Vec<TriggerDocument>,
}

// ==========================================
// 纯函数: 状态推导决策表
// ==========================================

/// 由单据存在性/结清情况推导订单工作流状态
///
/// 决策顺序 (已送达分支优先级从严到宽):
/// - 已送达: 全部财务单据结清 → CLOSED; 有财务单据 → AR_AP_OPEN;
///   有托书或配柜 → IN_TRANSIT; 否则 PO_UPLOADED
/// - 未送达: 有财务单据 → IN_TRANSIT; 有托书 → SHIPPING_DOC_SENT;
///   仅配柜 → PARTIALLY_SHIPPED; 否则 PO_UPLOADED
///
/// CLOSED 要求至少存在一张财务单据且全部 PAID,
/// 零单据的已送达订单不会被误判为关闭
pub fn derive_workflow_status(
    delivered: bool,
    has_shipping_doc: bool,
    has_allocation: bool,
    has_finance_doc: bool,
    all_finance_paid: bool,
) -> WorkflowStatus {
    if delivered {
        if has_finance_doc && all_finance_paid {
            WorkflowStatus::Closed
        } else if has_finance_doc {
            WorkflowStatus::ArApOpen
        } else if has_shipping_doc || has_allocation {
            WorkflowStatus::InTransit
        } else {
            WorkflowStatus::PoUploaded
        }
    } else if has_finance_doc {
        WorkflowStatus::InTransit
    } else if has_shipping_doc {
        WorkflowStatus::ShippingDocSent
    } else if has_allocation {
        WorkflowStatus::PartiallyShipped
    } else {
        WorkflowStatus::PoUploaded
    }
}

/// 生成带前缀的单据编号
fn generate_doc_no(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, suffix[..12].to_uppercase())
}

// ==========================================
// WorkflowEngine
// ==========================================

pub struct WorkflowEngine {
    order_repo: OrderRepository,
    order_item_repo: OrderItemRepository,
    shipping_repo: ShippingDocRepository,
    container_repo: ContainerRepository,
    allocation_repo: ContainerAllocationRepository,
    invoice_repo: CommercialInvoiceRepository,
    vendor_bill_repo: VendorBillRepository,
    summary_repo: FinanceDocSummaryRepository,
}

impl WorkflowEngine {
    /// 从共享连接构建 (与调用方共用同一事务边界)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        WorkflowEngine {
            order_repo: OrderRepository::from_connection(conn.clone()),
            order_item_repo: OrderItemRepository::from_connection(conn.clone()),
            shipping_repo: ShippingDocRepository::from_connection(conn.clone()),
            container_repo: ContainerRepository::from_connection(conn.clone()),
            allocation_repo: ContainerAllocationRepository::from_connection(conn.clone()),
            invoice_repo: CommercialInvoiceRepository::from_connection(conn.clone()),
            vendor_bill_repo: VendorBillRepository::from_connection(conn.clone()),
            summary_repo: FinanceDocSummaryRepository::from_connection(conn),
        }
    }

    // ==========================================
    // 状态重算
    // ==========================================

    /// 重算订单工作流状态
    ///
    /// 幂等; 对单据无副作用; 订单不存在时软跳过返回 None。
    /// 状态无变化时不写库 (不推高 revision);
    /// 写库走乐观锁, 并发重算互相覆盖时报 OptimisticLockFailure
    pub fn recompute(&self, order_id: &str) -> RepositoryResult<Option<Order>> {
        let Some(order) = self.order_repo.find_by_id(order_id)? else {
            debug!(order_id, "工作流重算跳过: 订单不存在");
            return Ok(None);
        };

        let shipping_docs = self.shipping_repo.find_by_order(order_id)?;
        let allocations = self.allocation_repo.find_by_order(order_id)?;
        let summaries = self.summary_repo.summaries_for_order(order_id)?;

        let has_finance = !summaries.is_empty();
        let all_paid = has_finance && summaries.iter().all(FinanceDocSummary::is_paid);
        let new_status = derive_workflow_status(
            order.delivered_at.is_some(),
            !shipping_docs.is_empty(),
            !allocations.is_empty(),
            has_finance,
            all_paid,
        );

        // closed_at 只设置一次: 进入 CLOSED 时保留已有值或取当前时间;
        // 离开 CLOSED 的重算不清除, 仅显式回退动作 (UNDO_MARK_DELIVERED) 清除
        let new_closed_at = if new_status == WorkflowStatus::Closed {
            Some(order.closed_at.unwrap_or_else(|| Utc::now().naive_utc()))
        } else {
            order.closed_at
        };

        if new_status == order.workflow_status && new_closed_at == order.closed_at {
            return Ok(Some(order));
        }

        info!(
            order_id,
            from = %order.workflow_status,
            to = %new_status,
            "订单工作流状态变更"
        );
        self.order_repo.update_workflow_fields(
            order_id,
            new_status,
            order.delivered_at,
            new_closed_at,
            order.revision,
        )?;
        self.order_repo.find_by_id(order_id)
    }

    // ==========================================
    // 显式动作触发
    // ==========================================

    /// 触发工作流动作
    ///
    /// 前向动作按需补齐目标单据 (幂等); 回退动作清理前向产生的
    /// 订单级字段后由重算落到正确阶段, 从不硬编码回退目标状态。
    /// 每次触发末尾必定执行 recompute, 最终状态以单据实际情况为准
    pub fn trigger(
        &self,
        order_id: &str,
        action: WorkflowAction,
        params: &TriggerParams,
    ) -> RepositoryResult<TriggerOutcome> {
        let order = self
            .order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            })?;
        let container_id = self.resolve_container(order_id, params)?;
        let before = (order.workflow_status, order.delivered_at, order.closed_at);

        info!(order_id, action = %action, container_id = ?container_id, "触发工作流动作");

        let mut documents: Vec<TriggerDocument> = Vec::new();
        match action {
            WorkflowAction::GenerateShippingDoc => {
                let (doc, created) =
                    self.ensure_shipping_doc(&order, container_id.as_deref())?;
                documents.push(TriggerDocument {
                    kind: "SHIPPING_DOCUMENT".to_string(),
                    doc_id: doc.doc_id,
                    doc_no: doc.doc_no,
                    created,
                });
            }
            WorkflowAction::StartTransit => {
                let (doc, doc_created) =
                    self.ensure_shipping_doc(&order, container_id.as_deref())?;
                documents.push(TriggerDocument {
                    kind: "SHIPPING_DOCUMENT".to_string(),
                    doc_id: doc.doc_id,
                    doc_no: doc.doc_no,
                    created: doc_created,
                });
                let (invoice, invoice_created) = self.ensure_commercial_invoice(&order)?;
                documents.push(TriggerDocument {
                    kind: "COMMERCIAL_INVOICE".to_string(),
                    doc_id: invoice.invoice_id,
                    doc_no: invoice.doc_no,
                    created: invoice_created,
                });
                let (bill, bill_created) = self.ensure_vendor_bill(&order)?;
                documents.push(TriggerDocument {
                    kind: "VENDOR_BILL".to_string(),
                    doc_id: bill.bill_id,
                    doc_no: bill.doc_no,
                    created: bill_created,
                });
                if let Some(cid) = container_id.as_deref() {
                    self.stamp_container_in_transit(cid)?;
                }
            }
            WorkflowAction::MarkDelivered => {
                let delivered_at = params
                    .delivered_at
                    .or(order.delivered_at)
                    .unwrap_or_else(|| Utc::now().naive_utc());
                if order.delivered_at != Some(delivered_at) {
                    self.order_repo.update_workflow_fields(
                        order_id,
                        order.workflow_status,
                        Some(delivered_at),
                        order.closed_at,
                        order.revision,
                    )?;
                }
                if let Some(cid) = container_id.as_deref() {
                    self.stamp_container_arrived(cid)?;
                }
            }
            WorkflowAction::UndoMarkDelivered => {
                if order.delivered_at.is_some() || order.closed_at.is_some() {
                    self.order_repo.update_workflow_fields(
                        order_id,
                        order.workflow_status,
                        None,
                        None,
                        order.revision,
                    )?;
                }
                if let Some(cid) = container_id.as_deref() {
                    self.revert_container_arrival(cid)?;
                }
            }
            WorkflowAction::UndoStartTransit => {
                // 财务单据保留 (回退从不删除财务/物流单据),
                // 推导可能合法地停留在 IN_TRANSIT
                if let Some(cid) = container_id.as_deref() {
                    self.revert_container_transit(cid)?;
                }
            }
            WorkflowAction::UndoShippingDoc => {
                let removed = self.shipping_repo.delete_by_order(order_id)?;
                debug!(order_id, removed, "回退托书: 删除订单托书");
            }
        }

        let after = self
            .recompute(order_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            })?;

        let created = documents.iter().any(|d| d.created);
        let updated = (after.workflow_status, after.delivered_at, after.closed_at) != before;
        Ok(TriggerOutcome {
            created,
            updated,
            documents,
        })
    }

    // ==========================================
    // 集装箱解析与状态联动
    // ==========================================

    /// 解析动作作用的集装箱: 显式参数优先, 否则取首条配柜记录
    fn resolve_container(
        &self,
        order_id: &str,
        params: &TriggerParams,
    ) -> RepositoryResult<Option<String>> {
        if let Some(cid) = &params.container_id {
            if self.container_repo.find_by_id(cid)?.is_none() {
                return Err(RepositoryError::NotFound {
                    entity: "Container".to_string(),
                    id: cid.clone(),
                });
            }
            return Ok(Some(cid.clone()));
        }
        let allocations = self.allocation_repo.find_by_order(order_id)?;
        Ok(allocations.into_iter().next().map(|a| a.container_id))
    }

    /// 启运: 集装箱置 IN_TRANSIT 并补 atd
    fn stamp_container_in_transit(&self, container_id: &str) -> RepositoryResult<()> {
        let Some(container) = self.container_repo.find_by_id(container_id)? else {
            return Ok(());
        };
        let atd = container.atd.or_else(|| Some(Utc::now().date_naive()));
        self.container_repo.update_status_and_dates(
            container_id,
            ContainerStatus::InTransit,
            atd,
            container.ata,
            container.arrival_at_warehouse,
        )
    }

    /// 送达: 集装箱置 ARRIVED 并补 ata/入仓时间
    fn stamp_container_arrived(&self, container_id: &str) -> RepositoryResult<()> {
        let Some(container) = self.container_repo.find_by_id(container_id)? else {
            return Ok(());
        };
        let today = Utc::now().date_naive();
        self.container_repo.update_status_and_dates(
            container_id,
            ContainerStatus::Arrived,
            container.atd,
            container.ata.or(Some(today)),
            container.arrival_at_warehouse.or(Some(today)),
        )
    }

    /// 回退送达: ARRIVED 的集装箱退回 IN_TRANSIT, 清到港/入仓时间
    fn revert_container_arrival(&self, container_id: &str) -> RepositoryResult<()> {
        let Some(container) = self.container_repo.find_by_id(container_id)? else {
            return Ok(());
        };
        if container.status != ContainerStatus::Arrived {
            return Ok(());
        }
        self.container_repo.update_status_and_dates(
            container_id,
            ContainerStatus::InTransit,
            container.atd,
            None,
            None,
        )
    }

    /// 回退启运: 集装箱退回 PLANNED, 清全部实际时间
    fn revert_container_transit(&self, container_id: &str) -> RepositoryResult<()> {
        if self.container_repo.find_by_id(container_id)?.is_none() {
            return Ok(());
        }
        self.container_repo.update_status_and_dates(
            container_id,
            ContainerStatus::Planned,
            None,
            None,
            None,
        )
    }

    // ==========================================
    // 幂等单据生成
    // ==========================================

    /// 确保订单存在唯一托书, 缺失时生成 (状态 ISSUED)
    fn ensure_shipping_doc(
        &self,
        order: &Order,
        container_id: Option<&str>,
    ) -> RepositoryResult<(ShippingDocument, bool)> {
        if let Some(existing) = self.shipping_repo.find_by_order(&order.order_id)?.into_iter().next()
        {
            return Ok((existing, false));
        }
        let now = Utc::now().naive_utc();
        let doc = ShippingDocument {
            doc_id: Uuid::new_v4().to_string(),
            order_id: order.order_id.clone(),
            container_id: container_id.map(String::from),
            doc_no: generate_doc_no(SHIPPING_DOC_PREFIX),
            status: ShippingDocStatus::Issued,
            issued_at: Some(now),
            created_at: now,
        };
        self.shipping_repo.create(&doc)?;
        info!(order_id = %order.order_id, doc_no = %doc.doc_no, "生成托书");
        Ok((doc, true))
    }

    /// 确保订单存在唯一商业发票
    ///
    /// 金额 = 订单总额, 到期日 = 开票日 + 客户账期
    fn ensure_commercial_invoice(
        &self,
        order: &Order,
    ) -> RepositoryResult<(CommercialInvoice, bool)> {
        if let Some(existing) = self.invoice_repo.find_by_order(&order.order_id)?.into_iter().next()
        {
            return Ok((existing, false));
        }
        let now = Utc::now().naive_utc();
        let issue_date = Utc::now().date_naive();
        let invoice = CommercialInvoice {
            invoice_id: Uuid::new_v4().to_string(),
            order_id: order.order_id.clone(),
            doc_no: generate_doc_no(INVOICE_PREFIX),
            amount: round_money(order.total_amount),
            currency: DEFAULT_CURRENCY.to_string(),
            issue_date,
            due_date: issue_date + Duration::days(i64::from(order.customer_term_days)),
            status: FinanceDocStatus::Open,
            created_at: now,
            updated_at: now,
        };
        self.invoice_repo.create(&invoice)?;
        info!(order_id = %order.order_id, doc_no = %invoice.doc_no, amount = invoice.amount, "生成商业发票");
        Ok((invoice, true))
    }

    /// 确保订单存在唯一供应商账单
    ///
    /// 金额 = Σ 数量 × 供应商单价, 到期日 = 开单日 + 供应商账期
    fn ensure_vendor_bill(&self, order: &Order) -> RepositoryResult<(VendorBill, bool)> {
        if let Some(existing) = self
            .vendor_bill_repo
            .find_by_order(&order.order_id)?
            .into_iter()
            .next()
        {
            return Ok((existing, false));
        }
        let items = self.order_item_repo.find_by_order(&order.order_id)?;
        let amount = round_money(items.iter().map(|i| i.qty * i.vendor_unit_price).sum());
        let now = Utc::now().naive_utc();
        let issue_date = Utc::now().date_naive();
        let bill = VendorBill {
            bill_id: Uuid::new_v4().to_string(),
            order_id: order.order_id.clone(),
            doc_no: generate_doc_no(VENDOR_BILL_PREFIX),
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
            issue_date,
            due_date: issue_date + Duration::days(i64::from(order.vendor_term_days)),
            status: FinanceDocStatus::Open,
            created_at: now,
            updated_at: now,
        };
        self.vendor_bill_repo.create(&bill)?;
        info!(order_id = %order.order_id, doc_no = %bill.doc_no, amount = bill.amount, "生成供应商账单");
        Ok((bill, true))
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_status_not_delivered() {
        // 无任何单据
        assert_eq!(
            derive_workflow_status(false, false, false, false, false),
            WorkflowStatus::PoUploaded
        );
        // 仅配柜
        assert_eq!(
            derive_workflow_status(false, false, true, false, false),
            WorkflowStatus::PartiallyShipped
        );
        // 有托书 (配柜与否不影响)
        assert_eq!(
            derive_workflow_status(false, true, false, false, false),
            WorkflowStatus::ShippingDocSent
        );
        assert_eq!(
            derive_workflow_status(false, true, true, false, false),
            WorkflowStatus::ShippingDocSent
        );
        // 有财务单据即视为在途, 优先于托书判断
        assert_eq!(
            derive_workflow_status(false, false, false, true, false),
            WorkflowStatus::InTransit
        );
        assert_eq!(
            derive_workflow_status(false, true, true, true, true),
            WorkflowStatus::InTransit
        );
    }

    #[test]
    fn test_derive_status_delivered() {
        // 已送达 + 未结清财务单据 → 应收应付敞口
        assert_eq!(
            derive_workflow_status(true, true, true, true, false),
            WorkflowStatus::ArApOpen
        );
        // 已送达 + 全部结清 → 关闭
        assert_eq!(
            derive_workflow_status(true, false, false, true, true),
            WorkflowStatus::Closed
        );
        // 已送达但无财务单据 → 不能关闭
        assert_eq!(
            derive_workflow_status(true, true, false, false, false),
            WorkflowStatus::InTransit
        );
        assert_eq!(
            derive_workflow_status(true, false, true, false, false),
            WorkflowStatus::InTransit
        );
        // 已送达且零单据 → 回到初始态
        assert_eq!(
            derive_workflow_status(true, false, false, false, false),
            WorkflowStatus::PoUploaded
        );
    }

    #[test]
    fn test_generate_doc_no_prefix_and_length() {
        let no = generate_doc_no(SHIPPING_DOC_PREFIX);
        assert!(no.starts_with("SD-"));
        assert_eq!(no.len(), "SD-".len() + 12);
        // 两次生成不重复
        assert_ne!(generate_doc_no(INVOICE_PREFIX), generate_doc_no(INVOICE_PREFIX));
    }
}
