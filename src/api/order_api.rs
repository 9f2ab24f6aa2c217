// ==========================================
// 国际贸易订单流转系统 - 订单 API
// ==========================================
// 职责: 订单创建(关税解析+毛利测算)、查询、删除、工作流入口
// 红线: 删除受支付引用保护; 订单+明细创建在同一保护点内
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::{validator, with_savepoint};
use crate::config::ConfigManager;
use crate::domain::order::{Order, OrderItem};
use crate::domain::types::{FinanceTargetType, WorkflowAction, WorkflowStatus};
use crate::engine::margin::{calculate_estimated_margin, round_money, round_rate};
use crate::engine::tariff::{infer_origin_country, normalize_tariff_key, TariffResolver};
use crate::engine::workflow::{TriggerOutcome, TriggerParams, WorkflowEngine};
use crate::repository::{
    CommercialInvoiceRepository, OrderItemRepository, OrderRepository, PaymentRepository,
    TariffRateRepository, VendorBillRepository,
};

// ==========================================
// 输入/输出结构
// ==========================================

/// 订单明细行创建输入
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderItemInput {
    pub product_description: String,
    pub collection: Option<String>,
    pub material: Option<String>,
    pub qty: f64,
    pub customer_unit_price: f64,
    pub vendor_unit_price: f64,
}

/// 订单创建输入
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderInput {
    pub vpo_number: String,
    pub customer_name: String,
    pub customer_address: Option<String>,
    pub vendor_name: String,
    pub vendor_address: Option<String>,
    pub order_date: Option<NaiveDate>,
    /// 缺省取配置默认账期
    pub customer_term_days: Option<i32>,
    pub vendor_term_days: Option<i32>,
    pub logistics_term_days: Option<i32>,
    pub items: Vec<CreateOrderItemInput>,
}

/// 订单 + 明细组合 (查询/创建返回)
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

// ==========================================
// OrderApi
// ==========================================

pub struct OrderApi {
    conn: Arc<Mutex<Connection>>,
    order_repo: OrderRepository,
    order_item_repo: OrderItemRepository,
    invoice_repo: CommercialInvoiceRepository,
    vendor_bill_repo: VendorBillRepository,
    payment_repo: PaymentRepository,
    tariff_resolver: TariffResolver,
    workflow_engine: WorkflowEngine,
    config: Arc<ConfigManager>,
}

impl OrderApi {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        let config = Arc::new(ConfigManager::from_connection(conn.clone()));
        let tariff_repo = Arc::new(TariffRateRepository::from_connection(conn.clone()));
        OrderApi {
            order_repo: OrderRepository::from_connection(conn.clone()),
            order_item_repo: OrderItemRepository::from_connection(conn.clone()),
            invoice_repo: CommercialInvoiceRepository::from_connection(conn.clone()),
            vendor_bill_repo: VendorBillRepository::from_connection(conn.clone()),
            payment_repo: PaymentRepository::from_connection(conn.clone()),
            tariff_resolver: TariffResolver::new(tariff_repo, config.clone()),
            workflow_engine: WorkflowEngine::from_connection(conn.clone()),
            config,
            conn,
        }
    }

    // ==========================================
    // 订单创建
    // ==========================================

    /// 创建订单
    ///
    /// 逐行解析关税键/原产国/税率并测算毛利, 汇总订单级
    /// 总额/毛利/毛利率; 初始状态 PO_UPLOADED。
    /// 订单与明细写入在同一保护点内, 任一失败整体回滚
    pub fn create_order(&self, input: CreateOrderInput) -> ApiResult<OrderWithItems> {
        validator::require_non_empty("vpo_number", &input.vpo_number)?;
        validator::require_non_empty("customer_name", &input.customer_name)?;
        validator::require_non_empty("vendor_name", &input.vendor_name)?;
        if input.items.is_empty() {
            return Err(ApiError::InvalidInput("订单至少需要一条明细".to_string()));
        }
        for (idx, item) in input.items.iter().enumerate() {
            validator::require_non_empty(
                &format!("items[{}].product_description", idx),
                &item.product_description,
            )?;
            validator::require_positive(&format!("items[{}].qty", idx), item.qty)?;
            validator::require_non_negative(
                &format!("items[{}].customer_unit_price", idx),
                item.customer_unit_price,
            )?;
            validator::require_non_negative(
                &format!("items[{}].vendor_unit_price", idx),
                item.vendor_unit_price,
            )?;
        }

        let customer_term_days = match input.customer_term_days {
            Some(d) => d,
            None => self.config.default_customer_term_days()?,
        };
        let vendor_term_days = match input.vendor_term_days {
            Some(d) => d,
            None => self.config.default_vendor_term_days()?,
        };
        let logistics_term_days = match input.logistics_term_days {
            Some(d) => d,
            None => self.config.default_logistics_term_days()?,
        };
        validator::require_term_days("customer_term_days", customer_term_days)?;
        validator::require_term_days("vendor_term_days", vendor_term_days)?;
        validator::require_term_days("logistics_term_days", logistics_term_days)?;

        let default_origin = self.config.default_origin_country()?;
        let now = Utc::now().naive_utc();
        let order_id = Uuid::new_v4().to_string();

        // 逐行: 关税键归一化 → 原产国推断 → 税率解析 → 毛利测算
        let mut items: Vec<OrderItem> = Vec::with_capacity(input.items.len());
        let mut total_amount = 0.0;
        let mut total_margin = 0.0;
        for item in &input.items {
            let tariff_key = normalize_tariff_key(
                &item.product_description,
                item.collection.as_deref(),
                item.material.as_deref(),
            );
            let origin_country = infer_origin_country(
                &input.vendor_name,
                input.vendor_address.as_deref(),
                &default_origin,
            );
            let tariff_rate = self.tariff_resolver.resolve_rate(&tariff_key, &origin_country)?;
            let breakdown = calculate_estimated_margin(
                item.customer_unit_price,
                item.vendor_unit_price,
                item.qty,
                tariff_rate,
            );
            total_amount += item.customer_unit_price * item.qty;
            total_margin += breakdown.estimated_margin;

            items.push(OrderItem {
                item_id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_description: item.product_description.trim().to_string(),
                collection: item.collection.clone(),
                material: item.material.clone(),
                tariff_key,
                origin_country,
                qty: item.qty,
                customer_unit_price: item.customer_unit_price,
                vendor_unit_price: item.vendor_unit_price,
                tariff_rate,
                duty_cost: breakdown.duty_cost,
                estimated_3pl_cost: breakdown.estimated_3pl,
                estimated_margin: breakdown.estimated_margin,
                created_at: now,
            });
        }

        let total_amount = round_money(total_amount);
        let estimated_margin = round_money(total_margin);
        let estimated_margin_rate = if total_amount == 0.0 {
            0.0
        } else {
            round_rate(estimated_margin / total_amount)
        };

        let order = Order {
            order_id: order_id.clone(),
            vpo_number: input.vpo_number.trim().to_string(),
            customer_name: input.customer_name.trim().to_string(),
            customer_address: input.customer_address.clone(),
            vendor_name: input.vendor_name.trim().to_string(),
            vendor_address: input.vendor_address.clone(),
            order_date: input.order_date,
            total_amount,
            estimated_margin,
            estimated_margin_rate,
            workflow_status: WorkflowStatus::PoUploaded,
            delivered_at: None,
            closed_at: None,
            customer_term_days,
            vendor_term_days,
            logistics_term_days,
            revision: 0,
            created_at: now,
            updated_at: now,
        };

        with_savepoint(&self.conn, "sp_create_order", || {
            self.order_repo.create(&order)?;
            for item in &items {
                self.order_item_repo.create(item)?;
            }
            Ok(())
        })?;

        info!(
            order_id = %order.order_id,
            vpo = %order.vpo_number,
            total_amount,
            estimated_margin,
            "订单创建完成"
        );
        Ok(OrderWithItems { order, items })
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询订单 (含明细)
    pub fn get_order(&self, order_id: &str) -> ApiResult<OrderWithItems> {
        let order = self
            .order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Order (id={})", order_id)))?;
        let items = self.order_item_repo.find_by_order(order_id)?;
        Ok(OrderWithItems { order, items })
    }

    /// 按 VPO 编号查询订单
    pub fn get_order_by_vpo(&self, vpo_number: &str) -> ApiResult<Option<Order>> {
        Ok(self.order_repo.find_by_vpo(vpo_number)?)
    }

    /// 查询订单明细行
    pub fn get_order_items(&self, order_id: &str) -> ApiResult<Vec<OrderItem>> {
        if self.order_repo.find_by_id(order_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Order (id={})", order_id)));
        }
        Ok(self.order_item_repo.find_by_order(order_id)?)
    }

    /// 订单分页列表
    pub fn list_orders(&self, limit: i64, offset: i64) -> ApiResult<Vec<Order>> {
        Ok(self.order_repo.list_all(limit, offset)?)
    }

    // ==========================================
    // 订单删除
    // ==========================================

    /// 删除订单
    ///
    /// 名下发票/供应商账单仍有支付引用时拒绝 (冲突, 不重试),
    /// 调用方须先删除支付; 通过后级联删除明细/托书/配柜/发票/账单,
    /// 物流账单仅解除订单关联
    pub fn delete_order(&self, order_id: &str) -> ApiResult<()> {
        if self.order_repo.find_by_id(order_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Order (id={})", order_id)));
        }

        for invoice in self.invoice_repo.find_by_order(order_id)? {
            let refs = self
                .payment_repo
                .count_for_target(FinanceTargetType::CommercialInvoice, &invoice.invoice_id)?;
            if refs > 0 {
                return Err(ApiError::Conflict(format!(
                    "发票 {} 存在 {} 笔支付, 需先删除支付",
                    invoice.doc_no, refs
                )));
            }
        }
        for bill in self.vendor_bill_repo.find_by_order(order_id)? {
            let refs = self
                .payment_repo
                .count_for_target(FinanceTargetType::VendorBill, &bill.bill_id)?;
            if refs > 0 {
                return Err(ApiError::Conflict(format!(
                    "供应商账单 {} 存在 {} 笔支付, 需先删除支付",
                    bill.doc_no, refs
                )));
            }
        }

        with_savepoint(&self.conn, "sp_delete_order", || {
            self.order_repo.delete(order_id)?;
            Ok(())
        })?;
        info!(order_id, "订单已删除");
        Ok(())
    }

    // ==========================================
    // 工作流入口
    // ==========================================

    /// 重算订单工作流状态 (订单不存在时软跳过)
    pub fn recompute_workflow_status(&self, order_id: &str) -> ApiResult<Option<Order>> {
        with_savepoint(&self.conn, "sp_recompute", || {
            Ok(self.workflow_engine.recompute(order_id)?)
        })
    }

    /// 触发工作流动作 (动作名按线上协议字符串传入)
    pub fn trigger_workflow(
        &self,
        order_id: &str,
        action: &str,
        params: TriggerParams,
    ) -> ApiResult<TriggerOutcome> {
        let action = WorkflowAction::parse(action)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知工作流动作: {}", action)))?;
        with_savepoint(&self.conn, "sp_trigger", || {
            Ok(self.workflow_engine.trigger(order_id, action, &params)?)
        })
    }
}
