// ==========================================
// 国际贸易订单流转系统 - 财务 API
// ==========================================
// 职责: 三类财务单据与支付的增删改, 变更后链式触发
//       对账(支付变更) → 工作流重算(归属订单)
// 红线: 单据删除受支付引用保护 (冲突, 不重试)
// 红线: 支付方向必须与单据类型匹配 (发票IN, 账单OUT)
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::{validator, with_savepoint};
use crate::domain::finance::{CommercialInvoice, LogisticsBill, VendorBill};
use crate::domain::payment::Payment;
use crate::domain::types::{FinanceDocStatus, FinanceTargetType, PaymentDirection};
use crate::engine::reconcile::ReconcileEngine;
use crate::engine::workflow::WorkflowEngine;
use crate::repository::{
    CommercialInvoiceRepository, ContainerRepository, LogisticsBillRepository, OrderRepository,
    PaymentRepository, VendorBillRepository,
};

/// 手工创建财务单据的默认币种
const DEFAULT_CURRENCY: &str = "USD";

// ==========================================
// 输入结构
// ==========================================

/// 订单级财务单据 (发票/供应商账单) 创建输入
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderDocInput {
    pub order_id: String,
    pub doc_no: String,
    pub amount: f64,
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    /// 缺省按订单账期推算
    pub due_date: Option<NaiveDate>,
}

/// 物流账单创建输入 (按柜, 可选挂订单)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLogisticsBillInput {
    pub container_id: String,
    pub order_id: Option<String>,
    pub provider_name: Option<String>,
    pub amount: f64,
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// 支付创建输入
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentInput {
    pub target_type: FinanceTargetType,
    pub target_id: String,
    pub direction: PaymentDirection,
    pub amount: f64,
    pub paid_date: Option<NaiveDate>,
    pub note: Option<String>,
}

// ==========================================
// FinanceApi
// ==========================================

pub struct FinanceApi {
    conn: Arc<Mutex<Connection>>,
    order_repo: OrderRepository,
    container_repo: ContainerRepository,
    invoice_repo: Arc<CommercialInvoiceRepository>,
    vendor_bill_repo: Arc<VendorBillRepository>,
    logistics_bill_repo: Arc<LogisticsBillRepository>,
    payment_repo: Arc<PaymentRepository>,
    reconcile_engine: ReconcileEngine,
    workflow_engine: WorkflowEngine,
}

impl FinanceApi {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        let invoice_repo = Arc::new(CommercialInvoiceRepository::from_connection(conn.clone()));
        let vendor_bill_repo = Arc::new(VendorBillRepository::from_connection(conn.clone()));
        let logistics_bill_repo = Arc::new(LogisticsBillRepository::from_connection(conn.clone()));
        let payment_repo = Arc::new(PaymentRepository::from_connection(conn.clone()));
        FinanceApi {
            order_repo: OrderRepository::from_connection(conn.clone()),
            container_repo: ContainerRepository::from_connection(conn.clone()),
            reconcile_engine: ReconcileEngine::new(
                payment_repo.clone(),
                invoice_repo.clone(),
                vendor_bill_repo.clone(),
                logistics_bill_repo.clone(),
            ),
            workflow_engine: WorkflowEngine::from_connection(conn.clone()),
            invoice_repo,
            vendor_bill_repo,
            logistics_bill_repo,
            payment_repo,
            conn,
        }
    }

    // ==========================================
    // 商业发票 (AR)
    // ==========================================

    /// 手工创建商业发票
    pub fn create_commercial_invoice(
        &self,
        input: CreateOrderDocInput,
    ) -> ApiResult<CommercialInvoice> {
        validator::require_non_empty("doc_no", &input.doc_no)?;
        validator::require_positive("amount", input.amount)?;
        let order = self
            .order_repo
            .find_by_id(&input.order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Order (id={})", input.order_id)))?;

        let issue_date = input.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_date = input
            .due_date
            .unwrap_or(issue_date + Duration::days(i64::from(order.customer_term_days)));
        let now = Utc::now().naive_utc();
        let invoice = CommercialInvoice {
            invoice_id: Uuid::new_v4().to_string(),
            order_id: input.order_id.clone(),
            doc_no: input.doc_no.trim().to_string(),
            amount: input.amount,
            currency: input.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            issue_date,
            due_date,
            status: FinanceDocStatus::Open,
            created_at: now,
            updated_at: now,
        };
        with_savepoint(&self.conn, "sp_create_invoice", || {
            self.invoice_repo.create(&invoice)?;
            self.workflow_engine.recompute(&input.order_id)?;
            Ok(())
        })?;
        info!(doc_no = %invoice.doc_no, amount = invoice.amount, "商业发票创建完成");
        Ok(invoice)
    }

    /// 更新商业发票金额/到期日, 并重新对账
    pub fn update_commercial_invoice(
        &self,
        invoice_id: &str,
        amount: f64,
        due_date: NaiveDate,
    ) -> ApiResult<()> {
        validator::require_positive("amount", amount)?;
        with_savepoint(&self.conn, "sp_update_invoice", || {
            self.invoice_repo.update_amount_and_due(invoice_id, amount, due_date)?;
            self.reconcile_and_recompute(FinanceTargetType::CommercialInvoice, invoice_id)
        })
    }

    /// 删除商业发票 (支付引用保护)
    pub fn delete_commercial_invoice(&self, invoice_id: &str) -> ApiResult<()> {
        let invoice = self
            .invoice_repo
            .find_by_id(invoice_id)?
            .ok_or_else(|| ApiError::NotFound(format!("CommercialInvoice (id={})", invoice_id)))?;
        self.guard_no_payments(FinanceTargetType::CommercialInvoice, invoice_id)?;
        with_savepoint(&self.conn, "sp_delete_invoice", || {
            self.invoice_repo.delete(invoice_id)?;
            self.workflow_engine.recompute(&invoice.order_id)?;
            Ok(())
        })
    }

    // ==========================================
    // 供应商账单 (AP)
    // ==========================================

    /// 手工创建供应商账单
    pub fn create_vendor_bill(&self, input: CreateOrderDocInput) -> ApiResult<VendorBill> {
        validator::require_non_empty("doc_no", &input.doc_no)?;
        validator::require_positive("amount", input.amount)?;
        let order = self
            .order_repo
            .find_by_id(&input.order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Order (id={})", input.order_id)))?;

        let issue_date = input.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_date = input
            .due_date
            .unwrap_or(issue_date + Duration::days(i64::from(order.vendor_term_days)));
        let now = Utc::now().naive_utc();
        let bill = VendorBill {
            bill_id: Uuid::new_v4().to_string(),
            order_id: input.order_id.clone(),
            doc_no: input.doc_no.trim().to_string(),
            amount: input.amount,
            currency: input.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            issue_date,
            due_date,
            status: FinanceDocStatus::Open,
            created_at: now,
            updated_at: now,
        };
        with_savepoint(&self.conn, "sp_create_vendor_bill", || {
            self.vendor_bill_repo.create(&bill)?;
            self.workflow_engine.recompute(&input.order_id)?;
            Ok(())
        })?;
        info!(doc_no = %bill.doc_no, amount = bill.amount, "供应商账单创建完成");
        Ok(bill)
    }

    /// 更新供应商账单金额/到期日, 并重新对账
    pub fn update_vendor_bill(
        &self,
        bill_id: &str,
        amount: f64,
        due_date: NaiveDate,
    ) -> ApiResult<()> {
        validator::require_positive("amount", amount)?;
        with_savepoint(&self.conn, "sp_update_vendor_bill", || {
            self.vendor_bill_repo.update_amount_and_due(bill_id, amount, due_date)?;
            self.reconcile_and_recompute(FinanceTargetType::VendorBill, bill_id)
        })
    }

    /// 删除供应商账单 (支付引用保护)
    pub fn delete_vendor_bill(&self, bill_id: &str) -> ApiResult<()> {
        let bill = self
            .vendor_bill_repo
            .find_by_id(bill_id)?
            .ok_or_else(|| ApiError::NotFound(format!("VendorBill (id={})", bill_id)))?;
        self.guard_no_payments(FinanceTargetType::VendorBill, bill_id)?;
        with_savepoint(&self.conn, "sp_delete_vendor_bill", || {
            self.vendor_bill_repo.delete(bill_id)?;
            self.workflow_engine.recompute(&bill.order_id)?;
            Ok(())
        })
    }

    // ==========================================
    // 物流账单 (AP, 按柜)
    // ==========================================

    /// 创建物流账单
    ///
    /// 集装箱必填 (业务校验); 订单关联可选,
    /// 挂了订单才参与该订单的工作流推导
    pub fn create_logistics_bill(
        &self,
        input: CreateLogisticsBillInput,
    ) -> ApiResult<LogisticsBill> {
        validator::require_positive("amount", input.amount)?;
        if self.container_repo.find_by_id(&input.container_id)?.is_none() {
            return Err(ApiError::NotFound(format!(
                "Container (id={})",
                input.container_id
            )));
        }
        let logistics_term_days = match &input.order_id {
            Some(order_id) => {
                let order = self
                    .order_repo
                    .find_by_id(order_id)?
                    .ok_or_else(|| ApiError::NotFound(format!("Order (id={})", order_id)))?;
                order.logistics_term_days
            }
            None => 0,
        };

        let issue_date = input.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_date = input
            .due_date
            .unwrap_or(issue_date + Duration::days(i64::from(logistics_term_days)));
        let now = Utc::now().naive_utc();
        let bill = LogisticsBill {
            bill_id: Uuid::new_v4().to_string(),
            container_id: Some(input.container_id.clone()),
            order_id: input.order_id.clone(),
            provider_name: input.provider_name,
            amount: input.amount,
            currency: input.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            issue_date,
            due_date,
            status: FinanceDocStatus::Open,
            created_at: now,
            updated_at: now,
        };
        with_savepoint(&self.conn, "sp_create_logistics_bill", || {
            self.logistics_bill_repo.create(&bill)?;
            if let Some(order_id) = &input.order_id {
                self.workflow_engine.recompute(order_id)?;
            }
            Ok(())
        })?;
        info!(bill_id = %bill.bill_id, amount = bill.amount, "物流账单创建完成");
        Ok(bill)
    }

    /// 更新物流账单金额/到期日, 并重新对账
    pub fn update_logistics_bill(
        &self,
        bill_id: &str,
        amount: f64,
        due_date: NaiveDate,
    ) -> ApiResult<()> {
        validator::require_positive("amount", amount)?;
        with_savepoint(&self.conn, "sp_update_logistics_bill", || {
            self.logistics_bill_repo.update_amount_and_due(bill_id, amount, due_date)?;
            self.reconcile_and_recompute(FinanceTargetType::LogisticsBill, bill_id)
        })
    }

    /// 删除物流账单 (支付引用保护)
    pub fn delete_logistics_bill(&self, bill_id: &str) -> ApiResult<()> {
        let bill = self
            .logistics_bill_repo
            .find_by_id(bill_id)?
            .ok_or_else(|| ApiError::NotFound(format!("LogisticsBill (id={})", bill_id)))?;
        self.guard_no_payments(FinanceTargetType::LogisticsBill, bill_id)?;
        with_savepoint(&self.conn, "sp_delete_logistics_bill", || {
            self.logistics_bill_repo.delete(bill_id)?;
            if let Some(order_id) = &bill.order_id {
                self.workflow_engine.recompute(order_id)?;
            }
            Ok(())
        })
    }

    // ==========================================
    // 支付
    // ==========================================

    /// 登记支付
    ///
    /// 方向必须匹配单据类型; 创建后同保护点内对账 → 工作流重算
    pub fn create_payment(&self, input: CreatePaymentInput) -> ApiResult<Payment> {
        validator::require_positive("amount", input.amount)?;
        validator::require_direction_match(input.target_type, input.direction)?;
        let payment = Payment {
            payment_id: Uuid::new_v4().to_string(),
            target_type: input.target_type,
            target_id: input.target_id.clone(),
            direction: input.direction,
            amount: input.amount,
            paid_date: input.paid_date.unwrap_or_else(|| Utc::now().date_naive()),
            note: input.note,
            created_at: Utc::now().naive_utc(),
        };
        with_savepoint(&self.conn, "sp_create_payment", || {
            self.payment_repo.create(&payment)?;
            // 对账失败 (目标单据不存在) 时整体回滚, 支付不会悬挂
            self.reconcile_and_recompute(input.target_type, &input.target_id)
        })?;
        info!(
            payment_id = %payment.payment_id,
            target_type = %payment.target_type,
            amount = payment.amount,
            "支付登记完成"
        );
        Ok(payment)
    }

    /// 删除支付, 并重算目标单据状态与订单工作流
    pub fn delete_payment(&self, payment_id: &str) -> ApiResult<()> {
        let payment = self
            .payment_repo
            .find_by_id(payment_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Payment (id={})", payment_id)))?;
        with_savepoint(&self.conn, "sp_delete_payment", || {
            self.payment_repo.delete(payment_id)?;
            self.reconcile_and_recompute(payment.target_type, &payment.target_id)
        })
    }

    /// 查询目标单据的支付列表
    pub fn list_payments(
        &self,
        target_type: FinanceTargetType,
        target_id: &str,
    ) -> ApiResult<Vec<Payment>> {
        Ok(self.payment_repo.find_by_target(target_type, target_id)?)
    }

    // ==========================================
    // 内部
    // ==========================================

    /// 对账并重算归属订单 (无订单的物流账单只对账)
    fn reconcile_and_recompute(
        &self,
        target_type: FinanceTargetType,
        target_id: &str,
    ) -> ApiResult<()> {
        let order_id = self
            .reconcile_engine
            .refresh_bill_status(target_type, target_id)?;
        if let Some(order_id) = order_id {
            self.workflow_engine.recompute(&order_id)?;
        }
        Ok(())
    }

    /// 支付引用保护: 目标单据仍有支付时拒绝删除
    fn guard_no_payments(
        &self,
        target_type: FinanceTargetType,
        target_id: &str,
    ) -> ApiResult<()> {
        let refs = self.payment_repo.count_for_target(target_type, target_id)?;
        if refs > 0 {
            return Err(ApiError::Conflict(format!(
                "{} (id={}) 存在 {} 笔支付, 需先删除支付",
                target_type, target_id, refs
            )));
        }
        Ok(())
    }
}
