// ==========================================
// 国际贸易订单流转系统 - 财务单据领域模型
// ==========================================
// 三类财务单据:
// - CommercialInvoice: 商业发票 (AR, 必须挂订单)
// - VendorBill:        供应商账单 (AP, 必须挂订单)
// - LogisticsBill:     物流账单 (AP, 挂集装箱, 可选挂订单;
//                      唯一允许在订单删除后存续的单据)
// 红线: status 是 Σ(payments) 与 amount 的纯函数
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::{FinanceDocStatus, FinanceTargetType};

// ==========================================
// CommercialInvoice - 商业发票 (应收)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommercialInvoice {
    pub invoice_id: String,            // 发票ID
    pub order_id: String,              // 所属订单 (非空)
    pub doc_no: String,                // 发票编号 (唯一)
    pub amount: f64,                   // 金额
    pub currency: String,              // 币种
    pub issue_date: NaiveDate,         // 开票日期
    pub due_date: NaiveDate,           // 到期日期 (开票日 + 客户账期)
    pub status: FinanceDocStatus,      // 状态 (对账引擎推导)
    pub created_at: NaiveDateTime,     // 创建时间
    pub updated_at: NaiveDateTime,     // 更新时间
}

// ==========================================
// VendorBill - 供应商账单 (应付)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorBill {
    pub bill_id: String,               // 账单ID
    pub order_id: String,              // 所属订单 (非空)
    pub doc_no: String,                // 账单编号 (唯一)
    pub amount: f64,                   // 金额 (Σ qty × 供应商单价)
    pub currency: String,              // 币种
    pub issue_date: NaiveDate,         // 开单日期
    pub due_date: NaiveDate,           // 到期日期 (开单日 + 供应商账期)
    pub status: FinanceDocStatus,      // 状态 (对账引擎推导)
    pub created_at: NaiveDateTime,     // 创建时间
    pub updated_at: NaiveDateTime,     // 更新时间
}

// ==========================================
// LogisticsBill - 物流账单 (应付, 按柜)
// ==========================================
// 说明: container_id 创建时必填(业务校验), schema 层可空以支持
//       集装箱删除时置空; order_id 可空, 订单删除时置空
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticsBill {
    pub bill_id: String,               // 账单ID
    pub container_id: Option<String>,  // 关联集装箱
    pub order_id: Option<String>,      // 关联订单 (可空)
    pub provider_name: Option<String>, // 物流商名称
    pub amount: f64,                   // 金额
    pub currency: String,              // 币种
    pub issue_date: NaiveDate,         // 开单日期
    pub due_date: NaiveDate,           // 到期日期 (开单日 + 物流商账期)
    pub status: FinanceDocStatus,      // 状态 (对账引擎推导)
    pub created_at: NaiveDateTime,     // 创建时间
    pub updated_at: NaiveDateTime,     // 更新时间
}

// ==========================================
// FinanceDocSummary - 财务单据快照 (推导用)
// ==========================================
// 用途: 工作流引擎 Recompute 只关心单据的存在性与状态,
//       用统一快照屏蔽三类单据的差异
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceDocSummary {
    pub target_type: FinanceTargetType, // 单据类型
    pub target_id: String,              // 单据ID
    pub amount: f64,                    // 金额
    pub status: FinanceDocStatus,       // 当前状态
}

impl FinanceDocSummary {
    pub fn is_paid(&self) -> bool {
        self.status == FinanceDocStatus::Paid
    }
}
