// ==========================================
// 国际贸易订单流转系统 - 支付领域模型
// ==========================================
// 红线: 存在支付引用的财务单据禁止删除 (先删支付)
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::{FinanceTargetType, PaymentDirection};

// ==========================================
// Payment - 支付记录
// ==========================================
// 通过 (target_type, target_id) 指向唯一一张财务单据,
// 无数据库外键 (多态引用), 删除保护在 API 层实施
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: String,              // 支付ID
    pub target_type: FinanceTargetType,  // 目标单据类型
    pub target_id: String,               // 目标单据ID
    pub direction: PaymentDirection,     // 方向 (AR收款IN / AP付款OUT)
    pub amount: f64,                     // 金额
    pub paid_date: NaiveDate,            // 支付日期
    pub note: Option<String>,            // 备注
    pub created_at: NaiveDateTime,       // 创建时间
}
