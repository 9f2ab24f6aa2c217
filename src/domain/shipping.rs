// ==========================================
// 国际贸易订单流转系统 - 托书领域模型
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::ShippingDocStatus;

// ==========================================
// ShippingDocument - 托书 (Shipping Order / 订舱单)
// ==========================================
// 约束: doc_no 全局唯一; container_id 可空, 集装箱删除时置空
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingDocument {
    pub doc_id: String,                  // 托书ID
    pub order_id: String,                // 所属订单
    pub container_id: Option<String>,    // 关联集装箱 (可空)
    pub doc_no: String,                  // 托书编号 (唯一)
    pub status: ShippingDocStatus,       // 状态 (DRAFT/ISSUED)
    pub issued_at: Option<NaiveDateTime>,// 发出时间
    pub created_at: NaiveDateTime,       // 创建时间
}

impl ShippingDocument {
    pub fn is_issued(&self) -> bool {
        self.status == ShippingDocStatus::Issued
    }
}
