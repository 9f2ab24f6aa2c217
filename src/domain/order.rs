// ==========================================
// 国际贸易订单流转系统 - 订单领域模型
// ==========================================
// 红线: workflow_status / delivered_at / closed_at 只能由工作流引擎写入
// 红线: closed_at 只设置一次,除非显式回退
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::WorkflowStatus;

// ==========================================
// Order - 贸易订单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,                 // 订单ID
    pub vpo_number: String,               // VPO编号 (客户原始采购单号, 唯一)
    pub customer_name: String,            // 客户名称
    pub customer_address: Option<String>, // 客户地址
    pub vendor_name: String,              // 供应商名称
    pub vendor_address: Option<String>,   // 供应商地址
    pub order_date: Option<NaiveDate>,    // 下单日期
    pub total_amount: f64,                // 订单总额 (客户侧)
    pub estimated_margin: f64,            // 预估毛利 (各明细行合计)
    pub estimated_margin_rate: f64,       // 预估毛利率
    pub workflow_status: WorkflowStatus,  // 工作流状态 (引擎推导)
    pub delivered_at: Option<NaiveDateTime>, // 送达时间 (MARK_DELIVERED 写入)
    pub closed_at: Option<NaiveDateTime>, // 关闭时间 (全部结清后一次性写入)
    pub customer_term_days: i32,          // 客户账期 (天)
    pub vendor_term_days: i32,            // 供应商账期 (天)
    pub logistics_term_days: i32,         // 物流商账期 (天)
    pub revision: i32,                    // 乐观锁: 工作流字段修订号
    pub created_at: NaiveDateTime,        // 创建时间
    pub updated_at: NaiveDateTime,        // 更新时间
}

impl Order {
    /// 判断订单是否已关闭
    pub fn is_closed(&self) -> bool {
        self.workflow_status == WorkflowStatus::Closed
    }

    /// 判断订单是否已送达
    pub fn is_delivered(&self) -> bool {
        self.delivered_at.is_some()
    }
}

// ==========================================
// OrderItem - 订单明细行
// ==========================================
// 约束: 随订单创建,随订单级联删除,不单独删除
// 注: duty_cost 仅作参考值,estimated_3pl 已含一半关税,
//     毛利计算不再单独扣减 duty_cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_id: String,                 // 明细ID
    pub order_id: String,                // 所属订单
    pub product_description: String,     // 产品描述
    pub collection: Option<String>,      // 系列
    pub material: Option<String>,        // 材质
    pub tariff_key: String,              // 归一化关税键 (产品分类键)
    pub origin_country: String,          // 推断原产国
    pub qty: f64,                        // 数量
    pub customer_unit_price: f64,        // 客户单价
    pub vendor_unit_price: f64,          // 供应商单价 (FOB)
    pub tariff_rate: f64,                // 关税税率
    pub duty_cost: f64,                  // 关税成本 (参考值)
    pub estimated_3pl_cost: f64,         // 预估3PL成本 (含一半关税)
    pub estimated_margin: f64,           // 预估毛利
    pub created_at: NaiveDateTime,       // 创建时间
}
