// ==========================================
// 国际贸易订单流转系统 - 集装箱领域模型
// ==========================================
// 说明: 集装箱独立生命周期,被托书/物流账单以可空外键引用
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::ContainerStatus;

// ==========================================
// Container - 集装箱
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub container_id: String,             // 集装箱ID
    pub container_no: String,             // 箱号 (唯一)
    pub vessel_name: Option<String>,      // 船名
    pub status: ContainerStatus,          // 状态 (PLANNED/IN_TRANSIT/ARRIVED)
    pub etd: Option<NaiveDate>,           // 预计离港
    pub atd: Option<NaiveDate>,           // 实际离港 (START_TRANSIT 写入)
    pub eta: Option<NaiveDate>,           // 预计到港
    pub ata: Option<NaiveDate>,           // 实际到港 (MARK_DELIVERED 写入)
    pub arrival_at_warehouse: Option<NaiveDate>, // 到仓日期
    pub created_at: NaiveDateTime,        // 创建时间
    pub updated_at: NaiveDateTime,        // 更新时间
}

impl Container {
    pub fn is_in_transit(&self) -> bool {
        self.status == ContainerStatus::InTransit
    }

    pub fn is_arrived(&self) -> bool {
        self.status == ContainerStatus::Arrived
    }
}

// ==========================================
// ContainerAllocation - 订单配柜记录
// ==========================================
// 用途: 订单 ↔ 集装箱 多对多关联; 仅配柜无托书时订单进入 PARTIALLY_SHIPPED
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerAllocation {
    pub allocation_id: String,     // 配柜ID
    pub order_id: String,          // 订单ID
    pub container_id: String,      // 集装箱ID
    pub qty: Option<f64>,          // 配柜数量 (可选,简单关联不做分摊)
    pub created_at: NaiveDateTime, // 创建时间
}
