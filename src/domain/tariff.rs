// ==========================================
// 国际贸易订单流转系统 - 关税税率领域模型
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::RateSource;

// ==========================================
// TariffRate - 关税税率表行
// ==========================================
// 主键: tariff_key (归一化产品分类键)
// source=auto: 解析时自动注册; source=manual: 用户编辑过
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffRate {
    pub tariff_key: String,        // 归一化关税键
    pub origin_country: String,    // 原产国
    pub rate: f64,                 // 税率 (0.0 ~ 1.0)
    pub source: RateSource,        // 来源 (auto/manual)
    pub notes: Option<String>,     // 备注
    pub updated_at: NaiveDateTime, // 更新时间
}
