// ==========================================
// 国际贸易订单流转系统 - 毛利计算器
// ==========================================
// 职责: 订单明细行的成本/收入/毛利纯函数计算
// 红线: estimated_3pl 已折算一半关税, 毛利公式不再单独扣减
//       duty_cost (duty_cost 仅作参考值输出)
// 舍入: 金额2位小数, 比率4位小数, 四舍五入远离零,
//       只对返回值舍入, 中间项不舍入 (避免误差累积)
// ==========================================

use serde::{Deserialize, Serialize};

/// 3PL 成本中关税的折算系数
const DUTY_SHARE_IN_3PL: f64 = 0.5;
/// 3PL 成本中按件计费部分 (每单位数量)
const PER_UNIT_3PL_FEE: f64 = 0.10;

// ==========================================
// MarginBreakdown - 毛利分解结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginBreakdown {
    pub customer_revenue: f64, // 客户收入 = 客户单价 × 数量
    pub vendor_cost: f64,      // 供应商成本 (FOB) = 供应商单价 × 数量
    pub duty_cost: f64,        // 关税成本 = 供应商成本 × 税率 (参考值)
    pub estimated_3pl: f64,    // 预估3PL = 关税 × 0.5 + 0.10 × 数量
    pub estimated_margin: f64, // 预估毛利 = 收入 − 供应商成本 − 3PL
    pub margin_rate: f64,      // 毛利率 = 毛利 / 收入 (收入为0时取0)
}

/// 金额舍入: 2位小数, 四舍五入远离零
pub fn round_money(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// 比率舍入: 4位小数, 四舍五入远离零
pub fn round_rate(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// 负输入钳制到零
fn clamp_non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// 计算订单明细行的预估毛利分解
///
/// # 参数
/// - customer_unit_price: 客户单价
/// - vendor_unit_price: 供应商单价 (FOB)
/// - qty: 数量
/// - tariff_rate: 关税税率
///
/// 所有输入先钳制到 ≥0; 舍入只作用于返回值
pub fn calculate_estimated_margin(
    customer_unit_price: f64,
    vendor_unit_price: f64,
    qty: f64,
    tariff_rate: f64,
) -> MarginBreakdown {
    let customer_unit = clamp_non_negative(customer_unit_price);
    let vendor_unit = clamp_non_negative(vendor_unit_price);
    let qty = clamp_non_negative(qty);
    let rate = clamp_non_negative(tariff_rate);

    let customer_revenue = customer_unit * qty;
    let vendor_cost = vendor_unit * qty;
    let duty_cost = vendor_cost * rate;
    let estimated_3pl = duty_cost * DUTY_SHARE_IN_3PL + PER_UNIT_3PL_FEE * qty;
    let estimated_margin = customer_revenue - vendor_cost - estimated_3pl;
    let margin_rate = if customer_revenue == 0.0 {
        0.0
    } else {
        estimated_margin / customer_revenue
    };

    MarginBreakdown {
        customer_revenue: round_money(customer_revenue),
        vendor_cost: round_money(vendor_cost),
        duty_cost: round_money(duty_cost),
        estimated_3pl: round_money(estimated_3pl),
        estimated_margin: round_money(estimated_margin),
        margin_rate: round_rate(margin_rate),
    }
}
