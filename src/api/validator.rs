// ==========================================
// 国际贸易订单流转系统 - 输入校验器
// ==========================================
// 职责: API层的字段级输入校验, 写入前拒绝非法数据
// 红线: 校验失败的错误必须带字段名与显式原因
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::{FinanceTargetType, PaymentDirection};

/// 非空字符串校验 (trim 后)
pub fn require_non_empty(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::FieldValidation {
            field: field.to_string(),
            message: "不能为空".to_string(),
        });
    }
    Ok(())
}

/// 正数校验 (> 0 且有限)
pub fn require_positive(field: &str, value: f64) -> ApiResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ApiError::FieldValidation {
            field: field.to_string(),
            message: format!("必须为正数, 实际: {}", value),
        });
    }
    Ok(())
}

/// 非负数校验 (≥ 0 且有限)
pub fn require_non_negative(field: &str, value: f64) -> ApiResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ApiError::FieldValidation {
            field: field.to_string(),
            message: format!("不能为负数, 实际: {}", value),
        });
    }
    Ok(())
}

/// 税率范围校验 (0 ≤ rate ≤ 1)
pub fn require_rate_range(field: &str, rate: f64) -> ApiResult<()> {
    if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
        return Err(ApiError::FieldValidation {
            field: field.to_string(),
            message: format!("税率必须在 [0, 1] 区间, 实际: {}", rate),
        });
    }
    Ok(())
}

/// 账期天数校验 (≥ 0)
pub fn require_term_days(field: &str, days: i32) -> ApiResult<()> {
    if days < 0 {
        return Err(ApiError::FieldValidation {
            field: field.to_string(),
            message: format!("账期天数不能为负, 实际: {}", days),
        });
    }
    Ok(())
}

/// 支付方向与单据类型匹配校验
///
/// 商业发票为应收 (IN), 供应商/物流账单为应付 (OUT)
pub fn require_direction_match(
    target_type: FinanceTargetType,
    direction: PaymentDirection,
) -> ApiResult<()> {
    let expected = target_type.expected_direction();
    if direction != expected {
        return Err(ApiError::FieldValidation {
            field: "direction".to_string(),
            message: format!(
                "{} 的支付方向必须为 {}, 实际: {}",
                target_type, expected, direction
            ),
        });
    }
    Ok(())
}
