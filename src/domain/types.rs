// ==========================================
// 国际贸易订单流转系统 - 领域类型定义
// ==========================================
// 职责: 工作流/单据/支付相关的类型安全枚举
// 约束: 序列化格式与数据库存储一致 (SCREAMING_SNAKE_CASE)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工作流状态 (Workflow Status)
// ==========================================
// 红线: 工作流状态永远由单据状态推导,不作为独立事实来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    PoUploaded,       // PO已录入
    ShippingDocSent,  // 托书已发出
    PartiallyShipped, // 部分配柜 (仅配柜、无托书时的过渡态)
    InTransit,        // 在途
    ArApOpen,         // 应收应付挂账
    Closed,           // 已关闭
}

impl WorkflowStatus {
    /// 数据库存储值
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::PoUploaded => "PO_UPLOADED",
            WorkflowStatus::ShippingDocSent => "SHIPPING_DOC_SENT",
            WorkflowStatus::PartiallyShipped => "PARTIALLY_SHIPPED",
            WorkflowStatus::InTransit => "IN_TRANSIT",
            WorkflowStatus::ArApOpen => "AR_AP_OPEN",
            WorkflowStatus::Closed => "CLOSED",
        }
    }

    /// 从数据库存储值解析 (未知值回落到 PO_UPLOADED,避免读取失败)
    pub fn parse(s: &str) -> Self {
        match s {
            "SHIPPING_DOC_SENT" => WorkflowStatus::ShippingDocSent,
            "PARTIALLY_SHIPPED" => WorkflowStatus::PartiallyShipped,
            "IN_TRANSIT" => WorkflowStatus::InTransit,
            "AR_AP_OPEN" => WorkflowStatus::ArApOpen,
            "CLOSED" => WorkflowStatus::Closed,
            _ => WorkflowStatus::PoUploaded,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 集装箱状态 (Container Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerStatus {
    Planned,   // 计划中
    InTransit, // 在途
    Arrived,   // 已到港
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Planned => "PLANNED",
            ContainerStatus::InTransit => "IN_TRANSIT",
            ContainerStatus::Arrived => "ARRIVED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "IN_TRANSIT" => ContainerStatus::InTransit,
            "ARRIVED" => ContainerStatus::Arrived,
            _ => ContainerStatus::Planned,
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 托书状态 (Shipping Document Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingDocStatus {
    Draft,  // 草稿
    Issued, // 已发出
}

impl ShippingDocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingDocStatus::Draft => "DRAFT",
            ShippingDocStatus::Issued => "ISSUED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ISSUED" => ShippingDocStatus::Issued,
            _ => ShippingDocStatus::Draft,
        }
    }
}

impl fmt::Display for ShippingDocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 财务单据状态 (Finance Document Status)
// ==========================================
// 红线: 状态是 Σ(payments) 与 amount 的纯函数,由对账引擎推导
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinanceDocStatus {
    Open,    // 未收/未付
    Partial, // 部分收付
    Paid,    // 已结清
}

impl FinanceDocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinanceDocStatus::Open => "OPEN",
            FinanceDocStatus::Partial => "PARTIAL",
            FinanceDocStatus::Paid => "PAID",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "PARTIAL" => FinanceDocStatus::Partial,
            "PAID" => FinanceDocStatus::Paid,
            _ => FinanceDocStatus::Open,
        }
    }
}

impl fmt::Display for FinanceDocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 支付目标类型 (Finance Target Type)
// ==========================================
// 支付通过 (target_type, target_id) 指向唯一一张财务单据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinanceTargetType {
    CommercialInvoice, // 商业发票 (应收)
    VendorBill,        // 供应商账单 (应付)
    LogisticsBill,     // 物流账单 (应付,按柜)
}

impl FinanceTargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinanceTargetType::CommercialInvoice => "COMMERCIAL_INVOICE",
            FinanceTargetType::VendorBill => "VENDOR_BILL",
            FinanceTargetType::LogisticsBill => "LOGISTICS_BILL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COMMERCIAL_INVOICE" => Some(FinanceTargetType::CommercialInvoice),
            "VENDOR_BILL" => Some(FinanceTargetType::VendorBill),
            "LOGISTICS_BILL" => Some(FinanceTargetType::LogisticsBill),
            _ => None,
        }
    }

    /// 该单据类型合法的支付方向 (AR收款IN / AP付款OUT)
    pub fn expected_direction(&self) -> PaymentDirection {
        match self {
            FinanceTargetType::CommercialInvoice => PaymentDirection::In,
            FinanceTargetType::VendorBill | FinanceTargetType::LogisticsBill => {
                PaymentDirection::Out
            }
        }
    }
}

impl fmt::Display for FinanceTargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 支付方向 (Payment Direction)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentDirection {
    In,  // 收款 (客户 → 我方)
    Out, // 付款 (我方 → 供应商/物流商)
}

impl PaymentDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentDirection::In => "IN",
            PaymentDirection::Out => "OUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(PaymentDirection::In),
            "OUT" => Some(PaymentDirection::Out),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 关税税率来源 (Rate Source)
// ==========================================
// auto: 解析时自动注册的默认值; manual: 用户编辑过
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    Auto,
    Manual,
}

impl RateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::Auto => "auto",
            RateSource::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "manual" => RateSource::Manual,
            _ => RateSource::Auto,
        }
    }
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 工作流动作 (Workflow Action)
// ==========================================
// 显式触发的状态机边: 正向3个 + 回退3个
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowAction {
    GenerateShippingDoc, // 生成托书
    StartTransit,        // 启运 (生成发票+账单)
    MarkDelivered,       // 标记送达
    UndoShippingDoc,     // 回退托书
    UndoStartTransit,    // 回退启运
    UndoMarkDelivered,   // 回退送达
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowAction::GenerateShippingDoc => "GENERATE_SHIPPING_DOC",
            WorkflowAction::StartTransit => "START_TRANSIT",
            WorkflowAction::MarkDelivered => "MARK_DELIVERED",
            WorkflowAction::UndoShippingDoc => "UNDO_SHIPPING_DOC",
            WorkflowAction::UndoStartTransit => "UNDO_START_TRANSIT",
            WorkflowAction::UndoMarkDelivered => "UNDO_MARK_DELIVERED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GENERATE_SHIPPING_DOC" => Some(WorkflowAction::GenerateShippingDoc),
            "START_TRANSIT" => Some(WorkflowAction::StartTransit),
            "MARK_DELIVERED" => Some(WorkflowAction::MarkDelivered),
            "UNDO_SHIPPING_DOC" => Some(WorkflowAction::UndoShippingDoc),
            "UNDO_START_TRANSIT" => Some(WorkflowAction::UndoStartTransit),
            "UNDO_MARK_DELIVERED" => Some(WorkflowAction::UndoMarkDelivered),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_status_roundtrip() {
        let all = [
            WorkflowStatus::PoUploaded,
            WorkflowStatus::ShippingDocSent,
            WorkflowStatus::PartiallyShipped,
            WorkflowStatus::InTransit,
            WorkflowStatus::ArApOpen,
            WorkflowStatus::Closed,
        ];
        for s in all {
            assert_eq!(WorkflowStatus::parse(s.as_str()), s);
        }
        // 未知值回落
        assert_eq!(WorkflowStatus::parse("GARBAGE"), WorkflowStatus::PoUploaded);
    }

    #[test]
    fn test_status_serde_matches_storage_form() {
        // serde 序列化与库内存储值保持同一套字符串
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::ArApOpen).unwrap(),
            "\"AR_AP_OPEN\""
        );
        assert_eq!(
            serde_json::to_string(&FinanceTargetType::LogisticsBill).unwrap(),
            "\"LOGISTICS_BILL\""
        );
        assert_eq!(serde_json::to_string(&PaymentDirection::Out).unwrap(), "\"OUT\"");
        let parsed: WorkflowStatus = serde_json::from_str("\"IN_TRANSIT\"").unwrap();
        assert_eq!(parsed, WorkflowStatus::InTransit);
        assert_eq!(parsed.as_str(), "IN_TRANSIT");
    }

    #[test]
    fn test_target_type_expected_direction() {
        assert_eq!(
            FinanceTargetType::CommercialInvoice.expected_direction(),
            PaymentDirection::In
        );
        assert_eq!(
            FinanceTargetType::VendorBill.expected_direction(),
            PaymentDirection::Out
        );
        assert_eq!(
            FinanceTargetType::LogisticsBill.expected_direction(),
            PaymentDirection::Out
        );
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(
            WorkflowAction::parse("START_TRANSIT"),
            Some(WorkflowAction::StartTransit)
        );
        assert_eq!(WorkflowAction::parse("NOPE"), None);
    }
}
