// ==========================================
// 国际贸易订单流转系统 - 引擎层
// ==========================================
// - margin:    毛利测算 (纯函数)
// - tariff:    关税键归一化与税率解析
// - reconcile: 支付对账 (单据状态推导)
// - workflow:  工作流状态推导与动作触发
// ==========================================

pub mod margin;
pub mod reconcile;
pub mod tariff;
pub mod workflow;

pub use margin::{calculate_estimated_margin, MarginBreakdown};
pub use reconcile::{derive_finance_status, ReconcileEngine};
pub use tariff::{infer_origin_country, normalize_tariff_key, TariffResolver};
pub use workflow::{
    derive_workflow_status, TriggerDocument, TriggerOutcome, TriggerParams, WorkflowEngine,
};
