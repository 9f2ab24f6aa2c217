// ==========================================
// 国际贸易订单流转系统 - 核心库
// ==========================================
// 系统定位: 订单工作流与财务对账核心
// 技术栈: Rust + SQLite
// 分层: domain → repository → engine → api
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施 (连接初始化/PRAGMA 统一/建表)
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ContainerStatus, FinanceDocStatus, FinanceTargetType, PaymentDirection, RateSource,
    ShippingDocStatus, WorkflowAction, WorkflowStatus,
};

// 领域实体
pub use domain::{
    CommercialInvoice, Container, ContainerAllocation, FinanceDocSummary, LogisticsBill, Order,
    OrderItem, Payment, ShippingDocument, TariffRate, VendorBill,
};

// 引擎
pub use engine::{
    calculate_estimated_margin, derive_finance_status, derive_workflow_status, MarginBreakdown,
    ReconcileEngine, TariffResolver, TriggerOutcome, TriggerParams, WorkflowEngine,
};

// API
pub use api::{ApiError, ApiResult, FinanceApi, LogisticsApi, OrderApi, TariffApi};

/// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 系统名称
pub const APP_NAME: &str = "trade-order-flow";
