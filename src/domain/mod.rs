// ==========================================
// 国际贸易订单流转系统 - 领域层
// ==========================================
// 职责: 实体与类型定义,不含持久化与业务规则
// ==========================================

pub mod container;
pub mod finance;
pub mod order;
pub mod payment;
pub mod shipping;
pub mod tariff;
pub mod types;

// 重导出核心实体
pub use container::{Container, ContainerAllocation};
pub use finance::{CommercialInvoice, FinanceDocSummary, LogisticsBill, VendorBill};
pub use order::{Order, OrderItem};
pub use payment::Payment;
pub use shipping::ShippingDocument;
pub use tariff::TariffRate;
