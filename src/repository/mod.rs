// ==========================================
// 国际贸易订单流转系统 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod container_repo;
pub mod error;
pub mod finance_doc_repo;
pub mod order_repo;
pub mod payment_repo;
pub mod shipping_doc_repo;
pub mod tariff_repo;

// 重导出核心仓储
pub use container_repo::{ContainerAllocationRepository, ContainerRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use finance_doc_repo::{
    CommercialInvoiceRepository, FinanceDocSummaryRepository, LogisticsBillRepository,
    VendorBillRepository,
};
pub use order_repo::{OrderItemRepository, OrderRepository};
pub use payment_repo::PaymentRepository;
pub use shipping_doc_repo::ShippingDocRepository;
pub use tariff_repo::TariffRateRepository;
