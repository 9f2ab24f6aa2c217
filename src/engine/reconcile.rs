// ==========================================
// 国际贸易订单流转系统 - 支付对账引擎
// ==========================================
// 职责: 支付变更后重算目标单据的已收/已付与状态
// 红线: 单据状态是 Σ(payments) 与 amount 的纯函数:
//       paid ≥ amount → PAID; 0 < paid < amount → PARTIAL; 否则 OPEN
// ==========================================

use std::sync::Arc;

use tracing::debug;

use crate::domain::types::{FinanceDocStatus, FinanceTargetType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{
    CommercialInvoiceRepository, LogisticsBillRepository, PaymentRepository, VendorBillRepository,
};

/// 已收/已付金额 vs 单据金额 → 单据状态 (纯函数)
///
/// PAID iff paid ≥ amount; PARTIAL iff 0 < paid < amount; 否则 OPEN
/// (单据创建时业务校验保证 amount > 0)
pub fn derive_finance_status(paid_amount: f64, doc_amount: f64) -> FinanceDocStatus {
    if paid_amount > 0.0 && paid_amount >= doc_amount {
        FinanceDocStatus::Paid
    } else if paid_amount > 0.0 {
        FinanceDocStatus::Partial
    } else {
        FinanceDocStatus::Open
    }
}

// ==========================================
// ReconcileEngine - 对账引擎
// ==========================================

pub struct ReconcileEngine {
    payment_repo: Arc<PaymentRepository>,
    invoice_repo: Arc<CommercialInvoiceRepository>,
    vendor_bill_repo: Arc<VendorBillRepository>,
    logistics_bill_repo: Arc<LogisticsBillRepository>,
}

impl ReconcileEngine {
    pub fn new(
        payment_repo: Arc<PaymentRepository>,
        invoice_repo: Arc<CommercialInvoiceRepository>,
        vendor_bill_repo: Arc<VendorBillRepository>,
        logistics_bill_repo: Arc<LogisticsBillRepository>,
    ) -> Self {
        Self {
            payment_repo,
            invoice_repo,
            vendor_bill_repo,
            logistics_bill_repo,
        }
    }

    /// 重算目标单据状态, 返回其归属订单ID (供调用方触发工作流重算)
    ///
    /// # 返回
    /// - Ok(Some(order_id)): 单据存在且挂在订单上
    /// - Ok(None): 单据存在但无订单 (仅限物流账单)
    /// - Err(NotFound): 单据不存在
    pub fn refresh_bill_status(
        &self,
        target_type: FinanceTargetType,
        target_id: &str,
    ) -> RepositoryResult<Option<String>> {
        let paid = self.payment_repo.sum_for_target(target_type, target_id)?;

        let (amount, order_id) = match target_type {
            FinanceTargetType::CommercialInvoice => {
                let invoice = self.invoice_repo.find_by_id(target_id)?.ok_or_else(|| {
                    RepositoryError::NotFound {
                        entity: "CommercialInvoice".to_string(),
                        id: target_id.to_string(),
                    }
                })?;
                (invoice.amount, Some(invoice.order_id))
            }
            FinanceTargetType::VendorBill => {
                let bill = self.vendor_bill_repo.find_by_id(target_id)?.ok_or_else(|| {
                    RepositoryError::NotFound {
                        entity: "VendorBill".to_string(),
                        id: target_id.to_string(),
                    }
                })?;
                (bill.amount, Some(bill.order_id))
            }
            FinanceTargetType::LogisticsBill => {
                let bill = self
                    .logistics_bill_repo
                    .find_by_id(target_id)?
                    .ok_or_else(|| RepositoryError::NotFound {
                        entity: "LogisticsBill".to_string(),
                        id: target_id.to_string(),
                    })?;
                (bill.amount, bill.order_id)
            }
        };

        let status = derive_finance_status(paid, amount);
        debug!(
            target_type = %target_type,
            target_id,
            paid,
            amount,
            status = %status,
            "对账: 重算单据状态"
        );

        match target_type {
            FinanceTargetType::CommercialInvoice => {
                self.invoice_repo.update_status(target_id, status)?
            }
            FinanceTargetType::VendorBill => {
                self.vendor_bill_repo.update_status(target_id, status)?
            }
            FinanceTargetType::LogisticsBill => {
                self.logistics_bill_repo.update_status(target_id, status)?
            }
        }

        Ok(order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_finance_status() {
        assert_eq!(derive_finance_status(0.0, 100.0), FinanceDocStatus::Open);
        assert_eq!(derive_finance_status(40.0, 100.0), FinanceDocStatus::Partial);
        assert_eq!(derive_finance_status(100.0, 100.0), FinanceDocStatus::Paid);
        assert_eq!(derive_finance_status(150.0, 100.0), FinanceDocStatus::Paid);
    }

    #[test]
    fn test_derive_zero_amount_doc() {
        // 金额为0: 无支付 OPEN, 有支付 PAID
        assert_eq!(derive_finance_status(0.0, 0.0), FinanceDocStatus::Open);
        assert_eq!(derive_finance_status(1.0, 0.0), FinanceDocStatus::Paid);
    }
}
