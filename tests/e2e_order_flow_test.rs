// ==========================================
// 订单全流程端到端测试
// ==========================================
// 职责: 建单 → 启运 → 收款 → 送达 → 付款 → 关闭 的完整链路
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod e2e_order_flow_test {
    use trade_order_flow::api::finance_api::CreatePaymentInput;
    use trade_order_flow::api::{FinanceApi, OrderApi};
    use trade_order_flow::domain::types::{
        FinanceDocStatus, FinanceTargetType, PaymentDirection, WorkflowStatus,
    };
    use trade_order_flow::engine::workflow::TriggerParams;
    use trade_order_flow::repository::{CommercialInvoiceRepository, VendorBillRepository};

    use crate::test_helpers::{create_test_db, open_shared_connection, sample_order_input};

    #[test]
    fn test_full_order_lifecycle() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let conn = open_shared_connection(&db_path);
        let order_api = OrderApi::from_connection(conn.clone());
        let finance_api = FinanceApi::from_connection(conn.clone());
        let invoice_repo = CommercialInvoiceRepository::from_connection(conn.clone());
        let bill_repo = VendorBillRepository::from_connection(conn);

        // 建单: 100 × $10 = 1000, 钢制品 (类默认税率 0.25), 宁波供应商 → CN
        let created = order_api.create_order(sample_order_input("VPO-E2E-1")).unwrap();
        let order = created.order;
        assert_eq!(order.workflow_status, WorkflowStatus::PoUploaded);
        assert_eq!(order.total_amount, 1000.0);
        let item = &created.items[0];
        assert_eq!(item.tariff_key, "dining chair|oslo|steel");
        assert_eq!(item.origin_country, "CN");
        assert_eq!(item.tariff_rate, 0.25);
        // duty = 600 × 0.25 = 150; 3PL = 75 + 10 = 85; margin = 1000 − 600 − 85
        assert_eq!(item.duty_cost, 150.0);
        assert_eq!(item.estimated_3pl_cost, 85.0);
        assert_eq!(item.estimated_margin, 315.0);
        assert_eq!(order.estimated_margin, 315.0);
        assert_eq!(order.estimated_margin_rate, 0.315);

        // 启运 → 一张发票 (1000, OPEN) + 一张供应商账单, 订单在途
        let outcome = order_api
            .trigger_workflow(&order.order_id, "START_TRANSIT", TriggerParams::default())
            .unwrap();
        assert!(outcome.created);
        let invoices = invoice_repo.find_by_order(&order.order_id).unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].amount, 1000.0);
        assert_eq!(invoices[0].status, FinanceDocStatus::Open);
        let bills = bill_repo.find_by_order(&order.order_id).unwrap();
        assert_eq!(bills.len(), 1);
        let order_now = order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::InTransit);

        // 客户全额回款 → 发票 PAID, 账单未清 → 订单仍在途
        finance_api
            .create_payment(CreatePaymentInput {
                target_type: FinanceTargetType::CommercialInvoice,
                target_id: invoices[0].invoice_id.clone(),
                direction: PaymentDirection::In,
                amount: 1000.0,
                paid_date: None,
                note: None,
            })
            .unwrap();
        let invoice_now = invoice_repo.find_by_id(&invoices[0].invoice_id).unwrap().unwrap();
        assert_eq!(invoice_now.status, FinanceDocStatus::Paid);
        let order_now = order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::InTransit);

        // 送达 → 供应商账单未清 → 应收应付敞口
        order_api
            .trigger_workflow(&order.order_id, "MARK_DELIVERED", TriggerParams::default())
            .unwrap();
        let order_now = order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::ArApOpen);
        assert!(order_now.delivered_at.is_some());
        assert!(order_now.closed_at.is_none());

        // 付清供应商账单 → 全部结清 → 关闭, closed_at 写入
        finance_api
            .create_payment(CreatePaymentInput {
                target_type: FinanceTargetType::VendorBill,
                target_id: bills[0].bill_id.clone(),
                direction: PaymentDirection::Out,
                amount: bills[0].amount,
                paid_date: None,
                note: None,
            })
            .unwrap();
        let order_now = order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::Closed);
        assert!(order_now.closed_at.is_some());
    }
}
