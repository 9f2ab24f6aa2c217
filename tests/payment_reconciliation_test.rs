// ==========================================
// 支付对账测试
// ==========================================
// 职责: 验证支付驱动的单据状态推导、删除保护与工作流联动
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod payment_reconciliation_test {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use rusqlite::Connection;

    use trade_order_flow::api::finance_api::{
        CreateLogisticsBillInput, CreateOrderDocInput, CreatePaymentInput,
    };
    use trade_order_flow::api::logistics_api::CreateContainerInput;
    use trade_order_flow::api::{ApiError, FinanceApi, LogisticsApi, OrderApi};
    use trade_order_flow::domain::types::{
        FinanceDocStatus, FinanceTargetType, PaymentDirection, WorkflowStatus,
    };
    use trade_order_flow::engine::workflow::TriggerParams;
    use trade_order_flow::repository::{
        CommercialInvoiceRepository, LogisticsBillRepository, VendorBillRepository,
    };

    use crate::test_helpers::{create_test_db, open_shared_connection, sample_order_input};

    fn setup() -> (
        tempfile::NamedTempFile,
        Arc<Mutex<Connection>>,
        OrderApi,
        LogisticsApi,
        FinanceApi,
    ) {
        let (tmp, db_path) = create_test_db().unwrap();
        let conn = open_shared_connection(&db_path);
        (
            tmp,
            conn.clone(),
            OrderApi::from_connection(conn.clone()),
            LogisticsApi::from_connection(conn.clone()),
            FinanceApi::from_connection(conn),
        )
    }

    fn pay(amount: f64) -> CreatePaymentInput {
        CreatePaymentInput {
            target_type: FinanceTargetType::CommercialInvoice,
            target_id: String::new(),
            direction: PaymentDirection::In,
            amount,
            paid_date: None,
            note: None,
        }
    }

    #[test]
    fn test_invoice_status_progression() {
        let (_tmp, conn, order_api, _logistics, finance_api) = setup();
        let order = order_api.create_order(sample_order_input("VPO-PR-1")).unwrap().order;
        let invoice = finance_api
            .create_commercial_invoice(CreateOrderDocInput {
                order_id: order.order_id.clone(),
                doc_no: "CI-PR-1".to_string(),
                amount: 1000.0,
                currency: None,
                issue_date: None,
                due_date: None,
            })
            .unwrap();
        let invoice_repo = CommercialInvoiceRepository::from_connection(conn);

        // OPEN → PARTIAL → PAID, 多笔支付累加
        finance_api
            .create_payment(CreatePaymentInput {
                target_id: invoice.invoice_id.clone(),
                ..pay(400.0)
            })
            .unwrap();
        let current = invoice_repo.find_by_id(&invoice.invoice_id).unwrap().unwrap();
        assert_eq!(current.status, FinanceDocStatus::Partial);

        finance_api
            .create_payment(CreatePaymentInput {
                target_id: invoice.invoice_id.clone(),
                ..pay(600.0)
            })
            .unwrap();
        let current = invoice_repo.find_by_id(&invoice.invoice_id).unwrap().unwrap();
        assert_eq!(current.status, FinanceDocStatus::Paid);
    }

    #[test]
    fn test_overpayment_is_still_paid() {
        let (_tmp, conn, order_api, _logistics, finance_api) = setup();
        let order = order_api.create_order(sample_order_input("VPO-PR-2")).unwrap().order;
        let invoice = finance_api
            .create_commercial_invoice(CreateOrderDocInput {
                order_id: order.order_id.clone(),
                doc_no: "CI-PR-2".to_string(),
                amount: 500.0,
                currency: None,
                issue_date: None,
                due_date: None,
            })
            .unwrap();

        finance_api
            .create_payment(CreatePaymentInput {
                target_id: invoice.invoice_id.clone(),
                ..pay(750.0)
            })
            .unwrap();
        let invoice_repo = CommercialInvoiceRepository::from_connection(conn);
        let current = invoice_repo.find_by_id(&invoice.invoice_id).unwrap().unwrap();
        assert_eq!(current.status, FinanceDocStatus::Paid);
    }

    #[test]
    fn test_delete_payment_regresses_status_and_workflow() {
        let (_tmp, conn, order_api, _logistics, finance_api) = setup();
        let order = order_api.create_order(sample_order_input("VPO-PR-3")).unwrap().order;
        let invoice = finance_api
            .create_commercial_invoice(CreateOrderDocInput {
                order_id: order.order_id.clone(),
                doc_no: "CI-PR-3".to_string(),
                amount: 1000.0,
                currency: None,
                issue_date: None,
                due_date: None,
            })
            .unwrap();
        let payment = finance_api
            .create_payment(CreatePaymentInput {
                target_id: invoice.invoice_id.clone(),
                ..pay(1000.0)
            })
            .unwrap();

        // 全额结清 + 送达 → CLOSED
        order_api
            .trigger_workflow(&order.order_id, "MARK_DELIVERED", TriggerParams::default())
            .unwrap();
        let order_now = order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::Closed);
        let first_closed_at = order_now.closed_at.expect("关闭时间必须写入");

        // 删除支付 → 发票退回 OPEN, 订单退回 AR_AP_OPEN;
        // closed_at 只设置一次, 重算回退不清除 (仅显式回退动作清除)
        finance_api.delete_payment(&payment.payment_id).unwrap();
        let invoice_repo = CommercialInvoiceRepository::from_connection(conn);
        let current = invoice_repo.find_by_id(&invoice.invoice_id).unwrap().unwrap();
        assert_eq!(current.status, FinanceDocStatus::Open);
        let order_now = order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::ArApOpen);
        assert_eq!(order_now.closed_at, Some(first_closed_at));

        // 重新结清 → 回到 CLOSED, 保留最初的关闭时间
        finance_api
            .create_payment(CreatePaymentInput {
                target_id: invoice.invoice_id.clone(),
                ..pay(1000.0)
            })
            .unwrap();
        let order_now = order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::Closed);
        assert_eq!(order_now.closed_at, Some(first_closed_at));
    }

    #[test]
    fn test_delete_document_with_payments_is_rejected() {
        let (_tmp, conn, order_api, _logistics, finance_api) = setup();
        let order = order_api.create_order(sample_order_input("VPO-PR-4")).unwrap().order;
        let invoice = finance_api
            .create_commercial_invoice(CreateOrderDocInput {
                order_id: order.order_id.clone(),
                doc_no: "CI-PR-4".to_string(),
                amount: 300.0,
                currency: None,
                issue_date: None,
                due_date: None,
            })
            .unwrap();
        finance_api
            .create_payment(CreatePaymentInput {
                target_id: invoice.invoice_id.clone(),
                ..pay(100.0)
            })
            .unwrap();

        let err = finance_api.delete_commercial_invoice(&invoice.invoice_id).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        // 单据未被删除
        let invoice_repo = CommercialInvoiceRepository::from_connection(conn);
        assert!(invoice_repo.find_by_id(&invoice.invoice_id).unwrap().is_some());

        // 受支付引用的订单同样拒绝删除
        let err = order_api.delete_order(&order.order_id).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn test_payment_direction_must_match_target() {
        let (_tmp, _conn, order_api, _logistics, finance_api) = setup();
        let order = order_api.create_order(sample_order_input("VPO-PR-5")).unwrap().order;
        let invoice = finance_api
            .create_commercial_invoice(CreateOrderDocInput {
                order_id: order.order_id.clone(),
                doc_no: "CI-PR-5".to_string(),
                amount: 300.0,
                currency: None,
                issue_date: None,
                due_date: None,
            })
            .unwrap();

        // 发票是应收, OUT 方向拒绝
        let err = finance_api
            .create_payment(CreatePaymentInput {
                target_type: FinanceTargetType::CommercialInvoice,
                target_id: invoice.invoice_id.clone(),
                direction: PaymentDirection::Out,
                amount: 100.0,
                paid_date: None,
                note: None,
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::FieldValidation { .. }));
    }

    #[test]
    fn test_payment_to_missing_target_rolls_back() {
        let (_tmp, _conn, _order_api, _logistics, finance_api) = setup();

        let err = finance_api
            .create_payment(CreatePaymentInput {
                target_id: "no-such-invoice".to_string(),
                ..pay(100.0)
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        // 支付行随保护点回滚, 不悬挂
        let payments = finance_api
            .list_payments(FinanceTargetType::CommercialInvoice, "no-such-invoice")
            .unwrap();
        assert!(payments.is_empty());
    }

    #[test]
    fn test_orderless_logistics_bill_reconciles_without_workflow() {
        let (_tmp, conn, _order_api, logistics_api, finance_api) = setup();
        let container = logistics_api
            .create_container(CreateContainerInput {
                container_no: "HLXU3333333".to_string(),
                vessel_name: None,
                etd: None,
                eta: None,
            })
            .unwrap();
        let bill = finance_api
            .create_logistics_bill(CreateLogisticsBillInput {
                container_id: container.container_id.clone(),
                order_id: None,
                provider_name: Some("Flexport".to_string()),
                amount: 120.0,
                currency: None,
                issue_date: None,
                due_date: None,
            })
            .unwrap();

        finance_api
            .create_payment(CreatePaymentInput {
                target_type: FinanceTargetType::LogisticsBill,
                target_id: bill.bill_id.clone(),
                direction: PaymentDirection::Out,
                amount: 120.0,
                paid_date: None,
                note: None,
            })
            .unwrap();

        let bill_repo = LogisticsBillRepository::from_connection(conn);
        let current = bill_repo.find_by_id(&bill.bill_id).unwrap().unwrap();
        assert_eq!(current.status, FinanceDocStatus::Paid);
    }

    #[test]
    fn test_update_amount_on_paid_invoice_reopens_order() {
        let (_tmp, conn, order_api, _logistics, finance_api) = setup();
        let order = order_api.create_order(sample_order_input("VPO-PR-6")).unwrap().order;
        let outcome = order_api
            .trigger_workflow(&order.order_id, "START_TRANSIT", TriggerParams::default())
            .unwrap();
        let invoice_id = outcome
            .documents
            .iter()
            .find(|d| d.kind == "COMMERCIAL_INVOICE")
            .unwrap()
            .doc_id
            .clone();
        let bill_id = outcome
            .documents
            .iter()
            .find(|d| d.kind == "VENDOR_BILL")
            .unwrap()
            .doc_id
            .clone();
        finance_api
            .create_payment(CreatePaymentInput {
                target_id: invoice_id.clone(),
                ..pay(1000.0)
            })
            .unwrap();
        finance_api
            .create_payment(CreatePaymentInput {
                target_type: FinanceTargetType::VendorBill,
                target_id: bill_id,
                direction: PaymentDirection::Out,
                amount: 600.0,
                paid_date: None,
                note: None,
            })
            .unwrap();
        order_api
            .trigger_workflow(&order.order_id, "MARK_DELIVERED", TriggerParams::default())
            .unwrap();
        let order_now = order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::Closed);
        let closed_at = order_now.closed_at.unwrap();

        // 上调发票金额 → 已收 1000 < 1500 → PARTIAL, 订单重新敞口
        let due = Utc::now().date_naive();
        finance_api
            .update_commercial_invoice(&invoice_id, 1500.0, due)
            .unwrap();
        let invoice_repo = CommercialInvoiceRepository::from_connection(conn);
        let current = invoice_repo.find_by_id(&invoice_id).unwrap().unwrap();
        assert_eq!(current.status, FinanceDocStatus::Partial);
        assert_eq!(current.amount, 1500.0);
        assert_eq!(current.due_date, due);
        let order_now = order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::ArApOpen);

        // 下调回已收范围以内 → PAID, 订单重新关闭且保留原关闭时间
        finance_api
            .update_commercial_invoice(&invoice_id, 800.0, due)
            .unwrap();
        let current = invoice_repo.find_by_id(&invoice_id).unwrap().unwrap();
        assert_eq!(current.status, FinanceDocStatus::Paid);
        let order_now = order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::Closed);
        assert_eq!(order_now.closed_at, Some(closed_at));
    }

    #[test]
    fn test_update_vendor_and_logistics_bill_amounts_rereconcile() {
        let (_tmp, conn, order_api, logistics_api, finance_api) = setup();
        let order = order_api.create_order(sample_order_input("VPO-PR-7")).unwrap().order;
        let container = logistics_api
            .create_container(CreateContainerInput {
                container_no: "SUDU4444444".to_string(),
                vessel_name: None,
                etd: None,
                eta: None,
            })
            .unwrap();
        let due = Utc::now().date_naive();

        // 物流账单: 付清后上调金额 → PARTIAL
        let bill = finance_api
            .create_logistics_bill(CreateLogisticsBillInput {
                container_id: container.container_id.clone(),
                order_id: Some(order.order_id.clone()),
                provider_name: None,
                amount: 120.0,
                currency: None,
                issue_date: None,
                due_date: None,
            })
            .unwrap();
        finance_api
            .create_payment(CreatePaymentInput {
                target_type: FinanceTargetType::LogisticsBill,
                target_id: bill.bill_id.clone(),
                direction: PaymentDirection::Out,
                amount: 120.0,
                paid_date: None,
                note: None,
            })
            .unwrap();
        finance_api.update_logistics_bill(&bill.bill_id, 200.0, due).unwrap();
        let bill_repo = LogisticsBillRepository::from_connection(conn.clone());
        let current = bill_repo.find_by_id(&bill.bill_id).unwrap().unwrap();
        assert_eq!(current.status, FinanceDocStatus::Partial);

        // 供应商账单: 同样的对账链路
        let vb = finance_api
            .create_vendor_bill(CreateOrderDocInput {
                order_id: order.order_id.clone(),
                doc_no: "VB-PR-7".to_string(),
                amount: 600.0,
                currency: None,
                issue_date: None,
                due_date: None,
            })
            .unwrap();
        finance_api
            .create_payment(CreatePaymentInput {
                target_type: FinanceTargetType::VendorBill,
                target_id: vb.bill_id.clone(),
                direction: PaymentDirection::Out,
                amount: 600.0,
                paid_date: None,
                note: None,
            })
            .unwrap();
        finance_api.update_vendor_bill(&vb.bill_id, 900.0, due).unwrap();
        let vb_repo = VendorBillRepository::from_connection(conn);
        let current = vb_repo.find_by_id(&vb.bill_id).unwrap().unwrap();
        assert_eq!(current.status, FinanceDocStatus::Partial);
        assert_eq!(current.amount, 900.0);
    }

    #[test]
    fn test_update_container_recomputes_linked_orders() {
        let (_tmp, _conn, order_api, logistics_api, _finance_api) = setup();
        let order = order_api.create_order(sample_order_input("VPO-PR-8")).unwrap().order;
        let container = logistics_api
            .create_container(CreateContainerInput {
                container_no: "TGHU5555555".to_string(),
                vessel_name: None,
                etd: None,
                eta: None,
            })
            .unwrap();
        logistics_api
            .create_allocation(&order.order_id, &container.container_id, None)
            .unwrap();
        let before = order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(before.workflow_status, WorkflowStatus::PartiallyShipped);

        let updated = logistics_api
            .update_container(
                &container.container_id,
                Some("EVER ACE".to_string()),
                Some(Utc::now().date_naive()),
                None,
            )
            .unwrap();
        assert_eq!(updated.vessel_name.as_deref(), Some("EVER ACE"));
        assert!(updated.etd.is_some());

        // 基础字段不参与状态推导 → 联动重算是无副作用的, revision 不推高
        let after = order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(after.workflow_status, WorkflowStatus::PartiallyShipped);
        assert_eq!(after.revision, before.revision);
    }
}
