// ==========================================
// 工作流触发测试
// ==========================================
// 职责: 验证触发动作的单据副作用、幂等性、集装箱联动与回退
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod workflow_engine_test {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;

    use trade_order_flow::api::finance_api::CreatePaymentInput;
    use trade_order_flow::api::logistics_api::CreateContainerInput;
    use trade_order_flow::api::{ApiError, FinanceApi, LogisticsApi, OrderApi};
    use trade_order_flow::domain::types::{
        ContainerStatus, FinanceTargetType, PaymentDirection, ShippingDocStatus, WorkflowStatus,
    };
    use trade_order_flow::engine::workflow::TriggerParams;
    use trade_order_flow::repository::{
        CommercialInvoiceRepository, ShippingDocRepository, VendorBillRepository,
    };

    use crate::test_helpers::{create_test_db, open_shared_connection, sample_order_input};

    struct TestEnv {
        conn: Arc<Mutex<Connection>>,
        order_api: OrderApi,
        logistics_api: LogisticsApi,
        finance_api: FinanceApi,
    }

    fn setup() -> (tempfile::NamedTempFile, TestEnv) {
        let (tmp, db_path) = create_test_db().unwrap();
        let conn = open_shared_connection(&db_path);
        let env = TestEnv {
            order_api: OrderApi::from_connection(conn.clone()),
            logistics_api: LogisticsApi::from_connection(conn.clone()),
            finance_api: FinanceApi::from_connection(conn.clone()),
            conn,
        };
        (tmp, env)
    }

    #[test]
    fn test_start_transit_generates_all_documents() {
        let (_tmp, env) = setup();
        let order = env.order_api.create_order(sample_order_input("VPO-WF-1")).unwrap().order;

        let outcome = env
            .order_api
            .trigger_workflow(&order.order_id, "START_TRANSIT", TriggerParams::default())
            .unwrap();
        assert!(outcome.created);
        assert!(outcome.updated);
        assert_eq!(outcome.documents.len(), 3);

        let invoice_repo = CommercialInvoiceRepository::from_connection(env.conn.clone());
        let bill_repo = VendorBillRepository::from_connection(env.conn.clone());
        let shipping_repo = ShippingDocRepository::from_connection(env.conn.clone());

        // 发票金额 = 订单总额, 账单金额 = Σ 数量 × 供应商单价
        let invoices = invoice_repo.find_by_order(&order.order_id).unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].amount, 1000.0);
        let bills = bill_repo.find_by_order(&order.order_id).unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].amount, 600.0);

        // 自动托书为已发出状态
        let docs = shipping_repo.find_by_order(&order.order_id).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].status, ShippingDocStatus::Issued);
        assert!(docs[0].doc_no.starts_with("SD-"));

        let order_now = env.order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::InTransit);

        // 到期日按账期推算
        assert_eq!(
            invoices[0].due_date,
            invoices[0].issue_date + chrono::Duration::days(i64::from(order.customer_term_days))
        );
        assert_eq!(
            bills[0].due_date,
            bills[0].issue_date + chrono::Duration::days(i64::from(order.vendor_term_days))
        );
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let (_tmp, env) = setup();
        let order = env.order_api.create_order(sample_order_input("VPO-WF-2")).unwrap().order;

        env.order_api
            .trigger_workflow(&order.order_id, "START_TRANSIT", TriggerParams::default())
            .unwrap();
        let second = env
            .order_api
            .trigger_workflow(&order.order_id, "START_TRANSIT", TriggerParams::default())
            .unwrap();

        // 重复触发: created=false, 不生成重复单据
        assert!(!second.created);
        assert!(second.documents.iter().all(|d| !d.created));

        let invoice_repo = CommercialInvoiceRepository::from_connection(env.conn.clone());
        let bill_repo = VendorBillRepository::from_connection(env.conn.clone());
        let shipping_repo = ShippingDocRepository::from_connection(env.conn.clone());
        assert_eq!(invoice_repo.find_by_order(&order.order_id).unwrap().len(), 1);
        assert_eq!(bill_repo.find_by_order(&order.order_id).unwrap().len(), 1);
        assert_eq!(shipping_repo.find_by_order(&order.order_id).unwrap().len(), 1);
    }

    #[test]
    fn test_generate_shipping_doc_only() {
        let (_tmp, env) = setup();
        let order = env.order_api.create_order(sample_order_input("VPO-WF-3")).unwrap().order;

        let outcome = env
            .order_api
            .trigger_workflow(
                &order.order_id,
                "GENERATE_SHIPPING_DOC",
                TriggerParams::default(),
            )
            .unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.documents[0].kind, "SHIPPING_DOCUMENT");

        let order_now = env.order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::ShippingDocSent);
    }

    #[test]
    fn test_container_lifecycle_through_triggers() {
        let (_tmp, env) = setup();
        let order = env.order_api.create_order(sample_order_input("VPO-WF-4")).unwrap().order;
        let container = env
            .logistics_api
            .create_container(CreateContainerInput {
                container_no: "OOLU1111111".to_string(),
                vessel_name: Some("EVER GIVEN".to_string()),
                etd: None,
                eta: None,
            })
            .unwrap();
        env.logistics_api
            .create_allocation(&order.order_id, &container.container_id, None)
            .unwrap();

        // 启运: 集装箱随配柜解析, 置 IN_TRANSIT 并补 atd
        env.order_api
            .trigger_workflow(&order.order_id, "START_TRANSIT", TriggerParams::default())
            .unwrap();
        let c = env.logistics_api.get_container(&container.container_id).unwrap();
        assert_eq!(c.status, ContainerStatus::InTransit);
        assert!(c.atd.is_some());
        assert!(c.ata.is_none());

        // 送达: 置 ARRIVED 并补 ata/入仓
        env.order_api
            .trigger_workflow(&order.order_id, "MARK_DELIVERED", TriggerParams::default())
            .unwrap();
        let c = env.logistics_api.get_container(&container.container_id).unwrap();
        assert_eq!(c.status, ContainerStatus::Arrived);
        assert!(c.ata.is_some());
        assert!(c.arrival_at_warehouse.is_some());

        let order_now = env.order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::ArApOpen);
        assert!(order_now.delivered_at.is_some());

        // 回退送达: 清 delivered_at, 集装箱退回 IN_TRANSIT
        env.order_api
            .trigger_workflow(&order.order_id, "UNDO_MARK_DELIVERED", TriggerParams::default())
            .unwrap();
        let c = env.logistics_api.get_container(&container.container_id).unwrap();
        assert_eq!(c.status, ContainerStatus::InTransit);
        assert!(c.ata.is_none());
        let order_now = env.order_api.get_order(&order.order_id).unwrap().order;
        assert!(order_now.delivered_at.is_none());
        // 财务单据仍在 → 推导回 IN_TRANSIT 而非硬编码回退
        assert_eq!(order_now.workflow_status, WorkflowStatus::InTransit);

        // 回退启运: 集装箱退回 PLANNED, 财务单据保留
        env.order_api
            .trigger_workflow(&order.order_id, "UNDO_START_TRANSIT", TriggerParams::default())
            .unwrap();
        let c = env.logistics_api.get_container(&container.container_id).unwrap();
        assert_eq!(c.status, ContainerStatus::Planned);
        assert!(c.atd.is_none());
        let order_now = env.order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::InTransit);
    }

    #[test]
    fn test_mark_delivered_on_fully_paid_order_closes_directly() {
        let (_tmp, env) = setup();
        let order = env.order_api.create_order(sample_order_input("VPO-WF-5")).unwrap().order;
        let outcome = env
            .order_api
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

        env.finance_api
            .create_payment(CreatePaymentInput {
                target_type: FinanceTargetType::CommercialInvoice,
                target_id: invoice_id,
                direction: PaymentDirection::In,
                amount: 1000.0,
                paid_date: None,
                note: None,
            })
            .unwrap();
        env.finance_api
            .create_payment(CreatePaymentInput {
                target_type: FinanceTargetType::VendorBill,
                target_id: bill_id,
                direction: PaymentDirection::Out,
                amount: 600.0,
                paid_date: None,
                note: None,
            })
            .unwrap();

        // 未送达时即使全额结清也只是 IN_TRANSIT
        let order_now = env.order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::InTransit);

        // 送达动作的"目标"是 AR_AP_OPEN, 但重算依据实际单据直达 CLOSED
        env.order_api
            .trigger_workflow(&order.order_id, "MARK_DELIVERED", TriggerParams::default())
            .unwrap();
        let order_now = env.order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::Closed);
        let first_closed_at = order_now.closed_at.expect("关闭时间必须写入");

        // closed_at 只设置一次, 重复重算不刷新
        env.order_api.recompute_workflow_status(&order.order_id).unwrap();
        let order_now = env.order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.closed_at, Some(first_closed_at));

        // 显式回退送达才清除 closed_at
        env.order_api
            .trigger_workflow(&order.order_id, "UNDO_MARK_DELIVERED", TriggerParams::default())
            .unwrap();
        let order_now = env.order_api.get_order(&order.order_id).unwrap().order;
        assert!(order_now.delivered_at.is_none());
        assert!(order_now.closed_at.is_none());
        assert_eq!(order_now.workflow_status, WorkflowStatus::InTransit);
    }

    #[test]
    fn test_undo_shipping_doc_deletes_generated_doc() {
        let (_tmp, env) = setup();
        let order = env.order_api.create_order(sample_order_input("VPO-WF-6")).unwrap().order;
        env.order_api
            .trigger_workflow(
                &order.order_id,
                "GENERATE_SHIPPING_DOC",
                TriggerParams::default(),
            )
            .unwrap();

        env.order_api
            .trigger_workflow(&order.order_id, "UNDO_SHIPPING_DOC", TriggerParams::default())
            .unwrap();

        let shipping_repo = ShippingDocRepository::from_connection(env.conn.clone());
        assert!(shipping_repo.find_by_order(&order.order_id).unwrap().is_empty());
        let order_now = env.order_api.get_order(&order.order_id).unwrap().order;
        assert_eq!(order_now.workflow_status, WorkflowStatus::PoUploaded);
    }

    #[test]
    fn test_trigger_rejects_unknown_action_and_missing_order() {
        let (_tmp, env) = setup();
        let order = env.order_api.create_order(sample_order_input("VPO-WF-7")).unwrap().order;

        let err = env
            .order_api
            .trigger_workflow(&order.order_id, "TELEPORT", TriggerParams::default())
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        let err = env
            .order_api
            .trigger_workflow("no-such-order", "START_TRANSIT", TriggerParams::default())
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_trigger_with_explicit_container_param() {
        let (_tmp, env) = setup();
        let order = env.order_api.create_order(sample_order_input("VPO-WF-8")).unwrap().order;
        let container = env
            .logistics_api
            .create_container(CreateContainerInput {
                container_no: "CMAU2222222".to_string(),
                vessel_name: None,
                etd: None,
                eta: None,
            })
            .unwrap();

        // 未配柜也可显式指定集装箱
        env.order_api
            .trigger_workflow(
                &order.order_id,
                "START_TRANSIT",
                TriggerParams {
                    container_id: Some(container.container_id.clone()),
                    delivered_at: None,
                },
            )
            .unwrap();
        let c = env.logistics_api.get_container(&container.container_id).unwrap();
        assert_eq!(c.status, ContainerStatus::InTransit);

        // 指定不存在的集装箱 → NotFound
        let err = env
            .order_api
            .trigger_workflow(
                &order.order_id,
                "MARK_DELIVERED",
                TriggerParams {
                    container_id: Some("no-such-container".to_string()),
                    delivered_at: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
