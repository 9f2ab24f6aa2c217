// 开发辅助工具: 重置演示库并走完一条完整订单流
//
// 用法:
//   cargo run --bin seed_demo_db -- [db_path]
//
// 流程: 建单 → 配柜 → 启运(生成发票+账单) → 收款 → 送达 → 付款 → 关闭

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use trade_order_flow::api::finance_api::{CreateLogisticsBillInput, CreatePaymentInput};
use trade_order_flow::api::logistics_api::CreateContainerInput;
use trade_order_flow::api::order_api::{CreateOrderInput, CreateOrderItemInput};
use trade_order_flow::db::{init_schema, open_sqlite_connection};
use trade_order_flow::domain::types::{FinanceTargetType, PaymentDirection};
use trade_order_flow::engine::workflow::TriggerParams;
use trade_order_flow::{FinanceApi, LogisticsApi, OrderApi};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    trade_order_flow::logging::init();

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "trade_order_flow_demo.db".to_string());
    if Path::new(&db_path).exists() {
        fs::remove_file(&db_path)?;
        println!("已删除旧演示库: {}", db_path);
    }

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    let order_api = OrderApi::from_connection(conn.clone());
    let logistics_api = LogisticsApi::from_connection(conn.clone());
    let finance_api = FinanceApi::from_connection(conn);

    // 建单: 两条明细, 客户侧总额 1000
    let created = order_api.create_order(CreateOrderInput {
        vpo_number: "VPO-2024-001".to_string(),
        customer_name: "Nordic Living AB".to_string(),
        customer_address: Some("Stockholm, Sweden".to_string()),
        vendor_name: "Ningbo Homeware Co., Ltd.".to_string(),
        vendor_address: Some("Ningbo, Zhejiang, China".to_string()),
        order_date: None,
        customer_term_days: None,
        vendor_term_days: None,
        logistics_term_days: None,
        items: vec![
            CreateOrderItemInput {
                product_description: "Dining Chair".to_string(),
                collection: Some("Oslo".to_string()),
                material: Some("Steel".to_string()),
                qty: 80.0,
                customer_unit_price: 10.0,
                vendor_unit_price: 6.0,
            },
            CreateOrderItemInput {
                product_description: "Side Table".to_string(),
                collection: Some("Oslo".to_string()),
                material: Some("Wood".to_string()),
                qty: 20.0,
                customer_unit_price: 10.0,
                vendor_unit_price: 5.5,
            },
        ],
    })?;
    let order_id = created.order.order_id.clone();
    println!(
        "订单创建: vpo={} total={} margin={} status={}",
        created.order.vpo_number,
        created.order.total_amount,
        created.order.estimated_margin,
        created.order.workflow_status
    );

    // 配柜
    let container = logistics_api.create_container(CreateContainerInput {
        container_no: "MSKU1234567".to_string(),
        vessel_name: Some("MAERSK ESSEX".to_string()),
        etd: None,
        eta: None,
    })?;
    logistics_api.create_allocation(&order_id, &container.container_id, Some(100.0))?;
    println!("配柜完成: container_no={}", container.container_no);

    // 启运: 自动生成托书 + 商业发票 + 供应商账单
    let outcome = order_api.trigger_workflow(&order_id, "START_TRANSIT", TriggerParams::default())?;
    println!("启运单据:\n{}", serde_json::to_string_pretty(&outcome.documents)?);
    let order = order_api.get_order(&order_id)?.order;
    println!("启运完成: status={}", order.workflow_status);

    // 物流账单 (按柜, 挂订单)
    let logistics_bill = finance_api.create_logistics_bill(CreateLogisticsBillInput {
        container_id: container.container_id.clone(),
        order_id: Some(order_id.clone()),
        provider_name: Some("Flexport".to_string()),
        amount: 120.0,
        currency: None,
        issue_date: None,
        due_date: None,
    })?;

    // 客户全额回款
    let invoice_id = outcome
        .documents
        .iter()
        .find(|d| d.kind == "COMMERCIAL_INVOICE")
        .map(|d| d.doc_id.clone())
        .expect("启运必定生成商业发票");
    finance_api.create_payment(CreatePaymentInput {
        target_type: FinanceTargetType::CommercialInvoice,
        target_id: invoice_id,
        direction: PaymentDirection::In,
        amount: order.total_amount,
        paid_date: None,
        note: Some("客户 T/T 全额回款".to_string()),
    })?;
    println!("收款完成: status={}", order_api.get_order(&order_id)?.order.workflow_status);

    // 送达
    order_api.trigger_workflow(&order_id, "MARK_DELIVERED", TriggerParams::default())?;
    println!("送达完成: status={}", order_api.get_order(&order_id)?.order.workflow_status);

    // 付清供应商账单与物流账单 → 订单关闭
    let vendor_bill_id = outcome
        .documents
        .iter()
        .find(|d| d.kind == "VENDOR_BILL")
        .map(|d| d.doc_id.clone())
        .expect("启运必定生成供应商账单");
    let vendor_bill_amount = created
        .items
        .iter()
        .map(|i| i.qty * i.vendor_unit_price)
        .sum::<f64>();
    finance_api.create_payment(CreatePaymentInput {
        target_type: FinanceTargetType::VendorBill,
        target_id: vendor_bill_id,
        direction: PaymentDirection::Out,
        amount: vendor_bill_amount,
        paid_date: None,
        note: None,
    })?;
    finance_api.create_payment(CreatePaymentInput {
        target_type: FinanceTargetType::LogisticsBill,
        target_id: logistics_bill.bill_id,
        direction: PaymentDirection::Out,
        amount: logistics_bill.amount,
        paid_date: None,
        note: None,
    })?;

    let order = order_api.get_order(&order_id)?.order;
    println!(
        "全部结清: status={} closed_at={:?}",
        order.workflow_status, order.closed_at
    );
    println!("演示库已生成: {}", db_path);
    Ok(())
}
