// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、标准订单输入等
// ==========================================

use std::error::Error;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tempfile::NamedTempFile;

use trade_order_flow::api::order_api::{CreateOrderInput, CreateOrderItemInput};
use trade_order_flow::db::{init_schema, open_sqlite_connection};

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件 (需要保持存活)
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接 (外键/busy_timeout 已统一配置)
pub fn open_shared_connection(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(
        Mutex::new(open_sqlite_connection(db_path).expect("打开测试数据库失败")),
    )
}

/// 标准测试订单输入
///
/// 单明细: 100 件 × 客户单价 10 / 供应商单价 6,
/// 客户侧总额 1000, 供应商侧 600; 供应商在宁波 → 原产国 CN
#[allow(dead_code)]
pub fn sample_order_input(vpo_number: &str) -> CreateOrderInput {
    CreateOrderInput {
        vpo_number: vpo_number.to_string(),
        customer_name: "Nordic Living AB".to_string(),
        customer_address: Some("Stockholm, Sweden".to_string()),
        vendor_name: "Ningbo Homeware Co., Ltd.".to_string(),
        vendor_address: Some("Ningbo, Zhejiang, China".to_string()),
        order_date: None,
        customer_term_days: None,
        vendor_term_days: None,
        logistics_term_days: None,
        items: vec![CreateOrderItemInput {
            product_description: "Dining Chair".to_string(),
            collection: Some("Oslo".to_string()),
            material: Some("Steel".to_string()),
            qty: 100.0,
            customer_unit_price: 10.0,
            vendor_unit_price: 6.0,
        }],
    }
}
