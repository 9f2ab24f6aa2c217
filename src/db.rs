// ==========================================
// 国际贸易订单流转系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为 (外键必须开启,
//   否则订单级联删除/置空语义失效)
// - 统一 busy_timeout, 减少并发写入时的偶发 busy 错误
// - schema 在代码内建表, 保证测试库与生产库结构一致
// ==========================================

use rusqlite::{Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout (毫秒)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明:
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version (若表不存在则返回 None)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema (幂等)
///
/// 外键动作与业务约束对齐:
/// - 订单删除: order_item / commercial_invoice / vendor_bill /
///   shipping_document / container_allocation 级联删除;
///   logistics_bill.order_id 置空 (物流账单随柜存续)
/// - 集装箱删除: shipping_document.container_id / logistics_bill.container_id 置空;
///   container_allocation 级联删除
/// - payment 为多态引用 (target_type, target_id), 无外键,
///   删除保护在 API 层实施
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS orders (
            order_id TEXT PRIMARY KEY,
            vpo_number TEXT NOT NULL UNIQUE,
            customer_name TEXT NOT NULL,
            customer_address TEXT,
            vendor_name TEXT NOT NULL,
            vendor_address TEXT,
            order_date TEXT,
            total_amount REAL NOT NULL DEFAULT 0,
            estimated_margin REAL NOT NULL DEFAULT 0,
            estimated_margin_rate REAL NOT NULL DEFAULT 0,
            workflow_status TEXT NOT NULL DEFAULT 'PO_UPLOADED',
            delivered_at TEXT,
            closed_at TEXT,
            customer_term_days INTEGER NOT NULL DEFAULT 30,
            vendor_term_days INTEGER NOT NULL DEFAULT 30,
            logistics_term_days INTEGER NOT NULL DEFAULT 45,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS order_item (
            item_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(order_id) ON DELETE CASCADE,
            product_description TEXT NOT NULL,
            collection TEXT,
            material TEXT,
            tariff_key TEXT NOT NULL,
            origin_country TEXT NOT NULL,
            qty REAL NOT NULL DEFAULT 0,
            customer_unit_price REAL NOT NULL DEFAULT 0,
            vendor_unit_price REAL NOT NULL DEFAULT 0,
            tariff_rate REAL NOT NULL DEFAULT 0,
            duty_cost REAL NOT NULL DEFAULT 0,
            estimated_3pl_cost REAL NOT NULL DEFAULT 0,
            estimated_margin REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_order_item_order ON order_item(order_id);

        CREATE TABLE IF NOT EXISTS container (
            container_id TEXT PRIMARY KEY,
            container_no TEXT NOT NULL UNIQUE,
            vessel_name TEXT,
            status TEXT NOT NULL DEFAULT 'PLANNED',
            etd TEXT,
            atd TEXT,
            eta TEXT,
            ata TEXT,
            arrival_at_warehouse TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS container_allocation (
            allocation_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(order_id) ON DELETE CASCADE,
            container_id TEXT NOT NULL REFERENCES container(container_id) ON DELETE CASCADE,
            qty REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(order_id, container_id)
        );
        CREATE INDEX IF NOT EXISTS idx_allocation_container ON container_allocation(container_id);

        CREATE TABLE IF NOT EXISTS shipping_document (
            doc_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(order_id) ON DELETE CASCADE,
            container_id TEXT REFERENCES container(container_id) ON DELETE SET NULL,
            doc_no TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            issued_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_shipping_doc_order ON shipping_document(order_id);
        CREATE INDEX IF NOT EXISTS idx_shipping_doc_container ON shipping_document(container_id);

        CREATE TABLE IF NOT EXISTS commercial_invoice (
            invoice_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(order_id) ON DELETE CASCADE,
            doc_no TEXT NOT NULL UNIQUE,
            amount REAL NOT NULL DEFAULT 0,
            currency TEXT NOT NULL DEFAULT 'USD',
            issue_date TEXT NOT NULL,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'OPEN',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_invoice_order ON commercial_invoice(order_id);

        CREATE TABLE IF NOT EXISTS vendor_bill (
            bill_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(order_id) ON DELETE CASCADE,
            doc_no TEXT NOT NULL UNIQUE,
            amount REAL NOT NULL DEFAULT 0,
            currency TEXT NOT NULL DEFAULT 'USD',
            issue_date TEXT NOT NULL,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'OPEN',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_vendor_bill_order ON vendor_bill(order_id);

        CREATE TABLE IF NOT EXISTS logistics_bill (
            bill_id TEXT PRIMARY KEY,
            container_id TEXT REFERENCES container(container_id) ON DELETE SET NULL,
            order_id TEXT REFERENCES orders(order_id) ON DELETE SET NULL,
            provider_name TEXT,
            amount REAL NOT NULL DEFAULT 0,
            currency TEXT NOT NULL DEFAULT 'USD',
            issue_date TEXT NOT NULL,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'OPEN',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_logistics_bill_order ON logistics_bill(order_id);
        CREATE INDEX IF NOT EXISTS idx_logistics_bill_container ON logistics_bill(container_id);

        CREATE TABLE IF NOT EXISTS payment (
            payment_id TEXT PRIMARY KEY,
            target_type TEXT NOT NULL,
            target_id TEXT NOT NULL,
            direction TEXT NOT NULL,
            amount REAL NOT NULL DEFAULT 0,
            paid_date TEXT NOT NULL,
            note TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_payment_target ON payment(target_type, target_id);

        CREATE TABLE IF NOT EXISTS tariff_rate (
            tariff_key TEXT PRIMARY KEY,
            origin_country TEXT NOT NULL,
            rate REAL NOT NULL DEFAULT 0,
            source TEXT NOT NULL DEFAULT 'auto',
            notes TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

// ==========================================
// 变更保护点 (Savepoint)
// ==========================================
// 用途: API 层的一次变更 = 单据写入 + 对账 + 工作流重算,
//       任一步失败必须整体回滚 (不留部分状态)
// 说明: savepoint 是连接级状态, 各仓储按次加锁访问同一连接,
//       因此这里只在开启/提交/回滚时短暂持锁, 不与仓储重入冲突

/// 开启保护点
pub fn begin_savepoint(conn: &Arc<Mutex<Connection>>, name: &str) -> rusqlite::Result<()> {
    let guard = conn.lock().map_err(|_| rusqlite::Error::InvalidQuery)?;
    guard.execute_batch(&format!("SAVEPOINT {};", name))
}

/// 提交保护点
pub fn release_savepoint(conn: &Arc<Mutex<Connection>>, name: &str) -> rusqlite::Result<()> {
    let guard = conn.lock().map_err(|_| rusqlite::Error::InvalidQuery)?;
    guard.execute_batch(&format!("RELEASE SAVEPOINT {};", name))
}

/// 回滚并释放保护点
pub fn rollback_savepoint(conn: &Arc<Mutex<Connection>>, name: &str) -> rusqlite::Result<()> {
    let guard = conn.lock().map_err(|_| rusqlite::Error::InvalidQuery)?;
    guard.execute_batch(&format!(
        "ROLLBACK TO SAVEPOINT {0}; RELEASE SAVEPOINT {0};",
        name
    ))
}
