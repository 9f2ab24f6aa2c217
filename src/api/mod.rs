// ==========================================
// 国际贸易订单流转系统 - API层
// ==========================================
// 职责: 校验输入 → 保护点内执行变更 → 链式触发对账/工作流重算
// 红线: 单据/支付变更与随后的重算在同一保护点内,
//       任一环节失败整体回滚
// ==========================================

pub mod error;
pub mod finance_api;
pub mod logistics_api;
pub mod order_api;
pub mod tariff_api;
pub mod validator;

pub use error::{ApiError, ApiResult};
pub use finance_api::FinanceApi;
pub use logistics_api::LogisticsApi;
pub use order_api::OrderApi;
pub use tariff_api::TariffApi;

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::warn;

use crate::db;

/// 在保护点内执行变更闭包
///
/// 成功则 RELEASE, 失败则 ROLLBACK 并原样返回错误;
/// 闭包内的仓储调用走同一共享连接, 天然落在保护点作用域内
pub(crate) fn with_savepoint<T>(
    conn: &Arc<Mutex<Connection>>,
    name: &str,
    f: impl FnOnce() -> ApiResult<T>,
) -> ApiResult<T> {
    db::begin_savepoint(conn, name)
        .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;
    match f() {
        Ok(value) => {
            db::release_savepoint(conn, name)
                .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = db::rollback_savepoint(conn, name) {
                warn!(savepoint = name, error = %rollback_err, "保护点回滚失败");
            }
            Err(err)
        }
    }
}
