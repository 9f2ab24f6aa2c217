// ==========================================
// 国际贸易订单流转系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value, scope_id='global')
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    /// 默认原产国 (供应商无法推断时的兜底)
    pub const DEFAULT_ORIGIN_COUNTRY: &str = "tariff.default_origin_country";
    /// 兜底关税税率 (关税键未映射且无产品类默认时)
    pub const DEFAULT_TARIFF_RATE: &str = "tariff.default_rate";
    /// 默认客户账期 (天)
    pub const DEFAULT_CUSTOMER_TERM_DAYS: &str = "finance.default_customer_term_days";
    /// 默认供应商账期 (天)
    pub const DEFAULT_VENDOR_TERM_DAYS: &str = "finance.default_vendor_term_days";
    /// 默认物流商账期 (天)
    pub const DEFAULT_LOGISTICS_TERM_DAYS: &str = "finance.default_logistics_term_days";
}

/// 内置默认值 (config_kv 无对应行时使用)
pub const BUILTIN_DEFAULT_ORIGIN_COUNTRY: &str = "CN";
pub const BUILTIN_DEFAULT_TARIFF_RATE: f64 = 0.0;
pub const BUILTIN_DEFAULT_CUSTOMER_TERM_DAYS: i32 = 30;
pub const BUILTIN_DEFAULT_VENDOR_TERM_DAYS: i32 = 30;
pub const BUILTIN_DEFAULT_LOGISTICS_TERM_DAYS: i32 = 45;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值 (scope_id='global')
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入配置值 (scope_id='global', 覆盖)
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 默认原产国
    pub fn default_origin_country(&self) -> RepositoryResult<String> {
        Ok(self
            .get_config_value(config_keys::DEFAULT_ORIGIN_COUNTRY)?
            .unwrap_or_else(|| BUILTIN_DEFAULT_ORIGIN_COUNTRY.to_string()))
    }

    /// 兜底关税税率 (解析失败回落内置默认)
    pub fn default_tariff_rate(&self) -> RepositoryResult<f64> {
        Ok(self
            .get_config_value(config_keys::DEFAULT_TARIFF_RATE)?
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(BUILTIN_DEFAULT_TARIFF_RATE))
    }

    /// 默认客户账期
    pub fn default_customer_term_days(&self) -> RepositoryResult<i32> {
        Ok(self
            .get_config_value(config_keys::DEFAULT_CUSTOMER_TERM_DAYS)?
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(BUILTIN_DEFAULT_CUSTOMER_TERM_DAYS))
    }

    /// 默认供应商账期
    pub fn default_vendor_term_days(&self) -> RepositoryResult<i32> {
        Ok(self
            .get_config_value(config_keys::DEFAULT_VENDOR_TERM_DAYS)?
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(BUILTIN_DEFAULT_VENDOR_TERM_DAYS))
    }

    /// 默认物流商账期
    pub fn default_logistics_term_days(&self) -> RepositoryResult<i32> {
        Ok(self
            .get_config_value(config_keys::DEFAULT_LOGISTICS_TERM_DAYS)?
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(BUILTIN_DEFAULT_LOGISTICS_TERM_DAYS))
    }
}
