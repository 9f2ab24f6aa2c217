// ==========================================
// 国际贸易订单流转系统 - 关税税率数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 税率表随解析自动增长 (source=auto),
//       用户编辑后标记 source=manual, 自动注册不得覆盖人工值
// ==========================================

use crate::domain::tariff::TariffRate;
use crate::domain::types::RateSource;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// TariffRateRepository - 关税税率仓储
// ==========================================

pub struct TariffRateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TariffRateRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> SqliteResult<TariffRate> {
        Ok(TariffRate {
            tariff_key: row.get(0)?,
            origin_country: row.get(1)?,
            rate: row.get(2)?,
            source: RateSource::parse(&row.get::<_, String>(3)?),
            notes: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    const SELECT_COLS: &'static str =
        "tariff_key, origin_country, rate, source, notes, updated_at";

    /// 按归一化键查询
    pub fn find_by_key(&self, tariff_key: &str) -> RepositoryResult<Option<TariffRate>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM tariff_rate WHERE tariff_key = ?1",
            Self::SELECT_COLS
        );
        let rate = conn
            .query_row(&sql, params![tariff_key], Self::map_row)
            .optional()?;
        Ok(rate)
    }

    /// 插入或覆盖税率行 (人工编辑走这里, source 由调用方给定)
    pub fn upsert(&self, rate: &TariffRate) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO tariff_rate (tariff_key, origin_country, rate, source, notes, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(tariff_key) DO UPDATE SET
                origin_country = excluded.origin_country,
                rate = excluded.rate,
                source = excluded.source,
                notes = excluded.notes,
                updated_at = excluded.updated_at
            "#,
            params![
                rate.tariff_key,
                rate.origin_country,
                rate.rate,
                rate.source.as_str(),
                rate.notes,
                rate.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 仅当键不存在时插入 (自动注册用, 不覆盖已有行)
    pub fn insert_if_absent(&self, rate: &TariffRate) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            INSERT OR IGNORE INTO tariff_rate
                (tariff_key, origin_country, rate, source, notes, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                rate.tariff_key,
                rate.origin_country,
                rate.rate,
                rate.source.as_str(),
                rate.notes,
                rate.updated_at,
            ],
        )?;
        Ok(rows > 0)
    }

    /// 查询全部税率行
    pub fn list_all(&self) -> RepositoryResult<Vec<TariffRate>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM tariff_rate ORDER BY tariff_key",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rates = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<TariffRate>>>()?;
        Ok(rates)
    }

    /// 删除税率行
    pub fn delete(&self, tariff_key: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM tariff_rate WHERE tariff_key = ?1",
            params![tariff_key],
        )?;
        Ok(rows > 0)
    }
}
