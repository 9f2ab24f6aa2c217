// ==========================================
// 国际贸易订单流转系统 - 关税 API
// ==========================================
// 职责: 税率解析查询与人工维护
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::Serialize;

use crate::api::error::ApiResult;
use crate::api::validator;
use crate::config::ConfigManager;
use crate::domain::tariff::TariffRate;
use crate::engine::tariff::{infer_origin_country, normalize_tariff_key, TariffResolver};
use crate::repository::TariffRateRepository;

/// 税率解析结果 (含归一化键与推断原产国, 便于前端回显)
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRate {
    pub tariff_key: String,
    pub origin_country: String,
    pub rate: f64,
}

pub struct TariffApi {
    tariff_repo: Arc<TariffRateRepository>,
    resolver: TariffResolver,
    config: Arc<ConfigManager>,
}

impl TariffApi {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        let tariff_repo = Arc::new(TariffRateRepository::from_connection(conn.clone()));
        let config = Arc::new(ConfigManager::from_connection(conn));
        TariffApi {
            resolver: TariffResolver::new(tariff_repo.clone(), config.clone()),
            tariff_repo,
            config,
        }
    }

    /// 按产品信息解析税率
    ///
    /// origin_country 缺省时从供应商信息推断
    pub fn resolve_tariff_rate(
        &self,
        product_description: &str,
        collection: Option<&str>,
        material: Option<&str>,
        vendor_name: &str,
        vendor_address: Option<&str>,
        origin_country: Option<&str>,
    ) -> ApiResult<ResolvedRate> {
        validator::require_non_empty("product_description", product_description)?;
        let tariff_key = normalize_tariff_key(product_description, collection, material);
        let origin_country = match origin_country {
            Some(c) => c.to_string(),
            None => {
                let default_origin = self.config.default_origin_country()?;
                infer_origin_country(vendor_name, vendor_address, &default_origin)
            }
        };
        let rate = self.resolver.resolve_rate(&tariff_key, &origin_country)?;
        Ok(ResolvedRate {
            tariff_key,
            origin_country,
            rate,
        })
    }

    /// 人工维护税率 (source=manual, 覆盖已有行)
    pub fn upsert_tariff_rate(
        &self,
        tariff_key: &str,
        origin_country: &str,
        rate: f64,
        notes: Option<String>,
    ) -> ApiResult<TariffRate> {
        validator::require_non_empty("tariff_key", tariff_key)?;
        validator::require_non_empty("origin_country", origin_country)?;
        validator::require_rate_range("rate", rate)?;
        Ok(self
            .resolver
            .upsert_manual_rate(tariff_key, origin_country, rate, notes)?)
    }

    /// 税率表全量列表
    pub fn list_rates(&self) -> ApiResult<Vec<TariffRate>> {
        Ok(self.tariff_repo.list_all()?)
    }
}
