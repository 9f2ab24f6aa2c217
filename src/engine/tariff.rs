// ==========================================
// 国际贸易订单流转系统 - 关税解析引擎
// ==========================================
// 职责: 产品描述 → 归一化关税键 → 税率
// 约束: 解析永不失败 —— 未映射的键回落到产品类默认或兜底税率,
//       并自动注册 (source=auto), 使税率表覆盖所有见过的产品类
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::config::ConfigManager;
use crate::domain::tariff::TariffRate;
use crate::domain::types::RateSource;
use crate::repository::error::RepositoryResult;
use crate::repository::TariffRateRepository;

/// 关税键分段分隔符
const KEY_DELIMITER: &str = "|";

/// 产品类默认税率表 (材质关键词 → 税率)
/// 顺序即匹配优先级
const CLASS_DEFAULT_RATES: &[(&str, f64)] = &[
    ("steel", 0.25),
    ("不锈钢", 0.25),
    ("aluminum", 0.25),
    ("铝", 0.25),
    ("ceramic", 0.15),
    ("陶瓷", 0.15),
    ("glass", 0.12),
    ("玻璃", 0.12),
    ("wood", 0.08),
    ("木", 0.08),
    ("plastic", 0.06),
    ("塑料", 0.06),
    ("textile", 0.10),
    ("纺织", 0.10),
];

/// 原产国推断关键词表 (供应商名称/地址子串 → 国家码)
const ORIGIN_KEYWORDS: &[(&str, &str)] = &[
    ("china", "CN"),
    ("中国", "CN"),
    ("shenzhen", "CN"),
    ("guangzhou", "CN"),
    ("ningbo", "CN"),
    ("vietnam", "VN"),
    ("越南", "VN"),
    ("india", "IN"),
    ("印度", "IN"),
    ("thailand", "TH"),
    ("泰国", "TH"),
    ("indonesia", "ID"),
    ("malaysia", "MY"),
];

// ==========================================
// 纯函数: 键归一化与原产国推断
// ==========================================

/// 从产品描述/系列/材质生成归一化关税键
///
/// 规则: 各段 lowercase + trim, 以 "|" 连接; 空段保留位置
pub fn normalize_tariff_key(
    description: &str,
    collection: Option<&str>,
    material: Option<&str>,
) -> String {
    let norm = |s: &str| s.trim().to_lowercase();
    [
        norm(description),
        norm(collection.unwrap_or("")),
        norm(material.unwrap_or("")),
    ]
    .join(KEY_DELIMITER)
}

/// 从供应商名称/地址推断原产国 (子串启发式)
///
/// 未命中任何关键词时返回 default_country
pub fn infer_origin_country(
    vendor_name: &str,
    vendor_address: Option<&str>,
    default_country: &str,
) -> String {
    let haystack = format!(
        "{} {}",
        vendor_name.to_lowercase(),
        vendor_address.unwrap_or("").to_lowercase()
    );
    for (keyword, country) in ORIGIN_KEYWORDS {
        if haystack.contains(keyword) {
            return (*country).to_string();
        }
    }
    default_country.to_string()
}

/// 按产品类关键词匹配默认税率
fn class_default_rate(tariff_key: &str) -> Option<f64> {
    for (keyword, rate) in CLASS_DEFAULT_RATES {
        if tariff_key.contains(keyword) {
            return Some(*rate);
        }
    }
    None
}

// ==========================================
// TariffResolver - 关税解析引擎
// ==========================================

pub struct TariffResolver {
    tariff_repo: Arc<TariffRateRepository>,
    config: Arc<ConfigManager>,
}

impl TariffResolver {
    pub fn new(tariff_repo: Arc<TariffRateRepository>, config: Arc<ConfigManager>) -> Self {
        Self {
            tariff_repo,
            config,
        }
    }

    /// 解析税率 (永不失败)
    ///
    /// 解析顺序:
    /// 1. 税率表精确匹配归一化键
    /// 2. 产品类关键词默认税率
    /// 3. 配置兜底税率 (默认 0.0)
    ///
    /// 未映射的键自动注册 (source=auto), 不覆盖已有行
    pub fn resolve_rate(&self, tariff_key: &str, origin_country: &str) -> RepositoryResult<f64> {
        if let Some(row) = self.tariff_repo.find_by_key(tariff_key)? {
            debug!(tariff_key, rate = row.rate, source = %row.source, "关税键精确命中");
            return Ok(row.rate);
        }

        let rate = match class_default_rate(tariff_key) {
            Some(r) => r,
            None => self.config.default_tariff_rate()?,
        };

        // 自动注册, 让税率表逐步覆盖所有见过的产品类
        let registered = self.tariff_repo.insert_if_absent(&TariffRate {
            tariff_key: tariff_key.to_string(),
            origin_country: origin_country.to_string(),
            rate,
            source: RateSource::Auto,
            notes: None,
            updated_at: Utc::now().naive_utc(),
        })?;
        debug!(tariff_key, rate, registered, "关税键回落默认并自动注册");

        Ok(rate)
    }

    /// 用户编辑税率 (标记 source=manual)
    pub fn upsert_manual_rate(
        &self,
        tariff_key: &str,
        origin_country: &str,
        rate: f64,
        notes: Option<String>,
    ) -> RepositoryResult<TariffRate> {
        let row = TariffRate {
            tariff_key: tariff_key.to_string(),
            origin_country: origin_country.to_string(),
            rate,
            source: RateSource::Manual,
            notes,
            updated_at: Utc::now().naive_utc(),
        };
        self.tariff_repo.upsert(&row)?;
        Ok(row)
    }
}
