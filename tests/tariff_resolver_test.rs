// ==========================================
// 关税解析集成测试
// ==========================================
// 职责: 验证解析优先级、自动注册与人工维护
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod tariff_resolver_test {
    use std::sync::Arc;

    use trade_order_flow::api::TariffApi;
    use trade_order_flow::config::{config_keys, ConfigManager};
    use trade_order_flow::domain::types::RateSource;
    use trade_order_flow::engine::tariff::TariffResolver;
    use trade_order_flow::repository::TariffRateRepository;

    use crate::test_helpers::{create_test_db, open_shared_connection};

    fn setup() -> (
        tempfile::NamedTempFile,
        Arc<TariffRateRepository>,
        Arc<ConfigManager>,
        TariffResolver,
    ) {
        let (tmp, db_path) = create_test_db().unwrap();
        let conn = open_shared_connection(&db_path);
        let repo = Arc::new(TariffRateRepository::from_connection(conn.clone()));
        let config = Arc::new(ConfigManager::from_connection(conn));
        let resolver = TariffResolver::new(repo.clone(), config.clone());
        (tmp, repo, config, resolver)
    }

    #[test]
    fn test_exact_match_beats_class_default() {
        let (_tmp, _repo, _config, resolver) = setup();

        // 先人工登记, 再解析钢制品 → 命中精确行而非 0.25 类默认
        resolver
            .upsert_manual_rate("dining chair|oslo|steel", "CN", 0.07, None)
            .unwrap();
        let rate = resolver.resolve_rate("dining chair|oslo|steel", "CN").unwrap();
        assert_eq!(rate, 0.07);
    }

    #[test]
    fn test_class_default_and_auto_registration() {
        let (_tmp, repo, _config, resolver) = setup();

        let rate = resolver.resolve_rate("side table|oslo|wood", "CN").unwrap();
        assert_eq!(rate, 0.08);

        // 回落解析会自动注册, 税率表逐步覆盖见过的产品类
        let row = repo.find_by_key("side table|oslo|wood").unwrap().unwrap();
        assert_eq!(row.rate, 0.08);
        assert_eq!(row.source, RateSource::Auto);

        // 再次解析命中已注册行
        let rate = resolver.resolve_rate("side table|oslo|wood", "CN").unwrap();
        assert_eq!(rate, 0.08);

        // 删除后下一次解析重新走回落并再注册
        assert!(repo.delete("side table|oslo|wood").unwrap());
        assert!(repo.find_by_key("side table|oslo|wood").unwrap().is_none());
        let rate = resolver.resolve_rate("side table|oslo|wood", "CN").unwrap();
        assert_eq!(rate, 0.08);
        let row = repo.find_by_key("side table|oslo|wood").unwrap().unwrap();
        assert_eq!(row.source, RateSource::Auto);
    }

    #[test]
    fn test_unmapped_key_falls_back_to_configured_baseline() {
        let (_tmp, _repo, config, resolver) = setup();

        // 内置兜底 0.0
        let rate = resolver.resolve_rate("mystery gadget||", "CN").unwrap();
        assert_eq!(rate, 0.0);

        // 配置兜底可覆写, 对新键生效
        config
            .set_config_value(config_keys::DEFAULT_TARIFF_RATE, "0.05")
            .unwrap();
        let rate = resolver.resolve_rate("another gadget||", "CN").unwrap();
        assert_eq!(rate, 0.05);

        // 已注册键不受兜底变化影响
        let rate = resolver.resolve_rate("mystery gadget||", "CN").unwrap();
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn test_manual_upsert_overrides_auto_row() {
        let (_tmp, repo, _config, resolver) = setup();

        resolver.resolve_rate("vase|terra|ceramic", "CN").unwrap();
        let row = repo.find_by_key("vase|terra|ceramic").unwrap().unwrap();
        assert_eq!(row.source, RateSource::Auto);
        assert_eq!(row.rate, 0.15);

        // 人工改税率, source 翻转为 manual
        resolver
            .upsert_manual_rate("vase|terra|ceramic", "CN", 0.18, Some("2024年新税则".to_string()))
            .unwrap();
        let row = repo.find_by_key("vase|terra|ceramic").unwrap().unwrap();
        assert_eq!(row.source, RateSource::Manual);
        assert_eq!(row.rate, 0.18);
        let rate = resolver.resolve_rate("vase|terra|ceramic", "CN").unwrap();
        assert_eq!(rate, 0.18);
    }

    #[test]
    fn test_tariff_api_resolve_and_validation() {
        let (tmp, _repo, _config, _resolver) = setup();
        let conn = open_shared_connection(tmp.path().to_str().unwrap());
        let api = TariffApi::from_connection(conn);

        // 原产国缺省由供应商信息推断
        let resolved = api
            .resolve_tariff_rate(
                "Dining Chair",
                Some("Oslo"),
                Some("Steel"),
                "Hanoi Furniture JSC",
                Some("Hanoi, Vietnam"),
                None,
            )
            .unwrap();
        assert_eq!(resolved.tariff_key, "dining chair|oslo|steel");
        assert_eq!(resolved.origin_country, "VN");
        assert_eq!(resolved.rate, 0.25);

        // 税率区间校验
        assert!(api
            .upsert_tariff_rate("dining chair|oslo|steel", "VN", 1.5, None)
            .is_err());
        assert!(api
            .upsert_tariff_rate("dining chair|oslo|steel", "VN", 0.22, None)
            .is_ok());
        // 自动注册行被人工覆写, 仍是同一行
        assert_eq!(api.list_rates().unwrap().len(), 1);
    }
}
