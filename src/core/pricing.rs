use crate::config::toml_config::PlanConfig;
use crate::core::country::CountryResolver;
use crate::core::iso3166;
use crate::domain::model::{PriceAdjustment, ProxyCheckStatus, RequestContext};
use crate::domain::ports::{PppStore, ProxyClassifier};
use crate::utils::error::{PppError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_COUNTRY_ISO2: &str = "US";
pub const DEFAULT_COUNTRY_NAME: &str = "United States";

/// How a failed proxy check is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyErrorPolicy {
    /// Treat the IP as not a proxy and keep PPP pricing.
    #[default]
    Allow,
    /// Treat the IP like a detected proxy and charge the base price.
    DisablePpp,
}

/// Turns a base USD price into the PPP-adjusted price for one request.
pub struct PriceAdjuster {
    store: Arc<dyn PppStore>,
    countries: CountryResolver,
    proxy: Option<Arc<dyn ProxyClassifier>>,
    on_proxy_error: ProxyErrorPolicy,
}

impl PriceAdjuster {
    pub fn new(store: Arc<dyn PppStore>, countries: CountryResolver) -> Self {
        Self {
            store,
            countries,
            proxy: None,
            on_proxy_error: ProxyErrorPolicy::default(),
        }
    }

    pub fn with_proxy_classifier(mut self, classifier: Arc<dyn ProxyClassifier>) -> Self {
        self.proxy = Some(classifier);
        self
    }

    pub fn with_proxy_error_policy(mut self, policy: ProxyErrorPolicy) -> Self {
        self.on_proxy_error = policy;
        self
    }

    pub async fn adjust(&self, base_price: Decimal, ctx: &RequestContext) -> PriceAdjustment {
        if self.is_proxy(ctx.ip()).await {
            tracing::info!("PPP disabled for {:?}: proxy/VPN detected", ctx.ip());
            return PriceAdjustment {
                country_code_iso2: DEFAULT_COUNTRY_ISO2.to_string(),
                country_name: DEFAULT_COUNTRY_NAME.to_string(),
                adjusted_price: base_price,
                ppp_disabled: true,
            };
        }

        let country_code_iso2 = self
            .countries
            .resolve(ctx)
            .await
            .unwrap_or_else(|| DEFAULT_COUNTRY_ISO2.to_string());

        let Some(country) = iso3166::alpha2(&country_code_iso2) else {
            tracing::warn!(
                "Unrecognized country code '{}', using base price",
                country_code_iso2
            );
            return PriceAdjustment {
                country_code_iso2,
                country_name: DEFAULT_COUNTRY_NAME.to_string(),
                adjusted_price: base_price,
                ppp_disabled: false,
            };
        };

        PriceAdjustment {
            adjusted_price: self.convert_price(base_price, country.alpha3),
            country_code_iso2,
            country_name: country.name.to_string(),
            ppp_disabled: false,
        }
    }

    /// `price × factor` for the alpha-3 country, or `price` when there is no usable factor.
    pub fn convert_price(&self, price: Decimal, country_code_iso3: &str) -> Decimal {
        match self.store.get(country_code_iso3) {
            Ok(Some(record)) => match record.usable_factor() {
                Some(factor) => price.checked_mul(factor).unwrap_or_else(|| {
                    tracing::warn!(
                        "PPP factor {} for {} overflows the price, using base price",
                        factor,
                        country_code_iso3
                    );
                    price
                }),
                None => {
                    tracing::debug!("PPP factor for {} is zero, using base price", country_code_iso3);
                    price
                }
            },
            Ok(None) => {
                tracing::debug!("No PPP data for {}, using base price", country_code_iso3);
                price
            }
            Err(e) => {
                tracing::error!("PPP lookup for {} failed: {}", country_code_iso3, e);
                price
            }
        }
    }

    async fn is_proxy(&self, ip: Option<&str>) -> bool {
        let (Some(ip), Some(classifier)) = (ip, self.proxy.as_ref()) else {
            return false;
        };

        let failure = match classifier.check(ip).await {
            Ok(check) if check.status == ProxyCheckStatus::Ok => {
                return check.is_proxy.unwrap_or(false);
            }
            Ok(check) => check.message.unwrap_or_else(|| "unknown error".to_string()),
            Err(e) => e.to_string(),
        };

        tracing::error!("Proxy IP detection error for {}: {}", ip, failure);
        self.on_proxy_error == ProxyErrorPolicy::DisablePpp
    }
}

/// Adjusted price for a configured plan, with the opaque product id passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub plan: String,
    pub product_id: Option<String>,
    pub base_price: Decimal,
    #[serde(flatten)]
    pub adjustment: PriceAdjustment,
}

pub struct PricingService {
    adjuster: PriceAdjuster,
    plans: HashMap<String, PlanConfig>,
}

impl PricingService {
    pub fn new(adjuster: PriceAdjuster, plans: HashMap<String, PlanConfig>) -> Self {
        Self { adjuster, plans }
    }

    pub fn adjuster(&self) -> &PriceAdjuster {
        &self.adjuster
    }

    pub async fn quote(&self, plan: &str, ctx: &RequestContext) -> Result<PriceQuote> {
        let config = self.plans.get(plan).ok_or_else(|| PppError::UnknownPlan {
            plan: plan.to_string(),
        })?;

        let adjustment = self.adjuster.adjust(config.price_in_usd, ctx).await;
        tracing::info!(
            "Quoted plan '{}' for {}: {} USD -> {} (ppp_disabled: {})",
            plan,
            adjustment.country_code_iso2,
            config.price_in_usd,
            adjustment.adjusted_price,
            adjustment.ppp_disabled
        );

        Ok(PriceQuote {
            plan: plan.to_string(),
            product_id: config.product_id.clone(),
            base_price: config.price_in_usd,
            adjustment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryPppStore;
    use crate::domain::model::{PppRecord, ProxyCheck};
    use crate::domain::ports::GeoIpProvider;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedGeoIp(Option<&'static str>);

    #[async_trait]
    impl GeoIpProvider for FixedGeoIp {
        async fn lookup(&self, _ip: &str) -> Result<String> {
            self.0.map(str::to_string).ok_or_else(|| PppError::GeoIpError {
                message: "unreachable".to_string(),
            })
        }
    }

    struct SlowGeoIp;

    #[async_trait]
    impl GeoIpProvider for SlowGeoIp {
        async fn lookup(&self, _ip: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("FR".to_string())
        }
    }

    struct FixedProxy {
        outcome: fn() -> Result<ProxyCheck>,
        calls: AtomicUsize,
    }

    impl FixedProxy {
        fn new(outcome: fn() -> Result<ProxyCheck>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ProxyClassifier for FixedProxy {
        async fn check(&self, _ip: &str) -> Result<ProxyCheck> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn store() -> Arc<MemoryPppStore> {
        Arc::new(
            MemoryPppStore::from_records(vec![
                PppRecord::new("FRA", "France", dec!(0.72)),
                PppRecord::new("DEU", "Germany", dec!(0.85)),
                PppRecord::new("ZWE", "Zimbabwe", dec!(0)),
            ])
            .unwrap(),
        )
    }

    fn adjuster(country: Option<&'static str>) -> PriceAdjuster {
        PriceAdjuster::new(store(), CountryResolver::new(Arc::new(FixedGeoIp(country))))
    }

    #[tokio::test]
    async fn test_price_is_scaled_by_factor() {
        let result = adjuster(Some("FR"))
            .adjust(dec!(98), &RequestContext::new("81.2.69.142"))
            .await;

        assert_eq!(
            result,
            PriceAdjustment {
                country_code_iso2: "FR".to_string(),
                country_name: "France".to_string(),
                adjusted_price: dec!(70.56),
                ppp_disabled: false,
            }
        );
    }

    #[tokio::test]
    async fn test_zero_factor_and_missing_record_keep_base_price() {
        let zero = adjuster(Some("ZW"))
            .adjust(dec!(98), &RequestContext::new("41.57.0.1"))
            .await;
        assert_eq!(zero.adjusted_price, dec!(98));
        assert_eq!(zero.country_name, "Zimbabwe");

        let missing = adjuster(Some("JP"))
            .adjust(dec!(98), &RequestContext::new("1.1.1.1"))
            .await;
        assert_eq!(missing.adjusted_price, dec!(98));
        assert_eq!(missing.country_code_iso2, "JP");
        assert!(!missing.ppp_disabled);
    }

    #[tokio::test]
    async fn test_overflowing_factor_keeps_base_price() {
        let store = Arc::new(
            MemoryPppStore::from_records(vec![PppRecord::new(
                "FRA",
                "France",
                dec!(1000000000000000000000000000),
            )])
            .unwrap(),
        );
        let result = PriceAdjuster::new(store, CountryResolver::header_only())
            .adjust(dec!(98), &RequestContext::default().with_trusted_country("FR"))
            .await;

        assert_eq!(result.country_code_iso2, "FR");
        assert_eq!(result.adjusted_price, dec!(98));
        assert!(!result.ppp_disabled);
    }

    #[tokio::test]
    async fn test_proxy_disables_ppp() {
        let proxy = FixedProxy::new(|| Ok(ProxyCheck::proxy()));
        let result = adjuster(Some("FR"))
            .with_proxy_classifier(proxy.clone())
            .adjust(dec!(98), &RequestContext::new("185.220.101.1").with_trusted_country("FR"))
            .await;

        assert_eq!(result.country_code_iso2, "US");
        assert_eq!(result.country_name, "United States");
        assert_eq!(result.adjusted_price, dec!(98));
        assert!(result.ppp_disabled);
        assert_eq!(proxy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_proxy_errors_fail_open_by_default() {
        for proxy in [
            FixedProxy::new(|| Ok(ProxyCheck::error("quota exceeded"))),
            FixedProxy::new(|| {
                Err(PppError::ProxyCheckError {
                    message: "connection refused".to_string(),
                })
            }),
        ] {
            let result = adjuster(Some("FR"))
                .with_proxy_classifier(proxy)
                .adjust(dec!(98), &RequestContext::new("81.2.69.142"))
                .await;
            assert!(!result.ppp_disabled);
            assert_eq!(result.adjusted_price, dec!(70.56));
        }
    }

    #[tokio::test]
    async fn test_proxy_errors_can_fail_closed() {
        let proxy = FixedProxy::new(|| Ok(ProxyCheck::error("quota exceeded")));
        let result = adjuster(Some("FR"))
            .with_proxy_classifier(proxy)
            .with_proxy_error_policy(ProxyErrorPolicy::DisablePpp)
            .adjust(dec!(98), &RequestContext::new("81.2.69.142"))
            .await;

        assert!(result.ppp_disabled);
        assert_eq!(result.country_code_iso2, "US");
        assert_eq!(result.adjusted_price, dec!(98));
    }

    #[tokio::test]
    async fn test_missing_ip_skips_proxy_check() {
        let proxy = FixedProxy::new(|| Ok(ProxyCheck::proxy()));
        let result = adjuster(Some("FR"))
            .with_proxy_classifier(proxy.clone())
            .adjust(dec!(98), &RequestContext::default().with_trusted_country("DE"))
            .await;

        assert_eq!(proxy.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.adjusted_price, dec!(83.30));
    }

    #[tokio::test]
    async fn test_unresolved_country_defaults_to_us() {
        let result = adjuster(None)
            .adjust(dec!(98), &RequestContext::new("10.0.0.1"))
            .await;

        assert_eq!(result.country_code_iso2, "US");
        assert_eq!(result.country_name, "United States of America");
        assert_eq!(result.adjusted_price, dec!(98));
        assert!(!result.ppp_disabled);
    }

    #[tokio::test]
    async fn test_geoip_timeout_defaults_to_us() {
        let countries =
            CountryResolver::new(Arc::new(SlowGeoIp)).with_budget(Duration::from_millis(50));
        let result = PriceAdjuster::new(store(), countries)
            .adjust(dec!(98), &RequestContext::new("81.2.69.142"))
            .await;

        assert_eq!(result.country_code_iso2, "US");
        assert_eq!(result.adjusted_price, dec!(98));
    }

    #[tokio::test]
    async fn test_unknown_iso_code_keeps_resolved_code() {
        let result = adjuster(None)
            .adjust(dec!(98), &RequestContext::new("81.2.69.142").with_trusted_country("XX"))
            .await;

        assert_eq!(
            result,
            PriceAdjustment {
                country_code_iso2: "XX".to_string(),
                country_name: "United States".to_string(),
                adjusted_price: dec!(98),
                ppp_disabled: false,
            }
        );
    }

    #[tokio::test]
    async fn test_quote_passes_product_through() {
        let mut plans = HashMap::new();
        plans.insert(
            "lifetime".to_string(),
            PlanConfig {
                price_in_usd: dec!(98.00),
                product_id: Some("prod_123".to_string()),
            },
        );
        let service = PricingService::new(adjuster(Some("DE")), plans);

        let quote = service
            .quote("lifetime", &RequestContext::new("81.2.69.142"))
            .await
            .unwrap();
        assert_eq!(quote.product_id.as_deref(), Some("prod_123"));
        assert_eq!(quote.base_price, dec!(98));
        assert_eq!(quote.adjustment.adjusted_price, dec!(83.30));

        assert!(matches!(
            service.quote("monthly", &RequestContext::default()).await,
            Err(PppError::UnknownPlan { .. })
        ));
    }
}
