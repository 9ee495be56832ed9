// Application layer: wires configuration to concrete adapters.

use crate::adapters::{HttpProxyClassifier, IpWhoisProvider, LocalStorage, SqlitePppStore};
use crate::config::AppConfig;
use crate::core::country::CountryResolver;
use crate::core::import::PppImporter;
use crate::core::pricing::{PriceAdjuster, PricingService};
use crate::domain::ports::PppStore;
use crate::utils::error::Result;
use std::path::Path;
use std::sync::Arc;

pub fn open_store(config: &AppConfig) -> Result<Arc<dyn PppStore>> {
    tracing::debug!("Opening PPP dataset at {}", config.database.path);
    let store = SqlitePppStore::open(Path::new(&config.database.path))?;
    Ok(Arc::new(store))
}

/// CSV paths in the config are used as given (absolute or relative to the working directory).
pub fn importer(config: &AppConfig, store: Arc<dyn PppStore>) -> PppImporter<LocalStorage> {
    PppImporter::new(
        LocalStorage::new(".".to_string()),
        store,
        config.parser_options(),
    )
}

pub fn price_adjuster(config: &AppConfig, store: Arc<dyn PppStore>) -> Result<PriceAdjuster> {
    let geoip = IpWhoisProvider::new(config.geoip_endpoint(), config.geoip_timeout())?;
    let countries = CountryResolver::new(Arc::new(geoip)).with_budget(config.geoip_timeout());
    let adjuster = PriceAdjuster::new(store, countries)
        .with_proxy_error_policy(config.proxy_error_policy());

    let adjuster = match &config.proxy {
        Some(proxy) => adjuster.with_proxy_classifier(Arc::new(HttpProxyClassifier::new(
            proxy.endpoint.clone(),
            proxy.api_key.clone(),
            config.proxy_timeout(),
        )?)),
        None => {
            tracing::warn!("No [proxy] section configured, proxy/VPN detection is off");
            adjuster
        }
    };

    Ok(adjuster)
}

pub fn pricing_service(config: &AppConfig, store: Arc<dyn PppStore>) -> Result<PricingService> {
    Ok(PricingService::new(
        price_adjuster(config, store)?,
        config.plans.clone(),
    ))
}
