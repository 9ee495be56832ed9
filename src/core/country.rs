use crate::domain::model::RequestContext;
use crate::domain::ports::GeoIpProvider;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LOOKUP_BUDGET: Duration = Duration::from_secs(4);

/// Resolves the alpha-2 country of a request. Never fails: an unresolved country is `None`.
pub struct CountryResolver {
    geoip: Option<Arc<dyn GeoIpProvider>>,
    budget: Duration,
}

impl CountryResolver {
    pub fn new(geoip: Arc<dyn GeoIpProvider>) -> Self {
        Self {
            geoip: Some(geoip),
            budget: DEFAULT_LOOKUP_BUDGET,
        }
    }

    /// Only the trusted header is consulted.
    pub fn header_only() -> Self {
        Self {
            geoip: None,
            budget: DEFAULT_LOOKUP_BUDGET,
        }
    }

    /// Hard upper bound for one geo-IP lookup, on top of the provider's own client timeout.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub async fn resolve(&self, ctx: &RequestContext) -> Option<String> {
        // 上游（例如 Cloudflare）給的國家直接採用，不再查詢
        if let Some(country) = ctx.trusted_country() {
            tracing::debug!("Using trusted country header: {}", country);
            return Some(country.to_string());
        }

        let ip = ctx.ip()?;
        let provider = self.geoip.as_ref()?;

        match tokio::time::timeout(self.budget, provider.lookup(ip)).await {
            Ok(Ok(country)) => {
                tracing::debug!("Geo-IP resolved {} to {}", ip, country);
                Some(country)
            }
            Ok(Err(e)) => {
                tracing::warn!("Geo-IP lookup for {} failed: {}", ip, e);
                None
            }
            Err(_) => {
                tracing::warn!("Geo-IP lookup for {} exceeded {:?}", ip, self.budget);
                None
            }
        }
    }
}
