pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::AppConfig;

pub use crate::adapters::{HttpProxyClassifier, IpWhoisProvider, LocalStorage, MemoryPppStore, SqlitePppStore};
pub use crate::core::{
    country::CountryResolver,
    csv_parser::{MalformedCellPolicy, ParserOptions, PppCsvParser},
    import::{ImportReport, PppImporter},
    pricing::{PriceAdjuster, PriceQuote, PricingService, ProxyErrorPolicy},
};
pub use crate::domain::model::{PppRecord, PriceAdjustment, ProxyCheck, RequestContext};
pub use crate::domain::ports::{GeoIpProvider, PppStore, ProxyClassifier};
pub use crate::utils::error::{PppError, Result};
