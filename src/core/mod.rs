pub mod country;
pub mod csv_parser;
pub mod import;
pub mod iso3166;
pub mod pricing;

pub use crate::domain::model::{PppRecord, PriceAdjustment, RequestContext};
pub use crate::domain::ports::{GeoIpProvider, PppStore, ProxyClassifier, Storage};
pub use crate::utils::error::Result;
