use crate::domain::model::{PppRecord, ProxyCheck};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

/// Keyed PPP dataset, one record per alpha-3 code.
pub trait PppStore: Send + Sync {
    fn get(&self, country_code: &str) -> Result<Option<PppRecord>>;

    /// Insert or fully replace the record for `record.country_code`.
    fn upsert(&self, record: PppRecord) -> Result<()>;

    /// Upsert every record as one transaction. On error nothing is applied.
    fn import_batch(&self, records: &mut dyn Iterator<Item = PppRecord>) -> Result<usize>;

    fn count(&self) -> Result<usize>;
}

#[async_trait]
pub trait ProxyClassifier: Send + Sync {
    async fn check(&self, ip: &str) -> Result<ProxyCheck>;
}

#[async_trait]
pub trait GeoIpProvider: Send + Sync {
    /// Returns the ISO-3166 alpha-2 code for `ip`.
    async fn lookup(&self, ip: &str) -> Result<String>;
}
