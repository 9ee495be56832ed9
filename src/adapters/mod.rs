// Adapters layer: concrete implementations for external systems (files, dataset storage, http services).

pub mod geoip;
pub mod memory_store;
pub mod proxy;
pub mod sqlite_store;
pub mod storage;

pub use geoip::IpWhoisProvider;
pub use memory_store::MemoryPppStore;
pub use proxy::HttpProxyClassifier;
pub use sqlite_store::SqlitePppStore;
pub use storage::LocalStorage;
