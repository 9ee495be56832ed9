use crate::core::csv_parser::{ParseStats, ParserOptions, PppCsvParser};
use crate::domain::ports::{PppStore, Storage};
use crate::utils::error::{PppError, Result};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub csv_path: String,
    pub records_processed: usize,
    pub dataset_size: usize,
    pub dry_run: bool,
    pub stats: ParseStats,
}

/// Loads the PPP CSV into a [`PppStore`] as a single all-or-nothing batch.
pub struct PppImporter<S: Storage> {
    storage: S,
    store: Arc<dyn PppStore>,
    parser: PppCsvParser,
}

impl<S: Storage> PppImporter<S> {
    pub fn new(storage: S, store: Arc<dyn PppStore>, options: ParserOptions) -> Self {
        Self {
            storage,
            store,
            parser: PppCsvParser::new(options),
        }
    }

    pub async fn run(&self, csv_path: &str) -> Result<ImportReport> {
        tracing::info!("Starting PPP import from {}", csv_path);
        let data = self.storage.read_file(csv_path).await?;
        tracing::debug!("Read {} bytes of CSV", data.len());

        let store = Arc::clone(&self.store);
        let parser = self.parser.clone();

        // SQLite 是同步 API，整批交易放到 blocking thread
        let (records_processed, stats) = tokio::task::spawn_blocking(move || {
            let mut records = parser.parse(data.as_slice());
            let processed = store.import_batch(&mut records)?;
            Ok::<_, PppError>((processed, records.stats().clone()))
        })
        .await
        .map_err(|e| PppError::ImportError {
            message: format!("import task did not complete: {}", e),
        })?
        .inspect_err(|e| tracing::error!("PPP import rolled back: {}", e))?;

        let dataset_size = self.store.count()?;
        Self::log_stats(&stats);
        tracing::info!(
            "Processed and saved {} records ({} countries in dataset)",
            records_processed,
            dataset_size
        );

        Ok(ImportReport {
            csv_path: csv_path.to_string(),
            records_processed,
            dataset_size,
            dry_run: false,
            stats,
        })
    }

    /// Parses the CSV and reports what an import would do, without touching the store.
    pub async fn dry_run(&self, csv_path: &str) -> Result<ImportReport> {
        tracing::info!("🔍 DRY RUN - parsing {} without saving", csv_path);
        let data = self.storage.read_file(csv_path).await?;

        let mut records = self.parser.parse(data.as_slice());
        let records_processed = records.by_ref().count();
        let stats = records.stats().clone();
        Self::log_stats(&stats);

        Ok(ImportReport {
            csv_path: csv_path.to_string(),
            records_processed,
            dataset_size: self.store.count()?,
            dry_run: true,
            stats,
        })
    }

    fn log_stats(stats: &ParseStats) {
        tracing::debug!(
            "Rows: {} read, {} header, {} undecodable, {} without code, {} without value, {} malformed cells",
            stats.rows_read,
            stats.header_rows_skipped,
            stats.undecodable_rows,
            stats.rows_without_code,
            stats.rows_without_factor,
            stats.malformed_cells
        );
        if stats.malformed_cells > 0 {
            tracing::warn!(
                "{} PPP cells were not valid numbers",
                stats.malformed_cells
            );
        }
    }
}
