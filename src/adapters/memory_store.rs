use crate::domain::model::PppRecord;
use crate::domain::ports::PppStore;
use crate::utils::error::{PppError, Result};
use crate::utils::validation::Validate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

type Dataset = HashMap<String, PppRecord>;

/// In-process PPP dataset. Imports build a private copy and publish it with one swap,
/// so readers only ever see a complete dataset.
#[derive(Debug, Default)]
pub struct MemoryPppStore {
    dataset: RwLock<Arc<Dataset>>,
    // 寫入者互斥，讀取只拿快照不受影響
    writer: Mutex<()>,
}

impl MemoryPppStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = PppRecord>) -> Result<Self> {
        let store = Self::new();
        store.import_batch(&mut records.into_iter())?;
        Ok(store)
    }

    fn snapshot(&self) -> Result<Arc<Dataset>> {
        self.dataset
            .read()
            .map(|dataset| Arc::clone(&dataset))
            .map_err(|e| PppError::ImportError {
                message: format!("PPP dataset lock poisoned: {}", e),
            })
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, ()>> {
        self.writer.lock().map_err(|e| PppError::ImportError {
            message: format!("PPP dataset writer lock poisoned: {}", e),
        })
    }

    fn publish(&self, next: Dataset) -> Result<()> {
        let mut dataset = self.dataset.write().map_err(|e| PppError::ImportError {
            message: format!("PPP dataset lock poisoned: {}", e),
        })?;
        *dataset = Arc::new(next);
        Ok(())
    }
}

impl PppStore for MemoryPppStore {
    fn get(&self, country_code: &str) -> Result<Option<PppRecord>> {
        Ok(self.snapshot()?.get(country_code).cloned())
    }

    fn upsert(&self, record: PppRecord) -> Result<()> {
        record.validate()?;
        let _writer = self.lock_writer()?;
        let mut next = Dataset::clone(&*self.snapshot()?);
        next.insert(record.country_code.clone(), record);
        self.publish(next)
    }

    fn import_batch(&self, records: &mut dyn Iterator<Item = PppRecord>) -> Result<usize> {
        let _writer = self.lock_writer()?;
        let mut next = Dataset::clone(&*self.snapshot()?);
        let mut processed = 0;

        for record in records {
            // 任何一筆驗證失敗就整批放棄，舊資料不動
            record.validate()?;
            next.insert(record.country_code.clone(), record);
            processed += 1;
        }

        self.publish(next)?;
        Ok(processed)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }
}
