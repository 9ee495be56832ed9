use crate::domain::model::PppRecord;
use crate::domain::ports::PppStore;
use crate::utils::error::{PppError, Result};
use crate::utils::validation::Validate;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ppp_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    country_name TEXT NOT NULL,
    country_code TEXT NOT NULL UNIQUE,
    latest_ppp_value TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

// 以文字存係數，避免 REAL 失去小數精度
const UPSERT: &str = "
INSERT INTO ppp_data (country_name, country_code, latest_ppp_value, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?4)
ON CONFLICT(country_code) DO UPDATE SET
    country_name = excluded.country_name,
    latest_ppp_value = excluded.latest_ppp_value,
    updated_at = excluded.updated_at
";

/// PPP dataset persisted in SQLite (`ppp_data` table).
pub struct SqlitePppStore {
    conn: Mutex<Connection>,
}

impl SqlitePppStore {
    /// Open or create the database at `path` and make sure the table exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| PppError::ImportError {
            message: format!("SQLite connection lock poisoned: {}", e),
        })
    }

    fn write_record(conn: &Connection, record: &PppRecord, now: &str) -> Result<()> {
        record.validate()?;
        conn.execute(
            UPSERT,
            params![
                record.country_name,
                record.country_code,
                record.factor.to_string(),
                now
            ],
        )?;
        Ok(())
    }
}

impl PppStore for SqlitePppStore {
    fn get(&self, country_code: &str) -> Result<Option<PppRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT country_code, country_name, latest_ppp_value FROM ppp_data WHERE country_code = ?1",
                params![country_code],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((code, name, value)) => {
                let factor = Decimal::from_str(&value)?;
                Ok(Some(PppRecord::new(code, name, factor)))
            }
            None => Ok(None),
        }
    }

    fn upsert(&self, record: PppRecord) -> Result<()> {
        let conn = self.lock()?;
        Self::write_record(&conn, &record, &Utc::now().to_rfc3339())
    }

    fn import_batch(&self, records: &mut dyn Iterator<Item = PppRecord>) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut processed = 0;

        for record in records {
            // 出錯時 tx 被 drop，自動 rollback
            Self::write_record(&tx, &record, &now)?;
            processed += 1;
        }

        tx.commit()?;
        Ok(processed)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM ppp_data", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    #[test]
    fn test_upsert_and_get() {
        let store = SqlitePppStore::open_in_memory().unwrap();
        store
            .upsert(PppRecord::new("FRA", "France", dec!(0.72)))
            .unwrap();
        store
            .upsert(PppRecord::new("FRA", "France", dec!(0.715)))
            .unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get("FRA").unwrap().unwrap().factor, dec!(0.715));
        assert!(store.get("DEU").unwrap().is_none());
    }

    #[test]
    fn test_factor_precision_survives_storage() {
        let store = SqlitePppStore::open_in_memory().unwrap();
        store
            .upsert(PppRecord::new("IDN", "Indonesia", dec!(4793.123456789)))
            .unwrap();
        assert_eq!(
            store.get("IDN").unwrap().unwrap().factor,
            dec!(4793.123456789)
        );
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let store = SqlitePppStore::open_in_memory().unwrap();
        store
            .upsert(PppRecord::new("FRA", "France", dec!(0.72)))
            .unwrap();

        let batch = vec![
            PppRecord::new("FRA", "France", dec!(0.99)),
            PppRecord::new("DEU", "Germany", dec!(0.74)),
            PppRecord::new("", "No Code", dec!(1.0)),
        ];
        assert!(store.import_batch(&mut batch.into_iter()).is_err());

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get("FRA").unwrap().unwrap().factor, dec!(0.72));
        assert!(store.get("DEU").unwrap().is_none());
    }

    #[test]
    fn test_dataset_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("data").join("ppp.sqlite");

        {
            let store = SqlitePppStore::open(&db_path).unwrap();
            let batch = vec![
                PppRecord::new("FRA", "France", dec!(0.72)),
                PppRecord::new("JPN", "Japan", dec!(96.3)),
            ];
            assert_eq!(store.import_batch(&mut batch.into_iter()).unwrap(), 2);
        }

        let reopened = SqlitePppStore::open(&db_path).unwrap();
        assert_eq!(reopened.count().unwrap(), 2);
        assert_eq!(
            reopened.get("JPN").unwrap(),
            Some(PppRecord::new("JPN", "Japan", dec!(96.3)))
        );
    }
}
