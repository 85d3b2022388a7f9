//! Local cache of the catalog dataset
//!
//! The cache keeps both record shapes. The normalized payload is written
//! together with the schema version it was derived under, so an outdated
//! payload can be detected and re-derived from raw.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CatalogError, Result};
use crate::types::{NormalizedStamp, RawRecord};

/// Bump when `NormalizedStamp` gains derived fields that old payloads lack
pub const NORMALIZED_SCHEMA_VERSION: u32 = 2;

const SCHEMA_VERSION_KEY: &str = "normalized_schema_version";
const RAW_SYNCED_AT_KEY: &str = "raw_synced_at";
const NORMALIZED_SYNCED_AT_KEY: &str = "normalized_synced_at";

/// Normalized payload plus the schema version it was written with.
/// Version 0 means "never written" or "written before versioning".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedCache {
    pub schema_version: u32,
    pub stamps: Vec<NormalizedStamp>,
}

impl NormalizedCache {
    pub fn is_current(&self) -> bool {
        self.schema_version >= NORMALIZED_SCHEMA_VERSION
    }
}

pub trait LocalCacheStore {
    /// Cached raw records in source order; empty when nothing is cached
    fn read_raw(&self) -> Result<Vec<RawRecord>>;
    /// Replace the cached raw set
    fn write_raw(&self, records: &[RawRecord]) -> Result<()>;
    fn read_normalized(&self) -> Result<NormalizedCache>;
    /// Replace the normalized set and record its schema version atomically
    fn write_normalized(&self, stamps: &[NormalizedStamp], schema_version: u32) -> Result<()>;
}

pub fn init_database(conn: &Connection) -> Result<()> {
    let schema = include_str!("../schema.sql");
    conn.execute_batch(schema)?;
    Ok(())
}

pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_database(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves SQLite itself consistent
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn meta(conn: &Connection, key: &str) -> Result<Option<String>> {
        let value = conn
            .query_row("SELECT value FROM cache_meta WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO cache_meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// RFC 3339 time of the last raw write, if any
    pub fn raw_synced_at(&self) -> Result<Option<String>> {
        Self::meta(&self.lock(), RAW_SYNCED_AT_KEY)
    }

    pub fn normalized_synced_at(&self) -> Result<Option<String>> {
        Self::meta(&self.lock(), NORMALIZED_SYNCED_AT_KEY)
    }

    /// Drop every cached record and all metadata
    pub fn clear(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(
            "DELETE FROM raw_records; DELETE FROM normalized_stamps; DELETE FROM cache_meta;",
        )?;
        Ok(())
    }

    fn read_payloads(conn: &Connection, table: &str) -> Result<Vec<String>> {
        let sql = format!("SELECT payload FROM {} ORDER BY position", table);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut payloads = Vec::new();
        for row in rows {
            payloads.push(row?);
        }
        Ok(payloads)
    }
}

impl LocalCacheStore for SqliteCacheStore {
    fn read_raw(&self) -> Result<Vec<RawRecord>> {
        let conn = self.lock();
        Self::read_payloads(&conn, "raw_records")?
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(CatalogError::from))
            .collect()
    }

    fn write_raw(&self, records: &[RawRecord]) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM raw_records", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO raw_records (position, id, payload) VALUES (?1, ?2, ?3)")?;
            for (position, record) in records.iter().enumerate() {
                let payload = serde_json::to_string(record)?;
                stmt.execute(params![position as i64, record.id, payload])?;
            }
        }
        Self::set_meta(&tx, RAW_SYNCED_AT_KEY, &chrono::Utc::now().to_rfc3339())?;
        tx.commit()?;
        Ok(())
    }

    fn read_normalized(&self) -> Result<NormalizedCache> {
        let conn = self.lock();
        let stamps = Self::read_payloads(&conn, "normalized_stamps")?
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(CatalogError::from))
            .collect::<Result<Vec<NormalizedStamp>>>()?;
        let schema_version = match Self::meta(&conn, SCHEMA_VERSION_KEY)? {
            Some(value) => value.parse().map_err(|_| {
                CatalogError::CacheRead(format!("invalid schema version {:?}", value))
            })?,
            None => 0,
        };
        Ok(NormalizedCache {
            schema_version,
            stamps,
        })
    }

    fn write_normalized(&self, stamps: &[NormalizedStamp], schema_version: u32) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM normalized_stamps", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO normalized_stamps (position, id, payload) VALUES (?1, ?2, ?3)",
            )?;
            for (position, stamp) in stamps.iter().enumerate() {
                let payload = serde_json::to_string(stamp)?;
                stmt.execute(params![position as i64, stamp.id, payload])?;
            }
        }
        Self::set_meta(&tx, SCHEMA_VERSION_KEY, &schema_version.to_string())?;
        Self::set_meta(&tx, NORMALIZED_SYNCED_AT_KEY, &chrono::Utc::now().to_rfc3339())?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn sample_raw(id: &str) -> RawRecord {
        RawRecord {
            id: Some(id.to_string()),
            name: Some(format!("Stamp {}", id)),
            country_code: Some("NZ".to_string()),
            issue_year: Some(1855),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_store_reads_empty() {
        let store = SqliteCacheStore::open_in_memory().unwrap();
        assert!(store.read_raw().unwrap().is_empty());
        let cache = store.read_normalized().unwrap();
        assert!(cache.stamps.is_empty());
        assert_eq!(cache.schema_version, 0);
        assert!(!cache.is_current());
        assert!(store.raw_synced_at().unwrap().is_none());
    }

    #[test]
    fn test_raw_round_trip_keeps_order() {
        let store = SqliteCacheStore::open_in_memory().unwrap();
        let records: Vec<RawRecord> = ["c", "a", "b"].iter().map(|id| sample_raw(id)).collect();
        store.write_raw(&records).unwrap();
        assert_eq!(store.read_raw().unwrap(), records);
        assert!(store.raw_synced_at().unwrap().is_some());
    }

    #[test]
    fn test_write_replaces_previous_set() {
        let store = SqliteCacheStore::open_in_memory().unwrap();
        store.write_raw(&[sample_raw("a"), sample_raw("b")]).unwrap();
        store.write_raw(&[sample_raw("z")]).unwrap();
        let records = store.read_raw().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_deref(), Some("z"));
    }

    #[test]
    fn test_normalized_written_with_version() {
        let store = SqliteCacheStore::open_in_memory().unwrap();
        let stamps = vec![normalize(&sample_raw("a"))];
        store.write_normalized(&stamps, NORMALIZED_SCHEMA_VERSION).unwrap();
        let cache = store.read_normalized().unwrap();
        assert_eq!(cache.stamps, stamps);
        assert_eq!(cache.schema_version, NORMALIZED_SCHEMA_VERSION);
        assert!(cache.is_current());
    }

    #[test]
    fn test_old_payload_loads_with_defaults() {
        let store = SqliteCacheStore::open_in_memory().unwrap();
        {
            let conn = store.lock();
            conn.execute(
                "INSERT INTO normalized_stamps (position, id, payload) VALUES (0, 'a', ?1)",
                [r#"{"id":"a","countryCode":"NZ"}"#],
            )
            .unwrap();
        }
        let cache = store.read_normalized().unwrap();
        assert_eq!(cache.schema_version, 0);
        assert_eq!(cache.stamps[0].id, "a");
        assert_eq!(cache.stamps[0].image_url, "");
    }

    #[test]
    fn test_corrupt_payload_is_a_read_error() {
        let store = SqliteCacheStore::open_in_memory().unwrap();
        {
            let conn = store.lock();
            conn.execute(
                "INSERT INTO raw_records (position, id, payload) VALUES (0, 'a', '{not json')",
                [],
            )
            .unwrap();
        }
        assert!(store.read_raw().is_err());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let store = SqliteCacheStore::open(&path).unwrap();
            store.write_raw(&[sample_raw("a")]).unwrap();
            store
                .write_normalized(&[normalize(&sample_raw("a"))], NORMALIZED_SCHEMA_VERSION)
                .unwrap();
        }
        let store = SqliteCacheStore::open(&path).unwrap();
        assert_eq!(store.read_raw().unwrap().len(), 1);
        assert_eq!(store.read_normalized().unwrap().stamps.len(), 1);

        store.clear().unwrap();
        assert!(store.read_raw().unwrap().is_empty());
        assert_eq!(store.read_normalized().unwrap().schema_version, 0);
    }
}
