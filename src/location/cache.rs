//! Durable address cache keyed by free-text query.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub query: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

pub struct AddressCache {
    conn: Mutex<Connection>,
}

impl AddressCache {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS geolocation (
                query     TEXT PRIMARY KEY,
                address   TEXT NOT NULL,
                latitude  REAL NOT NULL,
                longitude REAL NOT NULL
            );
            ",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn get(&self, query: &str) -> Result<Option<Address>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let found = conn
            .query_row(
                "SELECT query, address, latitude, longitude FROM geolocation WHERE query = ?1",
                params![query],
                |row| {
                    Ok(Address {
                        query: row.get(0)?,
                        address: row.get(1)?,
                        latitude: row.get(2)?,
                        longitude: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    pub fn put(&self, address: &Address) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT OR REPLACE INTO geolocation(query, address, latitude, longitude) VALUES(?1, ?2, ?3, ?4)",
            params![address.query, address.address, address.latitude, address.longitude],
        )?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM geolocation", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_addresses_across_reopen() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("cache").join("geocode.sqlite");
        let addr = Address {
            query: "北京".to_string(),
            address: "Beijing, China".to_string(),
            latitude: 39.9042,
            longitude: 116.4074,
        };
        AddressCache::open(&path).expect("open").put(&addr).expect("put");

        let reopened = AddressCache::open(&path).expect("reopen");
        assert_eq!(reopened.get("北京").expect("get"), Some(addr));
        assert_eq!(reopened.get("上海").expect("get"), None);
        assert_eq!(reopened.len().expect("len"), 1);
    }
}
