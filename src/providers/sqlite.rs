//! Supplier lookups backed by a local SQLite export.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use super::{LookupError, PostLookup, ProviderInfo, SupplierIds};
use crate::domain::{TagKey, TagValue};
use crate::error::{Error, Result};
use crate::location::ProviderLocation;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS posts (
        supplier      TEXT NOT NULL,
        unique_id     TEXT NOT NULL,
        series_number TEXT,
        fields        TEXT NOT NULL DEFAULT '{}',
        location      TEXT
    );
    CREATE TABLE IF NOT EXISTS artists (
        supplier TEXT NOT NULL,
        user_id  TEXT NOT NULL,
        fields   TEXT NOT NULL DEFAULT '{}',
        PRIMARY KEY (supplier, user_id)
    );
    CREATE INDEX IF NOT EXISTS idx_posts_unique ON posts(supplier, unique_id);
";

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// One supplier's view of the shared database.
pub struct SqliteLookup {
    supplier: String,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLookup {
    pub fn new(supplier: impl Into<String>, conn: Arc<Mutex<Connection>>) -> Self {
        Self { supplier: supplier.into(), conn }
    }

    /// Open the existing database at `path` and build a lookup for every
    /// supplier it mentions. A missing file is an error, never a new database.
    pub fn open_all(path: &Path) -> Result<Vec<SqliteLookup>> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        init_schema(&conn)?;
        let suppliers: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT supplier FROM posts UNION SELECT supplier FROM artists ORDER BY supplier",
            )?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<std::result::Result<_, _>>()?
        };
        let conn = Arc::new(Mutex::new(conn));
        Ok(suppliers.into_iter().map(|s| SqliteLookup::new(s, conn.clone())).collect())
    }

    fn query_post(&self, unique_id: &str, series: &str) -> Result<Option<(String, Option<String>)>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let row = conn
            .query_row(
                "SELECT fields, location FROM posts
                 WHERE supplier = ?1 COLLATE NOCASE AND unique_id = ?2
                   AND IFNULL(series_number, '') = ?3",
                params![self.supplier, unique_id, series],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    fn query_artist(&self, user_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let row = conn
            .query_row(
                "SELECT fields FROM artists WHERE supplier = ?1 COLLATE NOCASE AND user_id = ?2",
                params![self.supplier, user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row)
    }
}

impl PostLookup for SqliteLookup {
    fn supplier(&self) -> &str {
        &self.supplier
    }

    fn lookup_post(&self, ids: &SupplierIds) -> std::result::Result<ProviderInfo, LookupError> {
        let unique_id = ids.unique_id.as_deref().unwrap_or_default();
        let series = ids.series_number.as_deref().unwrap_or_default();
        let (fields, location) = self
            .query_post(unique_id, series)
            .map_err(backend)?
            .ok_or_else(|| LookupError::NotFound(format!("{} post {unique_id}", self.supplier)))?;
        Ok(ProviderInfo {
            tags: parse_fields(&fields).map_err(backend)?,
            location: location.as_deref().map(parse_location).transpose().map_err(backend)?,
        })
    }

    fn lookup_artist(&self, ids: &SupplierIds) -> std::result::Result<ProviderInfo, LookupError> {
        let user_id = ids.user_id.as_deref().unwrap_or_default();
        let fields = self
            .query_artist(user_id)
            .map_err(backend)?
            .ok_or_else(|| LookupError::NotFound(format!("{} artist {user_id}", self.supplier)))?;
        Ok(ProviderInfo { tags: parse_fields(&fields).map_err(backend)?, location: None })
    }
}

fn backend(err: Error) -> LookupError {
    LookupError::Backend(err.to_string())
}

fn parse_fields(raw: &str) -> Result<std::collections::BTreeMap<TagKey, TagValue>> {
    let value: Value = serde_json::from_str(raw)?;
    let object = value
        .as_object()
        .ok_or_else(|| Error::MalformedMetadata(format!("provider fields are not an object: {raw}")))?;
    object
        .iter()
        .map(|(k, v)| -> Result<(TagKey, TagValue)> { Ok((k.parse()?, TagValue::from_json(v))) })
        .collect()
}

fn parse_location(raw: &str) -> Result<ProviderLocation> {
    match raw.trim() {
        "missing" => Ok(ProviderLocation::Missing),
        "not_found" => Ok(ProviderLocation::NotFound),
        pair => {
            let parsed = pair
                .split_once(',')
                .and_then(|(lat, lng)| Some((lat.trim().parse().ok()?, lng.trim().parse().ok()?)));
            parsed
                .map(|(lat, lng)| ProviderLocation::Coordinates(lat, lng))
                .ok_or_else(|| Error::MalformedMetadata(format!("bad provider location '{raw}'")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("providers.sqlite");
        let conn = Connection::open(&path).expect("open");
        init_schema(&conn).expect("schema");
        conn.execute_batch(
            r#"
            INSERT INTO posts VALUES ('Weibo', 'Mx9a', NULL, '{"XMP:BlogTitle":"hello"}', '39.9,116.4');
            INSERT INTO posts VALUES ('Weibo', 'Mx9a', '2', '{"XMP:BlogTitle":"second"}', 'missing');
            INSERT INTO artists VALUES ('Weibo', '123', '{"XMP:Artist":"Alice","XMP:ImageCreatorID":"https://weibo.com/123"}');
            INSERT INTO artists VALUES ('Twitter', 'alice', '{"XMP:Artist":"Alice"}');
            "#,
        )
        .expect("seed");
        path
    }

    fn ids(unique: &str, series: Option<&str>) -> SupplierIds {
        SupplierIds {
            supplier: "Weibo".to_string(),
            user_id: Some("123".to_string()),
            unique_id: Some(unique.to_string()),
            series_number: series.map(str::to_string),
        }
    }

    #[test]
    fn opens_one_lookup_per_supplier() {
        let dir = TempDir::new().expect("tmp");
        let lookups = SqliteLookup::open_all(&seeded(&dir)).expect("open");
        let names: Vec<&str> = lookups.iter().map(|l| l.supplier()).collect();
        assert_eq!(names, vec!["Twitter", "Weibo"]);
    }

    #[test]
    fn missing_database_is_not_created() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("typo.sqlite");

        assert!(SqliteLookup::open_all(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn post_lookup_honours_series_and_location() {
        let dir = TempDir::new().expect("tmp");
        let lookups = SqliteLookup::open_all(&seeded(&dir)).expect("open");
        let weibo = lookups.iter().find(|l| l.supplier() == "Weibo").expect("weibo");

        let first = weibo.lookup_post(&ids("Mx9a", None)).expect("post");
        assert_eq!(first.tags[&TagKey::xmp("BlogTitle")], TagValue::from("hello"));
        assert_eq!(first.location, Some(ProviderLocation::Coordinates(39.9, 116.4)));

        let second = weibo.lookup_post(&ids("Mx9a", Some("2"))).expect("post");
        assert_eq!(second.location, Some(ProviderLocation::Missing));

        assert!(matches!(weibo.lookup_post(&ids("nope", None)), Err(LookupError::NotFound(_))));
    }

    #[test]
    fn artist_lookup_reads_fields() {
        let dir = TempDir::new().expect("tmp");
        let lookups = SqliteLookup::open_all(&seeded(&dir)).expect("open");
        let weibo = lookups.iter().find(|l| l.supplier() == "Weibo").expect("weibo");

        let artist = weibo.lookup_artist(&ids("Mx9a", None)).expect("artist");
        assert_eq!(artist.tags[&TagKey::xmp("Artist")], TagValue::from("Alice"));
    }

    #[test]
    fn location_column_values() {
        assert_eq!(parse_location("not_found").unwrap(), ProviderLocation::NotFound);
        assert_eq!(parse_location(" 1.5, 2.5 ").unwrap(), ProviderLocation::Coordinates(1.5, 2.5));
        assert!(parse_location("somewhere").is_err());
    }
}
