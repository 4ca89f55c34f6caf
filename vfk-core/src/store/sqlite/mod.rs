//! SQLite cache for parsed blocks and resolved geometry.
//!
//! The store owns the connection and the two catalog tables. Blocks created
//! or attached through it share the connection, so one transaction can span
//! every block of a source.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;
use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;

mod block;
mod query;
pub mod schema;
mod blob;

pub use block::SqliteBlock;
pub use blob::WkbError;

use crate::block::{BlockError, DataBlock, GeometryLoad};
use crate::feature::BlockKey;
use crate::property::{PropertyDefn, PropertyDefnError};
use schema::{block_table_sql, create_catalog, parse_table_defn, table_defn};

/// Errors raised by the cache store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A catalog or transaction statement failed.
    #[error("SQLite error during {operation}: {source}")]
    Sqlite {
        /// Operation being performed.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A cached block schema no longer parses.
    #[error("cached schema of block {table} is corrupt: {source}")]
    CorruptSchema {
        /// Block table name.
        table: String,
        /// Parse failure.
        #[source]
        source: PropertyDefnError,
    },
    /// A block-level operation failed.
    #[error(transparent)]
    Block(#[from] BlockError),
}

/// Identity of the source a cache was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentity {
    /// Source file name without directories.
    pub file_name: String,
    /// Source size in bytes.
    pub file_size: u64,
}

/// One row of the `vfk_blocks` catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Block name, also the table name.
    pub table_name: String,
    /// Column schema.
    pub properties: Vec<PropertyDefn>,
    /// Stored rows.
    pub num_records: u64,
    /// Rows dropped during ingestion.
    pub num_skipped: u64,
    /// Features with valid geometry.
    pub num_geometries: u64,
    /// Features with invalid geometry.
    pub num_invalid: u64,
    /// Whether resolved geometry is stored in the table.
    pub geometry_loaded: bool,
}

impl CatalogEntry {
    /// Geometry summary implied by the recorded counts.
    #[must_use]
    pub const fn geometry_load(&self) -> Option<GeometryLoad> {
        if !self.geometry_loaded {
            return None;
        }
        Some(GeometryLoad {
            valid: self.num_geometries,
            invalid: self.num_invalid,
            empty: self
                .num_records
                .saturating_sub(self.num_geometries)
                .saturating_sub(self.num_invalid),
        })
    }
}

/// Cache database holding the blocks of one source.
#[derive(Debug)]
pub struct SqliteStore {
    connection: Rc<Connection>,
}

impl SqliteStore {
    /// Open or create a cache database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let connection = Connection::open(path).map_err(|source| StoreError::OpenDatabase {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(connection)
    }

    /// Open a throwaway in-memory cache.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| StoreError::OpenDatabase {
                path: PathBuf::from(":memory:"),
                source,
            })?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> Result<Self, StoreError> {
        create_catalog(&connection)?;
        Ok(Self {
            connection: Rc::new(connection),
        })
    }

    /// Underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn run(&self, operation: &'static str, sql: &str) -> Result<(), StoreError> {
        self.connection
            .execute_batch(sql)
            .map_err(|source| StoreError::Sqlite { operation, source })
    }

    /// Start a transaction.
    pub fn begin(&self) -> Result<(), StoreError> {
        self.run("begin transaction", "BEGIN")
    }

    /// Commit the open transaction.
    pub fn commit(&self) -> Result<(), StoreError> {
        self.run("commit transaction", "COMMIT")
    }

    /// Roll back the open transaction.
    pub fn rollback(&self) -> Result<(), StoreError> {
        self.run("roll back transaction", "ROLLBACK")
    }

    /// Whether the catalog describes exactly `source` and nothing else.
    pub fn holds_source(&self, source: &SourceIdentity) -> Result<bool, StoreError> {
        let (matching, other): (i64, i64) = self
            .connection
            .query_row(
                "SELECT
                    COALESCE(SUM(file_name = ?1 AND file_size = ?2), 0),
                    COALESCE(SUM(NOT (file_name = ?1 AND file_size = ?2)), 0)
                 FROM vfk_blocks",
                (&source.file_name, size_param(source.file_size)),
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "inspect catalog",
                source,
            })?;
        Ok(matching > 0 && other == 0)
    }

    /// Drop every cached block table and clear both catalogs.
    pub fn reset(&self) -> Result<(), StoreError> {
        let tables = {
            let mut statement = self
                .connection
                .prepare("SELECT table_name FROM vfk_blocks")
                .map_err(|source| StoreError::Sqlite {
                    operation: "prepare catalog scan",
                    source,
                })?;
            let names = statement
                .query_map([], |row| row.get::<_, String>(0))
                .and_then(Iterator::collect::<Result<Vec<_>, _>>)
                .map_err(|source| StoreError::Sqlite {
                    operation: "scan catalog",
                    source,
                })?;
            names
        };
        for table in &tables {
            let quoted = query::quote_identifier(table)?;
            self.run("drop block table", &format!("DROP TABLE IF EXISTS {quoted}"))?;
        }
        debug!("cleared {} cached blocks", tables.len());
        self.run("clear catalog", "DELETE FROM vfk_blocks; DELETE FROM vfk_header")
    }

    /// Catalog rows for `source` in declaration order.
    pub fn catalog_entries(&self, source: &SourceIdentity) -> Result<Vec<CatalogEntry>, StoreError> {
        let rows = {
            let mut statement = self
                .connection
                .prepare_cached(
                    "SELECT table_name, table_defn, num_records, num_skipped,
                            num_geometries, num_invalid, geometry_loaded
                     FROM vfk_blocks WHERE file_name = ?1 ORDER BY rowid",
                )
                .map_err(|source| StoreError::Sqlite {
                    operation: "prepare catalog read",
                    source,
                })?;
            let rows = statement
                .query_map([&source.file_name], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        [
                            row.get::<_, i64>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, i64>(4)?,
                            row.get::<_, i64>(5)?,
                        ],
                        row.get::<_, bool>(6)?,
                    ))
                })
                .and_then(Iterator::collect::<Result<Vec<_>, _>>)
                .map_err(|source| StoreError::Sqlite {
                    operation: "read catalog",
                    source,
                })?;
            rows
        };

        rows.into_iter()
            .map(|(table_name, defn, counts, geometry_loaded)| -> Result<_, StoreError> {
                let properties = parse_table_defn(&defn).map_err(|source| {
                    StoreError::CorruptSchema {
                        table: table_name.clone(),
                        source,
                    }
                })?;
                let [records, skipped, geometries, invalid] =
                    counts.map(|count| u64::try_from(count).unwrap_or_default());
                Ok(CatalogEntry {
                    table_name,
                    properties,
                    num_records: records,
                    num_skipped: skipped,
                    num_geometries: geometries,
                    num_invalid: invalid,
                    geometry_loaded,
                })
            })
            .collect()
    }

    /// Create the table and catalog row for a newly declared block.
    pub fn create_block(
        &self,
        source: &SourceIdentity,
        key: BlockKey,
        name: &str,
        properties: Vec<PropertyDefn>,
        persist_geometry: bool,
    ) -> Result<SqliteBlock, StoreError> {
        let quoted = query::quote_identifier(name)?;
        let with_geometry = crate::kind::GeometryKind::for_block(name).has_geometry();
        self.run("drop stale block table", &format!("DROP TABLE IF EXISTS {quoted}"))?;
        self.run(
            "create block table",
            &block_table_sql(name, &properties, with_geometry)?,
        )?;
        self.connection
            .execute(
                "INSERT OR REPLACE INTO vfk_blocks (file_name, file_size, table_name, table_defn)
                 VALUES (?1, ?2, ?3, ?4)",
                (
                    &source.file_name,
                    size_param(source.file_size),
                    name,
                    table_defn(&properties),
                ),
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "register block",
                source,
            })?;
        Ok(SqliteBlock::new(
            Rc::clone(&self.connection),
            key,
            name,
            properties,
            persist_geometry,
        )?)
    }

    /// Reopen a block recorded in the catalog.
    pub fn attach_block(
        &self,
        key: BlockKey,
        entry: &CatalogEntry,
        persist_geometry: bool,
    ) -> Result<SqliteBlock, StoreError> {
        let block = SqliteBlock::new(
            Rc::clone(&self.connection),
            key,
            &entry.table_name,
            entry.properties.clone(),
            persist_geometry,
        )?
        .with_counts(entry.num_records, entry.num_skipped);
        Ok(block.with_geometry_load(entry.geometry_load()))
    }

    /// Write a block's counters and geometry summary to the catalog.
    pub fn record_block(
        &self,
        source: &SourceIdentity,
        block: &SqliteBlock,
    ) -> Result<(), StoreError> {
        let load = block.geometry_load();
        let persisted = load.is_some() && block.geometry_in_table();
        let summary = load.unwrap_or_default();
        self.connection
            .execute(
                "UPDATE vfk_blocks
                 SET num_records = ?1, num_skipped = ?2, num_geometries = ?3,
                     num_invalid = ?4, geometry_loaded = ?5
                 WHERE file_name = ?6 AND table_name = ?7",
                (
                    size_param(block.feature_count()),
                    size_param(block.skipped_rows()),
                    size_param(summary.valid),
                    size_param(summary.invalid),
                    persisted,
                    &source.file_name,
                    block.name(),
                ),
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "update catalog",
                source,
            })?;
        Ok(())
    }

    /// Replace the cached header records of `source`.
    pub fn record_header(
        &self,
        source: &SourceIdentity,
        header: &[(String, String)],
    ) -> Result<(), StoreError> {
        self.connection
            .execute("DELETE FROM vfk_header WHERE file_name = ?1", [&source.file_name])
            .map_err(|source| StoreError::Sqlite {
                operation: "clear header",
                source,
            })?;
        let mut statement = self
            .connection
            .prepare_cached(
                "INSERT INTO vfk_header (file_name, key, value, position) VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare header insert",
                source,
            })?;
        for (position, (key, value)) in header.iter().enumerate() {
            statement
                .execute((&source.file_name, key, value, size_param(position as u64)))
                .map_err(|source| StoreError::Sqlite {
                    operation: "insert header",
                    source,
                })?;
        }
        Ok(())
    }

    /// Cached header records of `source` in file order.
    pub fn header(&self, source: &SourceIdentity) -> Result<Vec<(String, String)>, StoreError> {
        let mut statement = self
            .connection
            .prepare_cached(
                "SELECT key, COALESCE(value, '') FROM vfk_header
                 WHERE file_name = ?1 ORDER BY position",
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare header read",
                source,
            })?;
        let header = statement
            .query_map([&source.file_name], |row| Ok((row.get(0)?, row.get(1)?)))
            .and_then(Iterator::collect::<Result<Vec<_>, _>>)
            .map_err(|source| StoreError::Sqlite {
                operation: "read header",
                source,
            })?;
        Ok(header)
    }

    /// Whether the cached table for `name` exists.
    pub fn has_table(&self, name: &str) -> Result<bool, StoreError> {
        self.connection
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(|source| StoreError::Sqlite {
                operation: "look up table",
                source,
            })
    }
}

fn size_param(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::GeometryUpdate;
    use crate::feature::GeometryState;
    use crate::value::PropertyValue;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn source() -> SourceIdentity {
        SourceIdentity {
            file_name: "600001.vfk".into(),
            file_size: 1024,
        }
    }

    fn properties() -> Vec<PropertyDefn> {
        ["ID N30", "SOURADNICE_Y N10.2", "SOURADNICE_X N10.2"]
            .into_iter()
            .map(|declaration| PropertyDefn::parse(declaration).expect("valid declaration"))
            .collect()
    }

    #[rstest]
    fn catalog_survives_reopening(source: SourceIdentity) {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.db");
        {
            let store = SqliteStore::open(&path).expect("open");
            store.begin().expect("begin");
            let mut block = store
                .create_block(&source, BlockKey(0), "SOBR", properties(), true)
                .expect("create");
            block
                .add_feature(vec!["1".into(), PropertyValue::Real(1.0), PropertyValue::Real(2.0)])
                .expect("insert");
            block.record_skipped_row();
            block
                .store_geometries(vec![GeometryUpdate::owned(1, GeometryState::Invalid)])
                .expect("store");
            store.record_block(&source, &block).expect("record");
            store
                .record_header(&source, &[("VERZE".into(), "5.1".into())])
                .expect("header");
            store.commit().expect("commit");
        }

        let store = SqliteStore::open(&path).expect("reopen");
        assert!(store.holds_source(&source).expect("inspect"));
        let entries = store.catalog_entries(&source).expect("catalog");
        let entry = entries.first().expect("one block");
        assert_eq!(entry.table_name, "SOBR");
        assert_eq!((entry.num_records, entry.num_skipped, entry.num_invalid), (1, 1, 1));
        assert!(entry.geometry_loaded);
        assert_eq!(
            store.header(&source).expect("header"),
            vec![(String::from("VERZE"), String::from("5.1"))]
        );

        let block = store.attach_block(BlockKey(0), entry, true).expect("attach");
        assert_eq!(block.feature_count(), 1);
        assert_eq!(block.geometry_load().map(|load| load.invalid), Some(1));
    }

    #[rstest]
    fn other_sources_are_not_reused(source: SourceIdentity) {
        let store = SqliteStore::open_in_memory().expect("open");
        store
            .create_block(&source, BlockKey(0), "SOBR", properties(), true)
            .expect("create");
        let resized = SourceIdentity {
            file_size: 2048,
            ..source.clone()
        };
        assert!(store.holds_source(&source).expect("inspect"));
        assert!(!store.holds_source(&resized).expect("inspect"));

        store.reset().expect("reset");
        assert!(!store.has_table("SOBR").expect("lookup"));
        assert!(!store.holds_source(&source).expect("inspect"));
    }

    #[rstest]
    fn rollback_discards_rows(source: SourceIdentity) {
        let store = SqliteStore::open_in_memory().expect("open");
        let mut block = store
            .create_block(&source, BlockKey(0), "SOBR", properties(), true)
            .expect("create");
        store.begin().expect("begin");
        block
            .add_feature(vec!["1".into(), PropertyValue::Null, PropertyValue::Null])
            .expect("insert");
        store.rollback().expect("rollback");
        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM \"SOBR\"", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 0);
    }

    #[rstest]
    fn unloaded_geometry_is_not_restored(source: SourceIdentity) {
        let store = SqliteStore::open_in_memory().expect("open");
        let block = store
            .create_block(&source, BlockKey(0), "SOBR", properties(), false)
            .expect("create");
        store.record_block(&source, &block).expect("record");
        let entries = store.catalog_entries(&source).expect("catalog");
        assert!(entries.first().is_some_and(|entry| !entry.geometry_loaded));
    }
}
