//! Behavioural tests for the SQLite-backed reader and its cache.
#![cfg(feature = "store-sqlite")]

use std::cell::RefCell;

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use rusqlite::Connection;
use tempfile::TempDir;
use vfk_core::DataBlock;
use vfk_data::{ReaderError, ReaderOptions, SqliteReader};

mod support;

use support::{SAMPLE_NAME, assert_unit_square, feature_with_id, sample_bytes, write_source};

/// World state for cache scenarios.
#[derive(Debug, Default)]
struct CacheWorld {
    dir: RefCell<Option<TempDir>>,
    source: RefCell<Option<Utf8PathBuf>>,
    result: RefCell<Option<Result<SqliteReader, ReaderError>>>,
}

impl CacheWorld {
    fn with_reader<T>(&self, check: impl FnOnce(&SqliteReader) -> T) -> T {
        let borrowed = self.result.borrow();
        let reader = borrowed
            .as_ref()
            .expect("read was attempted")
            .as_ref()
            .expect("expected a successful read");
        check(reader)
    }

    fn cache_connection(&self) -> Connection {
        let source = self.source.borrow();
        let path = ReaderOptions::default()
            .cache_path_for(source.as_ref().expect("source written"));
        Connection::open(path).expect("open cache database")
    }

    fn read(&self, options: ReaderOptions) {
        // Close the previous connection before the cache file is touched.
        self.result.replace(None);
        let outcome = {
            let source = self.source.borrow();
            SqliteReader::open(source.as_ref().expect("source written"), options)
        };
        self.result.replace(Some(outcome));
    }
}

#[fixture]
fn world() -> CacheWorld {
    CacheWorld::default()
}

#[given("the sample source on disk")]
fn sample_on_disk(world: &CacheWorld) {
    let dir = TempDir::new().expect("create temp dir");
    let path = write_source(&support::utf8_dir(&dir), SAMPLE_NAME, &sample_bytes());
    world.dir.replace(Some(dir));
    world.source.replace(Some(path));
}

#[when("I read the source through the cache")]
fn read_through_cache(world: &CacheWorld) {
    world.read(ReaderOptions::default());
}

#[when("I read the source through the cache again")]
fn read_again(world: &CacheWorld) {
    world.read(ReaderOptions::default());
}

#[when("I read the source through the cache again with overwrite")]
fn read_again_with_overwrite(world: &CacheWorld) {
    world.read(ReaderOptions::default().with_overwrite(true));
}

#[then("the source was parsed")]
fn source_was_parsed(world: &CacheWorld) {
    world.with_reader(|reader| {
        let report = reader.report();
        assert!(!report.reused_cache);
        assert!(report.records > 0, "records should have been read");
    });
}

#[then("the cache was reused")]
fn cache_was_reused(world: &CacheWorld) {
    world.with_reader(|reader| {
        let report = reader.report();
        assert!(report.reused_cache);
        assert_eq!(report.records, 0, "no record should be parsed");
        assert_eq!(report.features, 24);
        assert_eq!(reader.header_value("JMENO"), Some("Kraví hora"));
    });
}

#[then("block {name} holds {count} features in the cache")]
fn block_rows_cached(world: &CacheWorld, name: String, count: u64) {
    world.with_reader(|reader| {
        let block = reader.block(&name).expect("block declared");
        assert_eq!(block.feature_count(), count);
    });
    let stored: i64 = world
        .cache_connection()
        .query_row(&format!("SELECT COUNT(*) FROM \"{name}\""), [], |row| {
            row.get(0)
        })
        .expect("count cached rows");
    assert_eq!(u64::try_from(stored).ok(), Some(count));
}

#[then("the catalog records {count} invalid geometries")]
fn catalog_invalid(world: &CacheWorld, count: u64) {
    let recorded: i64 = world
        .cache_connection()
        .query_row("SELECT SUM(num_invalid) FROM vfk_blocks", [], |row| row.get(0))
        .expect("sum invalid geometries");
    assert_eq!(u64::try_from(recorded).ok(), Some(count));
}

#[then("parcel {id} is a unit square without holes")]
fn parcel_is_unit_square(world: &CacheWorld, id: String) {
    world.with_reader(|reader| {
        let parcels = reader.block("PAR").expect("PAR declared");
        assert_unit_square(feature_with_id(parcels, &id).geometry());
        assert!(parcels.geometry_load().is_some());
    });
}

#[scenario(path = "tests/features/sqlite_cache.feature", index = 0)]
fn building_the_cache(world: CacheWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_cache.feature", index = 1)]
fn reusing_the_cache(world: CacheWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_cache.feature", index = 2)]
fn rebuilding_the_cache(world: CacheWorld) {
    let _ = world;
}
