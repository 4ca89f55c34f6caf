//! Reading a VFK source into blocks and resolving their geometry.
//!
//! A [`Reader`] decodes the source, declares one block per `&B` record and
//! appends each `&D` row to its block. Malformed records are skipped and
//! listed in the [`LoadReport`]; only I/O and storage failures abort the
//! load. Geometry is then resolved in dependency order: points, point
//! chains, indirect lines and finally polygons.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use vfk_core::names;
use vfk_core::{BlockArena, BlockKey, DataBlock, PropertyDefn, PropertyValue, ResolverKind};

mod backend;
mod options;
mod report;

#[cfg(feature = "store-sqlite")]
pub use backend::SqliteBackend;
pub use backend::{Backend, MemoryBackend, Restored};
pub use options::{CACHE_EXTENSION, ReaderOptions};
pub use report::{LoadIssue, LoadReport};

use crate::error::ReaderError;
use crate::text::{LogicalLines, Record, RecordError, SourceEncoding, parse_record};

/// Header key selecting the source character set.
pub const CODEPAGE_HEADER: &str = "CODEPAGE";

/// Reader keeping every block in memory.
pub type MemoryReader = Reader<MemoryBackend>;

/// Reader backed by a SQLite cache.
#[cfg(feature = "store-sqlite")]
pub type SqliteReader = Reader<SqliteBackend>;

/// Blocks of one VFK source.
#[derive(Debug)]
pub struct Reader<B: Backend> {
    path: Utf8PathBuf,
    backend: B,
    options: ReaderOptions,
    header: Vec<(String, String)>,
    blocks: BlockArena<B::Block>,
    report: LoadReport,
}

impl MemoryReader {
    /// Read the source at `path` into memory.
    pub fn open(path: &Utf8Path, options: ReaderOptions) -> Result<Self, ReaderError> {
        Self::with_backend(path, MemoryBackend, options)
    }

    /// Read an in-memory source labelled `name`.
    ///
    /// ```
    /// use vfk_data::{MemoryReader, ReaderOptions};
    /// use vfk_core::DataBlock;
    ///
    /// let source = b"&HVERZE;\"5.1\"\r\n&BSOBR;ID N30;SOURADNICE_Y N10.2;SOURADNICE_X N10.2\r\n\
    ///                &DSOBR;1;-500000.00;-1000000.00\r\n&K\r\n";
    /// let reader = MemoryReader::from_bytes("sample.vfk", source, ReaderOptions::default())?;
    /// assert_eq!(reader.block("SOBR").map(DataBlock::feature_count), Some(1));
    /// # Ok::<(), vfk_data::ReaderError>(())
    /// ```
    pub fn from_bytes(
        name: &str,
        bytes: &[u8],
        options: ReaderOptions,
    ) -> Result<Self, ReaderError> {
        let mut reader = Self::empty(Utf8PathBuf::from(name), MemoryBackend, options);
        reader.ingest(bytes)?;
        reader.finish_open()?;
        Ok(reader)
    }
}

#[cfg(feature = "store-sqlite")]
impl SqliteReader {
    /// Read the source at `path` through its SQLite cache.
    ///
    /// A cache built from the same file name and size is reused without
    /// parsing the source again.
    pub fn open(path: &Utf8Path, options: ReaderOptions) -> Result<Self, ReaderError> {
        let backend = SqliteBackend::open(path, &options)?;
        Self::with_backend(path, backend, options)
    }
}

impl<B: Backend> Reader<B> {
    /// Read the source at `path` into `backend`.
    pub fn with_backend(
        path: &Utf8Path,
        backend: B,
        options: ReaderOptions,
    ) -> Result<Self, ReaderError> {
        let mut reader = Self::empty(path.to_path_buf(), backend, options);
        if let Some(restored) = reader.backend.restore()? {
            reader.adopt(restored);
        } else {
            let bytes = read_source(path)?;
            reader.ingest(&bytes)?;
        }
        reader.finish_open()?;
        Ok(reader)
    }

    /// Read an in-memory source into `backend`, reusing its cache if any.
    pub fn from_bytes_with_backend(
        name: &str,
        bytes: &[u8],
        backend: B,
        options: ReaderOptions,
    ) -> Result<Self, ReaderError> {
        let mut reader = Self::empty(Utf8PathBuf::from(name), backend, options);
        if let Some(restored) = reader.backend.restore()? {
            reader.adopt(restored);
        } else {
            reader.ingest(bytes)?;
        }
        reader.finish_open()?;
        Ok(reader)
    }

    fn empty(path: Utf8PathBuf, backend: B, options: ReaderOptions) -> Self {
        Self {
            path,
            backend,
            options,
            header: Vec::new(),
            blocks: BlockArena::default(),
            report: LoadReport::default(),
        }
    }

    fn adopt(&mut self, restored: Restored<B::Block>) {
        self.blocks = restored.blocks;
        self.header = restored.header;
        self.report = LoadReport {
            header_records: self.header.len() as u64,
            blocks: self.blocks.len() as u64,
            features: self.blocks.iter().map(DataBlock::feature_count).sum(),
            skipped_rows: self.blocks.iter().map(DataBlock::skipped_rows).sum(),
            reused_cache: true,
            ..LoadReport::default()
        };
    }

    fn finish_open(&mut self) -> Result<(), ReaderError> {
        if self.options.read_all_blocks {
            self.load_geometry()?;
        }
        Ok(())
    }

    fn ingest(&mut self, bytes: &[u8]) -> Result<(), ReaderError> {
        self.backend.begin()?;
        let outcome = self
            .read_records(bytes)
            .and_then(|()| self.create_indexes())
            .and_then(|()| self.backend.finish_ingest(&self.blocks, &self.header));
        if let Err(err) = outcome {
            if let Err(rollback) = self.backend.abort() {
                warn!("rollback after failed ingest of {} failed: {rollback}", self.path);
            }
            return Err(err);
        }
        debug!(
            "read {} blocks and {} rows from {} ({} records skipped)",
            self.report.blocks,
            self.report.features,
            self.path,
            self.report.issues.len()
        );
        Ok(())
    }

    fn read_records(&mut self, bytes: &[u8]) -> Result<(), ReaderError> {
        let mut lines = LogicalLines::new(bytes, SourceEncoding::default());
        while let Some(line) = lines.next() {
            self.report.records += 1;
            let outcome = match parse_record(&line.text) {
                Ok(Record::End) => break,
                Ok(Record::Header { key, value }) => {
                    if key == CODEPAGE_HEADER {
                        switch_encoding(&mut lines, &value);
                    }
                    self.header.push((key.to_owned(), value));
                    self.report.header_records += 1;
                    Ok(())
                }
                Ok(Record::Block { name, columns }) => self.declare_block(name, &columns),
                Ok(Record::Data { name, tokens }) => self.add_row(name, &tokens),
                Err(err) => Err(Skip::Record(err)),
            };
            match outcome {
                Ok(()) => {}
                Err(Skip::Record(err)) => {
                    warn!("{}:{}: skipping record: {err}", self.path, line.number);
                    self.report.record_issue(line.number, err);
                }
                Err(Skip::Fatal(err)) => return Err(err),
            }
        }
        Ok(())
    }

    fn declare_block(&mut self, name: &str, columns: &[&str]) -> Result<(), Skip> {
        if self.blocks.key_of(name).is_some() {
            return Err(Skip::Record(RecordError::DuplicateBlock {
                block: name.to_owned(),
            }));
        }
        let properties = columns
            .iter()
            .map(|column| PropertyDefn::parse(column))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| {
                Skip::Record(RecordError::Schema {
                    block: name.to_owned(),
                    source,
                })
            })?;
        let key = self.blocks.next_key();
        let block = self
            .backend
            .create_block(key, name, properties)
            .map_err(Skip::Fatal)?;
        self.blocks.push(block);
        self.report.blocks += 1;
        Ok(())
    }

    fn add_row(&mut self, name: &str, tokens: &[&str]) -> Result<(), Skip> {
        let block = self
            .blocks
            .find_mut(name)
            .ok_or_else(|| {
                Skip::Record(RecordError::UndeclaredBlock {
                    block: name.to_owned(),
                })
            })?;
        let properties = block.properties();
        if tokens.len() != properties.len() {
            let error = RecordError::FieldCount {
                block: name.to_owned(),
                expected: properties.len(),
                found: tokens.len(),
            };
            block.record_skipped_row();
            self.report.skipped_rows += 1;
            return Err(Skip::Record(error));
        }
        let parsed = properties
            .iter()
            .zip(tokens)
            .map(|(defn, token)| PropertyValue::parse(defn, token))
            .collect::<Result<Vec<_>, _>>();
        match parsed {
            Ok(values) => {
                block.add_feature(values).map_err(|err| Skip::Fatal(err.into()))?;
                self.report.features += 1;
                Ok(())
            }
            Err(source) => {
                block.record_skipped_row();
                self.report.skipped_rows += 1;
                Err(Skip::Record(RecordError::Value {
                    block: name.to_owned(),
                    source,
                }))
            }
        }
    }

    fn create_indexes(&mut self) -> Result<(), ReaderError> {
        for block in self.blocks.iter_mut() {
            for column in names::indexed_columns(block.name()) {
                if block.property_index(column).is_some() {
                    block.create_index(column)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve the geometry of every block in dependency order.
    ///
    /// Returns the number of features whose geometry failed validation.
    /// Blocks that already finished a load are not resolved again.
    pub fn load_geometry(&mut self) -> Result<u64, ReaderError> {
        if self.options.suppress_geometry {
            return Ok(0);
        }
        let mut order: Vec<(u8, BlockKey)> = self
            .blocks
            .iter()
            .filter_map(|block| {
                ResolverKind::for_block(block.name())
                    .stage()
                    .map(|stage| (stage, block.key()))
            })
            .collect();
        order.sort_unstable();
        let mut invalid = 0;
        for (_, key) in order {
            invalid += self.load_key(key)?;
        }
        Ok(invalid)
    }

    /// Resolve the geometry of `name` and of every block it depends on.
    ///
    /// Returns the number of invalid features in `name`.
    pub fn load_block_geometry(&mut self, name: &str) -> Result<u64, ReaderError> {
        let key = self
            .blocks
            .key_of(name)
            .ok_or_else(|| ReaderError::UnknownBlock {
                name: name.to_owned(),
            })?;
        if self.options.suppress_geometry {
            return Ok(0);
        }
        for dependency in names::geometry_dependencies(name) {
            if self.blocks.key_of(dependency).is_some() {
                self.load_block_geometry(dependency)?;
            }
        }
        self.load_key(key)
    }

    fn load_key(&mut self, key: BlockKey) -> Result<u64, ReaderError> {
        let Some((block, others)) = self.blocks.split_at_key(key) else {
            return Err(ReaderError::UnknownBlock {
                name: format!("#{}", key.0),
            });
        };
        if let Some(load) = block.geometry_load() {
            return Ok(load.invalid);
        }
        self.backend.begin()?;
        let outcome = vfk_core::load_geometry(&mut *block, &others)
            .map_err(ReaderError::from)
            .and_then(|load| {
                self.backend.finish_geometry(block)?;
                Ok(load)
            });
        match outcome {
            Ok(load) => Ok(load.invalid),
            Err(err) => {
                block.forget_geometry_load();
                if let Err(rollback) = self.backend.abort() {
                    warn!("rollback after failed geometry load failed: {rollback}");
                }
                Err(err)
            }
        }
    }

    /// Source location or label.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Options the reader was opened with.
    #[must_use]
    pub const fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Storage backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Header records in source order.
    #[must_use]
    pub fn header(&self) -> &[(String, String)] {
        &self.header
    }

    /// First header value recorded for `key`.
    #[must_use]
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.header
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Ingestion counters.
    #[must_use]
    pub const fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Number of declared blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks in declaration order.
    pub fn blocks(&self) -> impl Iterator<Item = &B::Block> {
        self.blocks.iter()
    }

    /// Block called `name`.
    #[must_use]
    pub fn block(&self, name: &str) -> Option<&B::Block> {
        self.blocks.find(name)
    }

    /// Mutable block called `name`, e.g. for cursor reads.
    pub fn block_mut(&mut self, name: &str) -> Option<&mut B::Block> {
        self.blocks.find_mut(name)
    }

    /// Block stored under `key`.
    #[must_use]
    pub fn block_by_key(&self, key: BlockKey) -> Option<&B::Block> {
        self.blocks.get(key)
    }
}

/// Why a record was not stored.
enum Skip {
    /// The record is skipped and reading continues.
    Record(RecordError),
    /// Storage failed; the load aborts.
    Fatal(ReaderError),
}

fn switch_encoding(lines: &mut LogicalLines<'_>, codepage: &str) {
    match SourceEncoding::from_codepage(codepage) {
        Some(encoding) => lines.set_encoding(encoding),
        None => warn!(
            "unknown codepage {codepage:?}, keeping {}",
            lines.encoding().encoding().name()
        ),
    }
}

fn read_source(path: &Utf8Path) -> Result<Vec<u8>, ReaderError> {
    vfk_fs::read_bytes(path).map_err(|source| ReaderError::Source {
        path: path.to_path_buf(),
        source,
    })
}
