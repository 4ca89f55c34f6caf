//! Storage strategies for [`Reader`](super::Reader).
//!
//! The memory backend keeps every row in process and forgets it when the
//! reader is dropped. The SQLite backend writes rows to a cache database
//! that a later run can reopen without parsing the source again.

use vfk_core::{BlockArena, BlockKey, DataBlock, MemoryBlock, PropertyDefn};

use crate::error::ReaderError;

/// Blocks and header recovered from a cache.
#[derive(Debug)]
pub struct Restored<B> {
    /// Blocks in declaration order.
    pub blocks: BlockArena<B>,
    /// Header records in source order.
    pub header: Vec<(String, String)>,
}

/// Where a reader keeps its blocks.
pub trait Backend {
    /// Block type created by this backend.
    type Block: DataBlock;

    /// Reuse a cache built from the same source, if one exists.
    fn restore(&mut self) -> Result<Option<Restored<Self::Block>>, ReaderError>;

    /// Create an empty block for a new declaration.
    fn create_block(
        &mut self,
        key: BlockKey,
        name: &str,
        properties: Vec<PropertyDefn>,
    ) -> Result<Self::Block, ReaderError>;

    /// Start a unit of work.
    fn begin(&mut self) -> Result<(), ReaderError>;

    /// Finish ingestion, recording every block and the header.
    fn finish_ingest(
        &mut self,
        blocks: &BlockArena<Self::Block>,
        header: &[(String, String)],
    ) -> Result<(), ReaderError>;

    /// Finish a geometry load for `block`.
    fn finish_geometry(&mut self, block: &Self::Block) -> Result<(), ReaderError>;

    /// Abandon the current unit of work.
    fn abort(&mut self) -> Result<(), ReaderError>;
}

/// Transient in-process storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryBackend;

impl Backend for MemoryBackend {
    type Block = MemoryBlock;

    fn restore(&mut self) -> Result<Option<Restored<MemoryBlock>>, ReaderError> {
        Ok(None)
    }

    fn create_block(
        &mut self,
        key: BlockKey,
        name: &str,
        properties: Vec<PropertyDefn>,
    ) -> Result<MemoryBlock, ReaderError> {
        Ok(MemoryBlock::new(key, name, properties))
    }

    fn begin(&mut self) -> Result<(), ReaderError> {
        Ok(())
    }

    fn finish_ingest(
        &mut self,
        _blocks: &BlockArena<MemoryBlock>,
        _header: &[(String, String)],
    ) -> Result<(), ReaderError> {
        Ok(())
    }

    fn finish_geometry(&mut self, _block: &MemoryBlock) -> Result<(), ReaderError> {
        Ok(())
    }

    fn abort(&mut self) -> Result<(), ReaderError> {
        Ok(())
    }
}

#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteBackend;

#[cfg(feature = "store-sqlite")]
mod sqlite {
    use camino::{Utf8Path, Utf8PathBuf};
    use log::debug;
    use vfk_core::{
        BlockArena, BlockKey, DataBlock, PropertyDefn, SourceIdentity, SqliteBlock, SqliteStore,
    };

    use super::{Backend, Restored};
    use crate::error::ReaderError;
    use crate::reader::options::ReaderOptions;

    /// Persistent storage in a SQLite cache database.
    #[derive(Debug)]
    pub struct SqliteBackend {
        store: SqliteStore,
        source: SourceIdentity,
        cache_path: Option<Utf8PathBuf>,
        spatial: bool,
    }

    impl SqliteBackend {
        /// Open the cache for the source at `source_path`.
        ///
        /// With [`ReaderOptions::overwrite`] set, any existing cache file is
        /// deleted first.
        pub fn open(source_path: &Utf8Path, options: &ReaderOptions) -> Result<Self, ReaderError> {
            let file_name = source_path
                .file_name()
                .ok_or_else(|| ReaderError::Unnamed {
                    path: source_path.to_path_buf(),
                })?
                .to_owned();
            let file_size =
                vfk_fs::file_size(source_path).map_err(|source| ReaderError::Source {
                    path: source_path.to_path_buf(),
                    source,
                })?;
            let cache_path = options.cache_path_for(source_path);
            let cache_error = |source| ReaderError::Cache {
                path: cache_path.clone(),
                source,
            };
            if options.overwrite && vfk_fs::remove_file_if_exists(&cache_path).map_err(cache_error)?
            {
                debug!("discarded cache {cache_path}");
            }
            vfk_fs::ensure_parent_dir(&cache_path).map_err(cache_error)?;
            let store = SqliteStore::open(cache_path.as_std_path())?;
            Ok(Self {
                store,
                source: SourceIdentity {
                    file_name,
                    file_size,
                },
                cache_path: Some(cache_path),
                spatial: options.spatial,
            })
        }

        /// Cache held in memory for a source identified by `source`.
        pub fn in_memory(source: SourceIdentity, spatial: bool) -> Result<Self, ReaderError> {
            Ok(Self {
                store: SqliteStore::open_in_memory()?,
                source,
                cache_path: None,
                spatial,
            })
        }

        /// Underlying store.
        #[must_use]
        pub const fn store(&self) -> &SqliteStore {
            &self.store
        }

        /// Identity recorded in the catalog.
        #[must_use]
        pub const fn source(&self) -> &SourceIdentity {
            &self.source
        }

        /// Cache database location; `None` for in-memory caches.
        #[must_use]
        pub fn cache_path(&self) -> Option<&Utf8Path> {
            self.cache_path.as_deref()
        }
    }

    impl Backend for SqliteBackend {
        type Block = SqliteBlock;

        fn restore(&mut self) -> Result<Option<Restored<SqliteBlock>>, ReaderError> {
            if !self.store.holds_source(&self.source)? {
                self.store.reset()?;
                return Ok(None);
            }
            let entries = self.store.catalog_entries(&self.source)?;
            let mut blocks = BlockArena::default();
            for entry in &entries {
                let block = self
                    .store
                    .attach_block(blocks.next_key(), entry, self.spatial)?;
                blocks.push(block);
            }
            let header = self.store.header(&self.source)?;
            debug!(
                "reusing cache of {} with {} blocks",
                self.source.file_name,
                blocks.len()
            );
            Ok(Some(Restored { blocks, header }))
        }

        fn create_block(
            &mut self,
            key: BlockKey,
            name: &str,
            properties: Vec<PropertyDefn>,
        ) -> Result<SqliteBlock, ReaderError> {
            Ok(self
                .store
                .create_block(&self.source, key, name, properties, self.spatial)?)
        }

        fn begin(&mut self) -> Result<(), ReaderError> {
            Ok(self.store.begin()?)
        }

        fn finish_ingest(
            &mut self,
            blocks: &BlockArena<SqliteBlock>,
            header: &[(String, String)],
        ) -> Result<(), ReaderError> {
            for block in blocks.iter() {
                self.store.record_block(&self.source, block)?;
            }
            self.store.record_header(&self.source, header)?;
            Ok(self.store.commit()?)
        }

        fn finish_geometry(&mut self, block: &SqliteBlock) -> Result<(), ReaderError> {
            self.store.record_block(&self.source, block)?;
            debug!("cached geometry of block {}", block.name());
            Ok(self.store.commit()?)
        }

        fn abort(&mut self) -> Result<(), ReaderError> {
            Ok(self.store.rollback()?)
        }
    }
}
