//! Facade crate for the VFK cadastral exchange reader.
//!
//! This crate re-exports the block and geometry model from `vfk-core` and the
//! reader from `vfk-data`. The SQLite cache sits behind the `store-sqlite`
//! feature.

#![forbid(unsafe_code)]

pub use vfk_core::{
    BlockError, DataBlock, Feature, Fid, Filter, GeometryKind, GeometryLoad, GeometryState,
    MemoryBlock, PropertyDefn, PropertyKind, PropertyValue,
};
pub use vfk_data::{
    Backend, LoadIssue, LoadReport, MemoryBackend, MemoryReader, Reader, ReaderError,
    ReaderOptions, RecordError, SourceEncoding,
};

#[cfg(feature = "store-sqlite")]
pub use vfk_core::{SqliteBlock, SqliteStore, StoreError};
#[cfg(feature = "store-sqlite")]
pub use vfk_data::{SqliteBackend, SqliteReader};
