use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;
use vfk_core::BlockError;
#[cfg(feature = "store-sqlite")]
use vfk_core::StoreError;

/// Errors that abort reading a source.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The source could not be read.
    #[error("failed to read VFK source {path}: {source}")]
    Source {
        /// Source location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The source path has no file name to identify it by.
    #[error("VFK source path {path} has no file name")]
    Unnamed {
        /// Source location.
        path: Utf8PathBuf,
    },
    /// The cache database location could not be prepared.
    #[error("failed to prepare cache {path}: {source}")]
    Cache {
        /// Cache location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A geometry load named a block that is not declared.
    #[error("block {name} is not declared")]
    UnknownBlock {
        /// Requested block.
        name: String,
    },
    /// A block operation failed.
    #[error(transparent)]
    Block(#[from] BlockError),
    /// The cache store failed.
    #[cfg(feature = "store-sqlite")]
    #[error(transparent)]
    Store(#[from] StoreError),
}
