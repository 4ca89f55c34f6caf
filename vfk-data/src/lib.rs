//! Reading VFK cadastral exchange files.
//!
//! [`text`] turns raw bytes into logical records, and [`Reader`] feeds them
//! into blocks held by a [`Backend`]: [`MemoryBackend`] for one-off reads or
//! `SqliteBackend` (feature `store-sqlite`) for a cache that later runs reuse.
//!
//! ```no_run
//! use camino::Utf8Path;
//! use vfk_core::DataBlock;
//! use vfk_data::{MemoryReader, ReaderOptions};
//!
//! let reader = MemoryReader::open(Utf8Path::new("600001.vfk"), ReaderOptions::default())?;
//! for block in reader.blocks() {
//!     println!("{}: {} rows", block.name(), block.feature_count());
//! }
//! # Ok::<(), vfk_data::ReaderError>(())
//! ```

mod error;
pub mod reader;
pub mod text;

pub use error::ReaderError;
#[cfg(feature = "store-sqlite")]
pub use reader::{SqliteBackend, SqliteReader};
pub use reader::{
    Backend, LoadIssue, LoadReport, MemoryBackend, MemoryReader, Reader, ReaderOptions, Restored,
};
pub use text::{
    LogicalLines, Record, RecordError, SourceEncoding, SourceLine, parse_record, split_fields,
};
