//! Block storage backends.
//!
//! [`memory::MemoryBlock`] keeps rows in a vector for one-shot reads;
//! `sqlite::SqliteBlock` keeps them in a cache database that later runs can
//! reopen without parsing the source again.

pub mod memory;
#[cfg(feature = "store-sqlite")]
pub mod sqlite;
