//! Core data model and geometry resolution for VFK cadastral exchange data.
//!
//! A VFK source declares named blocks of typed columns and fills them with
//! rows that refer to one another by identifier. This crate models those
//! blocks behind the [`DataBlock`] capability, stores them either in memory
//! ([`MemoryBlock`]) or in a SQLite cache (`SqliteBlock`, behind the
//! `store-sqlite` feature), and rebuilds point, line and polygon geometry by
//! following the cross-block references.
//!
//! Text decoding and ingestion orchestration live in `vfk-data`; this crate
//! never touches the filesystem.

pub mod arena;
pub mod block;
pub mod cursor;
pub mod feature;
pub mod geometry;
pub mod kind;
pub mod names;
pub mod property;
pub mod store;
pub mod value;

pub use arena::{ArenaView, BlockArena, BlockLookup};
pub use block::{BlockError, DataBlock, Filter, GeometryLoad, GeometryUpdate};
pub use cursor::Cursor;
pub use feature::{BlockKey, Feature, Fid, GeometryState};
pub use geometry::{
    LineError, LineSubKind, RingAssembly, RingError, assemble_polygon, assemble_rings,
    load_geometry, resolve_block,
};
pub use kind::{GeometryKind, ResolverKind};
pub use property::{PropertyDefn, PropertyDefnError, PropertyKind};
pub use store::memory::MemoryBlock;
#[cfg(feature = "store-sqlite")]
pub use store::sqlite::{CatalogEntry, SourceIdentity, SqliteBlock, SqliteStore, StoreError};
pub use value::{JoinKey, PropertyValue, ValueParseError};
