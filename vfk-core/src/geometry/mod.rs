//! Geometry construction and cross-block resolution.

mod line;
mod point;
mod resolve;
mod rings;

pub use line::{LineError, LineSubKind, build_line};
pub use point::point_from_columns;
pub use resolve::{load_geometry, resolve_block};
pub use rings::{RingAssembly, RingError, assemble_polygon, assemble_rings};
