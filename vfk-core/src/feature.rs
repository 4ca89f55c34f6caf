//! Feature rows and their lazily resolved geometry.

use geo::Geometry;

use crate::kind::GeometryKind;
use crate::value::PropertyValue;

/// Feature identifier, 1-based and unique within a block.
pub type Fid = u64;

/// Position of a block inside the reader's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey(pub usize);

/// Resolution state of a feature's geometry.
///
/// Every state other than [`GeometryState::Pending`] is final.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GeometryState {
    /// Not resolved yet.
    #[default]
    Pending,
    /// Resolved to a geometry of the block's kind.
    Valid(Geometry<f64>),
    /// Resolution failed; the geometry is permanently null.
    Invalid,
    /// Continuation row of a point chain; its geometry lives on the
    /// representative row.
    Empty,
}

impl GeometryState {
    /// Accept `geometry` only when it matches `kind`.
    #[must_use]
    pub fn validated(geometry: Geometry<f64>, kind: GeometryKind) -> Self {
        if kind.accepts(&geometry) {
            Self::Valid(geometry)
        } else {
            Self::Invalid
        }
    }

    /// Whether resolution has already run for the feature.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether resolution failed.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }

    /// Resolved geometry, if any.
    #[must_use]
    pub const fn geometry(&self) -> Option<&Geometry<f64>> {
        match self {
            Self::Valid(geometry) => Some(geometry),
            _ => None,
        }
    }

    /// Numeric code persisted alongside cached geometries.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::Valid(_) => 1,
            Self::Invalid => 2,
            Self::Empty => 3,
        }
    }
}

/// One row of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    block: BlockKey,
    fid: Fid,
    join_fid: Fid,
    values: Vec<PropertyValue>,
    geometry: GeometryState,
}

impl Feature {
    /// Create a pending feature whose join id equals its id.
    #[must_use]
    pub const fn new(block: BlockKey, fid: Fid, values: Vec<PropertyValue>) -> Self {
        Self {
            block,
            fid,
            join_fid: fid,
            values,
            geometry: GeometryState::Pending,
        }
    }

    /// Rebuild a feature whose geometry state was persisted earlier.
    #[must_use]
    pub const fn restored(
        block: BlockKey,
        fid: Fid,
        join_fid: Fid,
        values: Vec<PropertyValue>,
        geometry: GeometryState,
    ) -> Self {
        Self {
            block,
            fid,
            join_fid,
            values,
            geometry,
        }
    }

    /// Owning block.
    #[must_use]
    pub const fn block(&self) -> BlockKey {
        self.block
    }

    /// Feature id.
    #[must_use]
    pub const fn fid(&self) -> Fid {
        self.fid
    }

    /// Id other blocks join against; differs from [`Feature::fid`] only for
    /// continuation rows of a point chain.
    #[must_use]
    pub const fn join_fid(&self) -> Fid {
        self.join_fid
    }

    /// Property values in column order.
    #[must_use]
    pub fn values(&self) -> &[PropertyValue] {
        &self.values
    }

    /// Value of the column at `index`.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&PropertyValue> {
        self.values.get(index)
    }

    /// Current geometry state.
    #[must_use]
    pub const fn geometry_state(&self) -> &GeometryState {
        &self.geometry
    }

    /// Resolved geometry, if any.
    #[must_use]
    pub const fn geometry(&self) -> Option<&Geometry<f64>> {
        self.geometry.geometry()
    }

    /// Record a resolution outcome unless one is already present.
    pub fn resolve(&mut self, state: GeometryState, join_fid: Fid) {
        if self.geometry.is_resolved() {
            return;
        }
        self.geometry = state;
        self.join_fid = join_fid;
    }
}
