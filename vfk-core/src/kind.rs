//! Geometry kinds inferred from block names.

use geo::Geometry;

use crate::names;

/// Kind of geometry a block's features carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// Attribute-only block.
    None,
    /// One point per feature.
    Point,
    /// One line string per feature.
    Line,
    /// One polygon per feature.
    Polygon,
}

impl GeometryKind {
    /// Kind implied by a block name; unknown names carry no geometry.
    ///
    /// ```
    /// use vfk_core::GeometryKind;
    ///
    /// assert_eq!(GeometryKind::for_block("SOBR"), GeometryKind::Point);
    /// assert_eq!(GeometryKind::for_block("HP"), GeometryKind::Line);
    /// assert_eq!(GeometryKind::for_block("VLA"), GeometryKind::None);
    /// ```
    #[must_use]
    pub fn for_block(name: &str) -> Self {
        ResolverKind::for_block(name).geometry_kind()
    }

    /// Whether the block stores geometry at all.
    #[must_use]
    pub const fn has_geometry(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Whether `geometry` is acceptable for a feature of this kind.
    #[must_use]
    pub const fn accepts(self, geometry: &Geometry<f64>) -> bool {
        matches!(
            (self, geometry),
            (Self::Point, Geometry::Point(_))
                | (Self::Line, Geometry::LineString(_))
                | (Self::Polygon, Geometry::Polygon(_))
        )
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Point => "point",
            Self::Line => "line",
            Self::Polygon => "polygon",
        }
    }
}

/// Strategy used to build a block's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverKind {
    /// Nothing to resolve.
    None,
    /// Coordinates read from the row itself.
    Point,
    /// Consecutive rows chaining point references into lines.
    PointChain,
    /// Geometry borrowed from the representative chain row owning this id.
    ChainReference {
        /// Column of the chain block that points back at this block.
        owner_column: &'static str,
    },
    /// Parcel rings assembled from boundary lines.
    ParcelRings,
    /// Building rings assembled from symbol chains.
    BuildingRings,
}

impl ResolverKind {
    /// Resolver used for a block name.
    #[must_use]
    pub fn for_block(name: &str) -> Self {
        match name {
            names::SOBR | names::OBBP | names::SPOL | names::OB | names::OP | names::OBPEJ => {
                Self::Point
            }
            names::SBP | names::SBPG => Self::PointChain,
            names::HP => Self::ChainReference {
                owner_column: names::HP_ID,
            },
            names::DPM => Self::ChainReference {
                owner_column: names::DPM_ID,
            },
            names::ZVB => Self::ChainReference {
                owner_column: names::ZVB_ID,
            },
            names::PAR => Self::ParcelRings,
            names::BUD => Self::BuildingRings,
            _ => Self::None,
        }
    }

    /// Geometry kind produced by the resolver.
    #[must_use]
    pub const fn geometry_kind(self) -> GeometryKind {
        match self {
            Self::None => GeometryKind::None,
            Self::Point => GeometryKind::Point,
            Self::PointChain | Self::ChainReference { .. } => GeometryKind::Line,
            Self::ParcelRings | Self::BuildingRings => GeometryKind::Polygon,
        }
    }

    /// Resolution stage; lower stages run first.
    #[must_use]
    pub const fn stage(self) -> Option<u8> {
        match self {
            Self::None => None,
            Self::Point => Some(0),
            Self::PointChain => Some(1),
            Self::ChainReference { .. } => Some(2),
            Self::ParcelRings | Self::BuildingRings => Some(3),
        }
    }
}
