//! WKB blobs for cached geometries.
//!
//! Blobs are written little endian. Only the three shapes blocks can hold
//! are cached: points, line strings and polygons.

use geo::Geometry;
use geo_traits::to_geo::ToGeoGeometry;
use thiserror::Error;
use wkb::Endianness;
use wkb::reader::read_wkb;
use wkb::writer::{WriteOptions, write_geometry};

/// WKB encoding and decoding failures.
#[derive(Debug, Error)]
pub enum WkbError {
    /// Geometry type that blocks never hold.
    #[error("unsupported geometry type {0}")]
    Unsupported(&'static str),
    /// The blob decoded to an empty geometry.
    #[error("WKB blob holds an empty geometry")]
    Empty,
    /// The `wkb` codec rejected the geometry or blob.
    #[error(transparent)]
    Codec(#[from] wkb::error::WkbError),
}

pub(crate) fn encode(geometry: &Geometry<f64>) -> Result<Vec<u8>, WkbError> {
    check_cached(geometry)?;
    let mut out = Vec::new();
    let options = WriteOptions {
        endianness: Endianness::LittleEndian,
    };
    write_geometry(&mut out, geometry, &options)?;
    Ok(out)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Geometry<f64>, WkbError> {
    let blob = read_wkb(bytes)?;
    let geometry = blob.try_to_geometry().ok_or(WkbError::Empty)?;
    check_cached(&geometry)?;
    Ok(geometry)
}

fn check_cached(geometry: &Geometry<f64>) -> Result<(), WkbError> {
    match geometry {
        Geometry::Point(_) | Geometry::LineString(_) | Geometry::Polygon(_) => Ok(()),
        Geometry::MultiPoint(_) => Err(WkbError::Unsupported("MultiPoint")),
        Geometry::MultiLineString(_) => Err(WkbError::Unsupported("MultiLineString")),
        Geometry::MultiPolygon(_) => Err(WkbError::Unsupported("MultiPolygon")),
        Geometry::GeometryCollection(_) => Err(WkbError::Unsupported("GeometryCollection")),
        Geometry::Line(_) => Err(WkbError::Unsupported("Line")),
        Geometry::Rect(_) => Err(WkbError::Unsupported("Rect")),
        Geometry::Triangle(_) => Err(WkbError::Unsupported("Triangle")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, MultiPoint, Polygon, point};
    use rstest::rstest;

    #[rstest]
    fn point_matches_the_standard_layout() {
        let bytes = encode(&Geometry::Point(point! { x: 1.0, y: 2.0 })).expect("encode");
        let mut expected = vec![1, 1, 0, 0, 0];
        expected.extend_from_slice(&1.0_f64.to_le_bytes());
        expected.extend_from_slice(&2.0_f64.to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[rstest]
    fn polygon_with_hole_is_restored() {
        let polygon = Geometry::Polygon(Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 0.0)]),
            vec![LineString::from(vec![(1.0, 1.0), (2.0, 1.0), (2.0, 1.5), (1.0, 1.0)])],
        ));
        let bytes = encode(&polygon).expect("encode");
        assert_eq!(decode(&bytes).expect("decode"), polygon);
    }

    #[rstest]
    fn big_endian_points_are_read() {
        let mut bytes = vec![0, 0, 0, 0, 1];
        bytes.extend_from_slice(&3.5_f64.to_be_bytes());
        bytes.extend_from_slice(&(-7.0_f64).to_be_bytes());
        assert_eq!(
            decode(&bytes).expect("decode"),
            Geometry::Point(point! { x: 3.5, y: -7.0 })
        );
    }

    #[rstest]
    #[case::empty(&[][..])]
    #[case::bad_byte_order(&[7, 1, 0, 0, 0][..])]
    fn malformed_blobs_are_rejected(#[case] bytes: &[u8]) {
        assert!(matches!(decode(bytes), Err(WkbError::Codec(_))));
    }

    #[rstest]
    fn multi_geometries_are_not_cached() {
        let multi = Geometry::MultiPoint(MultiPoint::from(vec![(0.0, 0.0)]));
        assert!(matches!(encode(&multi), Err(WkbError::Unsupported("MultiPoint"))));
    }
}
