//! Shared fixtures for the reader behaviour tests.

use camino::{Utf8Path, Utf8PathBuf};
use encoding_rs::WINDOWS_1250;
use std::fs;

/// File name the sample source is written under.
pub const SAMPLE_NAME: &str = "600001.vfk";

/// Epsilon for floating-point coordinate comparisons in tests.
const COORDINATE_EPSILON: f64 = 1.0e-9;

/// Sample source covering every resolver.
///
/// Points 1 to 4 form a unit square. Boundary lines 10 to 13 chain those
/// points and all border parcel 100. Line 20 is a three-point chain and
/// line 30 refers to a single-point chain. One `SOBR` row has the wrong
/// field count and one row targets an undeclared block.
pub fn sample_text() -> String {
    [
        "&HVERZE;\"5.1\"",
        "&HCODEPAGE;\"EE8MSWIN1250\"",
        "&HJMENO;\"Kraví hora\"",
        "&BSOBR;ID N30;CISLO_BODU N12;SOURADNICE_Y N10.2;SOURADNICE_X N10.2",
        "&DSOBR;1;1;0.00;0.00",
        "&DSOBR;2;2;-1.00;0.00",
        "&DSOBR;3;3;-1.00;-1.00",
        "&DSOBR;4;4;0.00;-1.00",
        "&DSOBR;6;6",
        "&DSOBR;5;5;-1000000.00;500000.00",
        "&BSBP;ID N30;BP_ID N30;PORADOVE_CISLO_BODU N38;OB_ID N30;HP_ID N30;DPM_ID N30;ZVB_ID N30;PARAMETRY_SPOJENI T100",
        "&DSBP;1;1;1;;10;;;",
        "&DSBP;2;2;2;;10;;;",
        "&DSBP;3;2;1;;11;;;",
        "&DSBP;4;3;2;;11;;;",
        "&DSBP;5;3;1;;12;;;",
        "&DSBP;6;4;2;;12;;;",
        "&DSBP;7;4;1;;13;;;",
        "&DSBP;8;1;2;;13;;;",
        "&DSBP;9;1;1;;;20;;",
        "&DSBP;10;2;2;;;20;;",
        "&DSBP;11;3;3;;;20;;",
        "&DSBP;12;5;1;;;;30;",
        "&BHP;ID N30;PAR_ID_1 N30;PAR_ID_2 N30",
        "&DHP;10;100;",
        "&DHP;11;100;",
        "&DHP;12;100;",
        "&DHP;13;100;",
        "&BDPM;ID N30",
        "&DDPM;20",
        "&BZVB;ID N30",
        "&DZVB;30",
        "&BPAR;ID N30;KMENOVE_CISLO_PAR N5",
        "&DPAR;100;¤",
        "15",
        "&DXYZ;1",
        "&K",
    ]
    .join("\r\n")
}

/// The sample source encoded as Windows-1250.
pub fn sample_bytes() -> Vec<u8> {
    let text = sample_text();
    let (bytes, _, had_errors) = WINDOWS_1250.encode(&text);
    assert!(!had_errors, "sample text must be representable in Windows-1250");
    bytes.into_owned()
}

/// Write `bytes` to `name` under `dir`, returning the path.
pub fn write_source(dir: &Utf8Path, name: &str, bytes: &[u8]) -> Utf8PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap_or_else(|err| {
        panic!("failed to write source {path}: {err}");
    });
    path
}

/// Temporary directory as a UTF-8 path.
pub fn utf8_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temporary directory {path:?} is not UTF-8"))
}

/// Compare floating-point coordinates within a small epsilon.
pub fn assert_close(actual: f64, expected: f64) {
    let delta = (actual - expected).abs();
    assert!(
        delta <= COORDINATE_EPSILON,
        "expected {expected}, got {actual} (|Δ| = {delta})"
    );
}

/// Assert that `geometry` is the unit square parcel of the sample source.
pub fn assert_unit_square(geometry: Option<&geo::Geometry<f64>>) {
    use geo::Area;

    let Some(geo::Geometry::Polygon(polygon)) = geometry else {
        panic!("expected a polygon, got {geometry:?}");
    };
    assert_close(polygon.unsigned_area(), 1.0);
    assert_eq!(polygon.exterior().0.len(), 5, "closed ring of 4 vertices");
    assert!(polygon.interiors().is_empty(), "expected no holes");
}

/// Row of `block` whose `ID` column equals `id`.
pub fn feature_with_id(block: &dyn vfk_core::DataBlock, id: &str) -> vfk_core::Feature {
    block
        .find_first(&vfk_core::Filter::eq("ID", id))
        .unwrap_or_else(|err| panic!("lookup of {id} in {} failed: {err}", block.name()))
        .unwrap_or_else(|| panic!("{} has no row with ID {id}", block.name()))
}
