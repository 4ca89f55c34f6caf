//! Block and column names of the cadastral exchange format.

/// Survey points (`Souřadnice obrazu bodů`).
pub const SOBR: &str = "SOBR";
/// Boundary points (`Obrazy bodů BP`).
pub const OBBP: &str = "OBBP";
/// Detailed survey points.
pub const SPOL: &str = "SPOL";
/// Map symbols anchored at a point.
pub const OB: &str = "OB";
/// Parcel label points.
pub const OP: &str = "OP";
/// Soil-quality label points.
pub const OBPEJ: &str = "OBPEJ";
/// Point chains forming lines.
pub const SBP: &str = "SBP";
/// Point chains of cartographic lines.
pub const SBPG: &str = "SBPG";
/// Parcel boundary lines.
pub const HP: &str = "HP";
/// Lines of other map elements.
pub const DPM: &str = "DPM";
/// Lines of special map symbols.
pub const ZVB: &str = "ZVB";
/// Parcels.
pub const PAR: &str = "PAR";
/// Buildings.
pub const BUD: &str = "BUD";

/// Primary identifier column.
pub const ID: &str = "ID";
/// Northing column, negated into the `y` axis.
pub const SOURADNICE_X: &str = "SOURADNICE_X";
/// Easting column, negated into the `x` axis.
pub const SOURADNICE_Y: &str = "SOURADNICE_Y";
/// Point reference in chain blocks.
pub const BP_ID: &str = "BP_ID";
/// Position of a point within its chain.
pub const PORADOVE_CISLO_BODU: &str = "PORADOVE_CISLO_BODU";
/// Line shape parameters of a chain.
pub const PARAMETRY_SPOJENI: &str = "PARAMETRY_SPOJENI";
/// Chain owner column for parcel boundary lines.
pub const HP_ID: &str = "HP_ID";
/// Chain owner column for map element lines.
pub const DPM_ID: &str = "DPM_ID";
/// Chain owner column for special symbol lines.
pub const ZVB_ID: &str = "ZVB_ID";
/// Chain owner column for map symbols.
pub const OB_ID: &str = "OB_ID";
/// Parcel on the left of a boundary line.
pub const PAR_ID_1: &str = "PAR_ID_1";
/// Parcel on the right of a boundary line.
pub const PAR_ID_2: &str = "PAR_ID_2";
/// Building a map symbol belongs to.
pub const BUD_ID: &str = "BUD_ID";

/// Columns the reader indexes after ingestion, per block.
pub const INDEXED_COLUMNS: &[(&str, &[&str])] = &[
    (SBP, &[HP_ID, OB_ID, DPM_ID, ZVB_ID, BP_ID]),
    (SBPG, &[HP_ID, BP_ID]),
    (HP, &[PAR_ID_1, PAR_ID_2]),
    (OB, &[BUD_ID]),
];

/// Columns worth indexing for `block`; every block also gets [`ID`].
#[must_use]
pub fn indexed_columns(block: &str) -> Vec<&'static str> {
    let mut columns = vec![ID];
    if let Some((_, extra)) = INDEXED_COLUMNS.iter().find(|(name, _)| *name == block) {
        columns.extend_from_slice(extra);
    }
    columns
}

/// Blocks whose geometry must exist before `block` can be resolved.
#[must_use]
pub fn geometry_dependencies(block: &str) -> &'static [&'static str] {
    match block {
        SBP | SBPG => &[SOBR, OBBP],
        HP | DPM | ZVB => &[SBP],
        PAR => &[HP],
        BUD => &[OB, SBP],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SBP, &[ID, HP_ID, OB_ID, DPM_ID, ZVB_ID, BP_ID])]
    #[case(HP, &[ID, PAR_ID_1, PAR_ID_2])]
    #[case("KATUZE", &[ID])]
    fn lists_indexed_columns(#[case] block: &str, #[case] expected: &[&str]) {
        assert_eq!(indexed_columns(block), expected);
    }

    #[rstest]
    fn polygons_depend_on_lines() {
        assert_eq!(geometry_dependencies(PAR), &[HP]);
        assert!(geometry_dependencies(SOBR).is_empty());
    }
}
