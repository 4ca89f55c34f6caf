//! Geometry resolvers, one per [`ResolverKind`].
//!
//! A resolver reads the target block through its cursor and the other blocks
//! through equality joins, and returns one [`GeometryUpdate`] per pending
//! feature. Applying the batch is left to [`load_geometry`].

use geo::{Coord, Geometry, LineString};
use log::{debug, warn};

use super::line::{LineSubKind, build_line};
use super::point::point_from_columns;
use super::rings::assemble_polygon;
use crate::arena::BlockLookup;
use crate::block::{BlockError, DataBlock, Filter, GeometryLoad, GeometryUpdate};
use crate::feature::{Feature, GeometryState};
use crate::kind::{GeometryKind, ResolverKind};
use crate::names;
use crate::value::PropertyValue;

/// Resolve and store the geometry of `target`, returning the load summary.
///
/// A block that already finished a load returns the cached summary without
/// touching its features again.
pub fn load_geometry(
    target: &mut dyn DataBlock,
    others: &dyn BlockLookup,
) -> Result<GeometryLoad, BlockError> {
    if let Some(load) = target.geometry_load() {
        return Ok(load);
    }
    let updates = resolve_block(target, others)?;
    let load = target.store_geometries(updates)?;
    if load.invalid > 0 {
        debug!(
            "block {}: {} of {} features have invalid geometry",
            target.name(),
            load.invalid,
            target.feature_count()
        );
    }
    Ok(load)
}

/// Compute geometry updates for every pending feature of `target`.
pub fn resolve_block(
    target: &mut dyn DataBlock,
    others: &dyn BlockLookup,
) -> Result<Vec<GeometryUpdate>, BlockError> {
    target.reset_reading();
    let updates = match ResolverKind::for_block(target.name()) {
        ResolverKind::None => Ok(Vec::new()),
        ResolverKind::Point => resolve_points(target),
        ResolverKind::PointChain => resolve_chains(target, others),
        ResolverKind::ChainReference { owner_column } => {
            resolve_references(target, others, owner_column)
        }
        ResolverKind::ParcelRings => resolve_parcels(target, others),
        ResolverKind::BuildingRings => resolve_buildings(target, others),
    };
    target.reset_reading();
    updates
}

fn resolve_points(target: &mut dyn DataBlock) -> Result<Vec<GeometryUpdate>, BlockError> {
    let x_at = target.property_index(names::SOURADNICE_X);
    let y_at = target.property_index(names::SOURADNICE_Y);
    let mut updates = Vec::new();
    while let Some(feature) = target.next_feature()? {
        if feature.geometry_state().is_resolved() {
            continue;
        }
        let x = x_at.and_then(|index| feature.value(index));
        let y = y_at.and_then(|index| feature.value(index));
        let state = match x.zip(y).and_then(|(x, y)| point_from_columns(x, y)) {
            Some(point) => GeometryState::validated(point.into(), GeometryKind::Point),
            None => {
                debug!("{} feature {}: missing coordinates", target.name(), feature.fid());
                GeometryState::Invalid
            }
        };
        updates.push(GeometryUpdate::owned(feature.fid(), state));
    }
    Ok(updates)
}

struct ChainColumns {
    sequence: Option<usize>,
    point: Option<usize>,
    parameters: Option<usize>,
}

fn resolve_chains(
    target: &mut dyn DataBlock,
    others: &dyn BlockLookup,
) -> Result<Vec<GeometryUpdate>, BlockError> {
    let columns = ChainColumns {
        sequence: target.property_index(names::PORADOVE_CISLO_BODU),
        point: target.property_index(names::BP_ID),
        parameters: target.property_index(names::PARAMETRY_SPOJENI),
    };
    let point_blocks: Vec<&dyn DataBlock> = [names::SOBR, names::OBBP]
        .into_iter()
        .filter_map(|name| others.lookup(name))
        .collect();

    let mut updates = Vec::new();
    while let Some(group) = next_chain_group(target, columns.sequence)? {
        let Some(first) = group.first() else {
            continue;
        };
        if first.geometry_state().is_resolved() {
            continue;
        }
        let representative = first.fid();
        let state = chain_state(target.name(), &group, &columns, &point_blocks)?;
        updates.push(GeometryUpdate::owned(representative, state));
        updates.extend(group.iter().skip(1).map(|row| GeometryUpdate {
            fid: row.fid(),
            join_fid: representative,
            state: GeometryState::Empty,
        }));
    }
    Ok(updates)
}

/// Read the rows of the next chain, pushing the start of the following one
/// back onto the cursor.
fn next_chain_group(
    target: &mut dyn DataBlock,
    sequence_at: Option<usize>,
) -> Result<Option<Vec<Feature>>, BlockError> {
    let Some(first) = target.next_feature()? else {
        return Ok(None);
    };
    let mut last = sequence_of(&first, sequence_at);
    let mut group = vec![first];
    while let Some(row) = target.next_feature()? {
        let current = sequence_of(&row, sequence_at);
        let restarts = match (last, current) {
            (_, Some(1)) => true,
            (Some(previous), Some(number)) if number <= previous => {
                warn!(
                    "{} feature {}: point order {number} follows {previous}; starting a new line",
                    target.name(),
                    row.fid()
                );
                true
            }
            _ => false,
        };
        if restarts {
            target.previous_feature();
            break;
        }
        last = current;
        group.push(row);
    }
    Ok(Some(group))
}

fn sequence_of(feature: &Feature, sequence_at: Option<usize>) -> Option<i64> {
    sequence_at
        .and_then(|index| feature.value(index))
        .and_then(PropertyValue::as_i64)
}

fn chain_state(
    block: &str,
    group: &[Feature],
    columns: &ChainColumns,
    point_blocks: &[&dyn DataBlock],
) -> Result<GeometryState, BlockError> {
    let parameters = group
        .first()
        .zip(columns.parameters)
        .and_then(|(row, index)| row.value(index))
        .and_then(PropertyValue::as_str);
    let kind = match LineSubKind::parse(parameters) {
        Ok(kind) => kind,
        Err(error) => {
            debug!("{block}: chain starting at {}: {error}", representative_fid(group));
            return Ok(GeometryState::Invalid);
        }
    };

    let mut coords = Vec::with_capacity(group.len());
    for row in group {
        let Some(coord) = chain_point(row, columns.point, point_blocks)? else {
            debug!("{block} feature {}: point reference not found", row.fid());
            return Ok(GeometryState::Invalid);
        };
        coords.push(coord);
    }

    Ok(match build_line(kind, &coords) {
        Ok(line) => GeometryState::validated(line.into(), GeometryKind::Line),
        Err(error) => {
            debug!("{block}: chain starting at {}: {error}", representative_fid(group));
            GeometryState::Invalid
        }
    })
}

fn representative_fid(group: &[Feature]) -> u64 {
    group.first().map_or(0, Feature::fid)
}

/// Coordinate of the point a chain row references, searched in each point
/// block in turn.
fn chain_point(
    row: &Feature,
    point_at: Option<usize>,
    point_blocks: &[&dyn DataBlock],
) -> Result<Option<Coord<f64>>, BlockError> {
    let Some(reference) = point_at.and_then(|index| row.value(index)) else {
        return Ok(None);
    };
    for block in point_blocks {
        for candidate in matching_rows(*block, names::ID, reference)? {
            if let Some(Geometry::Point(point)) = candidate.geometry() {
                return Ok(Some(point.0));
            }
        }
    }
    Ok(None)
}

fn resolve_references(
    target: &mut dyn DataBlock,
    others: &dyn BlockLookup,
    owner_column: &str,
) -> Result<Vec<GeometryUpdate>, BlockError> {
    let id_at = target.property_index(names::ID);
    let chains = others.lookup(names::SBP);
    let mut updates = Vec::new();
    while let Some(feature) = target.next_feature()? {
        if feature.geometry_state().is_resolved() {
            continue;
        }
        let line = match (chains, id_at.and_then(|index| feature.value(index))) {
            (Some(chains), Some(id)) => chain_line(chains, owner_column, id)?,
            _ => None,
        };
        let state = match line {
            Some(line) => GeometryState::validated(line.into(), GeometryKind::Line),
            None => {
                debug!("{} feature {}: no chain owns this line", target.name(), feature.fid());
                GeometryState::Invalid
            }
        };
        updates.push(GeometryUpdate::owned(feature.fid(), state));
    }
    Ok(updates)
}

/// Line held by the first chain representative whose `column` equals `id`.
fn chain_line(
    chains: &dyn DataBlock,
    column: &str,
    id: &PropertyValue,
) -> Result<Option<LineString<f64>>, BlockError> {
    let representative = matching_rows(chains, column, id)?
        .into_iter()
        .find(|row| !matches!(row.geometry_state(), GeometryState::Empty));
    Ok(match representative.as_ref().and_then(Feature::geometry) {
        Some(Geometry::LineString(line)) => Some(line.clone()),
        _ => None,
    })
}

fn resolve_parcels(
    target: &mut dyn DataBlock,
    others: &dyn BlockLookup,
) -> Result<Vec<GeometryUpdate>, BlockError> {
    let id_at = target.property_index(names::ID);
    let boundaries = others.lookup(names::HP);
    let mut updates = Vec::new();
    while let Some(feature) = target.next_feature()? {
        if feature.geometry_state().is_resolved() {
            continue;
        }
        let mut pool = Vec::new();
        if let (Some(boundaries), Some(id)) = (boundaries, id_at.and_then(|i| feature.value(i))) {
            // Both sides are queried separately so an inner line lands twice.
            for side in [names::PAR_ID_1, names::PAR_ID_2] {
                for row in matching_rows(boundaries, side, id)? {
                    if let Some(Geometry::LineString(line)) = row.geometry() {
                        pool.push(line.clone());
                    }
                }
            }
        }
        let state = polygon_state(target.name(), &feature, &pool);
        updates.push(GeometryUpdate::owned(feature.fid(), state));
    }
    Ok(updates)
}

fn resolve_buildings(
    target: &mut dyn DataBlock,
    others: &dyn BlockLookup,
) -> Result<Vec<GeometryUpdate>, BlockError> {
    let id_at = target.property_index(names::ID);
    let symbols = others.lookup(names::OB);
    let chains = others.lookup(names::SBP);
    let symbol_id_at = symbols.and_then(|block| block.property_index(names::ID));
    let mut updates = Vec::new();
    while let Some(feature) = target.next_feature()? {
        if feature.geometry_state().is_resolved() {
            continue;
        }
        let mut pool = Vec::new();
        if let (Some(symbols), Some(chains), Some(id)) =
            (symbols, chains, id_at.and_then(|i| feature.value(i)))
        {
            for symbol in matching_rows(symbols, names::BUD_ID, id)? {
                let Some(symbol_id) = symbol_id_at.and_then(|i| symbol.value(i)) else {
                    continue;
                };
                if let Some(line) = chain_line(chains, names::OB_ID, symbol_id)? {
                    pool.push(line);
                }
            }
        }
        let state = polygon_state(target.name(), &feature, &pool);
        updates.push(GeometryUpdate::owned(feature.fid(), state));
    }
    Ok(updates)
}

fn polygon_state(block: &str, feature: &Feature, pool: &[LineString<f64>]) -> GeometryState {
    match assemble_polygon(pool) {
        Ok(polygon) => GeometryState::validated(polygon.into(), GeometryKind::Polygon),
        Err(error) => {
            debug!("{block} feature {}: {error}", feature.fid());
            GeometryState::Invalid
        }
    }
}

/// Rows of `block` whose `column` equals `value`; nothing when the column is
/// not declared or the value is null.
fn matching_rows(
    block: &dyn DataBlock,
    column: &str,
    value: &PropertyValue,
) -> Result<Vec<Feature>, BlockError> {
    if value.is_null() || block.property_index(column).is_none() {
        return Ok(Vec::new());
    }
    block.find_all(&Filter::eq(column, value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::BlockArena;
    use crate::property::PropertyDefn;
    use crate::store::memory::MemoryBlock;
    use geo::{Area, point};
    use rstest::rstest;

    fn block(arena: &mut BlockArena<MemoryBlock>, name: &str, columns: &[&str]) {
        let key = arena.next_key();
        let properties = columns
            .iter()
            .map(|declaration| PropertyDefn::parse(declaration).expect("valid declaration"))
            .collect();
        arena.push(MemoryBlock::new(key, name, properties));
    }

    fn row(arena: &mut BlockArena<MemoryBlock>, name: &str, values: Vec<PropertyValue>) {
        arena
            .find_mut(name)
            .expect("declared block")
            .add_feature(values)
            .expect("matching column count");
    }

    fn load_all(arena: &mut BlockArena<MemoryBlock>) {
        let mut keys: Vec<_> = arena
            .iter()
            .filter_map(|block| ResolverKind::for_block(block.name()).stage().map(|s| (s, block.key())))
            .collect();
        keys.sort();
        for (_, key) in keys {
            let (target, view) = arena.split_at_key(key).expect("valid key");
            load_geometry(target, &view).expect("load succeeds");
        }
    }

    fn s(text: &str) -> PropertyValue {
        PropertyValue::from(text)
    }

    fn chain_arena(points: &[(&str, f64, f64)]) -> BlockArena<MemoryBlock> {
        let mut arena = BlockArena::default();
        block(&mut arena, "SOBR", &["ID N30", "SOURADNICE_Y N10.2", "SOURADNICE_X N10.2"]);
        block(
            &mut arena,
            "SBP",
            &["ID N30", "BP_ID N30", "PORADOVE_CISLO_BODU N9", "HP_ID N30", "OB_ID N30", "PARAMETRY_SPOJENI T100"],
        );
        for (id, x, y) in points {
            // Columns hold negated, swapped coordinates.
            row(&mut arena, "SOBR", vec![s(id), PropertyValue::Real(-x), PropertyValue::Real(-y)]);
        }
        arena
    }

    fn sbp(arena: &mut BlockArena<MemoryBlock>, id: &str, point: &str, order: i64, hp: &str) {
        let hp_value = if hp.is_empty() { PropertyValue::Null } else { s(hp) };
        row(
            arena,
            "SBP",
            vec![s(id), s(point), PropertyValue::Integer(order), hp_value, PropertyValue::Null, PropertyValue::Null],
        );
    }

    #[rstest]
    fn point_columns_are_negated_and_swapped() {
        let mut arena = BlockArena::default();
        block(&mut arena, "SOBR", &["ID N30", "SOURADNICE_X N10.2", "SOURADNICE_Y N10.2"]);
        row(&mut arena, "SOBR", vec![s("1"), PropertyValue::Real(500_000.0), PropertyValue::Real(-1_000_000.0)]);
        load_all(&mut arena);
        let feature = arena.find("SOBR").and_then(|b| b.features().first()).expect("row");
        assert_eq!(
            feature.geometry(),
            Some(&Geometry::Point(point! { x: 1_000_000.0, y: -500_000.0 }))
        );
    }

    #[rstest]
    fn chained_rows_form_one_line_on_the_first_row() {
        let mut arena = chain_arena(&[("1", 0.0, 0.0), ("2", 1.0, 0.0), ("3", 1.0, 1.0)]);
        sbp(&mut arena, "10", "1", 1, "");
        sbp(&mut arena, "11", "2", 2, "");
        sbp(&mut arena, "12", "3", 3, "");
        sbp(&mut arena, "13", "3", 1, "");
        sbp(&mut arena, "14", "1", 2, "");
        load_all(&mut arena);

        let features = arena.find("SBP").expect("block").features();
        let expected = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert_eq!(features.first().and_then(Feature::geometry), Some(&expected.into()));
        let states: Vec<_> = features.iter().map(|f| f.geometry_state().code()).collect();
        assert_eq!(states, vec![1, 3, 3, 1, 3]);
        let joins: Vec<_> = features.iter().map(Feature::join_fid).collect();
        assert_eq!(joins, vec![1, 1, 1, 4, 4]);
    }

    #[rstest]
    fn single_point_chain_is_invalid() {
        let mut arena = chain_arena(&[("1", 0.0, 0.0)]);
        sbp(&mut arena, "10", "1", 1, "");
        load_all(&mut arena);
        let load = arena.find("SBP").and_then(MemoryBlock::geometry_load).expect("loaded");
        assert_eq!(load.invalid, 1);
    }

    #[rstest]
    fn decreasing_order_starts_a_new_line() {
        let mut arena = chain_arena(&[("1", 0.0, 0.0), ("2", 1.0, 0.0), ("3", 2.0, 0.0)]);
        sbp(&mut arena, "10", "1", 2, "");
        sbp(&mut arena, "11", "2", 3, "");
        sbp(&mut arena, "12", "2", 2, "");
        sbp(&mut arena, "13", "3", 3, "");
        load_all(&mut arena);
        let joins: Vec<_> = arena.find("SBP").expect("block").features().iter().map(Feature::join_fid).collect();
        assert_eq!(joins, vec![1, 1, 3, 3]);
    }

    #[rstest]
    fn unit_square_parcel_from_boundary_lines() {
        let mut arena = chain_arena(&[("1", 0.0, 0.0), ("2", 1.0, 0.0), ("3", 1.0, 1.0), ("4", 0.0, 1.0)]);
        block(&mut arena, "HP", &["ID N30", "PAR_ID_1 N30", "PAR_ID_2 N30"]);
        block(&mut arena, "PAR", &["ID N30"]);
        let edges = [("1", "2"), ("3", "2"), ("3", "4"), ("4", "1")];
        for (index, (from, to)) in edges.iter().enumerate() {
            let hp = format!("{}", 100 + index);
            sbp(&mut arena, &format!("{}", 20 + 2 * index), from, 1, &hp);
            sbp(&mut arena, &format!("{}", 21 + 2 * index), to, 2, &hp);
            row(&mut arena, "HP", vec![s(&hp), s("7"), s("8")]);
        }
        row(&mut arena, "PAR", vec![s("7")]);
        row(&mut arena, "PAR", vec![s("9")]);
        load_all(&mut arena);

        let parcels = arena.find("PAR").expect("block").features();
        let Some(Geometry::Polygon(polygon)) = parcels.first().and_then(Feature::geometry) else {
            panic!("parcel 7 should be a polygon");
        };
        assert_eq!(polygon.exterior().0.len(), 5);
        assert!((polygon.unsigned_area() - 1.0).abs() < 1e-12);
        assert!(parcels.get(1).is_some_and(|f| f.geometry_state().is_invalid()));
    }

    #[rstest]
    fn building_outline_follows_its_symbol_chain() {
        let mut arena = chain_arena(&[("1", 0.0, 0.0), ("2", 2.0, 0.0), ("3", 2.0, 2.0), ("4", 0.0, 2.0)]);
        block(&mut arena, "OB", &["ID N30", "BUD_ID N30"]);
        block(&mut arena, "BUD", &["ID N30"]);
        for (order, point) in ["1", "2", "3", "4", "1"].into_iter().enumerate() {
            let order = i64::try_from(order).expect("small index") + 1;
            let id = format!("{}", 40 + order);
            row(
                &mut arena,
                "SBP",
                vec![s(&id), s(point), PropertyValue::Integer(order), PropertyValue::Null, s("50"), PropertyValue::Null],
            );
        }
        row(&mut arena, "OB", vec![s("50"), s("700")]);
        row(&mut arena, "OB", vec![s("51"), s("701")]);
        row(&mut arena, "BUD", vec![s("700")]);
        row(&mut arena, "BUD", vec![s("701")]);
        row(&mut arena, "BUD", vec![s("702")]);
        load_all(&mut arena);

        let buildings = arena.find("BUD").expect("block").features();
        let Some(Geometry::Polygon(polygon)) = buildings.first().and_then(Feature::geometry) else {
            panic!("building 700 should be a polygon");
        };
        assert!((polygon.unsigned_area() - 4.0).abs() < 1e-12);
        // 701 has a symbol without a chain and 702 has no symbol at all.
        assert!(buildings.iter().skip(1).all(|f| f.geometry_state().is_invalid()));
        let load = arena.find("BUD").and_then(MemoryBlock::geometry_load).expect("loaded");
        assert_eq!((load.valid, load.invalid), (1, 2));
    }

    #[rstest]
    fn second_load_returns_cached_summary() {
        let mut arena = chain_arena(&[("1", 0.0, 0.0)]);
        load_all(&mut arena);
        let key = arena.key_of("SOBR").expect("declared");
        let (target, view) = arena.split_at_key(key).expect("valid key");
        let first = target.geometry_load().expect("loaded");
        let again = load_geometry(target, &view).expect("cached");
        assert_eq!(first, again);
        assert_eq!(again.valid, 1);
    }
}
