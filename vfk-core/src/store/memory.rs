//! Transient block storage.

use std::collections::HashMap;

use log::debug;

use crate::block::{
    BlockError, DataBlock, Filter, GeometryLoad, GeometryUpdate, check_value_count,
    resolve_filter,
};
use crate::cursor::Cursor;
use crate::feature::{BlockKey, Feature, Fid};
use crate::kind::GeometryKind;
use crate::property::PropertyDefn;
use crate::value::{JoinKey, PropertyValue};

/// Block whose rows live in memory for the lifetime of the reader.
///
/// ```
/// use vfk_core::{BlockKey, DataBlock, Filter, MemoryBlock, PropertyDefn, PropertyValue};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let properties = vec![PropertyDefn::parse("ID N30")?, PropertyDefn::parse("TEXT T10")?];
/// let mut block = MemoryBlock::new(BlockKey(0), "KATUZE", properties);
/// block.add_feature(vec!["1".into(), "Praha".into()])?;
/// block.add_feature(vec!["2".into(), PropertyValue::Null])?;
///
/// let found = block.find_first(&Filter::eq("ID", 2_i64))?.expect("row 2");
/// assert_eq!(found.fid(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryBlock {
    key: BlockKey,
    name: String,
    properties: Vec<PropertyDefn>,
    geometry_kind: GeometryKind,
    features: Vec<Feature>,
    indexes: HashMap<usize, HashMap<JoinKey, Vec<usize>>>,
    position: usize,
    cursor: Cursor<Feature>,
    skipped: u64,
    geometry_load: Option<GeometryLoad>,
}

impl MemoryBlock {
    /// Create an empty block.
    #[must_use]
    pub fn new(key: BlockKey, name: &str, properties: Vec<PropertyDefn>) -> Self {
        Self {
            key,
            name: name.to_owned(),
            properties,
            geometry_kind: GeometryKind::for_block(name),
            features: Vec::new(),
            indexes: HashMap::new(),
            position: 0,
            cursor: Cursor::default(),
            skipped: 0,
            geometry_load: None,
        }
    }

    /// Stored rows in id order.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    fn matches(feature: &Feature, terms: &[(usize, PropertyValue)]) -> bool {
        terms.iter().all(|(index, expected)| {
            let actual = feature.value(*index).and_then(PropertyValue::join_key);
            actual.is_some() && actual == expected.join_key()
        })
    }

    /// Positions of rows matching `terms`, narrowed through an index when one
    /// covers a term.
    fn candidates(&self, terms: &[(usize, PropertyValue)]) -> Vec<usize> {
        let indexed = terms.iter().find_map(|(index, value)| {
            let column = self.indexes.get(index)?;
            let key = value.join_key()?;
            Some(column.get(&key).cloned().unwrap_or_default())
        });
        match indexed {
            Some(positions) => positions,
            None => (0..self.features.len()).collect(),
        }
    }

    fn index_row(&mut self, position: usize) {
        let Some(feature) = self.features.get(position) else {
            return;
        };
        for (column, index) in &mut self.indexes {
            if let Some(key) = feature.value(*column).and_then(PropertyValue::join_key) {
                index.entry(key).or_default().push(position);
            }
        }
    }
}

impl DataBlock for MemoryBlock {
    fn key(&self) -> BlockKey {
        self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self) -> &[PropertyDefn] {
        &self.properties
    }

    fn geometry_kind(&self) -> GeometryKind {
        self.geometry_kind
    }

    fn feature_count(&self) -> u64 {
        self.features.len() as u64
    }

    fn skipped_rows(&self) -> u64 {
        self.skipped
    }

    fn record_skipped_row(&mut self) {
        self.skipped += 1;
    }

    fn add_feature(&mut self, values: Vec<PropertyValue>) -> Result<Fid, BlockError> {
        check_value_count(&self.name, &self.properties, &values)?;
        let fid = self.feature_count() + 1;
        self.features.push(Feature::new(self.key, fid, values));
        self.index_row(self.features.len() - 1);
        Ok(fid)
    }

    fn feature_by_index(&self, index: u64) -> Result<Option<Feature>, BlockError> {
        Ok(usize::try_from(index)
            .ok()
            .and_then(|position| self.features.get(position))
            .cloned())
    }

    fn feature_by_id(&self, fid: Fid) -> Result<Option<Feature>, BlockError> {
        match fid.checked_sub(1) {
            Some(index) => self.feature_by_index(index),
            None => Ok(None),
        }
    }

    fn find_all(&self, filter: &Filter) -> Result<Vec<Feature>, BlockError> {
        let terms = resolve_filter(self, filter)?;
        if filter.has_null() {
            return Ok(Vec::new());
        }
        Ok(self
            .candidates(&terms)
            .into_iter()
            .filter_map(|position| self.features.get(position))
            .filter(|feature| Self::matches(feature, &terms))
            .cloned()
            .collect())
    }

    fn create_index(&mut self, column: &str) -> Result<(), BlockError> {
        let index = self
            .property_index(column)
            .ok_or_else(|| BlockError::UnknownColumn {
                block: self.name.clone(),
                column: column.to_owned(),
            })?;
        if self.indexes.contains_key(&index) {
            return Ok(());
        }
        let mut entries: HashMap<JoinKey, Vec<usize>> = HashMap::new();
        for (position, feature) in self.features.iter().enumerate() {
            if let Some(key) = feature.value(index).and_then(PropertyValue::join_key) {
                entries.entry(key).or_default().push(position);
            }
        }
        debug!("indexed {}.{column} ({} keys)", self.name, entries.len());
        self.indexes.insert(index, entries);
        Ok(())
    }

    fn reset_reading(&mut self) {
        self.position = 0;
        self.cursor.reset();
    }

    fn next_feature(&mut self) -> Result<Option<Feature>, BlockError> {
        let features = &self.features;
        let position = &mut self.position;
        self.cursor.advance(|| {
            let next = features.get(*position).cloned();
            if next.is_some() {
                *position += 1;
            }
            Ok(next)
        })
    }

    fn previous_feature(&mut self) -> Option<Feature> {
        self.cursor.step_back()
    }

    fn store_geometries(
        &mut self,
        batch: Vec<GeometryUpdate>,
    ) -> Result<GeometryLoad, BlockError> {
        for update in batch {
            let feature = update
                .fid
                .checked_sub(1)
                .and_then(|index| usize::try_from(index).ok())
                .and_then(|position| self.features.get_mut(position))
                .ok_or_else(|| BlockError::UnknownFeature {
                    block: self.name.clone(),
                    fid: update.fid,
                })?;
            feature.resolve(update.state, update.join_fid);
        }
        let load = GeometryLoad::tally(self.features.iter().map(Feature::geometry_state));
        self.geometry_load = Some(load);
        Ok(load)
    }

    fn geometry_load(&self) -> Option<GeometryLoad> {
        self.geometry_load
    }

    fn forget_geometry_load(&mut self) {
        self.geometry_load = None;
    }
}
