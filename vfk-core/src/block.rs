//! The `DataBlock` capability shared by the memory and SQLite stores.
//!
//! A block owns the ordered column schema and the feature rows of one named
//! relation. Resolvers only talk to blocks through this trait, so the same
//! geometry code runs against either store.

use thiserror::Error;

use crate::feature::{BlockKey, Feature, Fid, GeometryState};
use crate::kind::GeometryKind;
use crate::property::PropertyDefn;
use crate::value::PropertyValue;

/// Conjunction of column equality terms.
///
/// ```
/// use vfk_core::{Filter, PropertyValue};
///
/// let filter = Filter::eq("HP_ID", "42").and("PORADOVE_CISLO_BODU", 1_i64);
/// assert_eq!(filter.terms().len(), 2);
/// assert_eq!(filter.terms()[1].1, PropertyValue::Integer(1));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    terms: Vec<(String, PropertyValue)>,
}

impl Filter {
    /// Match rows whose `column` equals `value`.
    #[must_use]
    pub fn eq(column: &str, value: impl Into<PropertyValue>) -> Self {
        Self::default().and(column, value)
    }

    /// Add another equality term.
    #[must_use]
    pub fn and(mut self, column: &str, value: impl Into<PropertyValue>) -> Self {
        self.terms.push((column.to_owned(), value.into()));
        self
    }

    /// Terms in insertion order.
    #[must_use]
    pub fn terms(&self) -> &[(String, PropertyValue)] {
        &self.terms
    }

    /// Whether any term compares against null; such filters match nothing.
    #[must_use]
    pub fn has_null(&self) -> bool {
        self.terms.iter().any(|(_, value)| value.is_null())
    }
}

/// Outcome of resolving one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryUpdate {
    /// Feature being updated.
    pub fid: Fid,
    /// Id other blocks should join against.
    pub join_fid: Fid,
    /// Resolved state.
    pub state: GeometryState,
}

impl GeometryUpdate {
    /// Update for a feature that owns its own geometry state.
    #[must_use]
    pub const fn owned(fid: Fid, state: GeometryState) -> Self {
        Self {
            fid,
            join_fid: fid,
            state,
        }
    }
}

/// Summary of a completed geometry load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeometryLoad {
    /// Features with a valid geometry.
    pub valid: u64,
    /// Features whose geometry failed validation.
    pub invalid: u64,
    /// Chain continuation rows without geometry of their own.
    pub empty: u64,
}

impl GeometryLoad {
    /// Tally a batch of states.
    #[must_use]
    pub fn tally<'a>(states: impl IntoIterator<Item = &'a GeometryState>) -> Self {
        states.into_iter().fold(Self::default(), |mut load, state| {
            match state {
                GeometryState::Valid(_) => load.valid += 1,
                GeometryState::Invalid => load.invalid += 1,
                GeometryState::Empty => load.empty += 1,
                GeometryState::Pending => {}
            }
            load
        })
    }
}

/// Errors raised by block operations.
#[derive(Debug, Error)]
pub enum BlockError {
    /// A filter or index named a column the block does not declare.
    #[error("block {block} has no column {column}")]
    UnknownColumn {
        /// Block name.
        block: String,
        /// Requested column.
        column: String,
    },
    /// A row did not carry one value per column.
    #[error("block {block} expects {expected} values but received {found}")]
    ValueCount {
        /// Block name.
        block: String,
        /// Declared column count.
        expected: usize,
        /// Supplied value count.
        found: usize,
    },
    /// A geometry update referenced a feature that does not exist.
    #[error("block {block} has no feature {fid}")]
    UnknownFeature {
        /// Block name.
        block: String,
        /// Missing feature id.
        fid: Fid,
    },
    /// A block or column name cannot be used as an SQL identifier.
    #[error("{identifier:?} is not a valid identifier")]
    InvalidIdentifier {
        /// Rejected identifier.
        identifier: String,
    },
    /// SQLite reported an error.
    #[cfg(feature = "store-sqlite")]
    #[error("SQLite error during {operation} on block {block}: {source}")]
    Sqlite {
        /// Block name.
        block: String,
        /// Operation being performed.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A cached geometry could not be encoded or decoded.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to {operation} geometry of feature {fid} in block {block}: {source}")]
    GeometryCodec {
        /// Block name.
        block: String,
        /// Feature id.
        fid: Fid,
        /// `encode` or `decode`.
        operation: &'static str,
        /// Codec failure.
        #[source]
        source: crate::store::sqlite::WkbError,
    },
}

/// Storage-agnostic access to one block.
pub trait DataBlock {
    /// Arena key of the block.
    fn key(&self) -> BlockKey;

    /// Block name, e.g. `SOBR`.
    fn name(&self) -> &str;

    /// Ordered column schema.
    fn properties(&self) -> &[PropertyDefn];

    /// Position of the column named `name`.
    fn property_index(&self, name: &str) -> Option<usize> {
        self.properties()
            .iter()
            .position(|defn| defn.name() == name)
    }

    /// Geometry kind, fixed when the block was created.
    fn geometry_kind(&self) -> GeometryKind;

    /// Number of stored rows.
    fn feature_count(&self) -> u64;

    /// Number of rows dropped during ingestion.
    fn skipped_rows(&self) -> u64;

    /// Count one more dropped row.
    fn record_skipped_row(&mut self);

    /// Append a row, assigning the next sequential id.
    fn add_feature(&mut self, values: Vec<PropertyValue>) -> Result<Fid, BlockError>;

    /// Row at 0-based position `index`.
    fn feature_by_index(&self, index: u64) -> Result<Option<Feature>, BlockError>;

    /// Row with id `fid`.
    fn feature_by_id(&self, fid: Fid) -> Result<Option<Feature>, BlockError>;

    /// Every row matching `filter`, ordered by id.
    fn find_all(&self, filter: &Filter) -> Result<Vec<Feature>, BlockError>;

    /// Lowest-id row matching `filter`.
    fn find_first(&self, filter: &Filter) -> Result<Option<Feature>, BlockError> {
        Ok(self.find_all(filter)?.into_iter().next())
    }

    /// Speed up equality lookups on `column`.
    fn create_index(&mut self, column: &str) -> Result<(), BlockError>;

    /// Rewind the sequential cursor.
    fn reset_reading(&mut self);

    /// Next row in id order.
    fn next_feature(&mut self) -> Result<Option<Feature>, BlockError>;

    /// Push the last returned row back so the next read yields it again.
    fn previous_feature(&mut self) -> Option<Feature>;

    /// Apply a resolution batch and record the resulting summary.
    fn store_geometries(&mut self, batch: Vec<GeometryUpdate>)
    -> Result<GeometryLoad, BlockError>;

    /// Summary of the completed geometry load, if any.
    fn geometry_load(&self) -> Option<GeometryLoad>;

    /// Drop the summary so the next load resolves the block again.
    ///
    /// Called when the unit of work holding the load was rolled back.
    fn forget_geometry_load(&mut self);
}

/// Check a row against the block's column count.
pub(crate) fn check_value_count(
    block: &str,
    properties: &[PropertyDefn],
    values: &[PropertyValue],
) -> Result<(), BlockError> {
    if values.len() == properties.len() {
        Ok(())
    } else {
        Err(BlockError::ValueCount {
            block: block.to_owned(),
            expected: properties.len(),
            found: values.len(),
        })
    }
}

/// Resolve filter columns to positions, coercing values to each column's type.
pub(crate) fn resolve_filter(
    block: &dyn DataBlock,
    filter: &Filter,
) -> Result<Vec<(usize, PropertyValue)>, BlockError> {
    filter
        .terms()
        .iter()
        .map(|(column, value)| {
            let index = block
                .property_index(column)
                .ok_or_else(|| BlockError::UnknownColumn {
                    block: block.name().to_owned(),
                    column: column.clone(),
                })?;
            let coerced = block
                .properties()
                .get(index)
                .map_or_else(|| value.clone(), |defn| value.coerce(defn));
            Ok((index, coerced))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;
    use rstest::rstest;

    #[rstest]
    fn tally_counts_each_state() {
        let states = [
            GeometryState::Valid(point! { x: 0.0, y: 0.0 }.into()),
            GeometryState::Invalid,
            GeometryState::Empty,
            GeometryState::Empty,
        ];
        let load = GeometryLoad::tally(&states);
        assert_eq!(
            load,
            GeometryLoad {
                valid: 1,
                invalid: 1,
                empty: 2
            }
        );
    }

    #[rstest]
    fn null_terms_are_detected() {
        assert!(Filter::eq("ID", PropertyValue::Null).has_null());
        assert!(!Filter::eq("ID", 1_i64).has_null());
    }
}
