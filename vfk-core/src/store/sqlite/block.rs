//! Block rows stored in a table of the cache database.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use rusqlite::types::Value;
use rusqlite::{Connection, Row, params_from_iter};

use super::query::{SelectQuery, quote_identifier, to_sql_value};
use super::schema::{FID_COLUMN, GEOMETRY_COLUMN, GEOMETRY_STATE_COLUMN, JOIN_FID_COLUMN};
use super::blob;
use crate::block::{
    BlockError, DataBlock, Filter, GeometryLoad, GeometryUpdate, check_value_count,
    resolve_filter,
};
use crate::cursor::Cursor;
use crate::feature::{BlockKey, Feature, Fid, GeometryState};
use crate::kind::GeometryKind;
use crate::property::{PropertyDefn, PropertyKind};
use crate::value::PropertyValue;

/// Rows fetched per cursor page.
const PAGE_SIZE: u32 = 256;

/// Block backed by one table of the cache database.
///
/// Features are materialised from rows on demand. When geometry blobs are
/// not persisted, resolved states live in an in-memory overlay instead.
#[derive(Debug)]
pub struct SqliteBlock {
    connection: Rc<Connection>,
    key: BlockKey,
    name: String,
    table: String,
    properties: Vec<PropertyDefn>,
    geometry_kind: GeometryKind,
    select_columns: String,
    insert_sql: String,
    count: u64,
    skipped: u64,
    persist_geometry: bool,
    overlay: HashMap<Fid, (Fid, GeometryState)>,
    cursor: Cursor<Feature>,
    page: VecDeque<Feature>,
    last_fetched: Fid,
    exhausted: bool,
    geometry_load: Option<GeometryLoad>,
}

/// Row as read from SQLite, before geometry decoding.
struct RawRow {
    values: Vec<PropertyValue>,
    fid: i64,
    join_fid: i64,
    blob: Option<Vec<u8>>,
    state: i64,
}

impl SqliteBlock {
    /// Wrap an existing block table.
    ///
    /// `persist_geometry` decides whether resolved geometry is written back
    /// to the table or only kept in memory.
    pub(crate) fn new(
        connection: Rc<Connection>,
        key: BlockKey,
        name: &str,
        properties: Vec<PropertyDefn>,
        persist_geometry: bool,
    ) -> Result<Self, BlockError> {
        let table = quote_identifier(name)?;
        let geometry_kind = GeometryKind::for_block(name);
        let mut columns = properties
            .iter()
            .map(|defn| quote_identifier(defn.name()))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders = (1..=columns.len() + 2)
            .map(|position| format!("?{position}"))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_sql = format!(
            "INSERT INTO {table} ({}, {FID_COLUMN}, {JOIN_FID_COLUMN}) VALUES ({placeholders})",
            columns.join(", ")
        );
        columns.push(FID_COLUMN.to_owned());
        columns.push(JOIN_FID_COLUMN.to_owned());
        if geometry_kind.has_geometry() {
            columns.push(GEOMETRY_COLUMN.to_owned());
            columns.push(GEOMETRY_STATE_COLUMN.to_owned());
        }

        Ok(Self {
            connection,
            key,
            name: name.to_owned(),
            table,
            properties,
            geometry_kind,
            select_columns: columns.join(", "),
            insert_sql,
            count: 0,
            skipped: 0,
            persist_geometry,
            overlay: HashMap::new(),
            cursor: Cursor::default(),
            page: VecDeque::new(),
            last_fetched: 0,
            exhausted: false,
            geometry_load: None,
        })
    }

    /// Restore counters recorded in the catalog.
    pub(crate) const fn with_counts(mut self, count: u64, skipped: u64) -> Self {
        self.count = count;
        self.skipped = skipped;
        self
    }

    /// Restore a geometry summary recorded in the catalog.
    pub(crate) const fn with_geometry_load(mut self, load: Option<GeometryLoad>) -> Self {
        self.geometry_load = load;
        self
    }

    /// Whether resolved geometry is written to the table.
    #[must_use]
    pub const fn persists_geometry(&self) -> bool {
        self.persist_geometry && self.geometry_kind.has_geometry()
    }

    /// Whether every resolved state of the block is stored in its table.
    ///
    /// Holds when blobs are persisted, or when nothing had to be resolved
    /// beyond what an earlier cache run already stored.
    #[must_use]
    pub fn geometry_in_table(&self) -> bool {
        self.geometry_kind.has_geometry() && (self.persist_geometry || self.overlay.is_empty())
    }

    fn sqlite_error(
        &self,
        operation: &'static str,
    ) -> impl FnOnce(rusqlite::Error) -> BlockError + '_ {
        move |source| BlockError::Sqlite {
            block: self.name.clone(),
            operation,
            source,
        }
    }

    fn read_raw(&self, row: &Row<'_>) -> rusqlite::Result<RawRow> {
        let mut values = Vec::with_capacity(self.properties.len());
        for (index, defn) in self.properties.iter().enumerate() {
            values.push(from_sql_value(defn, row.get::<_, Value>(index)?));
        }
        let hidden = self.properties.len();
        let (blob, state) = if self.geometry_kind.has_geometry() {
            (row.get(hidden + 2)?, row.get(hidden + 3)?)
        } else {
            (None, GeometryState::Pending.code())
        };
        Ok(RawRow {
            values,
            fid: row.get(hidden)?,
            join_fid: row.get(hidden + 1)?,
            blob,
            state,
        })
    }

    fn materialise(&self, raw: RawRow) -> Result<Feature, BlockError> {
        let fid = u64::try_from(raw.fid).unwrap_or_default();
        let (join_fid, state) = match self.overlay.get(&fid) {
            Some((join_fid, state)) => (*join_fid, state.clone()),
            None => (
                u64::try_from(raw.join_fid).unwrap_or(fid),
                self.decode_state(fid, raw.state, raw.blob.as_deref())?,
            ),
        };
        Ok(Feature::restored(self.key, fid, join_fid, raw.values, state))
    }

    fn decode_state(
        &self,
        fid: Fid,
        code: i64,
        blob: Option<&[u8]>,
    ) -> Result<GeometryState, BlockError> {
        Ok(match (code, blob) {
            (1, Some(bytes)) => {
                let geometry = blob::decode(bytes).map_err(|source| BlockError::GeometryCodec {
                    block: self.name.clone(),
                    fid,
                    operation: "decode",
                    source,
                })?;
                GeometryState::validated(geometry, self.geometry_kind)
            }
            (2, _) => GeometryState::Invalid,
            (3, _) => GeometryState::Empty,
            _ => GeometryState::Pending,
        })
    }

    fn query_features(&self, query: &SelectQuery) -> Result<Vec<Feature>, BlockError> {
        let raw_rows = {
            let mut statement = self
                .connection
                .prepare_cached(&query.sql())
                .map_err(self.sqlite_error("prepare select"))?;
            let rows = statement
                .query_map(params_from_iter(query.params()), |row| self.read_raw(row))
                .map_err(self.sqlite_error("run select"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(self.sqlite_error("read row"))?;
            rows
        };
        raw_rows
            .into_iter()
            .map(|raw| self.materialise(raw))
            .collect()
    }

    /// Query for `filter`, or `None` when a null term can match nothing.
    fn filter_query(&self, filter: &Filter) -> Result<Option<SelectQuery>, BlockError> {
        let terms = resolve_filter(self, filter)?;
        if filter.has_null() {
            return Ok(None);
        }
        let mut query = SelectQuery::new(&self.table, &self.select_columns);
        for (index, value) in &terms {
            let column = self
                .properties
                .get(*index)
                .map(PropertyDefn::name)
                .unwrap_or_default();
            query = query.where_eq(column, to_sql_value(value))?;
        }
        Ok(Some(query))
    }

    /// Load the next page for the cursor; the statement is finalised before
    /// returning.
    fn fill_page(&mut self) -> Result<(), BlockError> {
        let query = SelectQuery::new(&self.table, &self.select_columns)
            .after_fid(i64::try_from(self.last_fetched).unwrap_or(i64::MAX))
            .limit(PAGE_SIZE);
        let raw_rows = {
            let mut statement = self
                .connection
                .prepare(&query.sql())
                .map_err(self.sqlite_error("prepare cursor page"))?;
            let rows = statement
                .query_map(params_from_iter(query.params()), |row| self.read_raw(row))
                .map_err(self.sqlite_error("run cursor page"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(self.sqlite_error("read cursor row"))?;
            rows
        };
        self.exhausted = raw_rows.len() < PAGE_SIZE as usize;
        for raw in raw_rows {
            let feature = self.materialise(raw)?;
            self.last_fetched = feature.fid();
            self.page.push_back(feature);
        }
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Feature>, BlockError> {
        if self.page.is_empty() && !self.exhausted {
            self.fill_page()?;
        }
        Ok(self.page.pop_front())
    }

    fn count_states(&self) -> Result<GeometryLoad, BlockError> {
        let overlay = GeometryLoad::tally(self.overlay.values().map(|(_, state)| state));
        if !self.geometry_kind.has_geometry() {
            return Ok(overlay);
        }
        let sql = format!(
            "SELECT {GEOMETRY_STATE_COLUMN}, COUNT(*) FROM {} GROUP BY {GEOMETRY_STATE_COLUMN}",
            self.table
        );
        let mut statement = self
            .connection
            .prepare_cached(&sql)
            .map_err(self.sqlite_error("prepare geometry summary"))?;
        let counts = statement
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))
            .map_err(self.sqlite_error("run geometry summary"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(self.sqlite_error("read geometry summary"))?;
        // Overlay rows are still pending in the table, so the two never overlap.
        let mut load = overlay;
        for (code, count) in counts {
            let count = u64::try_from(count).unwrap_or_default();
            match code {
                1 => load.valid += count,
                2 => load.invalid += count,
                3 => load.empty += count,
                _ => {}
            }
        }
        Ok(load)
    }

    fn write_update(&mut self, update: GeometryUpdate) -> Result<(), BlockError> {
        if update.fid == 0 || update.fid > self.count {
            return Err(BlockError::UnknownFeature {
                block: self.name.clone(),
                fid: update.fid,
            });
        }
        if !self.persists_geometry() {
            self.overlay.insert(update.fid, (update.join_fid, update.state));
            return Ok(());
        }
        let blob = match update.state.geometry() {
            Some(geometry) => Some(blob::encode(geometry).map_err(|source| {
                BlockError::GeometryCodec {
                    block: self.name.clone(),
                    fid: update.fid,
                    operation: "encode",
                    source,
                }
            })?),
            None => None,
        };
        let sql = format!(
            "UPDATE {} SET {JOIN_FID_COLUMN} = ?1, {GEOMETRY_COLUMN} = ?2, \
             {GEOMETRY_STATE_COLUMN} = ?3 WHERE {FID_COLUMN} = ?4 \
             AND {GEOMETRY_STATE_COLUMN} = 0",
            self.table
        );
        let mut statement = self
            .connection
            .prepare_cached(&sql)
            .map_err(self.sqlite_error("prepare geometry update"))?;
        statement
            .execute((
                fid_param(update.join_fid),
                blob,
                update.state.code(),
                fid_param(update.fid),
            ))
            .map_err(self.sqlite_error("write geometry"))?;
        Ok(())
    }
}

fn fid_param(fid: Fid) -> i64 {
    i64::try_from(fid).unwrap_or(i64::MAX)
}

/// Convert a stored SQLite value back into the column's property type.
fn from_sql_value(defn: &PropertyDefn, value: Value) -> PropertyValue {
    match (defn.kind(), value) {
        (_, Value::Null | Value::Blob(_)) => PropertyValue::Null,
        (PropertyKind::Integer, Value::Integer(number)) => PropertyValue::Integer(number),
        (PropertyKind::Real | PropertyKind::Integer, Value::Real(number)) => {
            PropertyValue::Real(number)
        }
        (PropertyKind::Real, Value::Integer(number)) => PropertyValue::Real(number as f64),
        (PropertyKind::String, Value::Integer(number)) => PropertyValue::String(number.to_string()),
        (PropertyKind::String, Value::Real(number)) => PropertyValue::String(number.to_string()),
        (_, Value::Text(text)) => PropertyValue::String(text).coerce(defn),
    }
}

impl DataBlock for SqliteBlock {
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
        self.count
    }

    fn skipped_rows(&self) -> u64 {
        self.skipped
    }

    fn record_skipped_row(&mut self) {
        self.skipped += 1;
    }

    fn add_feature(&mut self, values: Vec<PropertyValue>) -> Result<Fid, BlockError> {
        check_value_count(&self.name, &self.properties, &values)?;
        let fid = self.count + 1;
        let mut params: Vec<Value> = values.iter().map(to_sql_value).collect();
        params.push(Value::Integer(fid_param(fid)));
        params.push(Value::Integer(fid_param(fid)));
        {
            let mut statement = self
                .connection
                .prepare_cached(&self.insert_sql)
                .map_err(self.sqlite_error("prepare insert"))?;
            statement
                .execute(params_from_iter(params.iter()))
                .map_err(self.sqlite_error("insert row"))?;
        }
        self.count = fid;
        Ok(fid)
    }

    fn feature_by_index(&self, index: u64) -> Result<Option<Feature>, BlockError> {
        match index.checked_add(1) {
            Some(fid) => self.feature_by_id(fid),
            None => Ok(None),
        }
    }

    fn feature_by_id(&self, fid: Fid) -> Result<Option<Feature>, BlockError> {
        let query = SelectQuery::new(&self.table, &self.select_columns)
            .where_eq(FID_COLUMN, Value::Integer(fid_param(fid)))?
            .limit(1);
        Ok(self.query_features(&query)?.into_iter().next())
    }

    fn find_all(&self, filter: &Filter) -> Result<Vec<Feature>, BlockError> {
        match self.filter_query(filter)? {
            Some(query) => self.query_features(&query),
            None => Ok(Vec::new()),
        }
    }

    fn find_first(&self, filter: &Filter) -> Result<Option<Feature>, BlockError> {
        match self.filter_query(filter)? {
            Some(query) => Ok(self.query_features(&query.limit(1))?.into_iter().next()),
            None => Ok(None),
        }
    }

    fn create_index(&mut self, column: &str) -> Result<(), BlockError> {
        if self.property_index(column).is_none() {
            return Err(BlockError::UnknownColumn {
                block: self.name.clone(),
                column: column.to_owned(),
            });
        }
        let index_name = quote_identifier(&format!("idx_{}_{column}", self.name))?;
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {index_name} ON {} ({})",
            self.table,
            quote_identifier(column)?
        );
        self.connection
            .execute_batch(&sql)
            .map_err(self.sqlite_error("create index"))
    }

    fn reset_reading(&mut self) {
        self.cursor.reset();
        self.page.clear();
        self.last_fetched = 0;
        self.exhausted = false;
    }

    fn next_feature(&mut self) -> Result<Option<Feature>, BlockError> {
        let mut cursor = std::mem::take(&mut self.cursor);
        let next = cursor.advance(|| self.fetch_next());
        self.cursor = cursor;
        next
    }

    fn previous_feature(&mut self) -> Option<Feature> {
        self.cursor.step_back()
    }

    fn store_geometries(
        &mut self,
        batch: Vec<GeometryUpdate>,
    ) -> Result<GeometryLoad, BlockError> {
        for update in batch {
            self.write_update(update)?;
        }
        self.reset_reading();
        let load = self.count_states()?;
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
