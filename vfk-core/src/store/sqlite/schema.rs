//! Cache database layout.
//!
//! Every block becomes one table holding its declared columns plus hidden
//! bookkeeping columns. Two catalog tables describe what the cache holds so
//! a later run can reuse it.

use rusqlite::Connection;

use super::StoreError;
use super::query::quote_identifier;
use crate::block::BlockError;
use crate::feature::GeometryState;
use crate::property::PropertyDefn;

/// Hidden primary key holding the feature id.
pub const FID_COLUMN: &str = "_fid";
/// Hidden join id column.
pub const JOIN_FID_COLUMN: &str = "_join_fid";
/// Hidden WKB geometry column.
pub const GEOMETRY_COLUMN: &str = "_geometry";
/// Hidden geometry state column.
pub const GEOMETRY_STATE_COLUMN: &str = "_geometry_state";

pub(crate) fn create_catalog(connection: &Connection) -> Result<(), StoreError> {
    run_schema_step(
        connection,
        "create vfk_blocks",
        "CREATE TABLE IF NOT EXISTS vfk_blocks (
            file_name TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            table_name TEXT NOT NULL,
            table_defn TEXT NOT NULL,
            num_records INTEGER NOT NULL DEFAULT 0,
            num_skipped INTEGER NOT NULL DEFAULT 0,
            num_geometries INTEGER NOT NULL DEFAULT 0,
            num_invalid INTEGER NOT NULL DEFAULT 0,
            geometry_loaded INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (file_name, table_name)
        )",
    )?;
    run_schema_step(
        connection,
        "create vfk_header",
        "CREATE TABLE IF NOT EXISTS vfk_header (
            file_name TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT,
            position INTEGER NOT NULL,
            PRIMARY KEY (file_name, position)
        )",
    )
}

fn run_schema_step(connection: &Connection, step: &'static str, sql: &str) -> Result<(), StoreError> {
    connection
        .execute_batch(sql)
        .map_err(|source| StoreError::Sqlite {
            operation: step,
            source,
        })
}

/// `CREATE TABLE` statement for a block.
pub(crate) fn block_table_sql(
    name: &str,
    properties: &[PropertyDefn],
    with_geometry: bool,
) -> Result<String, BlockError> {
    let mut columns = Vec::with_capacity(properties.len() + 4);
    for defn in properties {
        columns.push(format!(
            "{} {}",
            quote_identifier(defn.name())?,
            defn.kind().sql_type()
        ));
    }
    columns.push(format!("{FID_COLUMN} INTEGER PRIMARY KEY"));
    columns.push(format!("{JOIN_FID_COLUMN} INTEGER NOT NULL"));
    if with_geometry {
        columns.push(format!("{GEOMETRY_COLUMN} BLOB"));
        columns.push(format!(
            "{GEOMETRY_STATE_COLUMN} INTEGER NOT NULL DEFAULT {}",
            GeometryState::Pending.code()
        ));
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(name)?,
        columns.join(", ")
    ))
}

/// Serialise a block schema for the `table_defn` catalog column.
pub(crate) fn table_defn(properties: &[PropertyDefn]) -> String {
    properties
        .iter()
        .map(PropertyDefn::declaration)
        .collect::<Vec<_>>()
        .join(";")
}

/// Parse a `table_defn` catalog value back into column definitions.
pub(crate) fn parse_table_defn(text: &str) -> Result<Vec<PropertyDefn>, crate::PropertyDefnError> {
    text.split(';')
        .filter(|declaration| !declaration.trim().is_empty())
        .map(PropertyDefn::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn properties() -> Vec<PropertyDefn> {
        ["ID N30", "SOURADNICE_Y N10.2", "KODCHB_KOD N2"]
            .into_iter()
            .map(|declaration| PropertyDefn::parse(declaration).expect("valid declaration"))
            .collect()
    }

    #[rstest]
    fn geometry_blocks_get_hidden_geometry_columns() {
        let sql = block_table_sql("SOBR", &properties(), true).expect("valid names");
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"SOBR\" (\"ID\" TEXT, \"SOURADNICE_Y\" REAL, \
             \"KODCHB_KOD\" INTEGER, _fid INTEGER PRIMARY KEY, _join_fid INTEGER NOT NULL, \
             _geometry BLOB, _geometry_state INTEGER NOT NULL DEFAULT 0)"
        );
        let plain = block_table_sql("VLA", &properties(), false).expect("valid names");
        assert!(!plain.contains(GEOMETRY_COLUMN));
    }

    #[rstest]
    fn table_defn_restores_the_schema() {
        let text = table_defn(&properties());
        assert_eq!(text, "ID N30;SOURADNICE_Y N10.2;KODCHB_KOD N2");
        assert_eq!(parse_table_defn(&text), Ok(properties()));
    }

    #[rstest]
    fn catalog_creation_is_repeatable() {
        let connection = Connection::open_in_memory().expect("in-memory database");
        create_catalog(&connection).expect("first run");
        create_catalog(&connection).expect("second run");
        let mut statement = connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .expect("prepare");
        let tables = statement
            .query_map([], |row| row.get::<_, String>(0))
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("rows");
        assert_eq!(tables, vec!["vfk_blocks", "vfk_header"]);
    }
}
