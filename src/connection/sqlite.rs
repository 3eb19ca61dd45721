//! Bundled SQLite driver.

use std::path::PathBuf;

use rusqlite::params_from_iter;
use rusqlite::types::ValueRef;
use tracing::debug;

use super::{Connection, ConnectionProvider, Cursor};
use crate::core::{PulseError, Result, Row, Value};
use crate::result::ColumnDesc;

fn db_err(err: rusqlite::Error) -> PulseError {
    PulseError::Database(err.to_string())
}

/// Opens SQLite connections from a DSN.
///
/// Accepted forms: `sqlite://PATH`, a bare filesystem path, or
/// `:memory:` for a private in-memory database per connection.
pub struct SqliteProvider {
    target: SqliteTarget,
}

enum SqliteTarget {
    Memory,
    File(PathBuf),
}

impl SqliteProvider {
    pub fn new(dsn: &str) -> Self {
        let path = dsn.strip_prefix("sqlite://").unwrap_or(dsn);
        let target = if path == ":memory:" {
            SqliteTarget::Memory
        } else {
            SqliteTarget::File(PathBuf::from(path))
        };
        Self { target }
    }
}

impl ConnectionProvider for SqliteProvider {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        let conn = match &self.target {
            SqliteTarget::Memory => {
                debug!("Opening in-memory SQLite database");
                rusqlite::Connection::open_in_memory().map_err(db_err)?
            }
            SqliteTarget::File(path) => {
                debug!("Opening SQLite database at '{}'", path.display());
                rusqlite::Connection::open(path).map_err(db_err)?
            }
        };
        Ok(Box::new(SqliteConnection { conn }))
    }
}

pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: rusqlite::Connection::open_in_memory().map_err(db_err)?,
        })
    }
}

impl Connection for SqliteConnection {
    fn cursor(&mut self) -> Result<Box<dyn Cursor + '_>> {
        Ok(Box::new(SqliteCursor {
            conn: &self.conn,
            columns: Vec::new(),
            pending: None,
            rowcount: -1,
        }))
    }

    fn commit(&mut self) -> Result<()> {
        commit_if_open_txn(&self.conn)
    }

    fn is_closed(&self) -> bool {
        false
    }
}

// SQLite autocommits; an explicit COMMIT only applies when user logic
// opened a transaction itself.
fn commit_if_open_txn(conn: &rusqlite::Connection) -> Result<()> {
    if !conn.is_autocommit() {
        conn.execute_batch("COMMIT").map_err(db_err)?;
    }
    Ok(())
}

pub struct SqliteCursor<'c> {
    conn: &'c rusqlite::Connection,
    columns: Vec<ColumnDesc>,
    pending: Option<Vec<Row>>,
    rowcount: i64,
}

impl Cursor for SqliteCursor<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let bound = params.iter().map(to_sql_value);

        if stmt.column_count() > 0 {
            let column_count = stmt.column_count();
            let decltypes: Vec<String> = stmt
                .columns()
                .iter()
                .map(|c| c.decl_type().unwrap_or("").to_string())
                .collect();
            let columns: Vec<ColumnDesc> = (0..column_count)
                .map(|i| ColumnDesc {
                    name: stmt
                        .column_name(i)
                        .map(|n| n.to_string())
                        .unwrap_or_else(|_| format!("col{}", i)),
                    type_name: decltypes[i].clone(),
                })
                .collect();

            let mut fetched: Vec<Row> = Vec::new();
            let mut rows = stmt.query(params_from_iter(bound)).map_err(db_err)?;
            while let Some(row) = rows.next().map_err(db_err)? {
                let mut out = Row::with_capacity(column_count);
                for i in 0..column_count {
                    out.push(from_sql_ref(row.get_ref(i).map_err(db_err)?));
                }
                fetched.push(out);
            }

            self.rowcount = fetched.len() as i64;
            self.columns = columns;
            self.pending = Some(fetched);
        } else {
            let affected = stmt.execute(params_from_iter(bound)).map_err(db_err)?;
            self.rowcount = affected as i64;
            self.columns.clear();
            self.pending = None;
        }

        Ok(())
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>> {
        Ok(self.pending.take().unwrap_or_default())
    }

    fn row_count(&self) -> i64 {
        self.rowcount
    }

    fn description(&self) -> Option<Vec<ColumnDesc>> {
        if self.pending.is_some() {
            Some(self.columns.clone())
        } else {
            None
        }
    }

    fn has_result_set(&self) -> bool {
        self.pending.is_some()
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn commit(&mut self) -> Result<()> {
        commit_if_open_txn(self.conn)
    }
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(i) => rusqlite::types::Value::Integer(*i),
        Value::Float(f) => rusqlite::types::Value::Real(*f),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Boolean(b) => rusqlite::types::Value::Integer(i64::from(*b)),
    }
}

fn from_sql_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}
