//! Database connection capabilities.
//!
//! The harness core talks to databases through these object-safe traits;
//! [`sqlite`] provides the bundled SQLite implementation. A cursor or
//! connection is released when its boxed guard drops, which gives the
//! per-call scoped-acquisition semantics the invocation wrappers rely on.

pub mod sqlite;

use crate::core::{Result, Row, Value};
use crate::result::ColumnDesc;

pub use sqlite::SqliteProvider;

/// Statement execution handle scoped to one connection.
pub trait Cursor {
    /// Execute a statement with positional parameters.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()>;

    /// Drain all rows of the pending result set.
    fn fetch_all(&mut self) -> Result<Vec<Row>>;

    /// Driver-reported row count; `-1` means unknown / not applicable.
    fn row_count(&self) -> i64;

    /// Column descriptors of the pending result set, if any.
    fn description(&self) -> Option<Vec<ColumnDesc>>;

    /// Whether the last `execute` produced a result set.
    fn has_result_set(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// Commit on the owning connection.
    fn commit(&mut self) -> Result<()>;
}

/// An open database connection.
pub trait Connection {
    fn cursor(&mut self) -> Result<Box<dyn Cursor + '_>>;

    fn commit(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Opens fresh connections for detached invocations and worker threads.
pub trait ConnectionProvider: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Connection>>;
}
