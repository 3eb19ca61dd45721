// ============================================================================
// dbpulse library
// ============================================================================
//
// Declarative synthetic database load: annotated SQL statements become
// named queries, queries compose into scenarios, and both run against a
// live database one-shot or on a schedule.

pub mod config;
pub mod connection;
pub mod context;
pub mod core;
pub mod parser;
pub mod query;
pub mod queue;
pub mod result;
pub mod scenario;
pub mod sim;

// Re-export main types for convenience
pub use crate::core::{PulseError, Result, Row, Value};
pub use config::Config;
pub use connection::{Connection, ConnectionProvider, Cursor, SqliteProvider};
pub use context::Context;
pub use parser::{parse, ParsedStatement, StatementTable};
pub use query::{InvokeOptions, QueryDef, QueryLogic, QueryRecord, RandomVariant};
pub use queue::{ScheduleEntry, Scheduler, Task, TaskKind, TaskQueue, WorkerPool};
pub use result::{ColumnDesc, QueryResult};
pub use scenario::{QueryMap, ScenarioDef, ScenarioLogic, ScenarioRecord};
