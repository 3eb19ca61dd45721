//! Query records and their invocation behavior.
//!
//! A query is a named, invocable unit of work. Its behavior is one of
//! three [`QueryLogic`] variants: `Auto` executes the SQL text resolved
//! during infusion and materializes the result; `User` delegates to
//! hand-written logic; `RandomSample` invokes another registered query
//! and keeps a random subset of its rows.

use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::connection::Cursor;
use crate::core::{Result, Row, Value};
use crate::result::QueryResult;

/// The one option tag the infusion pass recognizes on annotated
/// statements.
pub const RETURN_RANDOM_OPTION: &str = "return_random";

/// Hand-written query logic. Receives the cursor and the call
/// parameters; returns a materialized result, or `None` when the logic
/// produces nothing tabular.
pub type QueryFn =
    Arc<dyn Fn(&mut dyn Cursor, &[Value]) -> Result<Option<QueryResult>> + Send + Sync>;

/// The behavior attached to a registered query.
#[derive(Clone)]
pub enum QueryLogic {
    /// Execute the resolved SQL text and return its materialized result.
    Auto,
    /// Delegate to user-supplied logic.
    User(QueryFn),
    /// Invoke the named source query and sample random rows from its
    /// result.
    RandomSample { source: String },
}

impl fmt::Debug for QueryLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryLogic::Auto => write!(f, "Auto"),
            QueryLogic::User(_) => write!(f, "User(..)"),
            QueryLogic::RandomSample { source } => {
                write!(f, "RandomSample {{ source: {:?} }}", source)
            }
        }
    }
}

/// A registered query.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub name: String,
    /// Name of the annotated statement this query's SQL comes from.
    pub match_name: String,
    /// Auto queries treat a missing matching statement as fatal during
    /// infusion.
    pub auto: bool,
    pub logic: QueryLogic,
    /// Resolved SQL text; `None` until infusion.
    pub sql: Option<String>,
}

/// Declaration of a query to register.
///
/// ```
/// use dbpulse::{Context, Cursor, QueryDef, QueryResult, Value};
///
/// let ctx = Context::new();
/// ctx.add_query(QueryDef::auto("select_employees")).unwrap();
/// ctx.add_query(
///     QueryDef::user("count_rows", |cursor: &mut dyn Cursor, _params: &[Value]| {
///         cursor.execute("SELECT count(*) FROM employees", &[])?;
///         Ok(Some(QueryResult::from_cursor(cursor)?))
///     })
///     .match_statement("select_employees"),
/// )
/// .unwrap();
/// ```
pub struct QueryDef {
    name: String,
    match_name: Option<String>,
    logic: QueryLogic,
}

impl QueryDef {
    /// A query whose behavior is entirely derived from annotated SQL.
    pub fn auto(name: &str) -> Self {
        Self {
            name: name.to_string(),
            match_name: None,
            logic: QueryLogic::Auto,
        }
    }

    /// A query with hand-written logic.
    pub fn user<F>(name: &str, logic: F) -> Self
    where
        F: Fn(&mut dyn Cursor, &[Value]) -> Result<Option<QueryResult>> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            match_name: None,
            logic: QueryLogic::User(Arc::new(logic)),
        }
    }

    /// Use a different annotated statement than the query's own name.
    pub fn match_statement(mut self, match_name: &str) -> Self {
        self.match_name = Some(match_name.to_string());
        self
    }

    pub(crate) fn into_record(self) -> QueryRecord {
        let auto = matches!(self.logic, QueryLogic::Auto);
        let match_name = self.match_name.unwrap_or_else(|| self.name.clone());
        QueryRecord {
            name: self.name,
            match_name,
            auto,
            logic: self.logic,
            sql: None,
        }
    }
}

/// Declaration of a random-sampling variant derived from a registered
/// query.
#[derive(Default)]
pub struct RandomVariant {
    pub(crate) name: Option<String>,
    pub(crate) match_name: Option<String>,
    pub(crate) auto: bool,
}

impl RandomVariant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under a custom name instead of `{source}_return_random`.
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Override the inherited matching statement name.
    pub fn match_statement(mut self, match_name: &str) -> Self {
        self.match_name = Some(match_name.to_string());
        self
    }

    /// Treat a missing matching statement as fatal during infusion.
    pub fn strict(mut self) -> Self {
        self.auto = true;
        self
    }
}

/// Per-call invocation options.
#[derive(Debug, Clone, Copy)]
pub struct InvokeOptions {
    /// Suppress execution errors: log them and yield no result instead
    /// of propagating.
    pub ignore: bool,
    /// Number of rows a random-sampling query draws. Draws are
    /// independent, so rows may repeat when `num > 1`.
    pub num: usize,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            ignore: false,
            num: 1,
        }
    }
}

impl InvokeOptions {
    pub fn ignore() -> Self {
        Self {
            ignore: true,
            ..Self::default()
        }
    }
}

/// Keep `num` randomly drawn rows of a materialized result.
///
/// Results with zero or one row pass through unchanged.
pub(crate) fn sample_rows(mut result: QueryResult, num: usize) -> QueryResult {
    if result.rows().len() > 1 {
        let mut rng = rand::thread_rng();
        let sampled: Vec<Row> = (0..num.max(1))
            .filter_map(|_| result.rows().choose(&mut rng).cloned())
            .collect();
        result.replace_rows(sampled);
    }
    result
}
