//! Scenario records and the query lookup capability handed to their
//! bodies.

use std::fmt;
use std::sync::Arc;

use crate::connection::{Connection, Cursor};
use crate::context::Context;
use crate::core::{PulseError, Result, Value};
use crate::query::InvokeOptions;
use crate::result::QueryResult;

/// Hand-written scenario logic. Receives the connection and a read-only
/// query lookup; the lookup resolves names only when the scenario was
/// registered with `infuse = true`.
pub type ScenarioFn = Arc<dyn Fn(&mut dyn Connection, &QueryMap<'_>) -> Result<()> + Send + Sync>;

/// The behavior attached to a registered scenario.
#[derive(Clone)]
pub enum ScenarioLogic {
    /// No user logic: run the auto-run queries, commit, done.
    Auto,
    /// Delegate to user-supplied logic after the auto-run queries.
    User(ScenarioFn),
}

impl fmt::Debug for ScenarioLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioLogic::Auto => write!(f, "Auto"),
            ScenarioLogic::User(_) => write!(f, "User(..)"),
        }
    }
}

/// A registered scenario.
#[derive(Debug, Clone)]
pub struct ScenarioRecord {
    pub name: String,
    /// Whether the scenario body gets the full query map.
    pub infuse: bool,
    pub auto: bool,
    /// Query names executed, in order, before the scenario's own logic.
    pub auto_run_queries: Vec<String>,
    pub logic: ScenarioLogic,
}

/// Declaration of a scenario to register.
pub struct ScenarioDef {
    name: String,
    infuse: bool,
    auto_run_queries: Vec<String>,
    logic: ScenarioLogic,
}

impl ScenarioDef {
    /// A scenario whose behavior is entirely its auto-run queries.
    pub fn auto(name: &str) -> Self {
        Self {
            name: name.to_string(),
            infuse: false,
            auto_run_queries: Vec::new(),
            logic: ScenarioLogic::Auto,
        }
    }

    /// A scenario with hand-written logic.
    pub fn user<F>(name: &str, logic: F) -> Self
    where
        F: Fn(&mut dyn Connection, &QueryMap<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            infuse: false,
            auto_run_queries: Vec::new(),
            logic: ScenarioLogic::User(Arc::new(logic)),
        }
    }

    /// Expose every registered query to the scenario body by name.
    pub fn infuse(mut self, infuse: bool) -> Self {
        self.infuse = infuse;
        self
    }

    /// Queries to run automatically before the scenario's own logic.
    ///
    /// Annotations referring to this scenario replace the list during
    /// infusion.
    pub fn auto_run(mut self, queries: &[&str]) -> Self {
        self.auto_run_queries = queries.iter().map(|q| q.to_string()).collect();
        self
    }

    pub(crate) fn into_record(self) -> ScenarioRecord {
        let auto = matches!(self.logic, ScenarioLogic::Auto);
        ScenarioRecord {
            name: self.name,
            infuse: self.infuse,
            auto,
            auto_run_queries: self.auto_run_queries,
            logic: self.logic,
        }
    }
}

/// Read-only mapping from query name to invocable query, handed to
/// scenario bodies.
///
/// For scenarios registered with `infuse = false` the map is empty and
/// every lookup fails, mirroring a body that was never wired to its
/// queries.
pub struct QueryMap<'a> {
    ctx: &'a Context,
    exposed: bool,
}

impl<'a> QueryMap<'a> {
    pub(crate) fn new(ctx: &'a Context, exposed: bool) -> Self {
        Self { ctx, exposed }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.exposed && self.ctx.has_query(name)
    }

    /// Names visible to the scenario body, sorted.
    pub fn names(&self) -> Vec<String> {
        if self.exposed {
            self.ctx.query_names()
        } else {
            Vec::new()
        }
    }

    /// Invoke a query with default options.
    pub fn call(
        &self,
        name: &str,
        cursor: &mut dyn Cursor,
        params: &[Value],
    ) -> Result<Option<QueryResult>> {
        self.call_with(name, cursor, params, InvokeOptions::default())
    }

    /// Invoke a query with explicit options.
    pub fn call_with(
        &self,
        name: &str,
        cursor: &mut dyn Cursor,
        params: &[Value],
        opts: InvokeOptions,
    ) -> Result<Option<QueryResult>> {
        if !self.contains(name) {
            return Err(PulseError::QueryNotFound(name.to_string()));
        }
        self.ctx.run_query(name, cursor, params, opts)
    }
}
