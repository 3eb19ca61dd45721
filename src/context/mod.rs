//! Execution context.
//!
//! The context owns every registered query and scenario. Records arrive
//! two ways: explicit registration through the builder API, and implicit
//! synthesis during infusion, the one-shot pass that ties annotated SQL
//! text to registered records. The context is an explicit object:
//! construct one per process (or per test) and share it by reference.
//!
//! ```
//! use dbpulse::{Context, QueryDef};
//!
//! let ctx = Context::with_sources(vec![
//!     "-- name: select_one\nSELECT 1;".to_string(),
//! ]);
//! ctx.add_query(QueryDef::auto("select_one").match_statement("select_one")).unwrap();
//! ctx.infuse().unwrap();
//! ```

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionProvider, Cursor};
use crate::core::{PulseError, Result, Value};
use crate::parser::{self, StatementTable};
use crate::query::{
    sample_rows, InvokeOptions, QueryDef, QueryLogic, QueryRecord, RandomVariant,
    RETURN_RANDOM_OPTION,
};
use crate::result::QueryResult;
use crate::scenario::{QueryMap, ScenarioDef, ScenarioLogic, ScenarioRecord};

#[derive(Debug, Default)]
struct Tables {
    queries: BTreeMap<String, QueryRecord>,
    scenarios: BTreeMap<String, ScenarioRecord>,
    infused: bool,
}

/// Process-wide registry of queries and scenarios.
#[derive(Debug)]
pub struct Context {
    tables: RwLock<Tables>,
    sources: Vec<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context with no SQL sources. Useful for tests and for library
    /// callers that only register user logic.
    pub fn new() -> Self {
        Self::with_sources(Vec::new())
    }

    /// A context that will parse the given raw SQL texts during
    /// infusion.
    pub fn with_sources(sources: Vec<String>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            sources,
        }
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a query. Fails when the name is already taken.
    pub fn add_query(&self, def: QueryDef) -> Result<()> {
        let record = def.into_record();
        debug!("Registering '{}' query in the context", record.name);

        let mut tables = self.tables.write()?;
        if tables.queries.contains_key(&record.name) {
            return Err(PulseError::QueryAlreadyExists(record.name));
        }
        tables.queries.insert(record.name.clone(), record);
        Ok(())
    }

    /// Register a scenario. Fails when the name is already taken.
    pub fn add_scenario(&self, def: ScenarioDef) -> Result<()> {
        let record = def.into_record();
        debug!("Registering '{}' scenario in the context", record.name);

        let mut tables = self.tables.write()?;
        if tables.scenarios.contains_key(&record.name) {
            return Err(PulseError::ScenarioAlreadyExists(record.name));
        }
        tables.scenarios.insert(record.name.clone(), record);
        Ok(())
    }

    /// Register a random-sampling variant of an existing query.
    ///
    /// The variant is a query of its own, named
    /// `{source}_return_random` unless overridden, inheriting the
    /// source's matching statement.
    pub fn add_random_variant(&self, source: &str, variant: RandomVariant) -> Result<()> {
        let mut tables = self.tables.write()?;

        let source_match = tables
            .queries
            .get(source)
            .ok_or_else(|| PulseError::RandomSourceMissing(source.to_string()))?
            .match_name
            .clone();

        let name = variant
            .name
            .unwrap_or_else(|| format!("{}_return_random", source));
        if tables.queries.contains_key(&name) {
            return Err(PulseError::QueryAlreadyExists(name));
        }
        debug!("Registering '{}' random variant in the context", name);

        let record = QueryRecord {
            name: name.clone(),
            match_name: variant.match_name.unwrap_or(source_match),
            auto: variant.auto,
            logic: QueryLogic::RandomSample {
                source: source.to_string(),
            },
            sql: None,
        };
        tables.queries.insert(name, record);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn is_infused(&self) -> bool {
        self.tables.read().map(|t| t.infused).unwrap_or(false)
    }

    pub fn has_query(&self, name: &str) -> bool {
        self.tables
            .read()
            .map(|t| t.queries.contains_key(name))
            .unwrap_or(false)
    }

    pub fn has_scenario(&self, name: &str) -> bool {
        self.tables
            .read()
            .map(|t| t.scenarios.contains_key(name))
            .unwrap_or(false)
    }

    /// Registered query names, sorted.
    pub fn query_names(&self) -> Vec<String> {
        self.tables
            .read()
            .map(|t| t.queries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Registered scenario names, sorted.
    pub fn scenario_names(&self) -> Vec<String> {
        self.tables
            .read()
            .map(|t| t.scenarios.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// `(name, resolved SQL)` pairs for listing, sorted by name.
    pub fn queries_overview(&self) -> Vec<(String, Option<String>)> {
        self.tables
            .read()
            .map(|t| {
                t.queries
                    .values()
                    .map(|q| (q.name.clone(), q.sql.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `(name, auto-run list)` pairs for listing, sorted by name.
    pub fn scenarios_overview(&self) -> Vec<(String, Vec<String>)> {
        self.tables
            .read()
            .map(|t| {
                t.scenarios
                    .values()
                    .map(|s| (s.name.clone(), s.auto_run_queries.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn query_record(&self, name: &str) -> Result<QueryRecord> {
        self.tables
            .read()?
            .queries
            .get(name)
            .cloned()
            .ok_or_else(|| PulseError::QueryNotFound(name.to_string()))
    }

    pub(crate) fn scenario_record(&self, name: &str) -> Result<ScenarioRecord> {
        self.tables
            .read()?
            .scenarios
            .get(name)
            .cloned()
            .ok_or_else(|| PulseError::ScenarioNotFound(name.to_string()))
    }

    // ------------------------------------------------------------------
    // Infusion
    // ------------------------------------------------------------------

    /// Tie annotated SQL to registered records. One-shot: the first call
    /// performs the pass, every later call is a no-op.
    pub fn infuse(&self) -> Result<()> {
        if self.is_infused() {
            debug!("Context was already infused, skipping");
            return Ok(());
        }
        debug!("Infusing context");

        let parsed = parser::parse(&self.sources);

        let mut tables = self.tables.write()?;
        if tables.infused {
            return Ok(());
        }

        synthesize_implicit_queries(&mut tables, &parsed);
        synthesize_implicit_scenarios(&mut tables, &parsed);
        resolve_matching_sql(&mut tables, &parsed)?;

        for scenario in tables.scenarios.values() {
            if scenario.infuse {
                debug!(
                    "Scenario '{}' exposes the full query map to its body",
                    scenario.name
                );
            }
        }

        tables.infused = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Query invocation
    // ------------------------------------------------------------------

    /// Invoke a registered query against the supplied cursor.
    ///
    /// A closed cursor and an unknown name fail before execution and are
    /// never suppressed; failures during execution are wrapped as
    /// `QueryExecution` unless `opts.ignore` converts them into a logged
    /// warning and `Ok(None)`.
    pub fn run_query(
        &self,
        name: &str,
        cursor: &mut dyn Cursor,
        params: &[Value],
        opts: InvokeOptions,
    ) -> Result<Option<QueryResult>> {
        let record = self.query_record(name)?;
        debug!("Executing '{}' query", name);

        if cursor.is_closed() {
            return Err(PulseError::CursorClosed(format!("in query '{}'", name)));
        }

        match self.execute_query_record(&record, cursor, params, opts) {
            Ok(result) => Ok(result),
            Err(err) if opts.ignore => {
                warn!("Error occurred in query '{}' but was handled: {}", name, err);
                Ok(None)
            }
            Err(err) => Err(PulseError::QueryExecution {
                name: name.to_string(),
                source: Box::new(err),
            }),
        }
    }

    /// Invoke a registered query with no resources supplied: infuse the
    /// context, then open a fresh connection and cursor for this call.
    pub fn run_query_detached(
        &self,
        name: &str,
        provider: &dyn ConnectionProvider,
        params: &[Value],
        opts: InvokeOptions,
    ) -> Result<Option<QueryResult>> {
        debug!(
            "No cursor supplied to the '{}' query, initiating a fresh connection",
            name
        );
        self.infuse()?;

        let mut connection = provider.connect()?;
        let mut cursor = connection.cursor()?;
        self.run_query(name, cursor.as_mut(), params, opts)
    }

    fn execute_query_record(
        &self,
        record: &QueryRecord,
        cursor: &mut dyn Cursor,
        params: &[Value],
        opts: InvokeOptions,
    ) -> Result<Option<QueryResult>> {
        match &record.logic {
            QueryLogic::Auto => {
                let sql = record.sql.as_ref().ok_or_else(|| {
                    PulseError::MatchingSqlNotFound {
                        query: record.name.clone(),
                        match_name: record.match_name.clone(),
                    }
                })?;

                cursor.execute(sql, params)?;
                let result = QueryResult::from_cursor(cursor)?;
                cursor.commit()?;
                Ok(Some(result))
            }
            QueryLogic::User(logic) => logic(cursor, params),
            QueryLogic::RandomSample { source } => {
                let inner = self.run_query(
                    source,
                    cursor,
                    params,
                    InvokeOptions {
                        ignore: false,
                        num: 1,
                    },
                )?;
                let result = inner
                    .ok_or_else(|| PulseError::NotQueryResult(source.clone()))?;
                Ok(Some(sample_rows(result, opts.num)))
            }
        }
    }

    // ------------------------------------------------------------------
    // Scenario invocation
    // ------------------------------------------------------------------

    /// Invoke a registered scenario against the supplied connection.
    ///
    /// Auto-run queries execute first, in their precomputed order, each
    /// on a fresh cursor with the scenario's `ignore` flag. Auto
    /// scenarios then commit and finish; user scenarios run their body
    /// with the connection and the query map.
    pub fn run_scenario(
        &self,
        name: &str,
        connection: &mut dyn Connection,
        opts: InvokeOptions,
    ) -> Result<()> {
        let record = self.scenario_record(name)?;
        debug!("Executing '{}' scenario", name);

        if connection.is_closed() {
            return Err(PulseError::ConnectionClosed(name.to_string()));
        }

        match self.execute_scenario_record(&record, connection, opts) {
            Ok(()) => Ok(()),
            Err(err) if opts.ignore => {
                warn!(
                    "Error occurred in scenario '{}' but was handled: {}",
                    name, err
                );
                Ok(())
            }
            Err(err) => Err(PulseError::ScenarioExecution {
                name: name.to_string(),
                source: Box::new(err),
            }),
        }
    }

    /// Invoke a registered scenario with no connection supplied: infuse
    /// the context, then open a fresh connection for this call.
    pub fn run_scenario_detached(
        &self,
        name: &str,
        provider: &dyn ConnectionProvider,
        opts: InvokeOptions,
    ) -> Result<()> {
        debug!(
            "No connection supplied to the '{}' scenario, initiating a fresh connection",
            name
        );
        self.infuse()?;

        let mut connection = provider.connect()?;
        self.run_scenario(name, connection.as_mut(), opts)
    }

    fn execute_scenario_record(
        &self,
        record: &ScenarioRecord,
        connection: &mut dyn Connection,
        opts: InvokeOptions,
    ) -> Result<()> {
        if !record.auto_run_queries.is_empty() {
            debug!(
                "Executing auto-run queries for scenario '{}': {:?}",
                record.name, record.auto_run_queries
            );
        }

        for query_name in &record.auto_run_queries {
            let mut cursor = connection.cursor()?;
            self.run_query(
                query_name,
                cursor.as_mut(),
                &[],
                InvokeOptions {
                    ignore: opts.ignore,
                    num: 1,
                },
            )?;
        }

        match &record.logic {
            ScenarioLogic::Auto => {
                connection.commit()?;
                Ok(())
            }
            ScenarioLogic::User(logic) => {
                let queries = QueryMap::new(self, record.infuse);
                logic(connection, &queries)
            }
        }
    }
}

// ----------------------------------------------------------------------
// Infusion steps
// ----------------------------------------------------------------------

/// Register an auto query for every annotated statement nobody claimed,
/// then derive per-option variants.
fn synthesize_implicit_queries(tables: &mut Tables, parsed: &StatementTable) {
    for statement in parsed.iter() {
        if !tables.queries.contains_key(&statement.name) {
            debug!("Synthesizing implicit query '{}'", statement.name);
            tables.queries.insert(
                statement.name.clone(),
                QueryRecord {
                    name: statement.name.clone(),
                    match_name: statement.name.clone(),
                    auto: true,
                    logic: QueryLogic::Auto,
                    sql: None,
                },
            );
        }

        for option in &statement.options {
            let derived = format!("{}_{}", statement.name, option);
            if tables.queries.contains_key(&derived) {
                continue;
            }

            if option == RETURN_RANDOM_OPTION {
                // The variant samples this statement's own query,
                // whether that query was explicit or synthesized just
                // above.
                let match_name = tables.queries[&statement.name].match_name.clone();
                debug!("Synthesizing implicit query '{}'", derived);
                tables.queries.insert(
                    derived.clone(),
                    QueryRecord {
                        name: derived,
                        match_name,
                        auto: true,
                        logic: QueryLogic::RandomSample {
                            source: statement.name.clone(),
                        },
                        sql: None,
                    },
                );
            } else {
                warn!("Unrecognized option in SQL statement: {}", option);
            }
        }
    }
}

/// Group scenario memberships, order them, and synthesize scenarios that
/// were never registered explicitly. Explicitly registered scenarios get
/// their auto-run list replaced by the annotation-derived one.
fn synthesize_implicit_scenarios(tables: &mut Tables, parsed: &StatementTable) {
    let mut memberships: BTreeMap<String, Vec<(String, i32)>> = BTreeMap::new();
    for statement in parsed.iter() {
        for (scenario_name, order) in &statement.scenarios {
            memberships
                .entry(scenario_name.clone())
                .or_default()
                .push((statement.name.clone(), *order));
        }
    }

    for (scenario_name, mut pairs) in memberships {
        // Stable: equal order keys keep statement encounter order.
        pairs.sort_by_key(|(_, order)| *order);
        let ordered: Vec<String> = pairs.into_iter().map(|(name, _)| name).collect();

        match tables.scenarios.entry(scenario_name) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().auto_run_queries = ordered;
            }
            Entry::Vacant(entry) => {
                debug!("Synthesizing implicit scenario '{}'", entry.key());
                let record = ScenarioRecord {
                    name: entry.key().clone(),
                    infuse: false,
                    auto: true,
                    auto_run_queries: ordered,
                    logic: ScenarioLogic::Auto,
                };
                entry.insert(record);
            }
        }
    }
}

/// Resolve each query's SQL text from its matching statement. Fatal for
/// auto queries, a warning otherwise.
fn resolve_matching_sql(tables: &mut Tables, parsed: &StatementTable) -> Result<()> {
    for record in tables.queries.values_mut() {
        let text = parsed
            .get(&record.match_name)
            .map(|s| s.text.as_str())
            .filter(|t| !t.trim().is_empty());

        match text {
            Some(text) => {
                record.sql = Some(text.to_string());
            }
            None if record.auto => {
                return Err(PulseError::MatchingSqlNotFound {
                    query: record.name.clone(),
                    match_name: record.match_name.clone(),
                });
            }
            None => {
                warn!("'{}' has no matching SQL statement", record.name);
                record.sql = None;
            }
        }
    }
    Ok(())
}
