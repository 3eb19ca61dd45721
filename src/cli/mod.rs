//! Command-line surface.
//!
//! Every command maps onto a context lookup followed by an invocation;
//! verbosity, quiet mode, and row limits only affect presentation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dbpulse::queue::{ScheduleEntry, Scheduler, Task, TaskQueue, WorkerPool};
use dbpulse::sim;
use dbpulse::{
    Config, ConnectionProvider, InvokeOptions, PulseError, QueryResult, SqliteProvider, Value,
};

#[derive(Parser)]
#[command(name = "dbpulse")]
#[command(version)]
#[command(about = "Generate synthetic database load from annotated SQL")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Path to the config file.
    #[arg(short = 'C', long, global = true)]
    config: Option<PathBuf>,

    /// Database connection string, e.g. sqlite://load.db.
    #[arg(short, long, global = true)]
    dsn: Option<String>,

    /// Paths to files with annotated SQL statements.
    #[arg(short, long, global = true)]
    sql: Vec<PathBuf>,

    /// Name of a predefined simulation.
    #[arg(short = 'P', long, global = true)]
    predefined: Option<String>,

    /// Ignore errors during query and scenario execution.
    #[arg(short, long, global = true)]
    ignore: bool,

    /// Log verbosity: stack up to -vvv for debug output.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Do not print any results. Errors are still printed.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario.
    Scenario { name: String },

    /// Execute a query.
    Query {
        name: String,

        /// Limit the number of rows displayed in the resulting table.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Parameters for the prepared statement.
        #[arg(short = 'p', long = "property")]
        properties: Vec<String>,
    },

    /// Execute an arbitrary SQL statement.
    Execute {
        statement: String,

        /// Limit the number of rows displayed in the resulting table.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Parameters for the prepared statement.
        #[arg(short = 'p', long = "property")]
        properties: Vec<String>,
    },

    /// Test the connection to the configured database.
    Test,

    /// Show settings, queries, or scenarios.
    Show {
        #[command(subcommand)]
        target: ShowTarget,
    },

    /// Enqueue a query or scenario on the task queue once.
    Send { name: String },

    /// Run the schedule: workers plus a fixed-interval ticker.
    Work {
        /// Schedule a single unit instead of the configured schedule.
        name: Option<String>,

        /// Interval in seconds for NAME. Defaults to 60.
        #[arg(long)]
        every: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    Settings,
    Queries,
    Scenarios,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.common.config.as_deref())?;
    apply_cli_args(&mut config, &cli.common);
    init_tracing(&config);

    dispatch(cli.command, &config)
}

fn apply_cli_args(config: &mut Config, common: &CommonArgs) {
    if let Some(dsn) = &common.dsn {
        config.dsn = Some(dsn.clone());
    }
    if !common.sql.is_empty() {
        config.sql = common.sql.clone();
    }
    if let Some(predefined) = &common.predefined {
        config.predefined = Some(predefined.clone());
    }
    if common.ignore {
        config.ignore = true;
    }
    if common.verbose > 0 {
        config.verbose = common.verbose;
    }
    if common.quiet {
        config.quiet = true;
    }
}

fn init_tracing(config: &Config) {
    let level = if config.quiet {
        "error"
    } else {
        match config.verbose {
            0 => "error",
            1 => "warn",
            2 => "info",
            _ => "debug",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dbpulse={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn dispatch(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Scenario { name } => run_scenario(&name, config),
        Command::Query {
            name,
            limit,
            properties,
        } => run_query(&name, limit, &properties, config),
        Command::Execute {
            statement,
            limit,
            properties,
        } => run_execute(&statement, limit, &properties, config),
        Command::Test => run_test(config),
        Command::Show { target } => run_show(target, config),
        Command::Send { name } => run_send(&name, config),
        Command::Work { name, every } => run_work(name.as_deref(), every, config),
    }
}

fn provider(config: &Config) -> Result<Arc<dyn ConnectionProvider>> {
    let dsn = config.dsn.as_ref().ok_or(PulseError::DsnMissing)?;
    Ok(Arc::new(SqliteProvider::new(dsn)))
}

fn invoke_options(config: &Config) -> InvokeOptions {
    InvokeOptions {
        ignore: config.ignore,
        num: 1,
    }
}

fn parse_properties(properties: &[String]) -> Vec<Value> {
    properties.iter().map(|p| Value::parse_literal(p)).collect()
}

fn run_scenario(name: &str, config: &Config) -> Result<()> {
    let ctx = sim::build_context(config)?;
    ctx.infuse()?;

    if !ctx.has_scenario(name) {
        bail!("Scenario '{}' does not exist.", name);
    }

    if !config.quiet {
        println!("Executing: {}", name);
    }

    let provider = provider(config)?;
    ctx.run_scenario_detached(name, provider.as_ref(), invoke_options(config))?;
    Ok(())
}

fn run_query(
    name: &str,
    limit: Option<usize>,
    properties: &[String],
    config: &Config,
) -> Result<()> {
    let ctx = sim::build_context(config)?;
    ctx.infuse()?;

    if !ctx.has_query(name) {
        bail!("Query '{}' does not exist.", name);
    }

    let params = parse_properties(properties);
    if !config.quiet {
        println!("Executing: {}", name);
        if !properties.is_empty() {
            println!("Properties: {:?}", properties);
        }
    }

    let provider = provider(config)?;
    let mut connection = provider.connect()?;
    let mut cursor = connection.cursor()?;
    let result = ctx.run_query(name, cursor.as_mut(), &params, invoke_options(config))?;

    if !config.quiet {
        if let Some(result) = result {
            println!("{}", result.table(limit.unwrap_or(config.limit)));
        }
    }
    Ok(())
}

fn run_execute(
    statement: &str,
    limit: Option<usize>,
    properties: &[String],
    config: &Config,
) -> Result<()> {
    let params = parse_properties(properties);
    if !config.quiet {
        println!("Executing: {}", statement);
        if !properties.is_empty() {
            println!("Properties: {:?}", properties);
        }
    }

    let provider = provider(config)?;
    let mut connection = provider.connect()?;
    {
        let mut cursor = connection.cursor()?;
        cursor.execute(statement, &params)?;
        let result = QueryResult::from_cursor(cursor.as_mut())?;

        if !config.quiet {
            println!("{}", result.table(limit.unwrap_or(config.limit)));
        }
    }
    connection.commit()?;
    Ok(())
}

fn run_test(config: &Config) -> Result<()> {
    let provider = provider(config)?;
    let mut connection = provider.connect()?;
    let _cursor = connection.cursor()?;
    println!("Successfully connected to the database.");
    Ok(())
}

fn run_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Settings => {
            let rows: Vec<Vec<String>> = config
                .to_rows()
                .into_iter()
                .map(|(key, value)| vec![key, value])
                .collect();
            println!("{}", format_table(&["setting", "value"], &rows));
        }
        ShowTarget::Queries => {
            let ctx = sim::build_context(config)?;
            ctx.infuse()?;
            let rows: Vec<Vec<String>> = ctx
                .queries_overview()
                .into_iter()
                .map(|(name, sql)| {
                    vec![name, sql.unwrap_or_else(|| "-".to_string()).replace('\n', " ")]
                })
                .collect();
            println!("{}", format_table(&["query", "sql"], &rows));
        }
        ShowTarget::Scenarios => {
            let ctx = sim::build_context(config)?;
            ctx.infuse()?;
            let rows: Vec<Vec<String>> = ctx
                .scenarios_overview()
                .into_iter()
                .map(|(name, queries)| vec![name, queries.join(", ")])
                .collect();
            println!("{}", format_table(&["scenario", "auto-run queries"], &rows));
        }
    }
    Ok(())
}

fn run_send(name: &str, config: &Config) -> Result<()> {
    let ctx = Arc::new(sim::build_context(config)?);
    ctx.infuse()?;

    let task = Task::resolve(&ctx, name)?;
    let provider = provider(config)?;

    let pool = WorkerPool::start(Arc::clone(&ctx), provider, 1, invoke_options(config));
    pool.enqueue(task)?;
    pool.shutdown();

    if !config.quiet {
        println!("Execution of '{}' has been processed by the queue.", name);
    }
    Ok(())
}

fn run_work(name: Option<&str>, every: Option<u64>, config: &Config) -> Result<()> {
    let ctx = Arc::new(sim::build_context(config)?);
    ctx.infuse()?;

    let mut entries = Vec::new();
    if let Some(name) = name {
        entries.push(ScheduleEntry {
            task: Task::resolve(&ctx, name)?,
            every: std::time::Duration::from_secs(every.unwrap_or(60)),
        });
    } else {
        for (name, every) in &config.schedule {
            entries.push(ScheduleEntry {
                task: Task::resolve(&ctx, name)?,
                every: std::time::Duration::from_secs(*every),
            });
        }
    }

    if entries.is_empty() {
        bail!("There is nothing to schedule. Schedule is empty.");
    }

    let provider = provider(config)?;
    let pool = WorkerPool::start(
        Arc::clone(&ctx),
        provider,
        config.workers,
        invoke_options(config),
    );

    if !config.quiet {
        println!("Scheduler has been started.");
    }
    Scheduler::new(entries).run(&pool)?;
    Ok(())
}

/// Plain-text two-or-more column table for listings.
fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut out = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    out.push_str(&header_line.join(" | "));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );

    for row in rows {
        out.push('\n');
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:width$}", cell, width = widths[i]))
            .collect();
        out.push_str(&line.join(" | "));
    }
    out
}
