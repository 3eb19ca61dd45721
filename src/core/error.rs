use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("SQL source file is empty: {0}")]
    SqlSourceEmpty(PathBuf),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unsupported predefined simulation '{0}'")]
    UnsupportedSimulation(String),

    #[error("Config must contain a 'dsn' connection string")]
    DsnMissing,

    #[error("Query '{0}' already exists in the context")]
    QueryAlreadyExists(String),

    #[error("Scenario '{0}' already exists in the context")]
    ScenarioAlreadyExists(String),

    #[error("Query '{0}' does not exist")]
    QueryNotFound(String),

    #[error("Scenario '{0}' does not exist")]
    ScenarioNotFound(String),

    #[error("Matching SQL statement '{match_name}' not found for query '{query}'")]
    MatchingSqlNotFound { query: String, match_name: String },

    #[error("Cannot derive a random variant: query '{0}' is not registered")]
    RandomSourceMissing(String),

    #[error("Query '{0}' did not produce a result set")]
    NotQueryResult(String),

    #[error("Closed cursor ({0})")]
    CursorClosed(String),

    #[error("Closed connection passed to scenario '{0}'")]
    ConnectionClosed(String),

    #[error("Query '{name}' failed: {source}")]
    QueryExecution {
        name: String,
        #[source]
        source: Box<PulseError>,
    },

    #[error("Scenario '{name}' failed: {source}")]
    ScenarioExecution {
        name: String,
        #[source]
        source: Box<PulseError>,
    },

    #[error("Task '{0}' is not registered as a query or scenario")]
    TaskNotRegistered(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, PulseError>;

impl From<std::io::Error> for PulseError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PulseError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
