//! Shared fakes: a scripted cursor, a connection handing out cursors
//! that write into one shared execution log, and a provider for
//! detached-invocation tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dbpulse::{
    ColumnDesc, Connection, ConnectionProvider, Cursor, PulseError, Result, Row, Value,
};

pub type ExecLog = Arc<Mutex<Vec<(String, Vec<Value>)>>>;

/// Scripted result set used by most tests: two rows, `id` + `name`.
pub fn scripted_rows() -> Vec<Row> {
    vec![
        vec![Value::Integer(1), Value::Text("John".into())],
        vec![Value::Integer(2), Value::Text("Ben".into())],
    ]
}

pub fn scripted_columns() -> Vec<ColumnDesc> {
    vec![
        ColumnDesc::new("id", "INTEGER"),
        ColumnDesc::new("name", "TEXT"),
    ]
}

pub struct FakeCursor {
    pub closed: bool,
    pub rowcount: i64,
    pub result_set: Option<Vec<Row>>,
    pub columns: Vec<ColumnDesc>,
    pub fail_on_execute: bool,
    pub commits: Arc<AtomicUsize>,
    pub log: ExecLog,
}

impl FakeCursor {
    /// Cursor with an active result set and the scripted rows.
    pub fn with_rows() -> Self {
        Self {
            closed: false,
            rowcount: -1,
            result_set: Some(scripted_rows()),
            columns: scripted_columns(),
            fail_on_execute: false,
            commits: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Cursor with custom rows.
    pub fn with_result(rows: Vec<Row>) -> Self {
        Self {
            result_set: Some(rows),
            ..Self::with_rows()
        }
    }

    /// Cursor after a DML statement: a row count, no result set.
    pub fn dml(rowcount: i64) -> Self {
        Self {
            rowcount,
            result_set: None,
            columns: Vec::new(),
            ..Self::with_rows()
        }
    }

    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::with_rows()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_on_execute: true,
            ..Self::with_rows()
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn executed_params(&self) -> Vec<Vec<Value>> {
        self.log.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl Cursor for FakeCursor {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        if self.fail_on_execute {
            return Err(PulseError::Database("scripted failure".to_string()));
        }
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(())
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>> {
        Ok(self.result_set.take().unwrap_or_default())
    }

    fn row_count(&self) -> i64 {
        self.rowcount
    }

    fn description(&self) -> Option<Vec<ColumnDesc>> {
        if self.result_set.is_some() {
            Some(self.columns.clone())
        } else {
            None
        }
    }

    fn has_result_set(&self) -> bool {
        self.result_set.is_some()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn commit(&mut self) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeConnection {
    pub closed: bool,
    pub commits: Arc<AtomicUsize>,
    pub log: ExecLog,
    /// Every handed-out cursor starts with these rows.
    pub rows: Vec<Row>,
    pub columns: Vec<ColumnDesc>,
    pub fail_cursors: bool,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self {
            closed: false,
            commits: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
            rows: scripted_rows(),
            columns: scripted_columns(),
            fail_cursors: false,
        }
    }

    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::new()
        }
    }

    /// Every cursor handed out by this connection fails on execute.
    pub fn failing() -> Self {
        Self {
            fail_cursors: true,
            ..Self::new()
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl Default for FakeConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for FakeConnection {
    fn cursor(&mut self) -> Result<Box<dyn Cursor + '_>> {
        Ok(Box::new(FakeCursor {
            closed: false,
            rowcount: -1,
            result_set: Some(self.rows.clone()),
            columns: self.columns.clone(),
            fail_on_execute: self.fail_cursors,
            commits: Arc::clone(&self.commits),
            log: Arc::clone(&self.log),
        }))
    }

    fn commit(&mut self) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Provider handing out fake connections that all share one execution
/// log, so detached invocations stay observable.
pub struct FakeProvider {
    pub log: ExecLog,
    pub commits: Arc<AtomicUsize>,
    pub connections_opened: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            commits: Arc::new(AtomicUsize::new(0)),
            connections_opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(sql, _)| sql.clone()).collect()
    }
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionProvider for FakeProvider {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        self.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            closed: false,
            commits: Arc::clone(&self.commits),
            log: Arc::clone(&self.log),
            rows: scripted_rows(),
            columns: scripted_columns(),
            fail_cursors: false,
        }))
    }
}
