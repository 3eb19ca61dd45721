//! Annotated SQL parser.
//!
//! Splits raw SQL text into named statements using lightweight comment
//! annotations. A line is an annotation when it contains the `--` comment
//! marker and a `name:` tag; the same line may carry repeatable
//! `option:` tags and `scenario:NAME[ORDER]` tags. Every other line is
//! body text for the currently open statement. SQL syntax is not
//! validated here.
//!
//! ```sql
//! -- name: select_employees, option: return_random, scenario: warmup[2]
//! SELECT id, name FROM employees;
//! ```

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"name:\s*(\w+)").unwrap();
    static ref OPTION_RE: Regex = Regex::new(r"option:\s*(\w+)").unwrap();
    static ref SCENARIO_RE: Regex =
        Regex::new(r"scenario:\s*([\w-]+)(?:\[(-?\d+)\])?").unwrap();
}

/// One annotated SQL block.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatement {
    pub name: String,
    /// Accumulated body text, lines joined with `\n`. Tabs are normalized
    /// to spaces and carriage returns stripped.
    pub text: String,
    /// Free-form modifier tags, e.g. `return_random`.
    pub options: Vec<String>,
    /// `(scenario_name, order_key)` memberships. Order key defaults to 0.
    pub scenarios: Vec<(String, i32)>,
}

impl ParsedStatement {
    fn new(name: String, options: Vec<String>, scenarios: Vec<(String, i32)>) -> Self {
        Self {
            name,
            text: String::new(),
            options,
            scenarios,
        }
    }

    fn push_line(&mut self, line: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line);
    }
}

/// Name-keyed statement table preserving first-seen order.
///
/// Re-declaring a name replaces the record wholesale but keeps its
/// original position, so scenario tie-breaking stays stable across
/// sources.
#[derive(Debug, Default)]
pub struct StatementTable {
    order: Vec<String>,
    map: HashMap<String, ParsedStatement>,
}

impl StatementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ParsedStatement> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate statements in encounter order.
    pub fn iter(&self) -> impl Iterator<Item = &ParsedStatement> {
        self.order.iter().map(|name| &self.map[name])
    }

    fn insert(&mut self, mut statement: ParsedStatement) {
        statement.text.truncate(statement.text.trim_end().len());
        if !self.map.contains_key(&statement.name) {
            self.order.push(statement.name.clone());
        }
        self.map.insert(statement.name.clone(), statement);
    }
}

/// Parse text sources with annotated SQL statements.
///
/// Sources are parsed independently in order and merged into one table;
/// when two sources declare the same name, the later source wins. A
/// source without a single annotation produces no records, which is not
/// an error; other sources may still contribute.
pub fn parse(sources: &[String]) -> StatementTable {
    let mut table = StatementTable::new();
    for source in sources {
        parse_source(source, &mut table);
    }
    table
}

fn parse_source(source: &str, table: &mut StatementTable) {
    let mut current: Option<ParsedStatement> = None;

    for raw_line in source.split('\n') {
        let line = raw_line.replace('\r', "").replace('\t', " ");

        if let Some(annotation) = parse_annotation(&line) {
            if let Some(open) = current.take() {
                table.insert(open);
            }
            current = Some(annotation);
        } else if let Some(open) = current.as_mut() {
            open.push_line(&line);
        }
        // Body lines before the first annotation have no home and are
        // dropped.
    }

    if let Some(open) = current.take() {
        table.insert(open);
    }
}

fn parse_annotation(line: &str) -> Option<ParsedStatement> {
    if !line.contains("--") {
        return None;
    }

    let name = NAME_RE.captures(line)?.get(1)?.as_str().to_string();

    let options = OPTION_RE
        .captures_iter(line)
        .map(|c| c[1].to_string())
        .collect();

    let scenarios = SCENARIO_RE
        .captures_iter(line)
        .map(|c| {
            let order = c
                .get(2)
                .map(|m| m.as_str().parse::<i32>().unwrap_or(0))
                .unwrap_or(0);
            (c[1].to_string(), order)
        })
        .collect();

    Some(ParsedStatement::new(name, options, scenarios))
}
