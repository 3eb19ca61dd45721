use crate::connection::Cursor;
use crate::core::{PulseError, Result, Row};

/// Column descriptor captured from a cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDesc {
    pub name: String,
    pub type_name: String,
}

impl ColumnDesc {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
        }
    }
}

/// A result set snapshot, independent of the cursor it came from.
///
/// Some drivers report a literal affected-row count for DML instead of
/// "no result set"; both shapes are representable: a data-bearing result
/// carries columns and rows, a DML result carries only `rowcount`.
#[derive(Debug, Clone)]
pub struct QueryResult {
    rowcount: i64,
    columns: Vec<ColumnDesc>,
    rows: Vec<Row>,
}

impl QueryResult {
    /// Snapshot the cursor's pending result set.
    ///
    /// `execute` must already have been called on the cursor; all rows
    /// are fetched eagerly so the snapshot stays valid after the cursor
    /// is closed or dropped.
    pub fn from_cursor(cursor: &mut dyn Cursor) -> Result<Self> {
        if cursor.is_closed() {
            return Err(PulseError::CursorClosed(
                "while materializing a result".to_string(),
            ));
        }

        let rowcount = cursor.row_count();

        // A -1 rowcount means "unknown / not applicable"; drivers that
        // report a literal count for SELECTs still expose an active
        // result set.
        if rowcount == -1 || cursor.has_result_set() {
            Ok(Self {
                rowcount,
                columns: cursor.description().unwrap_or_default(),
                rows: cursor.fetch_all()?,
            })
        } else {
            Ok(Self {
                rowcount,
                columns: Vec::new(),
                rows: Vec::new(),
            })
        }
    }

    pub fn rowcount(&self) -> i64 {
        self.rowcount
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    /// First row, if any.
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Bounds-checked row access.
    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub(crate) fn replace_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
    }

    #[cfg(test)]
    pub(crate) fn stub(columns: Vec<ColumnDesc>, rows: Vec<Row>) -> Self {
        Self {
            rowcount: rows.len() as i64,
            columns,
            rows,
        }
    }

    /// Render a printable table.
    ///
    /// Data-bearing results render as a `#` + column headers grid,
    /// truncated to `limit` rows when `limit > 0`. DML results render a
    /// single "Rows affected" cell.
    pub fn table(&self, limit: usize) -> String {
        if self.rowcount == -1 || !self.columns.is_empty() || !self.rows.is_empty() {
            let mut headers = vec!["#".to_string()];
            headers.extend(self.columns.iter().map(|c| c.name.clone()));

            let shown = if limit > 0 && limit < self.rows.len() {
                &self.rows[..limit]
            } else {
                &self.rows[..]
            };

            let cells: Vec<Vec<String>> = shown
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    let mut line = vec![(i + 1).to_string()];
                    line.extend(row.iter().map(|v| v.to_string()));
                    line
                })
                .collect();

            render_grid(&headers, &cells)
        } else {
            render_grid(
                &["Rows affected".to_string()],
                &[vec![self.rowcount.to_string()]],
            )
        }
    }
}

/// Plain-text grid with per-column widths.
pub(crate) fn render_grid(headers: &[String], rows: &[Vec<String>]) -> String {
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

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-");
    out.push_str(&separator);

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
