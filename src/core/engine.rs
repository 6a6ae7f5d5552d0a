//! Compute engine seam.
//!
//! The kernel treats the analytical SQL engine as a black box reachable
//! through [`ComputeEngine`]. Production deployments wire a real engine in;
//! the test suite and the CLI demo use [`StubEngine`], which understands only
//! the statement shapes the built-in agents emit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

/// One result row: column name -> value.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub column_type: String,
}

#[async_trait]
pub trait ComputeEngine: Send + Sync {
    /// Execute a SQL statement and return its rows (empty for DDL).
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// `DESCRIBE`-style schema introspection for one table.
    async fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Make raw tabular content queryable under a virtual file name
    /// (the engine's `read_csv_auto` source).
    async fn register_tabular_source(&self, name: &str, content: &str) -> Result<()>;
}

// --- Stub engine ---

#[derive(Debug, Clone)]
struct StubTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Default)]
struct StubState {
    sources: HashMap<String, String>,
    tables: HashMap<String, StubTable>,
}

/// In-process stand-in for the external engine. Not a SQL engine: it
/// pattern-matches the fixed statement shapes the built-in agents produce
/// (`read_csv_auto` loads, dedup swaps, `COUNT(*)`, `SUM`/`AVG` over
/// `TRY_CAST` columns, `EXPLAIN`) and reports missing tables with the
/// engine-style message the recovery layer knows how to rewrite.
pub struct StubEngine {
    state: Mutex<StubState>,
    executed: AtomicUsize,
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StubState::default()),
            executed: AtomicUsize::new(0),
        }
    }

    /// Number of statements executed so far. Lets tests observe whether a
    /// query was served by the cache or reached the engine.
    pub fn executed_statements(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    fn missing_table(table: &str) -> anyhow::Error {
        anyhow!("Catalog Error: Table with name {table} does not exist!")
    }
}

fn parse_csv(content: &str) -> StubTable {
    let mut lines = content.lines();
    let columns: Vec<String> = lines
        .next()
        .map(|h| h.split(',').map(|c| c.trim().to_string()).collect())
        .unwrap_or_default();
    let rows = lines
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.split(',').map(|v| v.trim().to_string()).collect())
        .collect();
    StubTable { columns, rows }
}

fn numeric(v: &str) -> Option<f64> {
    v.trim().parse::<f64>().ok()
}

#[async_trait]
impl ComputeEngine for StubEngine {
    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        let sql = sql.trim();
        let mut state = self.state.lock().await;

        if let Some(rest) = sql.get(..8).and_then(|prefix| {
            prefix
                .eq_ignore_ascii_case("EXPLAIN ")
                .then(|| sql[8..].to_string())
        }) {
            let mut row = Row::new();
            row.insert(
                "explain_value".to_string(),
                Value::String(format!("STUB PLAN\n{rest}")),
            );
            return Ok(vec![row]);
        }

        let drop_if = Regex::new(r"(?i)^DROP\s+TABLE\s+IF\s+EXISTS\s+(\w+)$").unwrap();
        if let Some(cap) = drop_if.captures(sql) {
            state.tables.remove(&cap[1]);
            return Ok(Vec::new());
        }

        let drop_table = Regex::new(r"(?i)^DROP\s+TABLE\s+(\w+)$").unwrap();
        if let Some(cap) = drop_table.captures(sql) {
            return match state.tables.remove(&cap[1]) {
                Some(_) => Ok(Vec::new()),
                None => Err(Self::missing_table(&cap[1])),
            };
        }

        let create_csv = Regex::new(
            r"(?i)^CREATE\s+TABLE\s+(\w+)\s+AS\s+SELECT\s+\*\s+FROM\s+read_csv_auto\('([^']+)'\)$",
        )
        .unwrap();
        if let Some(cap) = create_csv.captures(sql) {
            let content = state
                .sources
                .get(&cap[2])
                .ok_or_else(|| anyhow!("IO Error: No files found that match the pattern \"{}\"", &cap[2]))?
                .clone();
            let table = parse_csv(&content);
            state.tables.insert(cap[1].to_string(), table);
            return Ok(Vec::new());
        }

        let create_distinct = Regex::new(
            r"(?i)^CREATE\s+TABLE\s+(\w+)\s+AS\s+SELECT\s+DISTINCT\s+\*\s+FROM\s+(\w+)$",
        )
        .unwrap();
        if let Some(cap) = create_distinct.captures(sql) {
            let source = state
                .tables
                .get(&cap[2])
                .ok_or_else(|| Self::missing_table(&cap[2]))?
                .clone();
            let mut seen = Vec::new();
            for row in source.rows {
                if !seen.contains(&row) {
                    seen.push(row);
                }
            }
            state.tables.insert(
                cap[1].to_string(),
                StubTable {
                    columns: source.columns,
                    rows: seen,
                },
            );
            return Ok(Vec::new());
        }

        let rename = Regex::new(r"(?i)^ALTER\s+TABLE\s+(\w+)\s+RENAME\s+TO\s+(\w+)$").unwrap();
        if let Some(cap) = rename.captures(sql) {
            let table = state
                .tables
                .remove(&cap[1])
                .ok_or_else(|| Self::missing_table(&cap[1]))?;
            state.tables.insert(cap[2].to_string(), table);
            return Ok(Vec::new());
        }

        let count =
            Regex::new(r"(?i)^SELECT\s+COUNT\(\*\)(?:\s+AS\s+(\w+))?\s+FROM\s+(\w+)$").unwrap();
        if let Some(cap) = count.captures(sql) {
            let table = state
                .tables
                .get(&cap[2])
                .ok_or_else(|| Self::missing_table(&cap[2]))?;
            let alias = cap.get(1).map(|m| m.as_str()).unwrap_or("count");
            let mut row = Row::new();
            row.insert(alias.to_string(), Value::from(table.rows.len() as i64));
            return Ok(vec![row]);
        }

        let aggregate = Regex::new(
            r"(?i)^SELECT\s+(SUM|AVG)\(TRY_CAST\((\w+)\s+AS\s+\w+\)\)\s+FROM\s+(\w+)$",
        )
        .unwrap();
        if let Some(cap) = aggregate.captures(sql) {
            let table = state
                .tables
                .get(&cap[3])
                .ok_or_else(|| Self::missing_table(&cap[3]))?;
            let col = &cap[2];
            let idx = table
                .columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(col));
            let values: Vec<f64> = idx
                .map(|i| {
                    table
                        .rows
                        .iter()
                        .filter_map(|r| r.get(i).and_then(|v| numeric(v)))
                        .collect()
                })
                .unwrap_or_default();
            let agg = cap[1].to_lowercase();
            let result = if values.is_empty() {
                Value::Null
            } else if agg == "sum" {
                Value::from(values.iter().sum::<f64>())
            } else {
                Value::from(values.iter().sum::<f64>() / values.len() as f64)
            };
            let mut row = Row::new();
            row.insert(format!("{agg}({col})"), result);
            return Ok(vec![row]);
        }

        let select_all = Regex::new(r"(?i)^SELECT\s+\*\s+FROM\s+(\w+)$").unwrap();
        if let Some(cap) = select_all.captures(sql) {
            let table = state
                .tables
                .get(&cap[1])
                .ok_or_else(|| Self::missing_table(&cap[1]))?;
            let rows = table
                .rows
                .iter()
                .map(|r| {
                    let mut row = Row::new();
                    for (i, col) in table.columns.iter().enumerate() {
                        let raw = r.get(i).map(String::as_str).unwrap_or("");
                        let value = match numeric(raw) {
                            Some(n) => Value::from(n),
                            None => Value::String(raw.to_string()),
                        };
                        row.insert(col.clone(), value);
                    }
                    row
                })
                .collect();
            return Ok(rows);
        }

        Err(anyhow!("StubEngine cannot execute: {sql}"))
    }

    async fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let state = self.state.lock().await;
        let t = state
            .tables
            .get(table)
            .ok_or_else(|| Self::missing_table(table))?;
        Ok(t.columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let all_numeric = !t.rows.is_empty()
                    && t.rows
                        .iter()
                        .all(|r| r.get(i).map(|v| numeric(v).is_some()).unwrap_or(false));
                ColumnInfo {
                    column_name: name.clone(),
                    column_type: if all_numeric { "DOUBLE" } else { "VARCHAR" }.to_string(),
                }
            })
            .collect())
    }

    async fn register_tabular_source(&self, name: &str, content: &str) -> Result<()> {
        self.state
            .lock()
            .await
            .sources
            .insert(name.to_string(), content.to_string());
        Ok(())
    }
}
