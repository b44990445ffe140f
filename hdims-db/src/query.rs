//! Query options for the data-access facade
//!
//! A small subset of the hosted platform's REST filter language: column
//! projection, equality filters, a single ordering column, row limit and
//! count-only (`head`) selects.

use serde_json::{Map, Value};

use crate::error::{DbError, DbResult};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Select/update/delete options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Comma-separated column list, `None` selects every column
    pub columns: Option<String>,
    /// Equality filters, all must match
    pub filters: Vec<(String, Value)>,
    pub order: Option<(String, Order)>,
    pub limit: Option<usize>,
    /// Count rows without returning them
    pub head: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn order(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order = Some((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn head(mut self) -> Self {
        self.head = true;
        self
    }

    /// Whether a row satisfies every equality filter
    ///
    /// Values compare as JSON, except that a string filter also matches a
    /// number or boolean with the same text.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|(column, expected)| {
            match (row.get(column), expected) {
                (Some(actual), expected) if actual == expected => true,
                (Some(actual), Value::String(s)) if !actual.is_string() => actual.to_string() == *s,
                (None, Value::Null) => true,
                _ => false,
            }
        })
    }

    /// Keep only the requested columns
    pub fn project(&self, row: &Value) -> Value {
        let (Some(columns), Some(obj)) = (&self.columns, row.as_object()) else {
            return row.clone();
        };
        let wanted: Vec<&str> = columns.split(',').map(str::trim).collect();
        if wanted.iter().any(|c| *c == "*") {
            return row.clone();
        }
        let projected: Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| wanted.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(projected)
    }

    /// Sort rows in place by the ordering column
    pub fn sort(&self, rows: &mut [Value]) {
        let Some((column, order)) = &self.order else {
            return;
        };
        rows.sort_by(|a, b| {
            let ord = compare_json(a.get(column), b.get(column));
            match order {
                Order::Asc => ord,
                Order::Desc => ord.reverse(),
            }
        });
    }

    /// Query-string pairs in the platform's REST dialect
    pub fn to_rest_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(columns) = &self.columns {
            params.push(("select".to_string(), columns.clone()));
        }
        for (column, value) in &self.filters {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => "null".to_string(),
                other => other.to_string(),
            };
            let op = if value.is_null() { "is" } else { "eq" };
            params.push((column.clone(), format!("{}.{}", op, text)));
        }
        if let Some((column, order)) = &self.order {
            let dir = match order {
                Order::Asc => "asc",
                Order::Desc => "desc",
            };
            params.push(("order".to_string(), format!("{}.{}", column, dir)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// Reject unfiltered update/delete
    pub fn require_filter(&self, operation: &str) -> DbResult<()> {
        if self.filters.is_empty() {
            return Err(DbError::InvalidQuery(format!(
                "{} requires at least one filter",
                operation
            )));
        }
        Ok(())
    }
}

fn compare_json(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        // nulls last
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

/// Result of a select
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Matching rows, empty for `head` selects
    pub data: Vec<Value>,
    /// Number of matching rows before `limit`
    pub count: usize,
}
