//! In-memory table store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use hdims_core::Collection;

use crate::error::{DbError, DbResult};
use crate::facade::DataStore;
use crate::query::{Query, Selection};

/// Parent/child links: (parent, child, foreign key column)
const FOREIGN_KEYS: [(Collection, Collection, &str); 4] = [
    (Collection::States, Collection::Districts, "state_id"),
    (Collection::Districts, Collection::Facilities, "district_id"),
    (Collection::Facilities, Collection::PerformanceData, "facility_id"),
    (Collection::Facilities, Collection::SchemeTracking, "facility_id"),
];

/// Links whose parent delete removes the children
const CASCADES: [(Collection, Collection, &str); 2] = [
    (Collection::States, Collection::Districts, "state_id"),
    (Collection::Districts, Collection::Facilities, "district_id"),
];

/// JSON rows per collection behind a single lock
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<Collection, Vec<Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every row
    pub async fn clear(&self) {
        self.tables.write().await.clear();
    }

    /// Row count of a table
    pub async fn len(&self, table: Collection) -> usize {
        self.tables
            .read()
            .await
            .get(&table)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// All rows of a table, unfiltered
    pub async fn rows(&self, table: Collection) -> Vec<Value> {
        self.tables
            .read()
            .await
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    fn prepare_row(table: Collection, row: Value) -> DbResult<Map<String, Value>> {
        let Value::Object(mut obj) = row else {
            return Err(DbError::InvalidQuery(format!(
                "insert into {} expects a JSON object",
                table
            )));
        };
        obj.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        obj.entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        if matches!(
            table,
            Collection::States | Collection::Districts | Collection::Facilities | Collection::Profiles
        ) {
            obj.entry("is_active").or_insert(Value::Bool(true));
        }
        Ok(obj)
    }

    fn check_foreign_keys(
        tables: &HashMap<Collection, Vec<Value>>,
        table: Collection,
        row: &Map<String, Value>,
    ) -> DbResult<()> {
        for (parent, child, column) in FOREIGN_KEYS {
            if child != table {
                continue;
            }
            let Some(key) = row.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            let exists = tables
                .get(&parent)
                .map(|rows| rows.iter().any(|r| r.get("id") == Some(key)))
                .unwrap_or(false);
            if !exists {
                return Err(DbError::Constraint(format!(
                    "{}.{} references missing {} row {}",
                    table, column, parent, key
                )));
            }
        }
        Ok(())
    }

    /// Remove children of deleted rows, recursively
    fn cascade(tables: &mut HashMap<Collection, Vec<Value>>, parent: Collection, removed: &[Value]) {
        for (p, child, column) in CASCADES {
            if p != parent {
                continue;
            }
            let ids: Vec<&Value> = removed.iter().filter_map(|r| r.get("id")).collect();
            let Some(rows) = tables.get_mut(&child) else {
                continue;
            };
            let (gone, kept): (Vec<Value>, Vec<Value>) = std::mem::take(rows)
                .into_iter()
                .partition(|r| r.get(column).map(|v| ids.contains(&v)).unwrap_or(false));
            *rows = kept;
            if !gone.is_empty() {
                debug!(table = %child, count = gone.len(), "Cascade delete");
                Self::cascade(tables, child, &gone);
            }
        }
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, table: Collection, query: &Query) -> DbResult<Selection> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Value> = tables
            .get(&table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        let count = rows.len();
        if query.head {
            return Ok(Selection {
                data: Vec::new(),
                count,
            });
        }
        query.sort(&mut rows);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        let data = rows.iter().map(|r| query.project(r)).collect();
        Ok(Selection { data, count })
    }

    async fn insert(&self, table: Collection, row: Value) -> DbResult<Value> {
        let obj = Self::prepare_row(table, row)?;
        let mut tables = self.tables.write().await;
        Self::check_foreign_keys(&tables, table, &obj)?;

        let rows = tables.entry(table).or_default();
        let id = obj.get("id").cloned();
        if rows.iter().any(|r| r.get("id") == id.as_ref()) {
            return Err(DbError::AlreadyExists(format!(
                "{} {}",
                table,
                id.unwrap_or(Value::Null)
            )));
        }

        let row = Value::Object(obj);
        rows.push(row.clone());
        debug!(table = %table, "Row inserted");
        Ok(row)
    }

    async fn update(&self, table: Collection, patch: Value, query: &Query) -> DbResult<Vec<Value>> {
        query.require_filter("update")?;
        let Value::Object(patch) = patch else {
            return Err(DbError::InvalidQuery(format!(
                "update of {} expects a JSON object",
                table
            )));
        };
        if patch.contains_key("id") {
            return Err(DbError::InvalidQuery("id cannot be updated".to_string()));
        }

        let mut tables = self.tables.write().await;
        Self::check_foreign_keys(&tables, table, &patch)?;
        let Some(rows) = tables.get_mut(&table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|r| query.matches(r)) {
            if let Value::Object(obj) = row {
                for (k, v) in &patch {
                    obj.insert(k.clone(), v.clone());
                }
            }
            updated.push(row.clone());
        }
        debug!(table = %table, count = updated.len(), "Rows updated");
        Ok(updated)
    }

    async fn delete(&self, table: Collection, query: &Query) -> DbResult<Vec<Value>> {
        query.require_filter("delete")?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(&table) else {
            return Ok(Vec::new());
        };
        let (removed, kept): (Vec<Value>, Vec<Value>) =
            std::mem::take(rows).into_iter().partition(|r| query.matches(r));
        *rows = kept;
        Self::cascade(&mut tables, table, &removed);
        debug!(table = %table, count = removed.len(), "Rows deleted");
        Ok(removed)
    }
}
