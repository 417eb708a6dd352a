use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::document::{merge, Condition, DocumentStore, Filter, StoreResult, UpdateOutcome};

type Tables = HashMap<String, HashMap<String, Value>>;

/// In-process store for development and tests. Every operation holds the
/// table lock for its whole read-modify-write.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, table: &str, key: &str) -> StoreResult<Option<Value>> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|docs| docs.get(key)).cloned())
    }

    async fn put(&self, table: &str, key: &str, doc: &Value) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), doc.clone());
        Ok(())
    }

    async fn put_if_absent(&self, table: &str, key: &str, doc: &Value) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let docs = tables.entry(table.to_string()).or_default();
        if docs.contains_key(key) {
            return Ok(false);
        }
        docs.insert(key.to_string(), doc.clone());
        Ok(true)
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        changes: &Map<String, Value>,
        condition: Option<&Condition>,
    ) -> StoreResult<UpdateOutcome> {
        let mut tables = self.tables.write().await;
        let Some(doc) = tables.get_mut(table).and_then(|docs| docs.get_mut(key)) else {
            return Ok(UpdateOutcome::Missing);
        };

        if let Some(condition) = condition {
            if !condition.holds(doc) {
                return Ok(UpdateOutcome::ConditionFailed);
            }
        }

        merge(doc, changes);
        Ok(UpdateOutcome::Applied(doc.clone()))
    }

    async fn delete(&self, table: &str, key: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .get_mut(table)
            .map(|docs| docs.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn scan(&self, table: &str, filter: &Filter) -> StoreResult<Vec<Value>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|docs| docs.values().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default())
    }
}
