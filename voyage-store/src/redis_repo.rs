use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::document::{
    merge, Condition, DocumentStore, Filter, StoreError, StoreResult, UpdateOutcome,
};

const MAX_CAS_ATTEMPTS: usize = 8;

// Swap only if nobody wrote since we read.
static COMPARE_AND_SET: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r#"
        if redis.call("GET", KEYS[1]) == ARGV[1] then
            redis.call("SET", KEYS[1], ARGV[2])
            return 1
        else
            return 0
        end
    "#,
    )
});

// Create the document and index it in one step.
static INSERT_IF_ABSENT: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r#"
        if redis.call("SET", KEYS[1], ARGV[1], "NX") then
            redis.call("SADD", KEYS[2], ARGV[2])
            return 1
        else
            return 0
        end
    "#,
    )
});

/// Redis-backed document store. Each document is a JSON string under
/// `{prefix}doc:{table}:{key}`; `{prefix}index:{table}` is the set of keys for scans.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    prefix: String,
}

impl RedisStore {
    pub async fn new(connection_string: &str, prefix: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        let store = Self {
            client,
            prefix: prefix.to_string(),
        };
        let mut conn = store.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Connected to Redis document store (prefix {:?})", store.prefix);
        Ok(store)
    }

    fn doc_key(&self, table: &str, key: &str) -> String {
        format!("{}doc:{}:{}", self.prefix, table, key)
    }

    fn index_key(&self, table: &str) -> String {
        format!("{}index:{}", self.prefix, table)
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn get(&self, table: &str, key: &str) -> StoreResult<Option<Value>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(self.doc_key(table, key)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, table: &str, key: &str, doc: &Value) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let body = serde_json::to_string(doc)?;

        let _: () = redis::pipe()
            .atomic()
            .set(self.doc_key(table, key), body)
            .ignore()
            .sadd(self.index_key(table), key)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn put_if_absent(&self, table: &str, key: &str, doc: &Value) -> StoreResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let body = serde_json::to_string(doc)?;

        let created: i64 = INSERT_IF_ABSENT
            .key(self.doc_key(table, key))
            .key(self.index_key(table))
            .arg(body)
            .arg(key)
            .invoke_async(&mut conn)
            .await?;
        Ok(created == 1)
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        changes: &Map<String, Value>,
        condition: Option<&Condition>,
    ) -> StoreResult<UpdateOutcome> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let doc_key = self.doc_key(table, key);

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let raw: Option<String> = conn.get(&doc_key).await?;
            let Some(raw) = raw else {
                return Ok(UpdateOutcome::Missing);
            };

            let mut doc: Value = serde_json::from_str(&raw)?;
            if let Some(condition) = condition {
                if !condition.holds(&doc) {
                    return Ok(UpdateOutcome::ConditionFailed);
                }
            }
            if changes.is_empty() {
                return Ok(UpdateOutcome::Applied(doc));
            }

            merge(&mut doc, changes);
            let next = serde_json::to_string(&doc)?;

            let swapped: i64 = COMPARE_AND_SET
                .key(&doc_key)
                .arg(&raw)
                .arg(&next)
                .invoke_async(&mut conn)
                .await?;
            if swapped == 1 {
                return Ok(UpdateOutcome::Applied(doc));
            }
            debug!("Concurrent write on {}, retrying (attempt {})", doc_key, attempt);
        }

        Err(StoreError::Contention(doc_key))
    }

    async fn delete(&self, table: &str, key: &str) -> StoreResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (removed,): (i64,) = redis::pipe()
            .atomic()
            .del(self.doc_key(table, key))
            .srem(self.index_key(table), key)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn scan(&self, table: &str, filter: &Filter) -> StoreResult<Vec<Value>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let keys: Vec<String> = conn.smembers(self.index_key(table)).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let doc_keys: Vec<String> = keys.iter().map(|k| self.doc_key(table, k)).collect();
        let raws: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&doc_keys)
            .query_async(&mut conn)
            .await?;

        let mut docs = Vec::with_capacity(raws.len());
        for raw in raws.into_iter().flatten() {
            let doc: Value = serde_json::from_str(&raw)?;
            if filter.matches(&doc) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }
}
