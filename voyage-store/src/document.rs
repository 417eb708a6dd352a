use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use voyage_core::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Gave up on contended write to {0}")]
    Contention(String),
    #[error("Store misconfigured: {0}")]
    Config(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Encoding(e) => RepositoryError::Corrupt(e.to_string()),
            other => RepositoryError::Backend(other.to_string()),
        }
    }
}

/// Equality filter applied to scanned documents. All clauses must hold.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.clauses.push((field.to_string(), value.into()));
        self
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

/// Precondition on the stored document for a conditional update.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub equals: Value,
}

impl Condition {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            equals: value.into(),
        }
    }

    pub fn holds(&self, doc: &Value) -> bool {
        doc.get(&self.field) == Some(&self.equals)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Applied(Value),
    Missing,
    ConditionFailed,
}

/// Key-value document store with one logical table per entity.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, table: &str, key: &str) -> StoreResult<Option<Value>>;

    async fn put(&self, table: &str, key: &str, doc: &Value) -> StoreResult<()>;

    /// Insert only if `key` is unused. Returns whether the document was written.
    async fn put_if_absent(&self, table: &str, key: &str, doc: &Value) -> StoreResult<bool>;

    /// Merge `changes` into the stored document as one atomic step.
    /// Never creates a document. An empty `changes` map writes nothing.
    async fn update(
        &self,
        table: &str,
        key: &str,
        changes: &Map<String, Value>,
        condition: Option<&Condition>,
    ) -> StoreResult<UpdateOutcome>;

    async fn delete(&self, table: &str, key: &str) -> StoreResult<bool>;

    /// Full-table scan. Order is unspecified.
    async fn scan(&self, table: &str, filter: &Filter) -> StoreResult<Vec<Value>>;
}

pub(crate) fn merge(doc: &mut Value, changes: &Map<String, Value>) {
    if let Value::Object(fields) = doc {
        for (name, value) in changes {
            fields.insert(name.clone(), value.clone());
        }
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value, RepositoryError> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Corrupt(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(doc: Value) -> Result<T, RepositoryError> {
    serde_json::from_value(doc).map_err(|e| RepositoryError::Corrupt(e.to_string()))
}
