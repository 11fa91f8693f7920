//! Document store connector contract
//!
//! The domain layer defines what it needs from a remote schemaless document
//! database: point reads, filtered scans, live snapshot watches and
//! single-document writes. Connectors provide the implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::value_objects::DocumentId;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// JSON object body of a document
pub type Fields = serde_json::Map<String, Value>;

// ============================================================================
// Paths and documents
// ============================================================================

/// Slash-separated collection path, e.g. `/artifacts/app/public/data/posts`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Append path segments
    #[must_use]
    pub fn join<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = self.0.trim_end_matches('/').to_string();
        for segment in segments {
            path.push('/');
            path.push_str(segment.as_ref());
        }
        Self(path)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored document with its store-maintained metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    /// Store revision of the last write to this document
    pub revision: u64,
    pub fields: Fields,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Deserialize the body into a typed record
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Complete point-in-time view of a watched query
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Store revision this snapshot reflects
    pub revision: u64,
    pub documents: Vec<Document>,
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKey {
    /// Server-assigned creation timestamp
    CreateTime,
    Id,
    Field(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub key: OrderKey,
    pub direction: Direction,
}

/// Equality filter on a top-level field
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

/// Filter/order/limit description shared by `list` and `watch`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn order_by(mut self, key: OrderKey, direction: Direction) -> Self {
        self.order_by.push(OrderBy { key, direction });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|f| doc.fields.get(&f.field) == Some(&f.value))
    }

    /// Compare two documents by the query's ordering; documents without an
    /// explicit ordering fall back to id ascending
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for order in &self.order_by {
            let ord = match &order.key {
                OrderKey::CreateTime => a.create_time.cmp(&b.create_time),
                OrderKey::Id => a.id.cmp(&b.id),
                OrderKey::Field(name) => compare_values(a.fields.get(name), b.fields.get(name)),
            };
            let ord = match order.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    }

    /// Filter, sort and truncate a set of documents
    pub fn apply<'a, I>(&self, docs: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).cloned().collect();
        out.sort_by(|a, b| self.compare(a, b));
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Total order over optional JSON values: missing < null < bool < number < string < other
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

// ============================================================================
// Patches
// ============================================================================

/// Single-field write operation
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(Value),
    /// Append each value not already present (array treated as a set)
    ArrayUnion(Vec<Value>),
    /// Remove every occurrence of each value
    ArrayRemove(Vec<Value>),
    Delete,
}

/// Partial update applied atomically by the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    pub ops: Vec<(String, FieldOp)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push((field.into(), FieldOp::Set(value.into())));
        self
    }

    #[must_use]
    pub fn array_union(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push((field.into(), FieldOp::ArrayUnion(vec![value.into()])));
        self
    }

    #[must_use]
    pub fn array_remove(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push((field.into(), FieldOp::ArrayRemove(vec![value.into()])));
        self
    }

    #[must_use]
    pub fn delete(mut self, field: impl Into<String>) -> Self {
        self.ops.push((field.into(), FieldOp::Delete));
        self
    }

    /// Apply the patch to a document body. Either every op applies or none do.
    pub fn apply(&self, fields: &mut Fields) -> StoreResult<()> {
        let mut next = fields.clone();
        for (field, op) in &self.ops {
            match op {
                FieldOp::Set(value) => {
                    next.insert(field.clone(), value.clone());
                }
                FieldOp::Delete => {
                    next.remove(field);
                }
                FieldOp::ArrayUnion(values) => {
                    let items = array_field(&mut next, field)?;
                    for value in values {
                        if !items.contains(value) {
                            items.push(value.clone());
                        }
                    }
                }
                FieldOp::ArrayRemove(values) => {
                    let items = array_field(&mut next, field)?;
                    items.retain(|item| !values.contains(item));
                }
            }
        }
        *fields = next;
        Ok(())
    }
}

fn array_field<'a>(fields: &'a mut Fields, field: &str) -> StoreResult<&'a mut Vec<Value>> {
    let slot = fields
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut().ok_or_else(|| StoreError::InvalidPatch {
        field: field.to_string(),
        reason: "not an array".to_string(),
    })
}

// ============================================================================
// Live watches
// ============================================================================

/// Handle to a store-side listener. Detaching (or dropping) stops delivery.
pub struct ListenerHandle {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerHandle {
    pub fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Handle for a listener that owns no store-side resources
    pub fn noop() -> Self {
        Self { detach: None }
    }

    /// Stop delivery; calling more than once is harmless
    pub fn detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.detach.is_some()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Live query: a stream of full snapshots, ending with an error or `None`
/// when the connection is lost
#[derive(Debug)]
pub struct Watch {
    snapshots: mpsc::UnboundedReceiver<StoreResult<Snapshot>>,
    handle: ListenerHandle,
}

impl Watch {
    pub fn new(
        snapshots: mpsc::UnboundedReceiver<StoreResult<Snapshot>>,
        handle: ListenerHandle,
    ) -> Self {
        Self { snapshots, handle }
    }

    /// Detach the listener; pending snapshots are discarded
    pub fn detach(&mut self) {
        self.handle.detach();
        self.snapshots.close();
    }
}

impl Stream for Watch {
    type Item = StoreResult<Snapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.snapshots.poll_recv(cx)
    }
}

// ============================================================================
// Connector
// ============================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read
    async fn get(&self, path: &CollectionPath, id: &DocumentId) -> StoreResult<Option<Document>>;

    /// One-shot filtered scan
    async fn list(&self, path: &CollectionPath, query: &Query) -> StoreResult<Vec<Document>>;

    /// Attach a live listener; the first item is the current snapshot
    async fn watch(&self, path: &CollectionPath, query: Query) -> StoreResult<Watch>;

    /// Insert with a store-assigned id and creation time
    async fn insert(&self, path: &CollectionPath, fields: Fields) -> StoreResult<DocumentId>;

    /// Create or replace the document at a caller-chosen id
    async fn set(&self, path: &CollectionPath, id: &DocumentId, fields: Fields) -> StoreResult<()>;

    /// Apply a patch atomically and return the updated document
    async fn update(
        &self,
        path: &CollectionPath,
        id: &DocumentId,
        patch: Patch,
    ) -> StoreResult<Document>;

    /// Remove a document; removing a missing document is not an error
    async fn delete(&self, path: &CollectionPath, id: &DocumentId) -> StoreResult<()>;
}
