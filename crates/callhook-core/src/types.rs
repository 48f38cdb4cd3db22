//! Document model: schemaless records, queries, and write batches.
//!
//! Records live in named collections and carry a map of typed field values.
//! Queries are conjunctions of field filters; a missing field or a value of a
//! different type never matches, the same way the hosted document store
//! evaluates filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A typed field value inside a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Borrow the string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Order two values of the same kind. Numbers compare across integer and
    /// double; every other mix is unordered.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        use FieldValue::*;
        match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (Integer(a), Double(b)) => (*a as f64).partial_cmp(b),
            (Double(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Double(a), Double(b)) => a.partial_cmp(b),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality as a query filter sees it: `1 == 1.0`, containers compare structurally.
    pub fn equals(&self, other: &FieldValue) -> bool {
        match self.compare(other) {
            Some(ord) => ord == Ordering::Equal,
            None => self == other,
        }
    }

    /// Render a scalar for a string-only payload (push data values).
    pub fn to_display_string(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Double(d) => d.to_string(),
            FieldValue::String(s) => s.clone(),
            FieldValue::Timestamp(t) => t.to_rfc3339(),
            FieldValue::Array(_) | FieldValue::Map(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(d: f64) -> Self {
        FieldValue::Double(d)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(t: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(t)
    }
}

/// Location of a single document: collection name + document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentRef {
    pub collection: String,
    pub id: String,
}

impl DocumentRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// `collection/id`
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }

    /// Parse a `collection/id` path (a leading slash is tolerated).
    pub fn parse(path: &str) -> Option<Self> {
        let (collection, id) = path.trim_start_matches('/').split_once('/')?;
        if collection.is_empty() || id.is_empty() || id.contains('/') {
            return None;
        }
        Some(Self::new(collection, id))
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A record snapshot: where it lives and what it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub reference: DocumentRef,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Document {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            reference: DocumentRef::new(collection, id),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn get_timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(FieldValue::as_timestamp)
    }
}

/// Filter operator. Only the two the sweeps and triggers need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Equal,
    LessThan,
}

/// `field <op> value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: FieldValue,
}

impl FieldFilter {
    pub fn equal(field: &str, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Equal,
            value: value.into(),
        }
    }

    pub fn less_than(field: &str, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::LessThan,
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Equal => actual.equals(&self.value),
            FilterOp::LessThan => actual.compare(&self.value) == Some(Ordering::Less),
        }
    }
}

/// A collection query: every filter must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<FieldFilter>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filters: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.filter(FieldFilter::equal(field, value))
    }

    pub fn where_lt(self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.filter(FieldFilter::less_than(field, value))
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Evaluate the query predicate against one document.
    pub fn matches(&self, doc: &Document) -> bool {
        doc.reference.collection == self.collection && self.filters.iter().all(|f| f.matches(doc))
    }

    /// Apply predicate and limit to a candidate set, preserving order.
    pub fn apply<'a, I>(&self, docs: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let matched = docs.into_iter().filter(|d| self.matches(d)).cloned();
        match self.limit {
            Some(n) => matched.take(n).collect(),
            None => matched.collect(),
        }
    }
}

/// Accumulated deletes, committed as one atomic unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    deletes: Vec<DocumentRef>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete(&mut self, reference: DocumentRef) -> &mut Self {
        self.deletes.push(reference);
        self
    }

    pub fn deletes(&self) -> &[DocumentRef] {
        &self.deletes
    }

    pub fn len(&self) -> usize {
        self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty()
    }
}

impl FromIterator<DocumentRef> for WriteBatch {
    fn from_iter<T: IntoIterator<Item = DocumentRef>>(iter: T) -> Self {
        Self {
            deletes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_less_than_on_timestamps() {
        let doc = Document::new("signaling", "a").with_field("timestamp", now() - Duration::minutes(10));
        assert!(FieldFilter::less_than("timestamp", now() - Duration::minutes(5)).matches(&doc));
        assert!(!FieldFilter::less_than("timestamp", now() - Duration::minutes(10)).matches(&doc));
    }

    #[test]
    fn test_missing_or_mistyped_field_never_matches() {
        let cutoff = now();
        let missing = Document::new("signaling", "a");
        let mistyped = Document::new("signaling", "b").with_field("timestamp", "yesterday");
        let filter = FieldFilter::less_than("timestamp", cutoff);
        assert!(!filter.matches(&missing));
        assert!(!filter.matches(&mistyped));
    }

    #[test]
    fn test_numeric_equality_across_kinds() {
        let doc = Document::new("c", "1").with_field("n", 1i64);
        assert!(FieldFilter::equal("n", 1.0).matches(&doc));
        assert!(!FieldFilter::equal("n", "1").matches(&doc));
    }

    #[test]
    fn test_query_checks_collection_and_limit() {
        let docs = vec![
            Document::new("calls", "1").with_field("status", "ended"),
            Document::new("calls", "2").with_field("status", "ended"),
            Document::new("other", "3").with_field("status", "ended"),
        ];
        let q = Query::collection("calls").where_eq("status", "ended");
        assert_eq!(q.apply(&docs).len(), 2);
        assert_eq!(q.clone().limit(Some(1)).apply(&docs).len(), 1);
    }

    #[test]
    fn test_ref_parse() {
        let r = DocumentRef::parse("/notifications/abc").unwrap();
        assert_eq!(r, DocumentRef::new("notifications", "abc"));
        assert_eq!(r.path(), "notifications/abc");
        assert!(DocumentRef::parse("notifications").is_none());
        assert!(DocumentRef::parse("a/b/c").is_none());
    }

    #[test]
    fn test_display_string() {
        assert_eq!(FieldValue::Integer(42).to_display_string(), "42");
        assert_eq!(FieldValue::Null.to_display_string(), "");
        assert_eq!(FieldValue::from("u1").to_display_string(), "u1");
    }
}
