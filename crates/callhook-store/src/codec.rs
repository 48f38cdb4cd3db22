//! Firestore REST value encoding.
//!
//! The REST API wraps every value in a single-key object naming its type:
//! `{"stringValue": "x"}`, `{"integerValue": "42"}`, `{"timestampValue": "..."}`.
//! Integers travel as strings.

use callhook_core::error::{CallhookError, Result};
use callhook_core::types::{Document, DocumentRef, FieldValue};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Encode a value for a query filter or a write.
pub fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(t) => json!({ "timestampValue": t.to_rfc3339() }),
        FieldValue::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

pub fn encode_fields(fields: &BTreeMap<String, FieldValue>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Decode one wrapped value.
pub fn decode_value(value: &Value) -> Result<FieldValue> {
    let obj = value
        .as_object()
        .ok_or_else(|| CallhookError::Store(format!("Expected a typed value object, got {value}")))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| CallhookError::Store("Empty value object".into()))?;

    let decoded = match kind.as_str() {
        "nullValue" => FieldValue::Null,
        "booleanValue" => FieldValue::Bool(inner.as_bool().unwrap_or(false)),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            FieldValue::Integer(
                parsed.ok_or_else(|| CallhookError::Store(format!("Bad integerValue: {inner}")))?,
            )
        }
        "doubleValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<f64>().ok(),
                other => other.as_f64(),
            };
            FieldValue::Double(
                parsed.ok_or_else(|| CallhookError::Store(format!("Bad doubleValue: {inner}")))?,
            )
        }
        "stringValue" | "referenceValue" | "bytesValue" => {
            FieldValue::String(inner.as_str().unwrap_or_default().to_string())
        }
        "timestampValue" => {
            let raw = inner.as_str().unwrap_or_default();
            let at = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| CallhookError::Store(format!("Bad timestampValue '{raw}': {e}")))?;
            FieldValue::Timestamp(at.with_timezone(&Utc))
        }
        "arrayValue" => {
            let items = match inner.get("values").and_then(Value::as_array) {
                Some(values) => values.iter().map(decode_value).collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            FieldValue::Array(items)
        }
        "mapValue" => FieldValue::Map(decode_fields(inner.get("fields"))?),
        "geoPointValue" => {
            let mut point = BTreeMap::new();
            for axis in ["latitude", "longitude"] {
                let v = inner.get(axis).and_then(Value::as_f64).unwrap_or_default();
                point.insert(axis.to_string(), FieldValue::Double(v));
            }
            FieldValue::Map(point)
        }
        other => return Err(CallhookError::Store(format!("Unknown value type '{other}'"))),
    };
    Ok(decoded)
}

/// Decode a `fields` object. Missing = empty.
pub fn decode_fields(fields: Option<&Value>) -> Result<BTreeMap<String, FieldValue>> {
    let Some(fields) = fields.and_then(Value::as_object) else {
        return Ok(BTreeMap::new());
    };
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

/// Turn a full resource name
/// (`projects/p/databases/d/documents/notifications/abc`) into a ref.
pub fn parse_document_name(name: &str) -> Result<DocumentRef> {
    let relative = name
        .split_once("/documents/")
        .map(|(_, rest)| rest)
        .unwrap_or(name);
    let (collection, id) = relative
        .trim_matches('/')
        .rsplit_once('/')
        .ok_or_else(|| CallhookError::Store(format!("Not a document name: {name}")))?;
    if collection.is_empty() || id.is_empty() {
        return Err(CallhookError::Store(format!("Not a document name: {name}")));
    }
    Ok(DocumentRef::new(collection, id))
}

/// Decode a REST `Document` resource.
pub fn decode_document(value: &Value) -> Result<Document> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| CallhookError::Store("Document without a name".into()))?;
    Ok(Document {
        reference: parse_document_name(name)?,
        fields: decode_fields(value.get("fields"))?,
    })
}
