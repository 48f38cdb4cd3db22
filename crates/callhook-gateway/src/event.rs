//! Document-created event payloads.
//!
//! Accepted shapes:
//! - `{"value": <Firestore document>, ...}`: the event data the trigger service delivers
//! - `<Firestore document>`: `{"name": ".../documents/notifications/abc", "fields": {...}}`
//! - `{"path": "notifications/abc", "data": {...plain JSON...}}`: hand-written events
//!
//! Plain JSON maps onto field values directly; strings stay strings.

use callhook_core::error::{CallhookError, Result};
use callhook_core::types::{Document, DocumentRef, FieldValue};
use callhook_store::codec::decode_document;
use serde_json::Value;
use std::collections::BTreeMap;

/// Parse any accepted event shape into the created document.
pub fn parse_created_event(body: &Value) -> Result<Document> {
    if let Some(value) = body.get("value") {
        return decode_document(value).map_err(|e| CallhookError::Event(e.to_string()));
    }
    if body.get("name").is_some() {
        return decode_document(body).map_err(|e| CallhookError::Event(e.to_string()));
    }
    if let Some(path) = body.get("path").and_then(Value::as_str) {
        let reference = DocumentRef::parse(path)
            .ok_or_else(|| CallhookError::Event(format!("Invalid document path '{path}'")))?;
        let fields = match body.get("data") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), from_plain_json(v)))
                .collect(),
            Some(Value::Null) | None => BTreeMap::new(),
            Some(other) => {
                return Err(CallhookError::Event(format!("'data' must be an object, got {other}")));
            }
        };
        return Ok(Document { reference, fields });
    }
    Err(CallhookError::Event(
        "Expected a document event: {value}, {name, fields} or {path, data}".into(),
    ))
}

fn from_plain_json(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => FieldValue::Double(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => FieldValue::String(s.clone()),
        Value::Array(items) => FieldValue::Array(items.iter().map(from_plain_json).collect()),
        Value::Object(map) => FieldValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), from_plain_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trigger_event_shape() {
        let body = json!({
            "value": {
                "name": "projects/demo/databases/(default)/documents/notifications/n1",
                "fields": { "type": { "stringValue": "incoming_call" } }
            },
            "oldValue": {},
            "updateMask": {}
        });
        let doc = parse_created_event(&body).unwrap();
        assert_eq!(doc.reference, DocumentRef::new("notifications", "n1"));
        assert_eq!(doc.get_str("type"), Some("incoming_call"));
    }

    #[test]
    fn test_bare_document_shape() {
        let body = json!({
            "name": "projects/demo/databases/(default)/documents/notifications/n2",
            "fields": { "callerId": { "stringValue": "u1" } }
        });
        assert_eq!(parse_created_event(&body).unwrap().get_str("callerId"), Some("u1"));
    }

    #[test]
    fn test_plain_shape() {
        let body = json!({
            "path": "notifications/n3",
            "data": { "type": "incoming_call", "targetToken": "tok123", "attempt": 2, "score": 0.5 }
        });
        let doc = parse_created_event(&body).unwrap();
        assert_eq!(doc.reference.id, "n3");
        assert_eq!(doc.get_str("targetToken"), Some("tok123"));
        assert_eq!(doc.get("attempt"), Some(&FieldValue::Integer(2)));
        assert_eq!(doc.get("score"), Some(&FieldValue::Double(0.5)));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_created_event(&json!({ "hello": "world" })).is_err());
        assert!(parse_created_event(&json!({ "path": "no-id" })).is_err());
        assert!(parse_created_event(&json!({ "path": "a/b", "data": [1] })).is_err());
    }
}
