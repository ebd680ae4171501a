//! Tag records and the payload shape stored against each flattened interval.

use serde_json::Value;
use std::collections::BTreeMap;

/// A source tag as emitted by a feed plugin: `{ type, source, name?, ... }`.
/// Carried as a free-form JSON object end-to-end (spec's option (a) for
/// dynamic payloads) so that adding a plugin is a data change, not a type
/// change.
pub type Tag = serde_json::Map<String, Value>;

/// `type` is the only field every tag must carry besides `source`; it keys
/// the payload grouping and is stripped before the tag is stored under it.
pub fn tag_type(tag: &Tag) -> &str {
    tag.get("type").and_then(Value::as_str).unwrap_or("unknown")
}

/// Tag record with its `type` field removed, as stored in a record's payload.
pub fn strip_type(mut tag: Tag) -> Value {
    tag.remove("type");
    Value::Object(tag)
}

/// Canonical (key-sorted, recursively) JSON string for a tag. Two tags with
/// the same fields in different key order must compare equal for dedup
/// purposes, which plain `to_string` does not guarantee once
/// `preserve_order` is in play anywhere in the dependency graph.
pub fn canonical_json(tag: &Tag) -> String {
    serde_json::to_string(&canonicalize(&Value::Object(tag.clone()))).unwrap_or_default()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            serde_json::to_value(sorted).unwrap_or(Value::Null)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Payload carried by a flattened interval record: tag `type` -> ordered,
/// deduplicated tag bodies (type field stripped).
pub type Payload = BTreeMap<String, Vec<Value>>;

/// A fully flattened, non-overlapping interval and the union of tags that
/// cover it.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRecord {
    pub start: u32,
    pub end: u32,
    pub payload: Payload,
}

impl IntervalRecord {
    pub fn contains(&self, q: u32) -> bool {
        self.start <= q && q <= self.end
    }

    /// Serializes to the canonical member string `"<start>|<end>|<payload_json>"`
    /// used as the sorted-index member.
    pub fn to_member(&self) -> String {
        let payload_json = serde_json::to_string(&self.payload).unwrap_or_else(|_| "{}".into());
        format!("{}|{}|{}", self.start, self.end, payload_json)
    }

    /// Parses a member string back into an `IntervalRecord`. Used both by the
    /// lookup engine (R2: serialize-then-parse round trip) and by tests.
    pub fn from_member(member: &str) -> Option<Self> {
        let mut parts = member.splitn(3, '|');
        let start: u32 = parts.next()?.parse().ok()?;
        let end: u32 = parts.next()?.parse().ok()?;
        let payload_json = parts.next()?;
        let payload: Payload = serde_json::from_str(payload_json).ok()?;
        Some(IntervalRecord {
            start,
            end,
            payload,
        })
    }
}
