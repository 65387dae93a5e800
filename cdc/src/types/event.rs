use serde::Deserialize;
use serde_json::{Map, Value};

/// Body of one changefeed webhook request.
///
/// A request either carries a batch of row events in `payload` or only a `resolved`
/// checkpoint timestamp, in which case the batch is empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEnvelope {
    /// Row events, in the order emitted by the changefeed.
    #[serde(default)]
    pub payload: Vec<ChangeEvent>,
    /// Number of events the source claims to have sent.
    #[serde(default)]
    pub length: Option<u64>,
    /// Resolved timestamp checkpoint, if this is a resolved message.
    #[serde(default)]
    pub resolved: Option<String>,
}

impl WebhookEnvelope {
    /// Decodes an envelope from a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<WebhookEnvelope, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn is_resolved_only(&self) -> bool {
        self.payload.is_empty() && self.resolved.is_some()
    }
}

/// A notification about one row of a source table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeEvent {
    /// Name of the source table the row belongs to.
    #[serde(rename = "topic")]
    pub source: String,
    /// Primary key values, positionally matching the request's primary-key columns.
    #[serde(default)]
    pub key: Vec<Value>,
    /// New row state. `None` (absent or `null`) means the row was deleted.
    #[serde(default)]
    pub after: Option<Map<String, Value>>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_upserts_and_deletes() {
        let body = json!({
            "payload": [
                {
                    "topic": "orders",
                    "key": [1],
                    "after": {"id": 1, "note": "hello"},
                    "updated": "1700000000.0000000000"
                },
                {"topic": "orders", "key": [2], "after": null},
                {"topic": "orders", "key": [3]},
                {"topic": "orders", "key": [4], "after": {}}
            ],
            "length": 4
        });

        let envelope = WebhookEnvelope::from_slice(body.to_string().as_bytes()).unwrap();

        assert_eq!(envelope.length, Some(4));
        let deletes: Vec<bool> = envelope
            .payload
            .iter()
            .map(|event| event.after.is_none())
            .collect();
        assert_eq!(deletes, vec![false, true, true, false]);
        assert_eq!(envelope.payload[0].source, "orders");
        assert_eq!(envelope.payload[0].key, vec![json!(1)]);
    }

    #[test]
    fn resolved_only_envelope_is_an_empty_batch() {
        let envelope =
            WebhookEnvelope::from_slice(br#"{"resolved":"1700000000.0000000000"}"#).unwrap();

        assert!(envelope.payload.is_empty());
        assert!(envelope.is_resolved_only());
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(WebhookEnvelope::from_slice(b"{not json").is_err());
        assert!(WebhookEnvelope::from_slice(br#"{"payload":[{"key":[1]}]}"#).is_err());
    }
}
