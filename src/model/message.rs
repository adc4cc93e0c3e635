//! Chat message model.
//!
//! Messages are owned by the external message store. A message body is an
//! ordered list of heterogeneous segments (text, image, file); only text
//! segments carry searchable content.

use serde::{Deserialize, Serialize};

/// One segment of a structured message body.
///
/// Unknown kinds deserialize to [`Segment::Other`]. Entries that cannot be
/// parsed at all (null, missing `text`, wrong field types) are mapped to
/// `Other` by [`Segment::parse_parts`] instead of failing the whole message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Segment {
    Text {
        text: String,
    },
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl Segment {
    /// Create a text segment.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Parse a raw `parts` value leniently.
    ///
    /// A non-array value yields no segments. Each array entry that does not
    /// deserialize becomes [`Segment::Other`].
    #[must_use]
    pub fn parse_parts(value: &serde_json::Value) -> Vec<Self> {
        let Some(entries) = value.as_array() else {
            return Vec::new();
        };

        entries
            .iter()
            .map(|entry| serde_json::from_value(entry.clone()).unwrap_or(Self::Other))
            .collect()
    }

    /// Parse a JSON string of parts, treating invalid JSON as an empty body.
    #[must_use]
    pub fn parse_parts_str(raw: &str) -> Vec<Self> {
        serde_json::from_str::<serde_json::Value>(raw)
            .map(|value| Self::parse_parts(&value))
            .unwrap_or_default()
    }
}

/// A stored chat message as seen by the embedding subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier (assigned by the message store)
    pub id: String,

    /// Chat this message belongs to
    pub chat_id: String,

    /// Author role (user, assistant, system)
    pub role: String,

    /// Structured message body
    pub parts: Vec<Segment>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Message {
    /// Create a new message with a generated ID.
    pub fn new(chat_id: impl Into<String>, role: impl Into<String>, parts: Vec<Segment>) -> Self {
        Self {
            id: format!("msg_{}", &uuid::Uuid::new_v4().simple().to_string()[..16]),
            chat_id: chat_id.into(),
            role: role.into(),
            parts,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_kinds() {
        let parts = Segment::parse_parts(&json!([
            {"type": "text", "text": "Hello"},
            {"type": "image", "url": "https://example.com/a.png"},
            {"type": "file", "name": "notes.pdf"}
        ]));

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], Segment::text("Hello"));
        assert!(matches!(parts[1], Segment::Image { .. }));
        assert!(matches!(parts[2], Segment::File { .. }));
    }

    #[test]
    fn test_parse_malformed_entries_become_other() {
        let parts = Segment::parse_parts(&json!([
            null,
            {"type": "text"},
            {"type": "text", "text": 42},
            {"type": "tool-call", "name": "lookup"},
            "just a string",
            {"text": "no discriminator"}
        ]));

        assert_eq!(parts.len(), 6);
        assert!(parts.iter().all(|p| *p == Segment::Other));
    }

    #[test]
    fn test_parse_non_array() {
        assert!(Segment::parse_parts(&json!({"type": "text", "text": "x"})).is_empty());
        assert!(Segment::parse_parts(&json!(null)).is_empty());
        assert!(Segment::parse_parts_str("not json").is_empty());
    }

    #[test]
    fn test_new_message_id() {
        let message = Message::new("chat_1", "user", vec![Segment::text("hi")]);
        assert!(message.id.starts_with("msg_"));
        assert_eq!(message.chat_id, "chat_1");
        assert!(message.created_at > 0);
    }
}
