// SPDX-License-Identifier: MIT

//! The message envelope exchanged with the child process (§3, §6).
//!
//! Dynamic JSON metadata is modeled as a typed enum for the known envelope
//! tag plus an opaque map for the rest (§9): parsing never fails on unknown
//! fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smol_str::SmolStr;

/// Tag of a message envelope (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Text,
    ToolUse,
    Error,
    System,
    Progress,
    Complete,
    Metadata,
    Response,
}

crate::simple_display! {
    Tag {
        Text => "text",
        ToolUse => "tool_use",
        Error => "error",
        System => "system",
        Progress => "progress",
        Complete => "complete",
        Metadata => "metadata",
        Response => "response",
    }
}

impl Tag {
    /// All tags, in a stable order — used by routers/buses that need to
    /// enumerate the known tag space (e.g. the default subscription `""`).
    pub const ALL: &'static [Tag] = &[
        Tag::Text,
        Tag::ToolUse,
        Tag::Error,
        Tag::System,
        Tag::Progress,
        Tag::Complete,
        Tag::Metadata,
        Tag::Response,
    ];
}

/// Structured error block carried inside an envelope from the child (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
}

/// Minimal typed wrapper over messages exchanged with the child process.
///
/// To the child's stdin: `{ "type": tag, "content": string, "meta": object?,
/// "id": string }`. From the child's stdout: the same shape with
/// `"metadata"`/`"message_id"`/`"error"` instead of `"meta"`/`"id"` — both
/// directions serialize through this one type via field aliases so callers
/// never juggle two DTOs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub tag: Tag,
    pub content: String,
    #[serde(default, alias = "meta", skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<SmolStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

impl Envelope {
    pub fn new(tag: Tag, content: impl Into<String>) -> Self {
        Self { tag, content: content.into(), metadata: Map::new(), message_id: None, error: None }
    }

    crate::setters! {
        set {
            metadata: Map<String, Value>,
            error: Option<EnvelopeError>,
        }
        option {
            message_id: SmolStr,
        }
    }

    /// Correlation id, if present — used by routers and the multiplexer to
    /// tie a response back to the request that produced it.
    pub fn correlation_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_tag_content_and_id() {
        let original = Envelope::new(Tag::Text, "hello").message_id(SmolStr::new("abc-123"));
        let wire = serde_json::to_string(&original).unwrap();
        let parsed: Envelope = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed.tag, Tag::Text);
        assert_eq!(parsed.content, "hello");
        assert_eq!(parsed.message_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn accepts_stdin_field_names() {
        let json = r#"{"type":"text","content":"hi","meta":{"k":"v"},"id":"x1"}"#;
        let parsed: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.message_id.as_deref(), Some("x1"));
        assert_eq!(parsed.metadata.get("k").unwrap(), "v");
    }

    #[test]
    fn accepts_stdout_field_names_with_error_block() {
        let json = r#"{"type":"error","content":"","error":{"type":"auth","message":"bad key","code":401}}"#;
        let parsed: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.tag, Tag::Error);
        let err = parsed.error.unwrap();
        assert_eq!(err.kind, "auth");
        assert_eq!(err.code, Some(401));
    }

    #[test]
    fn unknown_fields_do_not_fail_parsing() {
        let json = r#"{"type":"system","content":"boot","future_field":123}"#;
        assert!(serde_json::from_str::<Envelope>(json).is_ok());
    }
}
