//! Saved chat transcripts and their field-map codec
//!
//! A [`Transcript`] is stored as a flat JSON object. The same decoder serves
//! two layouts: the camelCase record written to the local mirror and the
//! snake_case row used by the cloud table. Decoding validates every field
//! explicitly and returns [`MedibotError::MalformedRecord`] instead of
//! panicking on unexpected shapes.

use crate::error::{ArchiveResult, MedibotError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

/// Field names used when encoding a transcript
///
/// Message entries always use `text`, `isUser` and `timestamp`; only the
/// top-level keys differ between layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub id: &'static str,
    pub owner_id: &'static str,
    pub title: &'static str,
    pub messages: &'static str,
    pub saved_at: &'static str,
    pub message_count: &'static str,
}

/// Layout of records in the local key-value mirror
pub const RECORD_FIELDS: FieldLayout = FieldLayout {
    id: "id",
    owner_id: "ownerId",
    title: "title",
    messages: "messages",
    saved_at: "savedAt",
    message_count: "messageCount",
};

/// Layout of rows in the cloud table
pub const ROW_FIELDS: FieldLayout = FieldLayout {
    id: "id",
    owner_id: "owner_id",
    title: "title",
    messages: "messages",
    saved_at: "saved_at",
    message_count: "message_count",
};

/// One message of a saved conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message body
    pub text: String,
    /// `true` when written by the end user, `false` for the assistant
    pub is_user: bool,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a user-authored message stamped with the current time
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: true,
            timestamp: Utc::now(),
        }
    }

    /// Create an assistant-authored message stamped with the current time
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: false,
            timestamp: Utc::now(),
        }
    }

    /// Encode as a `{text, isUser, timestamp}` object
    pub fn encode(&self) -> Value {
        json!({
            "text": self.text,
            "isUser": self.is_user,
            "timestamp": format_timestamp(&self.timestamp),
        })
    }

    /// Decode a message object
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if `text`, `isUser` or `timestamp` is
    /// missing or of the wrong type, or if the timestamp is not ISO-8601.
    pub fn decode(value: &Value) -> ArchiveResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| MedibotError::malformed("message is not an object"))?;
        Ok(Self {
            text: required_str(obj, "text")?.to_string(),
            is_user: obj
                .get("isUser")
                .and_then(Value::as_bool)
                .ok_or_else(|| missing("isUser"))?,
            timestamp: parse_timestamp(required_str(obj, "timestamp")?, "timestamp")?,
        })
    }
}

/// A saved, immutable record of one chat conversation
///
/// The message count is always derived from `messages`, so the cached
/// `messageCount` field written by [`Transcript::encode`] can never drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Opaque unique identifier
    pub id: String,
    /// Principal the transcript belongs to (empty for legacy records)
    pub owner_id: String,
    /// Display title
    pub title: String,
    messages: Vec<Message>,
    saved_at: DateTime<Utc>,
}

impl Transcript {
    /// Create a transcript from a finished conversation
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        title: impl Into<String>,
        messages: Vec<Message>,
        saved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            title: title.into(),
            messages,
            saved_at,
        }
    }

    /// Messages in conversation order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Time the transcript was saved
    pub fn saved_at(&self) -> DateTime<Utc> {
        self.saved_at
    }

    /// Number of messages; always equals `messages().len()`
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Return a copy stamped with a different owner
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    /// Case-insensitive substring match on the title
    ///
    /// An empty query matches everything.
    pub fn title_matches(&self, query: &str) -> bool {
        let query = query.trim();
        query.is_empty() || self.title.to_lowercase().contains(&query.to_lowercase())
    }

    /// Encode to the local record layout
    pub fn encode(&self) -> Map<String, Value> {
        self.encode_with(&RECORD_FIELDS)
    }

    /// Decode from the local record layout
    pub fn decode(value: &Value) -> ArchiveResult<Self> {
        Self::decode_with(value, &RECORD_FIELDS)
    }

    /// Encode using the given field layout
    pub fn encode_with(&self, layout: &FieldLayout) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(layout.id.into(), Value::String(self.id.clone()));
        map.insert(layout.owner_id.into(), Value::String(self.owner_id.clone()));
        map.insert(layout.title.into(), Value::String(self.title.clone()));
        map.insert(
            layout.messages.into(),
            Value::Array(self.messages.iter().map(Message::encode).collect()),
        );
        map.insert(
            layout.saved_at.into(),
            Value::String(format_timestamp(&self.saved_at)),
        );
        map.insert(layout.message_count.into(), json!(self.message_count()));
        map
    }

    /// Decode using the given field layout
    ///
    /// A missing owner decodes as an empty string, which keeps records
    /// written before owner scoping readable.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` when `id`, `title`, `savedAt`,
    /// `messageCount` or `messages` is absent or mistyped, when `savedAt`
    /// is not ISO-8601, or when any message fails to decode.
    pub fn decode_with(value: &Value, layout: &FieldLayout) -> ArchiveResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| MedibotError::malformed("record is not an object"))?;

        let id = required_str(obj, layout.id)?.to_string();
        let title = required_str(obj, layout.title)?.to_string();
        let owner_id = match obj.get(layout.owner_id) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(wrong_type(layout.owner_id)),
        };
        let saved_at = parse_timestamp(required_str(obj, layout.saved_at)?, layout.saved_at)?;
        let cached_count = obj
            .get(layout.message_count)
            .ok_or_else(|| missing(layout.message_count))?
            .as_u64()
            .ok_or_else(|| wrong_type(layout.message_count))?;

        let raw_messages = obj
            .get(layout.messages)
            .ok_or_else(|| missing(layout.messages))?
            .as_array()
            .ok_or_else(|| wrong_type(layout.messages))?;
        let messages = raw_messages
            .iter()
            .enumerate()
            .map(|(i, m)| {
                Message::decode(m).map_err(|e| match e {
                    MedibotError::MalformedRecord { reason } => {
                        MedibotError::malformed(format!("message {}: {}", i, reason))
                    }
                    other => other,
                })
            })
            .collect::<ArchiveResult<Vec<_>>>()?;

        if cached_count != messages.len() as u64 {
            tracing::debug!(
                "Transcript {} caches {} messages but holds {}; using the actual count",
                id,
                cached_count,
                messages.len()
            );
        }

        Ok(Self {
            id,
            owner_id,
            title,
            messages,
            saved_at,
        })
    }
}

/// Format a timestamp as ISO-8601 with a `Z` suffix
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(raw: &str, field: &str) -> ArchiveResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MedibotError::malformed(format!("`{}` is not ISO-8601 ({})", field, e)))
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &str) -> ArchiveResult<&'a str> {
    obj.get(field)
        .ok_or_else(|| missing(field))?
        .as_str()
        .ok_or_else(|| wrong_type(field))
}

fn missing(field: &str) -> MedibotError {
    MedibotError::malformed(format!("missing field `{}`", field))
}

fn wrong_type(field: &str) -> MedibotError {
    MedibotError::malformed(format!("field `{}` has the wrong type", field))
}
