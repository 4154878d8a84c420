//! Wire schema for chat and favorite documents
//!
//! ```text
//! users/{uid}/chats/{chatId}
//!     title: string, timestamp: timestamp, isFavorited: bool,
//!     messages: [{text: string, isUser: bool, sentAt: timestamp}]
//! favorites/{uid}_{chatId}
//!     ownerUid: string, chatId: string, title: string, timestamp: timestamp,
//!     messages: [...]
//! ```
//!
//! Decoding applies defaults for missing fields (empty string, `false`,
//! now, empty list). A field that is present with the wrong type is a
//! [`Error::Schema`] for full documents. List rows treat it as missing and
//! log a warning, so one bad document cannot empty a whole list.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::store::{Document, Value};
use crate::types::{Chat, ChatId, ChatSummary, FavoriteRecord, FavoriteSummary, Message, UserId};

pub const TITLE: &str = "title";
pub const TIMESTAMP: &str = "timestamp";
pub const IS_FAVORITED: &str = "isFavorited";
pub const MESSAGES: &str = "messages";
pub const TEXT: &str = "text";
pub const IS_USER: &str = "isUser";
pub const SENT_AT: &str = "sentAt";
pub const OWNER_UID: &str = "ownerUid";
pub const CHAT_ID: &str = "chatId";

// ============================================
// Field readers with defaults
// ============================================

struct Fields<'a> {
    path: &'a str,
    doc: &'a Document,
    /// Default wrong-typed fields instead of failing
    lenient: bool,
}

impl<'a> Fields<'a> {
    fn strict(path: &'a str, doc: &'a Document) -> Self {
        Self {
            path,
            doc,
            lenient: false,
        }
    }

    fn lenient(path: &'a str, doc: &'a Document) -> Self {
        Self {
            path,
            doc,
            lenient: true,
        }
    }

    fn mismatch<T>(&self, field: &str, expected: &str, found: &Value, default: T) -> Result<T> {
        let path = format!("{}.{}", self.path, field);
        if self.lenient {
            tracing::warn!(
                path = %path,
                expected,
                found = found.type_name(),
                "Wrong field type, using default"
            );
            return Ok(default);
        }
        Err(Error::Schema {
            path,
            message: format!("expected {}, found {}", expected, found.type_name()),
        })
    }

    fn string(&self, field: &str) -> Result<String> {
        match self.doc.get(field) {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => self.mismatch(field, "string", other, String::new()),
        }
    }

    fn bool(&self, field: &str) -> Result<bool> {
        match self.doc.get(field) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => self.mismatch(field, "bool", other, false),
        }
    }

    fn timestamp(&self, field: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        match self.doc.get(field) {
            None | Some(Value::Null) => Ok(now),
            Some(Value::Timestamp(ts)) => Ok(*ts),
            Some(other) => self.mismatch(field, "timestamp", other, now),
        }
    }

    fn array(&self, field: &str) -> Result<&'a [Value]> {
        match self.doc.get(field) {
            None | Some(Value::Null) => Ok(&[][..]),
            Some(Value::Array(items)) => Ok(items.as_slice()),
            Some(other) => self.mismatch(field, "array", other, &[][..]),
        }
    }
}

// ============================================
// Messages
// ============================================

pub fn encode_message(message: &Message) -> Value {
    let mut map = Document::new();
    map.insert(TEXT.into(), Value::String(message.text.clone()));
    map.insert(IS_USER.into(), Value::Bool(message.is_user));
    map.insert(SENT_AT.into(), Value::Timestamp(message.sent_at));
    Value::Map(map)
}

fn decode_messages(fields: &Fields<'_>, now: DateTime<Utc>) -> Result<Vec<Message>> {
    fields
        .array(MESSAGES)?
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let map = item.as_map().ok_or_else(|| Error::Schema {
                path: format!("{}.{}[{}]", fields.path, MESSAGES, idx),
                message: format!("expected map, found {}", item.type_name()),
            })?;
            let path = format!("{}.{}[{}]", fields.path, MESSAGES, idx);
            let entry = Fields::strict(&path, map);
            Ok(Message {
                text: entry.string(TEXT)?,
                is_user: entry.bool(IS_USER)?,
                sent_at: entry.timestamp(SENT_AT, now)?,
            })
        })
        .collect()
}

fn encode_messages(messages: &[Message]) -> Value {
    Value::Array(messages.iter().map(encode_message).collect())
}

// ============================================
// Chats
// ============================================

/// Document for a freshly created chat.
pub fn new_chat_document(title: &str, timestamp: DateTime<Utc>) -> Document {
    let mut doc = Document::new();
    doc.insert(TITLE.into(), Value::String(title.to_string()));
    doc.insert(TIMESTAMP.into(), Value::Timestamp(timestamp));
    doc.insert(IS_FAVORITED.into(), Value::Bool(false));
    doc.insert(MESSAGES.into(), Value::Array(Vec::new()));
    doc
}

pub fn decode_chat(path: &str, id: ChatId, doc: &Document, now: DateTime<Utc>) -> Result<Chat> {
    let fields = Fields::strict(path, doc);
    Ok(Chat {
        id,
        title: fields.string(TITLE)?,
        timestamp: fields.timestamp(TIMESTAMP, now)?,
        is_favorited: fields.bool(IS_FAVORITED)?,
        messages: decode_messages(&fields, now)?,
    })
}

/// Decode only the list-row fields; `messages` is not inspected.
///
/// Never fails: wrong-typed fields fall back to their defaults.
pub fn decode_chat_summary(
    path: &str,
    id: ChatId,
    doc: &Document,
    now: DateTime<Utc>,
) -> ChatSummary {
    let fields = Fields::lenient(path, doc);
    ChatSummary {
        chat_id: id,
        title: fields.string(TITLE).unwrap_or_default(),
        timestamp: fields.timestamp(TIMESTAMP, now).unwrap_or(now),
        is_favorited: fields.bool(IS_FAVORITED).unwrap_or_default(),
    }
}

pub fn decode_chat_messages(path: &str, doc: &Document, now: DateTime<Utc>) -> Result<Vec<Message>> {
    decode_messages(&Fields::strict(path, doc), now)
}

// ============================================
// Favorites
// ============================================

pub fn encode_favorite(record: &FavoriteRecord) -> Document {
    let mut doc = Document::new();
    doc.insert(OWNER_UID.into(), Value::String(record.owner.as_str().to_string()));
    doc.insert(CHAT_ID.into(), Value::String(record.chat_id.as_str().to_string()));
    doc.insert(TITLE.into(), Value::String(record.title.clone()));
    doc.insert(TIMESTAMP.into(), Value::Timestamp(record.timestamp));
    doc.insert(MESSAGES.into(), encode_messages(&record.messages));
    doc
}

/// Decode a full favorite record.
///
/// Unlike list rows, a full record needs usable owner and chat ids.
pub fn decode_favorite(path: &str, doc: &Document, now: DateTime<Utc>) -> Result<FavoriteRecord> {
    let fields = Fields::strict(path, doc);
    let owner = UserId::new(fields.string(OWNER_UID)?).map_err(|_| Error::Schema {
        path: format!("{}.{}", path, OWNER_UID),
        message: "missing or invalid owner uid".to_string(),
    })?;
    let chat_id = ChatId::new(fields.string(CHAT_ID)?).map_err(|_| Error::Schema {
        path: format!("{}.{}", path, CHAT_ID),
        message: "missing or invalid chat id".to_string(),
    })?;
    Ok(FavoriteRecord {
        owner,
        chat_id,
        title: fields.string(TITLE)?,
        timestamp: fields.timestamp(TIMESTAMP, now)?,
        messages: decode_messages(&fields, now)?,
    })
}

/// List-row decode for favorites; lenient like [`decode_chat_summary`].
pub fn decode_favorite_summary(
    path: &str,
    record_key: &str,
    doc: &Document,
    now: DateTime<Utc>,
) -> FavoriteSummary {
    let fields = Fields::lenient(path, doc);
    FavoriteSummary {
        record_key: record_key.to_string(),
        owner: fields.string(OWNER_UID).unwrap_or_default(),
        chat_id: fields.string(CHAT_ID).unwrap_or_default(),
        title: fields.string(TITLE).unwrap_or_default(),
        timestamp: fields.timestamp(TIMESTAMP, now).unwrap_or(now),
        message_count: fields.array(MESSAGES).map_or(0, |items| items.len()),
    }
}
