//! Core domain types for chatsync
//!
//! These types are the typed view of the documents held by the remote store.
//! Conversion to and from store documents lives in [`crate::schema`].
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **User** | Opaque identifier supplied by the auth collaborator |
//! | **Chat** | A transcript owned by exactly one user, stored under `users/{uid}/chats/{chatId}` |
//! | **Message** | One immutable entry of a chat transcript |
//! | **FavoriteRecord** | Point-in-time copy of a favorited chat, stored under `favorites/{uid}_{chatId}` |
//! | **Summary** | The list-row projection of a chat or favorite |

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{Error, Result};

/// Maximum number of characters kept from the seed text for a chat title.
pub const TITLE_MAX_CHARS: usize = 30;

// ============================================
// Identifiers
// ============================================

fn validate_segment(kind: &'static str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains('/') {
        return Err(Error::InvalidId {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Opaque, stable user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_segment("user id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat identifier, unique within its owner's chat collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_segment("chat id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a favorite record: `{ownerUid}_{chatId}`.
pub fn favorite_key(owner: &UserId, chat_id: &ChatId) -> String {
    format!("{}_{}", owner, chat_id)
}

// ============================================
// Chat and messages
// ============================================

/// One entry of a chat transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message body (an error description for failed assistant replies)
    pub text: String,
    /// True when authored by the human, false for the assistant
    pub is_user: bool,
    /// When the message was appended
    pub sent_at: DateTime<Utc>,
}

/// A full chat document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub is_favorited: bool,
    /// Append-only; insertion order is temporal order
    pub messages: Vec<Message>,
}

impl Chat {
    /// Project this chat onto its list row.
    pub fn summary(&self) -> ChatSummary {
        ChatSummary {
            chat_id: self.id.clone(),
            title: self.title.clone(),
            timestamp: self.timestamp,
            is_favorited: self.is_favorited,
        }
    }
}

/// List-row projection of a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    pub chat_id: ChatId,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub is_favorited: bool,
}

// ============================================
// Favorites mirror
// ============================================

/// Point-in-time copy of a favorited chat.
///
/// Exists only while the source chat has `is_favorited = true`. Later appends
/// to the chat do not reach this copy unless the chat is favorited again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteRecord {
    pub owner: UserId,
    pub chat_id: ChatId,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl FavoriteRecord {
    /// Snapshot a chat for its owner.
    pub fn snapshot(owner: &UserId, chat: &Chat) -> Self {
        Self {
            owner: owner.clone(),
            chat_id: chat.id.clone(),
            title: chat.title.clone(),
            timestamp: chat.timestamp,
            messages: chat.messages.clone(),
        }
    }

    pub fn key(&self) -> String {
        favorite_key(&self.owner, &self.chat_id)
    }
}

/// List-row projection of a favorite record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteSummary {
    /// Document key in the favorites collection
    pub record_key: String,
    /// Owner uid as stored; empty when the record lacks one
    pub owner: String,
    /// Source chat id as stored; empty when the record lacks one
    pub chat_id: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub message_count: usize,
}

// ============================================
// Titles and time
// ============================================

/// Derive a chat title from seed text.
///
/// Takes the first line of the seed, cut to [`TITLE_MAX_CHARS`] characters.
/// A blank first line yields `Chat_{unix_seconds}`.
pub fn derive_title(seed: &str, now: DateTime<Utc>) -> String {
    let first_line = seed.lines().next().unwrap_or("").trim_end_matches('\r');
    if first_line.trim().is_empty() {
        return format!("Chat_{}", now.timestamp());
    }
    first_line.chars().take(TITLE_MAX_CHARS).collect()
}

/// Wall clock that never hands out the same or an earlier instant twice.
///
/// Chats created back to back must sort deterministically, and message
/// `sent_at` values must follow append order.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_nanos: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let mut prev = self.last_nanos.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev + 1);
            match self.last_nanos.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Utc.timestamp_nanos(next),
                Err(actual) => prev = actual,
            }
        }
    }
}
