//! Slash-separated store paths
//!
//! Collection paths have an odd number of segments (`users/u1/chats`),
//! document paths an even number (`users/u1/chats/c1`).

use std::fmt;

use crate::error::{Error, Result};
use crate::types::{ChatId, UserId};

fn split(kind: &'static str, raw: &str) -> Result<Vec<String>> {
    let segments: Vec<String> = raw.split('/').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::InvalidId {
            kind,
            value: raw.to_string(),
        });
    }
    Ok(segments)
}

/// Path to a collection of documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(Vec<String>);

impl CollectionPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let segments = split("collection path", raw)?;
        if segments.len() % 2 == 0 {
            return Err(Error::InvalidId {
                kind: "collection path",
                value: raw.to_string(),
            });
        }
        Ok(Self(segments))
    }

    /// `users/{uid}/chats`
    pub fn user_chats(uid: &UserId) -> Self {
        Self(vec!["users".into(), uid.as_str().into(), "chats".into()])
    }

    /// `favorites`
    pub fn favorites() -> Self {
        Self(vec!["favorites".into()])
    }

    /// Address a document in this collection.
    pub fn doc(&self, id: &str) -> Result<DocumentPath> {
        if id.is_empty() || id.contains('/') {
            return Err(Error::InvalidId {
                kind: "document id",
                value: id.to_string(),
            });
        }
        let mut segments = self.0.clone();
        segments.push(id.to_string());
        Ok(DocumentPath(segments))
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Path to a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath(Vec<String>);

impl DocumentPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let segments = split("document path", raw)?;
        if segments.len() % 2 != 0 {
            return Err(Error::InvalidId {
                kind: "document path",
                value: raw.to_string(),
            });
        }
        Ok(Self(segments))
    }

    /// `users/{uid}/chats/{chatId}`
    pub fn chat(uid: &UserId, chat_id: &ChatId) -> Self {
        Self(vec![
            "users".into(),
            uid.as_str().into(),
            "chats".into(),
            chat_id.as_str().into(),
        ])
    }

    /// `favorites/{key}`
    pub fn favorite(key: &str) -> Result<Self> {
        CollectionPath::favorites().doc(key)
    }

    /// Last segment.
    pub fn id(&self) -> &str {
        // Paths always hold at least two segments.
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// Collection holding this document.
    pub fn parent(&self) -> CollectionPath {
        CollectionPath(self.0[..self.0.len() - 1].to_vec())
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}
