//! Chat repository
//!
//! Owns the chat document lifecycle for the signed-in user: create, append,
//! fetch, list and favorite. Every operation resolves the current user
//! first and returns [`Error::Unauthenticated`] without touching the store
//! when there is none.

use std::sync::Arc;

use chrono::Utc;

use crate::config::FavoritesScope;
use crate::error::{Error, Result};
use crate::mirror::{self, FavoritesMirror};
use crate::schema;
use crate::session::SessionContext;
use crate::store::{CollectionPath, Document, DocumentPath, DocumentStore, OrderBy, Value};
use crate::types::{Chat, ChatId, ChatSummary, Message, MonotonicClock, UserId};

/// Per-user chat storage on top of a [`DocumentStore`].
pub struct ChatRepository {
    store: Arc<dyn DocumentStore>,
    session: SessionContext,
    mirror: FavoritesMirror,
    clock: MonotonicClock,
}

impl ChatRepository {
    /// Repository with an owner-scoped favorites mirror on the same store.
    pub fn new(store: Arc<dyn DocumentStore>, session: SessionContext) -> Self {
        let mirror = FavoritesMirror::new(store.clone(), session.clone(), FavoritesScope::Owner);
        Self::with_mirror(store, session, mirror)
    }

    pub fn with_mirror(
        store: Arc<dyn DocumentStore>,
        session: SessionContext,
        mirror: FavoritesMirror,
    ) -> Self {
        Self {
            store,
            session,
            mirror,
            clock: MonotonicClock::new(),
        }
    }

    pub fn mirror(&self) -> &FavoritesMirror {
        &self.mirror
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Current time from the repository's monotonic clock.
    pub fn now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }

    /// Create an empty, unfavorited chat stamped with the current time.
    pub async fn create_chat(&self, title: &str) -> Result<ChatId> {
        let uid = self.session.require_user()?;
        let collection = CollectionPath::user_chats(&uid);
        let id = ChatId::new(self.store.new_document_id(&collection).await?)?;
        let path = DocumentPath::chat(&uid, &id);

        let doc = schema::new_chat_document(title, self.clock.now());
        self.store.set(&path, doc).await?;

        tracing::debug!(uid = %uid, chat_id = %id, title, "Chat created");
        Ok(id)
    }

    /// Atomically append one message stamped with the current time.
    ///
    /// Uses the store's array-append primitive, so concurrent appends to the
    /// same chat are never lost. Appends awaited one after another keep their
    /// submission order.
    pub async fn append_message(&self, chat_id: &ChatId, text: &str, is_user: bool) -> Result<()> {
        let uid = self.session.require_user()?;
        let path = DocumentPath::chat(&uid, chat_id);
        let message = Message {
            text: text.to_string(),
            is_user,
            sent_at: self.clock.now(),
        };
        self.store
            .array_append(&path, schema::MESSAGES, schema::encode_message(&message))
            .await?;
        tracing::debug!(uid = %uid, chat_id = %chat_id, is_user, "Message appended");
        Ok(())
    }

    /// Every chat of the current user, most recent first.
    pub async fn fetch_all_chats(&self) -> Result<Vec<ChatSummary>> {
        let uid = self.session.require_user()?;
        let collection = CollectionPath::user_chats(&uid);
        let docs = self
            .store
            .query(&collection, &OrderBy::descending(schema::TIMESTAMP))
            .await?;

        let now = Utc::now();
        let rows = docs
            .iter()
            .map(|(id, doc)| {
                let path = format!("{}/{}", collection, id);
                Ok(schema::decode_chat_summary(&path, ChatId::new(id.as_str())?, doc, now))
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(uid = %uid, count = rows.len(), "Chats listed");
        Ok(rows)
    }

    /// The chat's messages in stored order; empty if the chat is missing.
    pub async fn fetch_messages(&self, chat_id: &ChatId) -> Result<Vec<Message>> {
        let uid = self.session.require_user()?;
        let path = DocumentPath::chat(&uid, chat_id);
        match self.store.get(&path).await? {
            Some(doc) => schema::decode_chat_messages(&path.to_string(), &doc, Utc::now()),
            None => Ok(Vec::new()),
        }
    }

    /// The full chat, or `None` if it does not exist.
    pub async fn fetch_chat(&self, chat_id: &ChatId) -> Result<Option<Chat>> {
        let uid = self.session.require_user()?;
        self.read_chat(&uid, chat_id).await
    }

    /// Set the chat's favorite flag and bring the favorites mirror in line.
    ///
    /// Two steps run in order:
    /// 1. write `isFavorited` on the chat;
    /// 2. copy the chat into the mirror (`desired = true`) or delete its
    ///    mirror record (`desired = false`).
    ///
    /// A failure in step 1 leaves the flag untouched and is returned as is.
    /// A failure in step 2 is returned as [`Error::MirrorDiverged`]: the flag
    /// keeps its new value and the mirror is stale until the next toggle.
    pub async fn set_favorited(&self, chat_id: &ChatId, desired: bool) -> Result<()> {
        let uid = self.session.require_user()?;
        let path = DocumentPath::chat(&uid, chat_id);

        let mut fields = Document::new();
        fields.insert(schema::IS_FAVORITED.to_string(), Value::Bool(desired));
        if let Err(err) = self.store.update(&path, fields).await {
            tracing::warn!(uid = %uid, chat_id = %chat_id, desired, error = %err, "Favorite flag update failed");
            return Err(err);
        }

        let mirrored = if desired {
            match self.read_chat(&uid, chat_id).await {
                Ok(Some(chat)) => self.mirror.upsert(&uid, &chat).await.map(|_| ()),
                Ok(None) => Err(Error::NotFound(path.to_string())),
                Err(err) => Err(err),
            }
        } else {
            self.mirror.remove(&uid, chat_id).await
        };

        mirrored.map_err(|err| mirror::diverged(chat_id, desired, err))?;
        tracing::debug!(uid = %uid, chat_id = %chat_id, desired, "Favorite flag set");
        Ok(())
    }

    async fn read_chat(&self, uid: &UserId, chat_id: &ChatId) -> Result<Option<Chat>> {
        let path = DocumentPath::chat(uid, chat_id);
        let Some(doc) = self.store.get(&path).await? else {
            return Ok(None);
        };
        schema::decode_chat(&path.to_string(), chat_id.clone(), &doc, Utc::now()).map(Some)
    }
}
