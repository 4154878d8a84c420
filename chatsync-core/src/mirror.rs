//! Favorites mirror
//!
//! A denormalized copy of favorited chats in the top-level `favorites`
//! collection, keyed `{ownerUid}_{chatId}`. Records are written whole when a
//! chat is favorited and deleted when it is unfavorited; nothing else
//! touches them.

use std::sync::Arc;

use chrono::Utc;

use crate::config::FavoritesScope;
use crate::error::{Error, Result};
use crate::schema;
use crate::session::SessionContext;
use crate::store::{CollectionPath, DocumentPath, DocumentStore, OrderBy};
use crate::types::{favorite_key, Chat, ChatId, FavoriteRecord, FavoriteSummary, UserId};

/// Reads and writes the favorites collection.
#[derive(Clone)]
pub struct FavoritesMirror {
    store: Arc<dyn DocumentStore>,
    session: SessionContext,
    scope: FavoritesScope,
}

impl FavoritesMirror {
    pub fn new(store: Arc<dyn DocumentStore>, session: SessionContext, scope: FavoritesScope) -> Self {
        Self {
            store,
            session,
            scope,
        }
    }

    pub fn scope(&self) -> FavoritesScope {
        self.scope
    }

    /// Write a snapshot of `chat` for `owner`, replacing any previous copy.
    pub async fn upsert(&self, owner: &UserId, chat: &Chat) -> Result<FavoriteRecord> {
        let record = FavoriteRecord::snapshot(owner, chat);
        let path = DocumentPath::favorite(&record.key())?;
        self.store.set(&path, schema::encode_favorite(&record)).await?;
        tracing::debug!(uid = %owner, chat_id = %chat.id, messages = record.messages.len(), "Favorite copied");
        Ok(record)
    }

    /// Delete the copy for `(owner, chat_id)`. Missing records are fine.
    pub async fn remove(&self, owner: &UserId, chat_id: &ChatId) -> Result<()> {
        let path = DocumentPath::favorite(&favorite_key(owner, chat_id))?;
        self.store.delete(&path).await?;
        tracing::debug!(uid = %owner, chat_id = %chat_id, "Favorite removed");
        Ok(())
    }

    /// List favorites, most recent first.
    ///
    /// With [`FavoritesScope::Owner`] only the signed-in user's records are
    /// returned; [`FavoritesScope::Global`] lists every record.
    pub async fn list_favorites(&self) -> Result<Vec<FavoriteSummary>> {
        let uid = self.session.require_user()?;
        let collection = CollectionPath::favorites();
        let docs = self
            .store
            .query(&collection, &OrderBy::descending(schema::TIMESTAMP))
            .await?;

        let now = Utc::now();
        let mut rows = Vec::with_capacity(docs.len());
        for (key, doc) in &docs {
            let path = format!("{}/{}", collection, key);
            let row = schema::decode_favorite_summary(&path, key, doc, now);
            if self.visible_to(&uid, &row.owner) {
                rows.push(row);
            }
        }
        tracing::debug!(uid = %uid, scope = ?self.scope, count = rows.len(), "Favorites listed");
        Ok(rows)
    }

    /// Read one favorite record by key; `None` if absent or not visible.
    pub async fn fetch_favorite(&self, record_key: &str) -> Result<Option<FavoriteRecord>> {
        let uid = self.session.require_user()?;
        let path = DocumentPath::favorite(record_key)?;
        let Some(doc) = self.store.get(&path).await? else {
            return Ok(None);
        };
        let record = schema::decode_favorite(&path.to_string(), &doc, Utc::now())?;
        if !self.visible_to(&uid, record.owner.as_str()) {
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn visible_to(&self, uid: &UserId, owner: &str) -> bool {
        match self.scope {
            FavoritesScope::Owner => owner == uid.as_str(),
            FavoritesScope::Global => true,
        }
    }
}

impl std::fmt::Debug for FavoritesMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FavoritesMirror")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Wrap a mirror-step failure for a flag write that already landed.
pub(crate) fn diverged(chat_id: &ChatId, desired: bool, source: Error) -> Error {
    tracing::error!(
        chat_id = %chat_id,
        desired,
        error = %source,
        "Favorite flag written but favorites mirror update failed; flag and mirror diverge"
    );
    Error::MirrorDiverged {
        chat_id: chat_id.to_string(),
        desired,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn chat(id: &str) -> Chat {
        Chat {
            id: ChatId::new(id).unwrap(),
            title: format!("title {}", id),
            timestamp: Utc::now(),
            is_favorited: true,
            messages: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_owner_scope_hides_other_users() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();

        let as_alice = FavoritesMirror::new(
            store.clone(),
            SessionContext::signed_in(alice.clone()),
            FavoritesScope::Owner,
        );
        as_alice.upsert(&alice, &chat("a1")).await.unwrap();
        as_alice.upsert(&bob, &chat("b1")).await.unwrap();

        let rows = as_alice.list_favorites().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record_key, "alice_a1");
        assert!(as_alice.fetch_favorite("bob_b1").await.unwrap().is_none());

        let global = FavoritesMirror::new(
            store,
            SessionContext::signed_in(alice),
            FavoritesScope::Global,
        );
        assert_eq!(global.list_favorites().await.unwrap().len(), 2);
        assert!(global.fetch_favorite("bob_b1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let uid = UserId::new("u1").unwrap();
        let mirror = FavoritesMirror::new(store, SessionContext::signed_in(uid.clone()), FavoritesScope::Owner);
        mirror.remove(&uid, &ChatId::new("c1").unwrap()).await.unwrap();
        mirror.remove(&uid, &ChatId::new("c1").unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_requires_session() {
        let store = Arc::new(MemoryStore::new());
        let mirror = FavoritesMirror::new(store.clone(), SessionContext::signed_out(), FavoritesScope::Owner);
        assert!(mirror.list_favorites().await.unwrap_err().is_unauthenticated());
        assert!(mirror.fetch_favorite("u_c").await.unwrap_err().is_unauthenticated());
        assert_eq!(store.call_count(), 0);
    }
}
