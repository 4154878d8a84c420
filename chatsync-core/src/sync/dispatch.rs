//! Runs repository calls off the view's thread
//!
//! Each dispatch spawns one task on the runtime and sends its result back as
//! a [`SyncEvent`]. If the receiving view has gone away by then, the result
//! is dropped.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::mirror::FavoritesMirror;
use crate::repository::ChatRepository;
use crate::types::ChatId;

use super::chats::ToggleRequest;
use super::SyncEvent;

/// Spawns repository calls for one view.
#[derive(Clone)]
pub struct SyncDispatcher {
    handle: Handle,
    repo: Arc<ChatRepository>,
    favorites: FavoritesMirror,
    events: mpsc::UnboundedSender<SyncEvent>,
}

impl SyncDispatcher {
    /// Create a dispatcher and the receiver the view drains.
    ///
    /// `favorites` is the mirror used for listing, which may have a wider
    /// scope than the repository's own.
    pub fn channel(
        handle: Handle,
        repo: Arc<ChatRepository>,
        favorites: FavoritesMirror,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                handle,
                repo,
                favorites,
                events,
            },
            rx,
        )
    }

    pub fn repository(&self) -> &Arc<ChatRepository> {
        &self.repo
    }

    /// Write the favorite flag for a row already showing its new value.
    pub fn dispatch_toggle(&self, request: ToggleRequest) -> JoinHandle<()> {
        let repo = self.repo.clone();
        self.spawn("toggle", async move {
            let result = repo.set_favorited(&request.chat_id, request.desired).await;
            SyncEvent::ToggleSettled {
                chat_id: request.chat_id,
                desired: request.desired,
                result,
            }
        })
    }

    /// Re-fetch the chat list.
    pub fn dispatch_refresh(&self) -> JoinHandle<()> {
        let repo = self.repo.clone();
        self.spawn("refresh_chats", async move {
            SyncEvent::ChatsRefreshed(repo.fetch_all_chats().await)
        })
    }

    /// Re-fetch the favorites list.
    pub fn dispatch_refresh_favorites(&self) -> JoinHandle<()> {
        let favorites = self.favorites.clone();
        self.spawn("refresh_favorites", async move {
            SyncEvent::FavoritesRefreshed(favorites.list_favorites().await)
        })
    }

    /// Load a chat's transcript.
    pub fn dispatch_load_messages(&self, chat_id: ChatId) -> JoinHandle<()> {
        let repo = self.repo.clone();
        self.spawn("load_messages", async move {
            let result = repo.fetch_messages(&chat_id).await;
            SyncEvent::MessagesLoaded { chat_id, result }
        })
    }

    /// Load a favorite snapshot.
    pub fn dispatch_load_favorite(&self, record_key: String) -> JoinHandle<()> {
        let favorites = self.favorites.clone();
        self.spawn("load_favorite", async move {
            let result = favorites.fetch_favorite(&record_key).await;
            SyncEvent::FavoriteLoaded { record_key, result }
        })
    }

    fn spawn<F>(&self, what: &'static str, call: F) -> JoinHandle<()>
    where
        F: Future<Output = SyncEvent> + Send + 'static,
    {
        let events = self.events.clone();
        self.handle.spawn(async move {
            let event = call.await;
            if events.send(event).is_err() {
                tracing::debug!(call = what, "View closed before result arrived; dropping it");
            }
        })
    }
}

impl std::fmt::Debug for SyncDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDispatcher")
            .field("favorites", &self.favorites)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FavoritesScope;
    use crate::session::SessionContext;
    use crate::store::{DocumentStore, MemoryStore};
    use crate::types::UserId;

    fn dispatcher() -> (SyncDispatcher, mpsc::UnboundedReceiver<SyncEvent>, Arc<ChatRepository>) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let session = SessionContext::signed_in(UserId::new("u1").unwrap());
        let repo = Arc::new(ChatRepository::new(store.clone(), session.clone()));
        let mirror = FavoritesMirror::new(store, session, FavoritesScope::Owner);
        let (dispatcher, rx) = SyncDispatcher::channel(Handle::current(), repo.clone(), mirror);
        (dispatcher, rx, repo)
    }

    #[tokio::test]
    async fn test_refresh_delivers_event() {
        let (dispatcher, mut rx, repo) = dispatcher();
        repo.create_chat("hello").await.unwrap();

        dispatcher.dispatch_refresh().await.unwrap();
        match rx.recv().await {
            Some(SyncEvent::ChatsRefreshed(Ok(rows))) => assert_eq!(rows.len(), 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_view_is_a_no_op() {
        let (dispatcher, rx, repo) = dispatcher();
        let id = repo.create_chat("hello").await.unwrap();
        drop(rx);

        dispatcher
            .dispatch_toggle(ToggleRequest {
                chat_id: id.clone(),
                desired: true,
            })
            .await
            .unwrap();
        // The write still happened
        assert!(repo.fetch_chat(&id).await.unwrap().unwrap().is_favorited);
    }
}
