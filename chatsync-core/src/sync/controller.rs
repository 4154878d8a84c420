//! Combined list state for a chats + favorites front end

use crate::config::PendingTogglePolicy;
use crate::types::{ChatId, Message};

use super::chats::{ChatListController, ToggleError, ToggleRequest, ToggleStart};
use super::diff::RowChange;
use super::favorites::FavoritesListController;
use super::{Notice, SyncEvent};

/// Where an opened transcript came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptSource {
    Chat(ChatId),
    /// Read-only favorite snapshot, by record key
    Favorite(String),
}

/// A loaded transcript ready to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub source: TranscriptSource,
    pub title: String,
    pub messages: Vec<Message>,
}

/// What applying one [`SyncEvent`] produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EventOutcome {
    pub chat_changes: Vec<RowChange>,
    pub favorite_changes: Vec<RowChange>,
    pub notice: Option<Notice>,
    /// Queued toggle to dispatch now
    pub follow_up: Option<ToggleRequest>,
    /// The favorites collection changed and should be re-fetched
    pub refresh_favorites: bool,
    pub transcript: Option<Transcript>,
}

/// List state for both views.
#[derive(Debug)]
pub struct ListSyncController {
    pub chats: ChatListController,
    pub favorites: FavoritesListController,
}

impl ListSyncController {
    pub fn new(policy: PendingTogglePolicy) -> Self {
        Self {
            chats: ChatListController::new(policy),
            favorites: FavoritesListController::new(),
        }
    }

    /// Optimistically toggle a chat's favorite flag.
    ///
    /// A returned request must be dispatched. Without one, the notice says
    /// whether the toggle was rejected, queued or unqueued.
    pub fn toggle_favorite(
        &mut self,
        chat_id: &ChatId,
    ) -> (Option<ToggleRequest>, Vec<RowChange>, Option<Notice>) {
        match self.chats.begin_toggle(chat_id) {
            Ok(ToggleStart::Dispatch { request, changes }) => (Some(request), changes, None),
            Ok(ToggleStart::Queued { queued }) => {
                (None, Vec::new(), Some(Notice::ToggleQueued(queued)))
            }
            Err(err) => {
                if let ToggleError::UnknownRow(_) = err {
                    tracing::debug!(chat_id = %chat_id, "Toggle on a row that is not listed");
                }
                (None, Vec::new(), Some(err.notice()))
            }
        }
    }

    /// Apply a repository result to the lists.
    pub fn handle_event(&mut self, event: SyncEvent) -> EventOutcome {
        let mut outcome = EventOutcome::default();
        match event {
            SyncEvent::ToggleSettled {
                chat_id,
                desired,
                result,
            } => match self.chats.complete_toggle(&chat_id, &result) {
                Some(settled) => {
                    outcome.chat_changes = settled.changes;
                    outcome.notice = Some(settled.notice);
                    outcome.follow_up = settled.follow_up;
                    outcome.refresh_favorites = settled.persisted;
                }
                None => {
                    tracing::debug!(chat_id = %chat_id, desired, "Toggle result with no pending row");
                }
            },
            SyncEvent::ChatsRefreshed(Ok(rows)) => {
                outcome.chat_changes = self.chats.apply_refresh(rows);
            }
            SyncEvent::FavoritesRefreshed(Ok(rows)) => {
                outcome.favorite_changes = self.favorites.apply_refresh(rows);
            }
            SyncEvent::ChatsRefreshed(Err(err)) | SyncEvent::FavoritesRefreshed(Err(err)) => {
                tracing::warn!(error = %err, "List refresh failed");
                outcome.notice = Some(Notice::RefreshFailed(err.to_string()));
            }
            SyncEvent::MessagesLoaded { chat_id, result } => match result {
                Ok(messages) => {
                    let title = self
                        .chats
                        .row(&chat_id)
                        .map(|row| row.summary.title.clone())
                        .unwrap_or_default();
                    outcome.transcript = Some(Transcript {
                        source: TranscriptSource::Chat(chat_id),
                        title,
                        messages,
                    });
                }
                Err(err) => {
                    tracing::warn!(chat_id = %chat_id, error = %err, "Loading messages failed");
                    outcome.notice = Some(Notice::LoadFailed(err.to_string()));
                }
            },
            SyncEvent::FavoriteLoaded { record_key, result } => match result {
                Ok(Some(record)) => {
                    outcome.transcript = Some(Transcript {
                        source: TranscriptSource::Favorite(record_key),
                        title: record.title,
                        messages: record.messages,
                    });
                }
                Ok(None) => {
                    outcome.notice = Some(Notice::LoadFailed(format!(
                        "favorite {} no longer exists",
                        record_key
                    )));
                    outcome.refresh_favorites = true;
                }
                Err(err) => {
                    tracing::warn!(record_key = %record_key, error = %err, "Loading favorite failed");
                    outcome.notice = Some(Notice::LoadFailed(err.to_string()));
                }
            },
        }
        outcome
    }
}
