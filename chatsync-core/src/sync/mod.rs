//! List-view synchronization
//!
//! Views hold their rows in controllers that are only mutated by the task
//! owning the view. Repository calls run on the tokio runtime through
//! [`SyncDispatcher`] and come back as [`SyncEvent`]s over a channel; the
//! view applies them with [`ListSyncController::handle_event`].
//!
//! A chat favorite toggle goes through these steps:
//! 1. [`ListSyncController::toggle_favorite`] flips the row locally and
//!    returns a [`ToggleRequest`].
//! 2. [`SyncDispatcher::dispatch_toggle`] runs `set_favorited`.
//! 3. The resulting [`SyncEvent::ToggleSettled`] confirms the row or rolls it
//!    back, and yields a [`Notice`] for the footer.

pub mod chats;
pub mod controller;
pub mod diff;
pub mod dispatch;
pub mod favorites;

pub use chats::{ChatListController, ChatRow, ToggleError, ToggleRequest, ToggleStart, ToggleState};
pub use controller::{EventOutcome, ListSyncController, Transcript, TranscriptSource};
pub use diff::{diff_rows, ListItem, ListView, RowChange};
pub use dispatch::SyncDispatcher;
pub use favorites::FavoritesListController;

use crate::error::Error;
use crate::types::{ChatId, ChatSummary, FavoriteRecord, FavoriteSummary, Message};

/// Transient, non-blocking notification for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Favorited,
    Unfavorited,
    /// The toggle failed and the row was restored
    ToggleFailed(String),
    /// The flag was saved but the favorites list could not be updated
    MirrorStale(String),
    /// A toggle on the row is still in flight
    ToggleRejected,
    /// A follow-up toggle was queued (`true`) or cancelled (`false`)
    ToggleQueued(bool),
    RefreshFailed(String),
    LoadFailed(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::Favorited => "Favorited".to_string(),
            Notice::Unfavorited => "Unfavorited".to_string(),
            Notice::ToggleFailed(reason) => format!("Error updating favorite: {}", reason),
            Notice::MirrorStale(reason) => {
                format!("Favorite saved, favorites list out of date: {}", reason)
            }
            Notice::ToggleRejected => "Favorite change still in progress".to_string(),
            Notice::ToggleQueued(true) => "Favorite change queued".to_string(),
            Notice::ToggleQueued(false) => "Queued favorite change cancelled".to_string(),
            Notice::RefreshFailed(reason) => format!("Refresh failed: {}", reason),
            Notice::LoadFailed(reason) => format!("Could not open: {}", reason),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notice::ToggleFailed(_)
                | Notice::MirrorStale(_)
                | Notice::RefreshFailed(_)
                | Notice::LoadFailed(_)
        )
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// A repository result routed back to the view that asked for it.
#[derive(Debug)]
pub enum SyncEvent {
    ToggleSettled {
        chat_id: ChatId,
        desired: bool,
        result: Result<(), Error>,
    },
    ChatsRefreshed(Result<Vec<ChatSummary>, Error>),
    FavoritesRefreshed(Result<Vec<FavoriteSummary>, Error>),
    MessagesLoaded {
        chat_id: ChatId,
        result: Result<Vec<Message>, Error>,
    },
    FavoriteLoaded {
        record_key: String,
        result: Result<Option<FavoriteRecord>, Error>,
    },
}
