//! Chat list with optimistic favorite toggling
//!
//! Each row's favorite flag is either `Settled(value)` or
//! `Pending { new, old }`. A toggle moves a settled row to pending and
//! redraws it with the new value right away. The repository result then
//! settles the row on `new` (success) or back on `old` (failure).

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::config::PendingTogglePolicy;
use crate::error::Error;
use crate::types::{ChatId, ChatSummary};

use super::diff::{ListItem, ListView, RowChange};
use super::Notice;

/// Favorite flag state of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    Settled(bool),
    Pending { new: bool, old: bool },
}

impl ToggleState {
    /// The value the row shows.
    pub fn displayed(&self) -> bool {
        match *self {
            ToggleState::Settled(value) => value,
            ToggleState::Pending { new, .. } => new,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ToggleState::Pending { .. })
    }
}

/// One drawn row of the chat list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRow {
    /// Row as last confirmed by the repository
    pub summary: ChatSummary,
    pub favorite: ToggleState,
}

impl ChatRow {
    pub fn is_favorited(&self) -> bool {
        self.favorite.displayed()
    }
}

impl ListItem for ChatRow {
    type Key = ChatId;

    fn key(&self) -> ChatId {
        self.summary.chat_id.clone()
    }

    fn same_content(&self, other: &Self) -> bool {
        self.summary.title == other.summary.title
            && self.summary.timestamp == other.summary.timestamp
            && self.is_favorited() == other.is_favorited()
    }
}

/// A favorite write to hand to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleRequest {
    pub chat_id: ChatId,
    pub desired: bool,
}

/// Result of a user toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleStart {
    /// Row is now pending; send the request and redraw `changes`
    Dispatch {
        request: ToggleRequest,
        changes: Vec<RowChange>,
    },
    /// A toggle is in flight; the follow-up is now `queued` (a second press
    /// while queued cancels it)
    Queued { queued: bool },
}

/// Why a toggle could not start.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToggleError {
    #[error("no row for chat {0}")]
    UnknownRow(ChatId),
    #[error("a favorite change for chat {0} is still in progress")]
    InFlight(ChatId),
}

impl ToggleError {
    pub fn notice(&self) -> Notice {
        match self {
            ToggleError::UnknownRow(_) => Notice::ToggleFailed(self.to_string()),
            ToggleError::InFlight(_) => Notice::ToggleRejected,
        }
    }
}

/// What settling a toggle produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleSettled {
    pub changes: Vec<RowChange>,
    pub notice: Notice,
    /// A queued toggle that has just been started and must be sent
    pub follow_up: Option<ToggleRequest>,
    /// Whether the repository now holds a new flag value
    pub persisted: bool,
}

/// Chat list state for one view.
///
/// Owned by the view's event loop; repository results reach it as
/// [`SyncEvent`](super::SyncEvent)s, never from another task directly.
#[derive(Debug)]
pub struct ChatListController {
    policy: PendingTogglePolicy,
    /// Latest repository order and values, with confirmed toggles applied
    authoritative: Vec<ChatSummary>,
    pending: HashMap<ChatId, (bool, bool)>,
    queued: HashSet<ChatId>,
    view: ListView<ChatRow>,
}

impl ChatListController {
    pub fn new(policy: PendingTogglePolicy) -> Self {
        Self {
            policy,
            authoritative: Vec::new(),
            pending: HashMap::new(),
            queued: HashSet::new(),
            view: ListView::new(),
        }
    }

    pub fn policy(&self) -> PendingTogglePolicy {
        self.policy
    }

    pub fn rows(&self) -> &[ChatRow] {
        self.view.items()
    }

    pub fn row(&self, chat_id: &ChatId) -> Option<&ChatRow> {
        self.view.position(chat_id).and_then(|i| self.view.get(i))
    }

    pub fn is_queued(&self, chat_id: &ChatId) -> bool {
        self.queued.contains(chat_id)
    }

    /// Replace the list with a fresh repository listing.
    ///
    /// Order is taken as given. Rows with a toggle in flight keep showing
    /// their optimistic value.
    pub fn apply_refresh(&mut self, summaries: Vec<ChatSummary>) -> Vec<RowChange> {
        self.authoritative = summaries;
        let live: HashSet<&ChatId> = self.authoritative.iter().map(|s| &s.chat_id).collect();
        self.queued.retain(|id| live.contains(id));
        self.redraw()
    }

    /// Start a favorite toggle on `chat_id`.
    pub fn begin_toggle(&mut self, chat_id: &ChatId) -> Result<ToggleStart, ToggleError> {
        if self.pending.contains_key(chat_id) {
            return match self.policy {
                PendingTogglePolicy::Reject => Err(ToggleError::InFlight(chat_id.clone())),
                PendingTogglePolicy::Queue => {
                    let queued = if self.queued.remove(chat_id) {
                        false
                    } else {
                        self.queued.insert(chat_id.clone());
                        true
                    };
                    Ok(ToggleStart::Queued { queued })
                }
            };
        }

        let current = self
            .authoritative
            .iter()
            .find(|s| &s.chat_id == chat_id)
            .map(|s| s.is_favorited)
            .ok_or_else(|| ToggleError::UnknownRow(chat_id.clone()))?;

        let request = self.start(chat_id, current);
        Ok(ToggleStart::Dispatch {
            request,
            changes: self.redraw(),
        })
    }

    /// Settle the in-flight toggle on `chat_id` with the repository result.
    ///
    /// Returns `None` when no toggle is in flight for that chat.
    pub fn complete_toggle(
        &mut self,
        chat_id: &ChatId,
        result: &Result<(), Error>,
    ) -> Option<ToggleSettled> {
        let (new, old) = self.pending.remove(chat_id)?;

        let (settled, notice, persisted) = match result {
            Ok(()) => (
                new,
                if new {
                    Notice::Favorited
                } else {
                    Notice::Unfavorited
                },
                true,
            ),
            Err(err) if err.is_mirror_divergence() => {
                tracing::warn!(chat_id = %chat_id, error = %err, "Favorite flag kept despite mirror failure");
                (new, Notice::MirrorStale(err.to_string()), true)
            }
            Err(err) => {
                tracing::warn!(chat_id = %chat_id, restored = old, error = %err, "Rolling back optimistic favorite toggle");
                (old, Notice::ToggleFailed(err.to_string()), false)
            }
        };

        if let Some(summary) = self
            .authoritative
            .iter_mut()
            .find(|s| &s.chat_id == chat_id)
        {
            summary.is_favorited = settled;
        }

        let follow_up = if self.queued.remove(chat_id) && self.contains(chat_id) {
            Some(self.start(chat_id, settled))
        } else {
            None
        };

        Some(ToggleSettled {
            changes: self.redraw(),
            notice,
            follow_up,
            persisted,
        })
    }

    fn contains(&self, chat_id: &ChatId) -> bool {
        self.authoritative.iter().any(|s| &s.chat_id == chat_id)
    }

    fn start(&mut self, chat_id: &ChatId, current: bool) -> ToggleRequest {
        self.pending.insert(chat_id.clone(), (!current, current));
        ToggleRequest {
            chat_id: chat_id.clone(),
            desired: !current,
        }
    }

    fn redraw(&mut self) -> Vec<RowChange> {
        let rows = self
            .authoritative
            .iter()
            .map(|summary| {
                let favorite = match self.pending.get(&summary.chat_id) {
                    Some(&(new, old)) => ToggleState::Pending { new, old },
                    None => ToggleState::Settled(summary.is_favorited),
                };
                ChatRow {
                    summary: summary.clone(),
                    favorite,
                }
            })
            .collect();
        self.view.submit(rows)
    }
}
