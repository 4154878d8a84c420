//! Application state for the TUI.

use std::time::{Duration, Instant};

use chatsync_core::config::PendingTogglePolicy;
use chatsync_core::sync::{
    EventOutcome, ListSyncController, Notice, SyncDispatcher, SyncEvent, ToggleRequest, Transcript,
    TranscriptSource,
};
use chatsync_core::ChatId;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::TableState;

/// How long a footer notice stays visible.
const NOTICE_TTL: Duration = Duration::from_secs(4);

/// Top-level tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Chats,
    Favorites,
}

/// Current view mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ViewMode {
    /// Table of the active tab
    #[default]
    List,
    /// Read-only transcript, waiting for or showing its messages
    Transcript,
}

/// Main application state.
pub struct App {
    dispatcher: SyncDispatcher,
    /// Row state for both tabs
    pub lists: ListSyncController,
    pub tab: Tab,
    pub view_mode: ViewMode,
    pub chat_table: TableState,
    pub favorites_table: TableState,
    /// Transcript the open view is waiting for
    requested: Option<TranscriptSource>,
    /// Loaded transcript for the transcript view
    pub transcript: Option<Transcript>,
    /// Scroll offset for the transcript view
    pub scroll_offset: usize,
    notice: Option<(Notice, Instant)>,
    /// Whether the app should quit
    pub should_quit: bool,
}

impl App {
    pub fn new(dispatcher: SyncDispatcher, policy: PendingTogglePolicy) -> Self {
        Self {
            dispatcher,
            lists: ListSyncController::new(policy),
            tab: Tab::default(),
            view_mode: ViewMode::default(),
            chat_table: TableState::default(),
            favorites_table: TableState::default(),
            requested: None,
            transcript: None,
            scroll_offset: 0,
            notice: None,
            should_quit: false,
        }
    }

    /// Request both lists from the store.
    pub fn refresh_all(&self) {
        self.dispatcher.dispatch_refresh();
        self.dispatcher.dispatch_refresh_favorites();
    }

    /// The notice to show, if it has not expired.
    pub fn notice(&self) -> Option<&Notice> {
        self.notice
            .as_ref()
            .filter(|(_, shown)| shown.elapsed() < NOTICE_TTL)
            .map(|(notice, _)| notice)
    }

    fn show(&mut self, notice: Notice) {
        self.notice = Some((notice, Instant::now()));
    }

    /// Apply a repository result delivered to this view.
    pub fn apply_event(&mut self, event: SyncEvent) {
        let selected_chat = self.selected_chat_id();
        let selected_favorite = self.selected_favorite_key();

        let EventOutcome {
            notice,
            follow_up,
            refresh_favorites,
            transcript,
            ..
        } = self.lists.handle_event(event);

        if let Some(notice) = notice {
            self.show(notice);
        }
        if let Some(request) = follow_up {
            self.dispatch_toggle(request);
        }
        if refresh_favorites {
            self.dispatcher.dispatch_refresh_favorites();
        }
        if let Some(transcript) = transcript {
            // Only the transcript the open view asked for
            if self.requested.as_ref() == Some(&transcript.source) {
                self.transcript = Some(transcript);
                self.scroll_offset = 0;
            } else {
                tracing::debug!(source = ?transcript.source, "Dropping stale transcript");
            }
        }

        self.restore_chat_selection(selected_chat);
        self.restore_favorite_selection(selected_favorite);
    }

    /// Handle keyboard input.
    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.view_mode {
            ViewMode::List => self.handle_list_key(key),
            ViewMode::Transcript => self.handle_transcript_key(key),
        }
    }

    /// Handle keyboard input in list view.
    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Tab => {
                self.tab = match self.tab {
                    Tab::Chats => Tab::Favorites,
                    Tab::Favorites => Tab::Chats,
                };
            }
            KeyCode::Char('r') => {
                self.refresh_all();
            }
            KeyCode::Char('f') => {
                if self.tab == Tab::Chats {
                    self.toggle_selected();
                }
            }
            KeyCode::Enter => {
                self.open_transcript();
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.select_next();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.select_previous();
            }
            _ => {}
        }
    }

    /// Handle keyboard input in transcript view.
    fn handle_transcript_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.view_mode = ViewMode::List;
                self.requested = None;
                self.transcript = None;
                self.scroll_offset = 0;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.scroll_offset = self.scroll_offset.saturating_add(1);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.scroll_offset = self.scroll_offset.saturating_sub(1);
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.scroll_offset = 0;
            }
            _ => {}
        }
    }

    fn toggle_selected(&mut self) {
        let Some(chat_id) = self.selected_chat_id() else {
            return;
        };
        let (request, _changes, notice) = self.lists.toggle_favorite(&chat_id);
        if let Some(notice) = notice {
            self.show(notice);
        }
        if let Some(request) = request {
            self.dispatch_toggle(request);
        }
    }

    fn dispatch_toggle(&self, request: ToggleRequest) {
        tracing::debug!(chat_id = %request.chat_id, desired = request.desired, "Dispatching favorite toggle");
        self.dispatcher.dispatch_toggle(request);
    }

    fn open_transcript(&mut self) {
        match self.tab {
            Tab::Chats => {
                if let Some(chat_id) = self.selected_chat_id() {
                    self.view_mode = ViewMode::Transcript;
                    self.requested = Some(TranscriptSource::Chat(chat_id.clone()));
                    self.dispatcher.dispatch_load_messages(chat_id);
                }
            }
            Tab::Favorites => {
                if let Some(key) = self.selected_favorite_key() {
                    self.view_mode = ViewMode::Transcript;
                    self.requested = Some(TranscriptSource::Favorite(key.clone()));
                    self.dispatcher.dispatch_load_favorite(key);
                }
            }
        }
    }

    fn selected_chat_id(&self) -> Option<ChatId> {
        let idx = self.chat_table.selected()?;
        self.lists
            .chats
            .rows()
            .get(idx)
            .map(|row| row.summary.chat_id.clone())
    }

    fn selected_favorite_key(&self) -> Option<String> {
        let idx = self.favorites_table.selected()?;
        self.lists
            .favorites
            .rows()
            .get(idx)
            .map(|row| row.record_key.clone())
    }

    /// Keep the cursor on the same chat across list changes.
    fn restore_chat_selection(&mut self, previous: Option<ChatId>) {
        let rows = self.lists.chats.rows();
        let idx = previous
            .and_then(|id| rows.iter().position(|row| row.summary.chat_id == id))
            .or_else(|| clamp_selection(self.chat_table.selected(), rows.len()));
        self.chat_table.select(idx);
    }

    fn restore_favorite_selection(&mut self, previous: Option<String>) {
        let rows = self.lists.favorites.rows();
        let idx = previous
            .and_then(|key| rows.iter().position(|row| row.record_key == key))
            .or_else(|| clamp_selection(self.favorites_table.selected(), rows.len()));
        self.favorites_table.select(idx);
    }

    fn active_len(&self) -> usize {
        match self.tab {
            Tab::Chats => self.lists.chats.rows().len(),
            Tab::Favorites => self.lists.favorites.len(),
        }
    }

    fn active_table(&mut self) -> &mut TableState {
        match self.tab {
            Tab::Chats => &mut self.chat_table,
            Tab::Favorites => &mut self.favorites_table,
        }
    }

    /// Select the next row in the table.
    fn select_next(&mut self) {
        let len = self.active_len();
        if len == 0 {
            return;
        }
        let table = self.active_table();
        let i = match table.selected() {
            Some(i) if i + 1 < len => i + 1,
            Some(_) => 0,
            None => 0,
        };
        table.select(Some(i));
    }

    /// Select the previous row in the table.
    fn select_previous(&mut self) {
        let len = self.active_len();
        if len == 0 {
            return;
        }
        let table = self.active_table();
        let i = match table.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        table.select(Some(i));
    }
}

fn clamp_selection(selected: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(selected.unwrap_or(0).min(len - 1))
}
