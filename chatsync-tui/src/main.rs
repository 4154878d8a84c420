//! chatsync - chat transcript and favorites browser
//!
//! Terminal UI over the signed-in user's chats, with optimistic favorite
//! toggling and a read-only favorites tab.

mod app;
mod chat_row;
mod ui;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use chatsync_core::sync::{SyncDispatcher, SyncEvent};
use chatsync_core::{store, ChatRepository, Config, FavoritesMirror, SessionContext};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::app::App;

fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file, not stdout since we have a TUI)
    let log_guard =
        chatsync_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("chatsync TUI starting up");

    let uid = config
        .startup_user()
        .context("invalid user id")?
        .with_context(|| {
            format!(
                "no user signed in; set {} or [session] user_id in {}",
                chatsync_core::config::USER_ENV,
                Config::config_path().display()
            )
        })?;
    let session = SessionContext::signed_in(uid);

    // Repository calls run here; the UI loop stays on the main thread
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    let store = store::open(&config.store).context("failed to open document store")?;
    let repo = Arc::new(ChatRepository::new(store.clone(), session.clone()));
    let favorites = FavoritesMirror::new(store, session, config.favorites.scope);
    let (dispatcher, events) = SyncDispatcher::channel(runtime.handle().clone(), repo, favorites);

    let mut app = App::new(dispatcher, config.list.pending_toggle);
    app.refresh_all();

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    // Run the main loop
    let result = run_app(&mut terminal, &mut app, events);

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    tracing::info!("chatsync TUI shutting down");

    if result.is_err() {
        eprintln!("Logs are in {}", log_guard.log_dir().display());
    }
    result
}

/// Run the main application loop.
///
/// Results of repository calls are drained at the top of every tick, so list
/// state is only ever touched from this thread.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut events: UnboundedReceiver<SyncEvent>,
) -> Result<()> {
    loop {
        while let Ok(event) = events.try_recv() {
            app.apply_event(event);
        }

        // Render
        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    Ok(())
}
