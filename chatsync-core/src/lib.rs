//! # chatsync-core
//!
//! Client-side sync layer between a chat UI and a per-user document store.
//!
//! This library provides:
//! - Chat, message and favorite types with explicit schema defaulting
//! - [`ChatRepository`] for chat lifecycle operations, with atomic appends
//! - [`FavoritesMirror`], the denormalized favorites collection
//! - List controllers with optimistic favorite toggles and minimal-diff redraws
//! - A [`DocumentStore`] abstraction with in-memory and SQLite backends
//! - Configuration and logging
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chatsync_core::{store, ChatRepository, Config, SessionContext, UserId};
//!
//! # async fn run() -> chatsync_core::Result<()> {
//! let config = Config::load()?;
//! let store = store::open(&config.store)?;
//! let session = SessionContext::signed_in(UserId::new("alice")?);
//!
//! let repo = Arc::new(ChatRepository::new(store, session));
//! let chat_id = repo.create_chat("Review my parser").await?;
//! repo.append_message(&chat_id, "fn parse() {}", true).await?;
//! repo.set_favorited(&chat_id, true).await?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use conversation::{ChatResponder, ConversationService, TextRecognizer};
pub use error::{Error, Result};
pub use mirror::FavoritesMirror;
pub use repository::ChatRepository;
pub use session::SessionContext;
pub use store::{DocumentStore, MemoryStore, SqliteStore};
pub use types::*;

// Public modules
pub mod config;
pub mod conversation;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod repository;
pub mod schema;
pub mod session;
pub mod store;
pub mod sync;
pub mod types;
