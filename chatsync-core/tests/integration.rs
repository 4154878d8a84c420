//! End-to-end tests for the repository, favorites mirror and list sync
//!
//! Each property runs against both store backends: the in-memory store and a
//! SQLite file in a temporary directory.

use std::sync::Arc;

use chatsync_core::config::{FavoritesScope, PendingTogglePolicy};
use chatsync_core::store::{
    Document, DocumentPath, DocumentStore, MemoryStore, SqliteStore, StoreOp, Value,
};
use chatsync_core::sync::{ListSyncController, Notice, SyncDispatcher, SyncEvent, ToggleState};
use chatsync_core::{ChatId, ChatRepository, Error, FavoritesMirror, SessionContext, UserId};
use chrono::Utc;
use tempfile::TempDir;
use tokio::runtime::Handle;

struct Backend {
    store: Arc<dyn DocumentStore>,
    // Keeps the SQLite file alive for the test
    _dir: Option<TempDir>,
}

fn backends() -> Vec<(&'static str, Backend)> {
    let dir = TempDir::new().unwrap();
    let sqlite = SqliteStore::open(&dir.path().join("documents.db")).unwrap();
    vec![
        (
            "memory",
            Backend {
                store: Arc::new(MemoryStore::new()),
                _dir: None,
            },
        ),
        (
            "sqlite",
            Backend {
                store: Arc::new(sqlite),
                _dir: Some(dir),
            },
        ),
    ]
}

fn signed_in(uid: &str) -> SessionContext {
    SessionContext::signed_in(UserId::new(uid).unwrap())
}

// ============================================
// Repository properties
// ============================================

#[tokio::test]
async fn test_create_then_list() {
    for (name, backend) in backends() {
        let repo = ChatRepository::new(backend.store.clone(), signed_in("u1"));
        assert!(repo.fetch_all_chats().await.unwrap().is_empty(), "{}", name);

        let before = Utc::now();
        let id = repo.create_chat("Review this").await.unwrap();

        let rows = repo.fetch_all_chats().await.unwrap();
        assert_eq!(rows.len(), 1, "{}", name);
        assert_eq!(rows[0].chat_id, id);
        assert_eq!(rows[0].title, "Review this");
        assert!(!rows[0].is_favorited);
        assert!(rows[0].timestamp >= before, "{}", name);
    }
}

#[tokio::test]
async fn test_chats_listed_newest_first() {
    for (name, backend) in backends() {
        let repo = ChatRepository::new(backend.store.clone(), signed_in("u1"));
        let first = repo.create_chat("first").await.unwrap();
        let second = repo.create_chat("second").await.unwrap();
        let third = repo.create_chat("third").await.unwrap();

        let ids: Vec<ChatId> = repo
            .fetch_all_chats()
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.chat_id)
            .collect();
        assert_eq!(ids, vec![third, second, first], "{}", name);
    }
}

#[tokio::test]
async fn test_appends_keep_submission_order() {
    for (name, backend) in backends() {
        let repo = ChatRepository::new(backend.store.clone(), signed_in("u1"));
        let id = repo.create_chat("t").await.unwrap();

        for i in 0..10 {
            repo.append_message(&id, &format!("m{}", i), i % 2 == 0)
                .await
                .unwrap();
        }

        let messages = repo.fetch_messages(&id).await.unwrap();
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("m{}", i)).collect();
        assert_eq!(texts, expected, "{}", name);
        assert!(messages.windows(2).all(|w| w[0].sent_at < w[1].sent_at));

        // Reading again returns the same messages
        assert_eq!(repo.fetch_messages(&id).await.unwrap(), messages);
    }
}

#[tokio::test]
async fn test_concurrent_appends_are_not_lost() {
    for (name, backend) in backends() {
        let repo = Arc::new(ChatRepository::new(backend.store.clone(), signed_in("u1")));
        let id = repo.create_chat("t").await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..20 {
            let repo = repo.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                repo.append_message(&id, &format!("m{}", i), true).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(repo.fetch_messages(&id).await.unwrap().len(), 20, "{}", name);
    }
}

#[tokio::test]
async fn test_favorite_round_trip() {
    for (name, backend) in backends() {
        let repo = ChatRepository::new(backend.store.clone(), signed_in("u1"));
        let id = repo.create_chat("t").await.unwrap();

        repo.set_favorited(&id, true).await.unwrap();
        assert_eq!(repo.mirror().list_favorites().await.unwrap().len(), 1, "{}", name);

        repo.set_favorited(&id, false).await.unwrap();
        // Unfavoriting twice is fine
        repo.set_favorited(&id, false).await.unwrap();

        assert!(!repo.fetch_chat(&id).await.unwrap().unwrap().is_favorited);
        assert!(repo.mirror().list_favorites().await.unwrap().is_empty(), "{}", name);
        assert!(repo
            .mirror()
            .fetch_favorite(&format!("u1_{}", id))
            .await
            .unwrap()
            .is_none());
    }
}

#[tokio::test]
async fn test_favorite_snapshot_is_frozen() {
    for (name, backend) in backends() {
        let repo = ChatRepository::new(backend.store.clone(), signed_in("u1"));
        let id = repo.create_chat("t").await.unwrap();
        repo.append_message(&id, "question", true).await.unwrap();
        repo.append_message(&id, "answer", false).await.unwrap();

        repo.set_favorited(&id, true).await.unwrap();
        let key = format!("u1_{}", id);
        let snapshot = repo.mirror().fetch_favorite(&key).await.unwrap().unwrap();
        let chat = repo.fetch_chat(&id).await.unwrap().unwrap();
        assert_eq!(snapshot.messages, chat.messages, "{}", name);
        assert_eq!(snapshot.title, chat.title);

        repo.append_message(&id, "follow-up", true).await.unwrap();
        let after = repo.mirror().fetch_favorite(&key).await.unwrap().unwrap();
        assert_eq!(after.messages.len(), 2, "{}", name);

        // Favoriting again refreshes the copy
        repo.set_favorited(&id, true).await.unwrap();
        let refreshed = repo.mirror().fetch_favorite(&key).await.unwrap().unwrap();
        assert_eq!(refreshed.messages.len(), 3, "{}", name);
    }
}

#[tokio::test]
async fn test_users_do_not_see_each_other() {
    for (name, backend) in backends() {
        let alice = ChatRepository::new(backend.store.clone(), signed_in("alice"));
        let bob = ChatRepository::new(backend.store.clone(), signed_in("bob"));

        let id = alice.create_chat("private").await.unwrap();
        alice.set_favorited(&id, true).await.unwrap();

        assert!(bob.fetch_all_chats().await.unwrap().is_empty(), "{}", name);
        assert!(bob.mirror().list_favorites().await.unwrap().is_empty());

        let global = FavoritesMirror::new(backend.store.clone(), signed_in("bob"), FavoritesScope::Global);
        assert_eq!(global.list_favorites().await.unwrap().len(), 1, "{}", name);
    }
}

#[tokio::test]
async fn test_unauthenticated_touches_nothing() {
    let store = Arc::new(MemoryStore::new());
    let session = SessionContext::signed_out();
    let repo = ChatRepository::new(store.clone(), session.clone());
    let id = ChatId::new("c1").unwrap();

    assert!(repo.create_chat("t").await.unwrap_err().is_unauthenticated());
    assert!(repo.append_message(&id, "x", true).await.unwrap_err().is_unauthenticated());
    assert!(repo.fetch_all_chats().await.unwrap_err().is_unauthenticated());
    assert!(repo.fetch_messages(&id).await.unwrap_err().is_unauthenticated());
    assert!(repo.fetch_chat(&id).await.unwrap_err().is_unauthenticated());
    assert!(repo.set_favorited(&id, true).await.unwrap_err().is_unauthenticated());
    assert!(repo.mirror().list_favorites().await.unwrap_err().is_unauthenticated());
    assert_eq!(store.call_count(), 0);

    // Signing in later makes the same repository usable
    session.sign_in(UserId::new("u1").unwrap());
    assert!(repo.fetch_all_chats().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_typed_fields_do_not_hide_other_rows() {
    for (name, backend) in backends() {
        let repo = ChatRepository::new(backend.store.clone(), signed_in("u1"));
        let good = repo.create_chat("good").await.unwrap();
        repo.set_favorited(&good, true).await.unwrap();

        let mut bad_chat = Document::new();
        bad_chat.insert("title".into(), Value::Integer(7));
        bad_chat.insert("isFavorited".into(), Value::from("yes"));
        backend
            .store
            .set(&DocumentPath::parse("users/u1/chats/bad").unwrap(), bad_chat)
            .await
            .unwrap();

        let mut bad_favorite = Document::new();
        bad_favorite.insert("ownerUid".into(), Value::from("u1"));
        bad_favorite.insert("title".into(), Value::Integer(7));
        backend
            .store
            .set(&DocumentPath::favorite("u1_bad").unwrap(), bad_favorite)
            .await
            .unwrap();

        let rows = repo.fetch_all_chats().await.unwrap();
        assert_eq!(rows.len(), 2, "{}", name);
        let bad = rows.iter().find(|row| row.chat_id.as_str() == "bad").unwrap();
        assert_eq!(bad.title, "");
        assert!(!bad.is_favorited);
        assert!(rows.iter().any(|row| row.chat_id == good && row.title == "good"));

        let favorites = repo.mirror().list_favorites().await.unwrap();
        assert_eq!(favorites.len(), 2, "{}", name);
        assert!(favorites.iter().any(|row| row.record_key == "u1_bad" && row.title.is_empty()));
    }
}

// ============================================
// List sync
// ============================================

fn view(
    store: Arc<dyn DocumentStore>,
) -> (
    SyncDispatcher,
    tokio::sync::mpsc::UnboundedReceiver<SyncEvent>,
    Arc<ChatRepository>,
) {
    let session = signed_in("u1");
    let repo = Arc::new(ChatRepository::new(store.clone(), session.clone()));
    let mirror = FavoritesMirror::new(store, session, FavoritesScope::Owner);
    let (dispatcher, rx) = SyncDispatcher::channel(Handle::current(), repo.clone(), mirror);
    (dispatcher, rx, repo)
}

#[tokio::test]
async fn test_failed_toggle_rolls_back() {
    chatsync_core::logging::init_test();
    let store = Arc::new(MemoryStore::new());
    let (dispatcher, mut rx, repo) = view(store.clone());
    let id = repo.create_chat("t").await.unwrap();

    let mut ctl = ListSyncController::new(PendingTogglePolicy::Reject);
    dispatcher.dispatch_refresh();
    let event = rx.recv().await.unwrap();
    ctl.handle_event(event);
    let before = ctl.chats.rows().to_vec();
    assert_eq!(before[0].favorite, ToggleState::Settled(false));

    store.fail_next(StoreOp::Update);
    let (request, _, _) = ctl.toggle_favorite(&id);
    assert!(ctl.chats.row(&id).unwrap().is_favorited());
    dispatcher.dispatch_toggle(request.unwrap());

    let outcome = ctl.handle_event(rx.recv().await.unwrap());
    assert!(matches!(outcome.notice, Some(Notice::ToggleFailed(_))));
    assert_eq!(ctl.chats.rows(), before.as_slice());
    assert!(!repo.fetch_chat(&id).await.unwrap().unwrap().is_favorited);
}

#[tokio::test]
async fn test_toggle_then_refresh_favorites() {
    let (dispatcher, mut rx, repo) = view(Arc::new(MemoryStore::new()));
    let id = repo.create_chat("t").await.unwrap();
    repo.create_chat("other").await.unwrap();

    let mut ctl = ListSyncController::new(PendingTogglePolicy::Reject);
    dispatcher.dispatch_refresh();
    ctl.handle_event(rx.recv().await.unwrap());

    let (request, _, _) = ctl.toggle_favorite(&id);
    dispatcher.dispatch_toggle(request.unwrap());
    let outcome = ctl.handle_event(rx.recv().await.unwrap());
    assert_eq!(outcome.notice, Some(Notice::Favorited));
    assert!(outcome.refresh_favorites);

    dispatcher.dispatch_refresh_favorites();
    ctl.handle_event(rx.recv().await.unwrap());
    assert_eq!(ctl.favorites.len(), 1);
    assert_eq!(ctl.favorites.rows()[0].chat_id, id.as_str());

    // Only the toggled row differs after a full refresh
    dispatcher.dispatch_refresh();
    let outcome = ctl.handle_event(rx.recv().await.unwrap());
    assert!(outcome.chat_changes.is_empty());
}

#[tokio::test]
async fn test_mirror_divergence_surfaces() {
    chatsync_core::logging::init_test();
    let store = Arc::new(MemoryStore::new());
    let (dispatcher, mut rx, repo) = view(store.clone());
    let id = repo.create_chat("t").await.unwrap();

    let mut ctl = ListSyncController::new(PendingTogglePolicy::Reject);
    dispatcher.dispatch_refresh();
    ctl.handle_event(rx.recv().await.unwrap());

    store.fail_path_prefix(StoreOp::Set, "favorites/");
    let (request, _, _) = ctl.toggle_favorite(&id);
    dispatcher.dispatch_toggle(request.unwrap());

    let event = rx.recv().await.unwrap();
    match &event {
        SyncEvent::ToggleSettled { result: Err(err), .. } => {
            assert!(matches!(err, Error::MirrorDiverged { .. }))
        }
        other => panic!("unexpected event: {:?}", other),
    }
    let outcome = ctl.handle_event(event);
    assert!(matches!(outcome.notice, Some(Notice::MirrorStale(_))));
    assert_eq!(ctl.chats.row(&id).unwrap().favorite, ToggleState::Settled(true));
}

#[tokio::test]
async fn test_torn_down_view_drops_results() {
    let (dispatcher, rx, repo) = view(Arc::new(MemoryStore::new()));
    let id = repo.create_chat("t").await.unwrap();
    drop(rx);

    dispatcher.dispatch_refresh().await.unwrap();
    dispatcher.dispatch_load_messages(id).await.unwrap();
}
