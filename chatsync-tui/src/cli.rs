//! chatsync-cli - script the chat store from the shell
//!
//! Creates chats, appends messages and toggles favorites for the configured
//! user, and prints chats and favorite snapshots.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chatsync_core::{
    store, Chat, ChatId, ChatRepository, Config, ConversationService, Error, FavoriteRecord,
    FavoritesMirror, Message, SessionContext,
};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};

/// Exit status when a favorite flag was written but the mirror was not.
const EXIT_MIRROR_DIVERGED: u8 = 2;

#[derive(Parser)]
#[command(name = "chatsync-cli")]
#[command(about = "Manage chats and favorites in the chatsync document store")]
#[command(version)]
struct Args {
    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a chat titled after the seed text
    New {
        /// Seed text; becomes the first user message when non-empty
        #[arg(long, default_value = "")]
        seed: String,
    },
    /// Append a message to a chat
    Append {
        chat: String,
        text: String,
        /// Record the message as an assistant reply
        #[arg(long)]
        assistant: bool,
    },
    /// List chats, most recent first
    List,
    /// Print a chat's transcript
    Show { chat: String },
    /// Favorite a chat and copy it into the favorites collection
    Favorite { chat: String },
    /// Unfavorite a chat and remove its favorites copy
    Unfavorite { chat: String },
    /// List favorites, most recent first
    Favorites,
    /// Print a favorite snapshot by record key
    FavoriteShow { record: String },
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        chatsync_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let json = match args.format.as_str() {
        "text" => false,
        "json" => true,
        other => anyhow::bail!("unknown format '{}' (expected text or json)", other),
    };

    // A missing user is reported by the repository as Unauthenticated
    let session = match config.startup_user().context("invalid user id")? {
        Some(uid) => SessionContext::signed_in(uid),
        None => SessionContext::signed_out(),
    };

    let store = store::open(&config.store).context("failed to open document store")?;
    let repo = Arc::new(ChatRepository::new(store.clone(), session.clone()));
    let favorites = FavoritesMirror::new(store, session, config.favorites.scope);

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(execute(args.command, &repo, &favorites, json))
}

async fn execute(
    command: Command,
    repo: &Arc<ChatRepository>,
    favorites: &FavoritesMirror,
    json: bool,
) -> Result<ExitCode> {
    match command {
        Command::New { seed } => {
            // No reply backend here; replies are added with `append --assistant`
            let chat_id = ConversationService::record_only(Arc::clone(repo))
                .start_from_seed(&seed)
                .await
                .map_err(explain)?;
            println!("{}", chat_id);
        }
        Command::Append {
            chat,
            text,
            assistant,
        } => {
            let chat_id = parse_chat_id(&chat)?;
            repo.append_message(&chat_id, &text, !assistant)
                .await
                .map_err(explain)?;
        }
        Command::List => {
            let rows = repo.fetch_all_chats().await.map_err(explain)?;
            if json {
                let items: Vec<_> = rows
                    .iter()
                    .map(|row| {
                        serde_json::json!({
                            "chatId": row.chat_id.as_str(),
                            "title": row.title,
                            "timestamp": row.timestamp.to_rfc3339(),
                            "isFavorited": row.is_favorited,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if rows.is_empty() {
                println!("No chats yet.");
            } else {
                for row in &rows {
                    let star = if row.is_favorited { "★" } else { " " };
                    println!(
                        "{} {}  {}  {}",
                        star,
                        row.chat_id,
                        format_time(row.timestamp),
                        row.title
                    );
                }
            }
        }
        Command::Show { chat } => {
            let chat_id = parse_chat_id(&chat)?;
            let chat = repo
                .fetch_chat(&chat_id)
                .await
                .map_err(explain)?
                .with_context(|| format!("no chat '{}'", chat_id))?;
            print_chat(&chat, json)?;
        }
        Command::Favorite { chat } => {
            return set_favorited(repo, &chat, true).await;
        }
        Command::Unfavorite { chat } => {
            return set_favorited(repo, &chat, false).await;
        }
        Command::Favorites => {
            let rows = favorites.list_favorites().await.map_err(explain)?;
            if json {
                let items: Vec<_> = rows
                    .iter()
                    .map(|row| {
                        serde_json::json!({
                            "key": row.record_key,
                            "ownerUid": row.owner,
                            "chatId": row.chat_id,
                            "title": row.title,
                            "timestamp": row.timestamp.to_rfc3339(),
                            "messages": row.message_count,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if rows.is_empty() {
                println!("No favorites yet.");
            } else {
                for row in &rows {
                    println!(
                        "{}  {}  {:>4} msgs  {}",
                        row.record_key,
                        format_time(row.timestamp),
                        row.message_count,
                        row.title
                    );
                }
            }
        }
        Command::FavoriteShow { record } => {
            let snapshot = favorites
                .fetch_favorite(&record)
                .await
                .map_err(explain)?
                .with_context(|| format!("no favorite '{}'", record))?;
            print_favorite(&snapshot, json)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn set_favorited(repo: &ChatRepository, chat: &str, desired: bool) -> Result<ExitCode> {
    let chat_id = parse_chat_id(chat)?;
    match repo.set_favorited(&chat_id, desired).await {
        Ok(()) => {
            println!("{}", if desired { "Favorited" } else { "Unfavorited" });
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_mirror_divergence() => {
            eprintln!("Warning: {}", e);
            eprintln!("The favorite flag was saved; toggle again to repair the favorites list.");
            Ok(ExitCode::from(EXIT_MIRROR_DIVERGED))
        }
        Err(e) => Err(explain(e)),
    }
}

fn parse_chat_id(raw: &str) -> Result<ChatId> {
    ChatId::new(raw).with_context(|| format!("invalid chat id '{}'", raw))
}

/// Add a hint to errors a user can fix.
fn explain(e: Error) -> anyhow::Error {
    if e.is_unauthenticated() {
        anyhow::Error::new(e).context(format!(
            "no user signed in; set {} or [session] user_id",
            chatsync_core::config::USER_ENV
        ))
    } else {
        anyhow::Error::new(e)
    }
}

fn format_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn messages_json(messages: &[Message]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "text": m.text,
                "isUser": m.is_user,
                "sentAt": m.sent_at.to_rfc3339(),
            })
        })
        .collect()
}

fn print_messages(messages: &[Message]) {
    if messages.is_empty() {
        println!("(no messages)");
    }
    for m in messages {
        let who = if m.is_user { "You" } else { "Assistant" };
        println!("[{}] {}:", format_time(m.sent_at), who);
        for line in m.text.lines() {
            println!("  {}", line);
        }
    }
}

fn print_chat(chat: &Chat, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "chatId": chat.id.as_str(),
            "title": chat.title,
            "timestamp": chat.timestamp.to_rfc3339(),
            "isFavorited": chat.is_favorited,
            "messages": messages_json(&chat.messages),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    let star = if chat.is_favorited { " ★" } else { "" };
    println!("{}{}", chat.title, star);
    println!("Created {}", format_time(chat.timestamp));
    println!();
    print_messages(&chat.messages);
    Ok(())
}

fn print_favorite(record: &FavoriteRecord, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "ownerUid": record.owner.as_str(),
            "chatId": record.chat_id.as_str(),
            "title": record.title,
            "timestamp": record.timestamp.to_rfc3339(),
            "messages": messages_json(&record.messages),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("{} (favorite snapshot)", record.title);
    println!("Created {}", format_time(record.timestamp));
    println!();
    print_messages(&record.messages);
    Ok(())
}
