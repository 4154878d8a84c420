//! Chat session flow
//!
//! Seeds a new chat from recognized text and relays prompts to a reply
//! backend, recording both sides of the exchange through
//! [`ChatRepository`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::repository::ChatRepository;
use crate::types::{derive_title, ChatId};

/// Reply used when the backend answers with nothing.
pub const EMPTY_REPLY: &str = "No response.";

/// Error type returned by collaborators.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Extracts text from a captured image.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> std::result::Result<String, CollaboratorError>;
}

/// Produces an assistant reply for a prompt.
#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn reply(&self, prompt: &str) -> std::result::Result<String, CollaboratorError>;
}

/// Drives one chat conversation at a time.
pub struct ConversationService {
    repo: Arc<ChatRepository>,
    /// `None` records user messages without asking for replies
    responder: Option<Arc<dyn ChatResponder>>,
}

impl ConversationService {
    pub fn new(repo: Arc<ChatRepository>, responder: Arc<dyn ChatResponder>) -> Self {
        Self {
            repo,
            responder: Some(responder),
        }
    }

    /// A service with no reply backend; only the user's side is recorded.
    pub fn record_only(repo: Arc<ChatRepository>) -> Self {
        Self {
            repo,
            responder: None,
        }
    }

    /// Recognize text in `image` and start a chat seeded with it.
    pub async fn start_from_image(
        &self,
        recognizer: &dyn TextRecognizer,
        image: &[u8],
    ) -> Result<ChatId> {
        let text = recognizer.recognize(image).await.map_err(|e| {
            tracing::warn!(error = %e, bytes = image.len(), "Text recognition failed");
            Error::Collaborator(format!("text recognition failed: {}", e))
        })?;
        self.start_from_seed(&text).await
    }

    /// Create a chat titled after `seed`.
    ///
    /// A non-blank seed becomes the first user message and is answered
    /// right away.
    pub async fn start_from_seed(&self, seed: &str) -> Result<ChatId> {
        let title = derive_title(seed, self.repo.now());
        let chat_id = self.repo.create_chat(&title).await?;
        tracing::info!(chat_id = %chat_id, title = %title, "Chat started");

        if !seed.trim().is_empty() {
            self.exchange(&chat_id, seed).await?;
        }
        Ok(chat_id)
    }

    /// Send user input to an existing chat.
    ///
    /// Input is trimmed; blank input is ignored and returns `None`.
    /// Otherwise returns the assistant message that was recorded, if a
    /// reply backend is attached.
    pub async fn send(&self, chat_id: &ChatId, text: &str) -> Result<Option<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        self.exchange(chat_id, text).await
    }

    async fn exchange(&self, chat_id: &ChatId, prompt: &str) -> Result<Option<String>> {
        self.repo.append_message(chat_id, prompt, true).await?;

        let Some(responder) = &self.responder else {
            return Ok(None);
        };
        let reply = match responder.reply(prompt).await {
            Ok(reply) if reply.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Reply backend failed");
                format!("Error: {}", e)
            }
        };

        self.repo.append_message(chat_id, &reply, false).await?;
        Ok(Some(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionContext;
    use crate::store::MemoryStore;
    use crate::types::UserId;

    struct Echo;

    #[async_trait]
    impl ChatResponder for Echo {
        async fn reply(&self, prompt: &str) -> std::result::Result<String, CollaboratorError> {
            Ok(format!("re: {}", prompt))
        }
    }

    struct Silent;

    #[async_trait]
    impl ChatResponder for Silent {
        async fn reply(&self, _prompt: &str) -> std::result::Result<String, CollaboratorError> {
            Ok(String::new())
        }
    }

    struct Broken;

    #[async_trait]
    impl ChatResponder for Broken {
        async fn reply(&self, _prompt: &str) -> std::result::Result<String, CollaboratorError> {
            Err("quota exceeded".into())
        }
    }

    struct FixedText(&'static str);

    #[async_trait]
    impl TextRecognizer for FixedText {
        async fn recognize(&self, _image: &[u8]) -> std::result::Result<String, CollaboratorError> {
            Ok(self.0.to_string())
        }
    }

    fn service(responder: Arc<dyn ChatResponder>) -> (ConversationService, Arc<ChatRepository>) {
        let store = Arc::new(MemoryStore::new());
        let session = SessionContext::signed_in(UserId::new("u1").unwrap());
        let repo = Arc::new(ChatRepository::new(store, session));
        (ConversationService::new(repo.clone(), responder), repo)
    }

    #[tokio::test]
    async fn test_seeded_chat_gets_reply() {
        let (svc, repo) = service(Arc::new(Echo));
        let id = svc.start_from_seed("fn main() {}\nmore").await.unwrap();

        let chat = repo.fetch_chat(&id).await.unwrap().unwrap();
        assert_eq!(chat.title, "fn main() {}");
        assert_eq!(chat.messages.len(), 2);
        assert!(chat.messages[0].is_user);
        assert_eq!(chat.messages[0].text, "fn main() {}\nmore");
        assert_eq!(chat.messages[1].text, "re: fn main() {}\nmore");
        assert!(!chat.messages[1].is_user);
    }

    #[tokio::test]
    async fn test_empty_seed_creates_empty_chat() {
        let (svc, repo) = service(Arc::new(Echo));
        let id = svc.start_from_seed("").await.unwrap();
        let chat = repo.fetch_chat(&id).await.unwrap().unwrap();
        assert!(chat.title.starts_with("Chat_"));
        assert!(chat.messages.is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_failed_replies() {
        let (svc, repo) = service(Arc::new(Silent));
        let id = repo.create_chat("t").await.unwrap();
        assert_eq!(svc.send(&id, "hi").await.unwrap().as_deref(), Some(EMPTY_REPLY));
        assert_eq!(svc.send(&id, "   ").await.unwrap(), None);

        let (svc, repo) = service(Arc::new(Broken));
        let id = repo.create_chat("t").await.unwrap();
        let reply = svc.send(&id, "hi").await.unwrap().unwrap();
        assert_eq!(reply, "Error: quota exceeded");
        let messages = repo.fetch_messages(&id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "Error: quota exceeded");
    }

    #[tokio::test]
    async fn test_record_only_keeps_user_side() {
        let store = Arc::new(MemoryStore::new());
        let session = SessionContext::signed_in(UserId::new("u1").unwrap());
        let repo = Arc::new(ChatRepository::new(store, session));
        let svc = ConversationService::record_only(repo.clone());

        let id = svc.start_from_seed("question").await.unwrap();
        assert_eq!(svc.send(&id, " again ").await.unwrap(), None);

        let messages = repo.fetch_messages(&id).await.unwrap();
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["question", "again"]);
        assert!(messages.iter().all(|m| m.is_user));
    }

    #[tokio::test]
    async fn test_start_from_image() {
        let (svc, repo) = service(Arc::new(Echo));
        let id = svc
            .start_from_image(&FixedText("let x = 1;"), b"png")
            .await
            .unwrap();
        assert_eq!(repo.fetch_chat(&id).await.unwrap().unwrap().title, "let x = 1;");
    }
}
