//! Error types for chatsync-core

use thiserror::Error;

/// Main error type for the chatsync-core library
#[derive(Error, Debug)]
pub enum Error {
    /// No user is signed in; raised before the store is touched
    #[error("not authenticated")]
    Unauthenticated,

    /// Remote or backend store failure
    #[error("store error: {0}")]
    Store(String),

    /// Addressed document does not exist
    #[error("document not found: {0}")]
    NotFound(String),

    /// Stored document has a field that cannot be decoded or defaulted
    #[error("schema error at {path}: {message}")]
    Schema { path: String, message: String },

    /// The favorite flag was written but the favorites mirror was not.
    ///
    /// The flag keeps its new value; the mirror record is stale until the
    /// chat is toggled again.
    #[error("favorite flag for chat {chat_id} set to {desired} but mirror update failed: {source}")]
    MirrorDiverged {
        chat_id: String,
        desired: bool,
        #[source]
        source: Box<Error>,
    },

    /// Text recognition or reply backend failed
    #[error("{0}")]
    Collaborator(String),

    /// Invalid identifier or path
    #[error("invalid {kind}: {value:?}")]
    InvalidId { kind: &'static str, value: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the call was rejected for lack of a session.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Error::Unauthenticated)
    }

    /// Whether the primary write landed and only the mirror is stale.
    pub fn is_mirror_divergence(&self) -> bool {
        matches!(self, Error::MirrorDiverged { .. })
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(format!("sqlite: {}", err))
    }
}

/// Result type alias for chatsync-core
pub type Result<T> = std::result::Result<T, Error>;
